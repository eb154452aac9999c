use crate::scheduler::{RunRecord, RunScheduler, RunState};
use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use lustre_core::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const SERVICE_NAME: &str = "Diamond Recommender";

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    service: String,
}

#[derive(Serialize, Deserialize)]
struct TriggerResponse {
    success: bool,
    message: String,
    run_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize)]
struct CancelResponse {
    run_id: Uuid,
    #[serde(flatten)]
    state: RunState,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(scheduler: Arc<RunScheduler>, port: u16) -> std::io::Result<()> {
        info!("Starting REST API on port {}", port);
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new().wrap(cors).configure(configure(scheduler.clone()))
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Register the routes and their shared state on an app
pub fn configure(scheduler: Arc<RunScheduler>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(scheduler))
            .route("/", web::get().to(health))
            .route("/trigger-update", web::post().to(trigger_update))
            .route("/runs", web::get().to(list_runs))
            .route("/runs/{id}", web::get().to(get_run))
            .route("/runs/{id}/cancel", web::post().to(cancel_run));
    }
}

async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "running".to_string(),
        service: SERVICE_NAME.to_string(),
    }))
}

async fn trigger_update(scheduler: web::Data<Arc<RunScheduler>>) -> ActixResult<HttpResponse> {
    match scheduler.trigger() {
        Ok(ticket) => {
            let message = if ticket.coalesced {
                "Update already queued; joined the pending run."
            } else {
                "Update process started in background."
            };
            Ok(HttpResponse::Ok().json(TriggerResponse {
                success: true,
                message: message.to_string(),
                run_id: Some(ticket.run_id),
            }))
        }
        Err(Error::ShuttingDown) => Ok(HttpResponse::ServiceUnavailable().json(TriggerResponse {
            success: false,
            message: Error::ShuttingDown.to_string(),
            run_id: None,
        })),
        Err(e) => Ok(HttpResponse::InternalServerError().json(TriggerResponse {
            success: false,
            message: e.to_string(),
            run_id: None,
        })),
    }
}

async fn list_runs(scheduler: web::Data<Arc<RunScheduler>>) -> ActixResult<HttpResponse> {
    let runs: Vec<RunRecord> = scheduler.runs();
    Ok(HttpResponse::Ok().json(runs))
}

fn parse_run_id(raw: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| {
        HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Invalid run id: {}", raw)
        }))
    })
}

fn run_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "error": "Run not found"
    }))
}

async fn get_run(scheduler: web::Data<Arc<RunScheduler>>, path: web::Path<String>) -> ActixResult<HttpResponse> {
    let id = match parse_run_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    match scheduler.status(id) {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(run_not_found()),
    }
}

async fn cancel_run(scheduler: web::Data<Arc<RunScheduler>>, path: web::Path<String>) -> ActixResult<HttpResponse> {
    let id = match parse_run_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    match scheduler.cancel(id) {
        Ok(state) => Ok(HttpResponse::Ok().json(CancelResponse { run_id: id, state })),
        Err(Error::RunNotFound(_)) => Ok(run_not_found()),
        Err(e) => Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": e.to_string()
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::BatchRunner;
    use actix_web::test;
    use lustre_core::EngineConfig;
    use lustre_storage::{CatalogStore, MemoryStore};
    use serde_json::{json, Value};
    use std::time::{Duration, Instant};

    fn scheduler_with(store: Arc<MemoryStore>) -> Arc<RunScheduler> {
        let runner = BatchRunner::new(store, EngineConfig::default()).unwrap();
        Arc::new(RunScheduler::new(Arc::new(runner)))
    }

    fn diamonds() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_documents(
            "diamonds",
            vec![
                json!({"_id": "1", "stockRef": "A", "shape": "ROUND", "priceListUSD": 900}),
                json!({"_id": "2", "stockRef": "B", "shape": "ROUND", "priceListUSD": 1100}),
            ],
        ))
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(App::new().configure(configure(scheduler_with(diamonds())))).await;
        let resp: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp, json!({"status": "running", "service": "Diamond Recommender"}));
    }

    #[actix_web::test]
    async fn test_trigger_runs_in_background() {
        let store = diamonds();
        let scheduler = scheduler_with(store.clone());
        let app = test::init_service(App::new().configure(configure(scheduler.clone()))).await;

        let req = test::TestRequest::post().uri("/trigger-update").to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["success"], json!(true));
        let run_id = resp["run_id"].as_str().unwrap().to_string();

        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.runs_completed() == 0 {
            assert!(Instant::now() < deadline, "run did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }

        let req = test::TestRequest::get().uri(&format!("/runs/{}", run_id)).to_request();
        let record: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(record["state"], json!("succeeded"));
        assert_eq!(record["report"]["modified"], json!(2));

        let docs = store.documents().unwrap();
        assert_eq!(docs[0]["similar_diamonds"], json!(["B"]));

        let req = test::TestRequest::get().uri("/runs").to_request();
        let runs: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(runs.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_and_malformed_run_ids() {
        let app = test::init_service(App::new().configure(configure(scheduler_with(diamonds())))).await;

        let req = test::TestRequest::get().uri(&format!("/runs/{}", Uuid::new_v4())).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::post().uri(&format!("/runs/{}/cancel", Uuid::new_v4())).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::get().uri("/runs/not-a-uuid").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn test_trigger_after_shutdown_is_unavailable() {
        let scheduler = scheduler_with(diamonds());
        scheduler.shutdown();
        let app = test::init_service(App::new().configure(configure(scheduler))).await;
        let req = test::TestRequest::post().uri("/trigger-update").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Scheduler is shutting down"));
    }
}
