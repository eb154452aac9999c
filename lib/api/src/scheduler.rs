// Run scheduler: a single background worker draining a FIFO queue of batch runs.
// Triggers return a ticket right away; outcomes land in a bounded run history.

use crate::runner::{BatchJob, RunReport};
use chrono::{DateTime, Utc};
use lustre_core::{CancelToken, Error, Result};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs kept in history
pub const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Succeeded { report: RunReport },
    Failed { reason: String },
    Cancelled,
}

impl RunState {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Succeeded { .. } | RunState::Failed { .. } | RunState::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub state: RunState,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Handed back to whoever triggered a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub run_id: Uuid,
    /// The trigger joined a run that was already waiting in the queue
    pub coalesced: bool,
}

struct QueuedRun {
    id: Uuid,
    cancel: CancelToken,
}

struct Shared {
    queue: Mutex<VecDeque<QueuedRun>>,
    condvar: Condvar,
    running: AtomicBool,
    current: Mutex<Option<(Uuid, CancelToken)>>,
    history: RwLock<VecDeque<RunRecord>>,
    completed: AtomicU64,
    job: Arc<dyn BatchJob>,
}

impl Shared {
    fn update<F: FnOnce(&mut RunRecord)>(&self, id: Uuid, f: F) {
        let mut history = self.history.write();
        if let Some(record) = history.iter_mut().find(|r| r.id == id) {
            f(record);
        }
    }

    fn finish(&self, id: Uuid, state: RunState) {
        self.update(id, |record| {
            record.state = state;
            record.finished_at = Some(Utc::now());
        });
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    fn execute(&self, run: QueuedRun) {
        if run.cancel.is_cancelled() {
            *self.current.lock() = None;
            self.finish(run.id, RunState::Cancelled);
            return;
        }

        self.update(run.id, |record| {
            record.state = RunState::Running;
            record.started_at = Some(Utc::now());
        });

        let outcome = catch_unwind(AssertUnwindSafe(|| self.job.execute(run.id, &run.cancel)));
        *self.current.lock() = None;

        let state = match outcome {
            Ok(Ok(report)) => {
                info!(
                    "Run {} finished: {} operations, matched {}, modified {}",
                    run.id, report.operations, report.matched, report.modified
                );
                RunState::Succeeded { report }
            }
            Ok(Err(Error::Cancelled)) => {
                warn!("Run {} cancelled", run.id);
                RunState::Cancelled
            }
            Ok(Err(e)) => {
                error!("Run {} failed: {}", run.id, e);
                RunState::Failed { reason: e.to_string() }
            }
            Err(_) => {
                error!("Run {} panicked", run.id);
                RunState::Failed { reason: "run panicked".to_string() }
            }
        };
        self.finish(run.id, state);
    }
}

/// Accepts trigger requests and runs them one at a time in the background
pub struct RunScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunScheduler {
    pub fn new(job: Arc<dyn BatchJob>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            running: AtomicBool::new(true),
            current: Mutex::new(None),
            history: RwLock::new(VecDeque::new()),
            completed: AtomicU64::new(0),
            job,
        });

        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("batch-run-worker".to_string())
            .spawn(move || Self::worker_loop(worker_shared));

        let worker = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn batch worker thread: {}", e);
                shared.running.store(false, Ordering::Release);
                None
            }
        };

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    fn worker_loop(shared: Arc<Shared>) {
        loop {
            let next = {
                let mut queue = shared.queue.lock();
                while queue.is_empty() && shared.running.load(Ordering::Acquire) {
                    shared.condvar.wait(&mut queue);
                }
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
                let run = queue.pop_front();
                // Claimed under the queue lock so cancel() always finds the run
                if let Some(run) = &run {
                    *shared.current.lock() = Some((run.id, run.cancel.clone()));
                }
                run
            };

            if let Some(run) = next {
                shared.execute(run);
            }
        }
    }

    /// Queue a run and return immediately. While a run is still waiting to
    /// start, further triggers join it instead of queueing another.
    pub fn trigger(&self) -> Result<Ticket> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(Error::ShuttingDown);
        }

        let mut queue = self.shared.queue.lock();
        if let Some(waiting) = queue.back() {
            info!("Trigger joined queued run {}", waiting.id);
            return Ok(Ticket {
                run_id: waiting.id,
                coalesced: true,
            });
        }

        let id = Uuid::new_v4();
        {
            let mut history = self.shared.history.write();
            history.push_back(RunRecord {
                id,
                state: RunState::Queued,
                queued_at: Utc::now(),
                started_at: None,
                finished_at: None,
            });
            while history.len() > MAX_HISTORY {
                history.pop_front();
            }
        }
        queue.push_back(QueuedRun {
            id,
            cancel: CancelToken::new(),
        });
        self.shared.condvar.notify_one();
        info!("Queued run {}", id);

        Ok(Ticket {
            run_id: id,
            coalesced: false,
        })
    }

    /// Cancel a queued or running run. Finished runs are left as they are.
    pub fn cancel(&self, id: Uuid) -> Result<RunState> {
        {
            let mut queue = self.shared.queue.lock();
            if let Some(pos) = queue.iter().position(|run| run.id == id) {
                queue.remove(pos);
                drop(queue);
                self.shared.finish(id, RunState::Cancelled);
                info!("Cancelled queued run {}", id);
                return Ok(RunState::Cancelled);
            }
        }

        if let Some((current, token)) = self.shared.current.lock().as_ref() {
            if *current == id {
                token.cancel();
                info!("Cancellation requested for running run {}", id);
            }
        }

        self.status(id)
            .map(|record| record.state)
            .ok_or_else(|| Error::RunNotFound(id.to_string()))
    }

    pub fn status(&self, id: Uuid) -> Option<RunRecord> {
        self.shared.history.read().iter().find(|r| r.id == id).cloned()
    }

    /// Run history, newest first
    pub fn runs(&self) -> Vec<RunRecord> {
        self.shared.history.read().iter().rev().cloned().collect()
    }

    pub fn pending_runs(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Runs that reached a final state
    pub fn runs_completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    /// Stop the worker. The run in progress is cancelled; queued runs are dropped.
    pub fn shutdown(&self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some((_, token)) = self.shared.current.lock().as_ref() {
            token.cancel();
        }

        let dropped: Vec<QueuedRun> = self.shared.queue.lock().drain(..).collect();
        for run in dropped {
            self.shared.finish(run.id, RunState::Cancelled);
        }
        self.shared.condvar.notify_all();

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("Batch worker thread panicked");
            }
        }
    }
}

impl Drop for RunScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
