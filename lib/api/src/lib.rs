//! Batch runs and the HTTP surface that triggers them
//!
//! [`BatchRunner`] performs one fetch, compute and write cycle against a
//! [`lustre_storage::CatalogStore`]. [`RunScheduler`] queues runs on a single
//! background worker so triggers return immediately, and [`RestApi`] exposes
//! the scheduler over HTTP.

pub mod rest;
pub mod runner;
pub mod scheduler;

pub use rest::{configure, RestApi, SERVICE_NAME};
pub use runner::{BatchJob, BatchRunner, RunReport};
pub use scheduler::{RunRecord, RunScheduler, RunState, Ticket, MAX_HISTORY};
