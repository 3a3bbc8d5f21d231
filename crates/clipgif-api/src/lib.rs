//! Axum HTTP server for video to GIF conversion.
//!
//! This crate provides:
//! - The upload form, conversion and result page
//! - One-shot downloads that purge the job once delivered
//! - A signed-cookie session holding the client's current job
//! - Background retention sweeps, health probes and Prometheus metrics

pub mod config;
pub mod delivery;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod views;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::RetentionSweeper;
pub use session::SessionKeys;
pub use state::AppState;
