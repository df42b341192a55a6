//! HTTP API: the Notion webhook receiver and a health probe.

mod routes;
pub mod types;

pub use routes::{build_pipeline, router, serve, AppState};
