//! HTTP API for manual cycle triggers, signal queries, and webhook management.

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::{build_router, run_server};
