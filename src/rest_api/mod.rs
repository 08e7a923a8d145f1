//! REST API module for probes and metrics
//!
//! Serves `/healthz`, `/readyz` and, with the `metrics` feature, `/metrics`.

mod handlers;
mod server;

pub use server::{router, run_server};
