//! # sov-daemon
//!
//! HTTP API for the sovereign compliance engine.
//!
//! Every route is a thin wrapper over [`sov_engine::ComplianceEngine`];
//! blocking engine calls run on tokio's blocking pool. Errors leave as a
//! JSON `{code, message}` body (see [`ApiError`]).

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_app;
pub use state::AppState;
