//! Axum HTTP adapter over the authorization and token endpoints.

pub mod context;
mod handler_authorize;
mod handler_token;
mod handler_well_known;
pub mod server;

pub use context::{AppEngine, AppState};
pub use server::build_router;
