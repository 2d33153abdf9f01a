//! Application state shared by the HTTP handlers.

use axum_template::engine::Engine;
use std::sync::Arc;

use crate::config::Config;
use crate::oauth::auth_server::AuthorizationServer;

pub type AppEngine = Engine<minijinja::Environment<'static>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Immutable authorization server graph built at startup
    pub server: Arc<AuthorizationServer>,
    /// Template engine for rendering HTML responses.
    pub template_env: AppEngine,
}
