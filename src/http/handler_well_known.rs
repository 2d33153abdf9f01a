//! Handles GET /.well-known/oauth-authorization-server

use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use super::context::AppState;

/// OAuth 2.0 Authorization Server Metadata handler
///
/// Advertises only the grants and endpoints this server was built with.
pub async fn oauth_authorization_server_handler(State(state): State<AppState>) -> Json<Value> {
    let base = state.config.external_base.trim_end_matches('/');
    let server = &state.server;

    let grant_types: Vec<String> = server
        .grant_types()
        .iter()
        .map(|grant_type| grant_type.to_string())
        .collect();

    let mut metadata = json!({
        "issuer": base,
        "token_endpoint": format!("{}{}", base, server.token_endpoint_url),
        "grant_types_supported": grant_types,
        "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post", "none"],
    });

    if let Some(endpoint) = &server.authorization_endpoint {
        let response_types: Vec<&str> = endpoint
            .supported_response_types()
            .iter()
            .map(|response_type| response_type.as_str())
            .collect();
        metadata["authorization_endpoint"] =
            json!(format!("{}{}", base, server.authorization_endpoint_url));
        metadata["response_types_supported"] = json!(response_types);
    }

    Json(metadata)
}
