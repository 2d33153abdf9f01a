//! Handles POST /oauth/token - dispatches token requests to the configured granters

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;

use super::context::AppState;
use crate::errors::OAuthError;
use crate::oauth::endpoints::extract_client_auth;
use crate::oauth::types::OAuthErrorResponse;

const NO_STORE: [(header::HeaderName, &str); 2] = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

pub async fn handle_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let result = match extract_client_auth(&headers, &form) {
        Ok(client_auth) => state.server.token_endpoint.token(client_auth, form).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(token) => (NO_STORE, Json(token)).into_response(),
        Err(err) => token_error_response(&err),
    }
}

fn token_error_response(err: &OAuthError) -> Response {
    let status = err.status_code();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "token request failed");
    } else {
        tracing::debug!(error = %err, "token request rejected");
    }

    let mut response = (status, NO_STORE, Json(OAuthErrorResponse::from(err))).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"oauth\", error=\"invalid_client\""),
        );
    }
    response
}
