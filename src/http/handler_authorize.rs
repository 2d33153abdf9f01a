//! Handles GET and POST on the authorization endpoint.

use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_template::TemplateEngine;
use serde_json::json;
use std::collections::HashMap;

use super::context::AppState;
use crate::errors::{HttpError, OAuthError};
use crate::oauth::endpoints::AuthorizeOutcome;
use crate::oauth::types::{AuthorizationRequest, join_scopes};
use crate::oauth::validation::ValidatedRequest;

/// GET /oauth/authorize
///
/// The approval answer is only accepted from the posted approval form, so a
/// link cannot approve on the user's behalf.
pub async fn handle_authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(mut params): Query<HashMap<String, String>>,
) -> Response {
    params.remove(&state.server.approval_parameter);
    authorize(&state, &headers, params).await
}

/// POST /oauth/authorize - submitted by the approval page
pub async fn handle_authorize_approval(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    authorize(&state, &headers, params).await
}

async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    params: HashMap<String, String>,
) -> Response {
    let Some(endpoint) = state.server.authorization_endpoint.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let request = AuthorizationRequest {
        response_type: params.get("response_type").cloned(),
        client_id: params.get("client_id").cloned().unwrap_or_default(),
        redirect_uri: params.get("redirect_uri").cloned(),
        scope: params.get("scope").cloned(),
        state: params.get("state").cloned(),
    };

    let user_id = headers
        .get(state.config.authenticated_user_header.as_str())
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    match endpoint.authorize(&request, user_id, &params).await {
        AuthorizeOutcome::Redirect(location) => Redirect::to(&location).into_response(),
        AuthorizeOutcome::ErrorPage { error, status } => render_error_page(state, status, &error),
        AuthorizeOutcome::ApprovalRequired { request, user_id } => {
            render_approval_page(state, &request, &user_id)
        }
    }
}

fn render_error_page(state: &AppState, status: StatusCode, error: &OAuthError) -> Response {
    let template_data = json!({
        "error": error.error_code(),
        "error_description": error.description(),
    });

    match state
        .template_env
        .render(&state.server.error_page, &template_data)
    {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => HttpError::TemplateRenderingFailed(e.to_string()).into_response(),
    }
}

fn render_approval_page(state: &AppState, request: &ValidatedRequest, user_id: &str) -> Response {
    let mut hidden = vec![
        ("response_type", request.response_type.as_str().to_string()),
        ("client_id", request.client.client_id.clone()),
        ("redirect_uri", request.redirect_uri.clone()),
    ];
    if !request.scopes.is_empty() {
        hidden.push(("scope", join_scopes(&request.scopes)));
    }
    if let Some(oauth_state) = &request.state {
        hidden.push(("state", oauth_state.clone()));
    }

    let mut scopes: Vec<_> = request.scopes.iter().collect();
    scopes.sort();

    let template_data = json!({
        "client_id": request.client.client_id,
        "client_name": request.client.client_name,
        "user_id": user_id,
        "scopes": scopes,
        "action": state.server.authorization_endpoint_url,
        "approval_parameter": state.server.approval_parameter,
        "hidden": hidden,
    });

    match state
        .template_env
        .render(&state.server.user_approval_page, &template_data)
    {
        Ok(html) => Html(html).into_response(),
        Err(e) => HttpError::TemplateRenderingFailed(e.to_string()).into_response(),
    }
}
