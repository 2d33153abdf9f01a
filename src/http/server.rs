//! Main router configuration assembling the OAuth endpoints.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::{
    context::AppState,
    handler_authorize::{handle_authorize, handle_authorize_approval},
    handler_token::handle_token,
    handler_well_known::oauth_authorization_server_handler,
};

/// Build the application router.
///
/// The authorization endpoint is only routed when the server has one.
pub fn build_router(ctx: AppState) -> Router {
    let mut router = Router::new()
        .route(&ctx.server.token_endpoint_url, post(handle_token))
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth_authorization_server_handler),
        );

    if ctx.server.authorization_endpoint.is_some() {
        router = router.route(
            &ctx.server.authorization_endpoint_url,
            get(handle_authorize).post(handle_authorize_approval),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(ctx)
}
