use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::granter::{TokenGranter, ensure_grant_allowed};
use crate::oauth::token_services::TokenServices;
use crate::oauth::types::*;

/// Issues an access token straight from an approved authorization request.
///
/// Only reachable through the authorization endpoint, which supplies the
/// resource owner; the token endpoint refuses this grant type.
pub struct ImplicitTokenGranter {
    token_services: Arc<TokenServices>,
}

impl ImplicitTokenGranter {
    pub fn new(token_services: Arc<TokenServices>) -> Self {
        Self { token_services }
    }
}

#[async_trait]
impl TokenGranter for ImplicitTokenGranter {
    fn grant_type(&self) -> GrantType {
        GrantType::Implicit
    }

    async fn grant(
        &self,
        request: &TokenRequest,
        client: &OAuthClient,
    ) -> Result<TokenResponse, OAuthError> {
        ensure_grant_allowed(client, &GrantType::Implicit)?;

        if request.parameter("response_type") != Some(ResponseType::Token.as_str()) {
            return Err(OAuthError::InvalidRequest(
                "Implicit grant requires response_type=token".to_string(),
            ));
        }

        let user_id = request.resource_owner.as_deref().ok_or_else(|| {
            OAuthError::InvalidRequest("Implicit grant requires an authenticated user".to_string())
        })?;

        let scopes = resolve_scopes(request.requested_scopes(), client)?;

        self.token_services
            .create_access_token(client, Some(user_id), &scopes, false)
            .await
    }
}
