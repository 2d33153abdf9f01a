use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::granter::{TokenGranter, ensure_grant_allowed};
use crate::oauth::token_services::TokenServices;
use crate::oauth::types::*;

/// Exchanges a refresh token for a new access token
pub struct RefreshTokenGranter {
    token_services: Arc<TokenServices>,
}

impl RefreshTokenGranter {
    pub fn new(token_services: Arc<TokenServices>) -> Self {
        Self { token_services }
    }
}

#[async_trait]
impl TokenGranter for RefreshTokenGranter {
    fn grant_type(&self) -> GrantType {
        GrantType::RefreshToken
    }

    async fn grant(
        &self,
        request: &TokenRequest,
        client: &OAuthClient,
    ) -> Result<TokenResponse, OAuthError> {
        ensure_grant_allowed(client, &GrantType::RefreshToken)?;

        let refresh_token = request.require("refresh_token")?;
        self.token_services
            .refresh_access_token(refresh_token, client, request.requested_scopes())
            .await
    }
}
