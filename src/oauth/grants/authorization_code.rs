use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::code_services::AuthorizationCodeServices;
use crate::oauth::granter::{TokenGranter, ensure_grant_allowed};
use crate::oauth::token_services::TokenServices;
use crate::oauth::types::*;

/// Exchanges a single-use authorization code for tokens
pub struct AuthorizationCodeTokenGranter {
    code_services: Arc<AuthorizationCodeServices>,
    token_services: Arc<TokenServices>,
}

impl AuthorizationCodeTokenGranter {
    pub fn new(
        code_services: Arc<AuthorizationCodeServices>,
        token_services: Arc<TokenServices>,
    ) -> Self {
        Self {
            code_services,
            token_services,
        }
    }
}

#[async_trait]
impl TokenGranter for AuthorizationCodeTokenGranter {
    fn grant_type(&self) -> GrantType {
        GrantType::AuthorizationCode
    }

    async fn grant(
        &self,
        request: &TokenRequest,
        client: &OAuthClient,
    ) -> Result<TokenResponse, OAuthError> {
        ensure_grant_allowed(client, &GrantType::AuthorizationCode)?;

        let code = request.require("code")?;
        let redirect_uri = request.require("redirect_uri")?;

        // The code is burned even when the checks below fail.
        let auth_code = self.code_services.consume(code).await?;

        if auth_code.client_id != client.client_id {
            return Err(OAuthError::InvalidGrant(
                "Authorization code was issued to another client".to_string(),
            ));
        }

        if auth_code.redirect_uri != redirect_uri {
            return Err(OAuthError::InvalidGrant(
                "Redirect URI does not match authorization request".to_string(),
            ));
        }

        let scopes = auth_code
            .scope
            .as_deref()
            .map(parse_scope)
            .unwrap_or_default();

        self.token_services
            .create_access_token(client, Some(&auth_code.user_id), &scopes, true)
            .await
    }
}
