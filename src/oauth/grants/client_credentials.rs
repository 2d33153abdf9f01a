use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::granter::{TokenGranter, ensure_grant_allowed};
use crate::oauth::token_services::TokenServices;
use crate::oauth::types::*;

/// Issues tokens to the client acting on its own behalf
pub struct ClientCredentialsTokenGranter {
    token_services: Arc<TokenServices>,
}

impl ClientCredentialsTokenGranter {
    pub fn new(token_services: Arc<TokenServices>) -> Self {
        Self { token_services }
    }
}

#[async_trait]
impl TokenGranter for ClientCredentialsTokenGranter {
    fn grant_type(&self) -> GrantType {
        GrantType::ClientCredentials
    }

    async fn grant(
        &self,
        request: &TokenRequest,
        client: &OAuthClient,
    ) -> Result<TokenResponse, OAuthError> {
        ensure_grant_allowed(client, &GrantType::ClientCredentials)?;

        if client.client_type() == ClientType::Public {
            return Err(OAuthError::InvalidClient(
                "Client credentials grant requires a confidential client".to_string(),
            ));
        }

        let scopes = resolve_scopes(request.requested_scopes(), client)?;

        self.token_services
            .create_access_token(client, None, &scopes, false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::token_services::TokenSettings;
    use crate::storage::inmemory::MemoryOAuthStorage;
    use chrono::Utc;

    fn client(secret: Option<&str>) -> OAuthClient {
        OAuthClient {
            client_id: "svc".to_string(),
            client_secret: secret.map(str::to_string),
            client_name: None,
            redirect_uris: vec![],
            grant_types: vec![GrantType::ClientCredentials],
            scope: Some("read write".to_string()),
            token_endpoint_auth_method: ClientAuthMethod::ClientSecretPost,
            access_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            created_at: Utc::now(),
        }
    }

    fn granter() -> ClientCredentialsTokenGranter {
        let storage = Arc::new(MemoryOAuthStorage::new());
        ClientCredentialsTokenGranter::new(Arc::new(TokenServices::new(
            storage,
            TokenSettings::default(),
        )))
    }

    #[tokio::test]
    async fn test_defaults_to_allowed_scopes() {
        let request = TokenRequest::new(GrantType::ClientCredentials);
        let response = granter().grant(&request, &client(Some("s"))).await.unwrap();
        assert_eq!(response.scope.as_deref(), Some("read write"));
        assert!(response.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_narrowed_and_widened_scope() {
        let granter = granter();
        let narrowed = granter
            .grant(
                &TokenRequest::new(GrantType::ClientCredentials).with_scope("read"),
                &client(Some("s")),
            )
            .await
            .unwrap();
        assert_eq!(narrowed.scope.as_deref(), Some("read"));

        let widened = granter
            .grant(
                &TokenRequest::new(GrantType::ClientCredentials).with_scope("read admin"),
                &client(Some("s")),
            )
            .await;
        assert!(matches!(widened, Err(OAuthError::InvalidScope(_))));
    }

    #[tokio::test]
    async fn test_public_client_rejected() {
        let result = granter()
            .grant(&TokenRequest::new(GrantType::ClientCredentials), &client(None))
            .await;
        assert!(matches!(result, Err(OAuthError::InvalidClient(_))));
    }
}
