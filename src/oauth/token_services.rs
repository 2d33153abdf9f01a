//! Access and refresh token minting on top of the token store.

use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::types::*;
use crate::storage::traits::TokenStore;

/// Server-wide token lifetimes and refresh policy
#[derive(Clone, Debug)]
pub struct TokenSettings {
    /// Default access token lifetime
    pub access_token_validity: Duration,
    /// Default refresh token lifetime
    pub refresh_token_validity: Duration,
    /// Whether refresh tokens are issued at all
    pub support_refresh_token: bool,
    /// Keep the same refresh token across refreshes instead of rotating it
    pub reuse_refresh_token: bool,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_token_validity: Duration::hours(12),
            refresh_token_validity: Duration::days(30),
            support_refresh_token: true,
            reuse_refresh_token: false,
        }
    }
}

/// Token services shared by every granter
pub struct TokenServices {
    store: Arc<dyn TokenStore>,
    settings: TokenSettings,
}

impl TokenServices {
    pub fn new(store: Arc<dyn TokenStore>, settings: TokenSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    fn access_token_validity(&self, client: &OAuthClient) -> Duration {
        client
            .access_token_validity_seconds
            .map(Duration::seconds)
            .unwrap_or(self.settings.access_token_validity)
    }

    fn refresh_token_validity(&self, client: &OAuthClient) -> Duration {
        client
            .refresh_token_validity_seconds
            .map(Duration::seconds)
            .unwrap_or(self.settings.refresh_token_validity)
    }

    fn supports_refresh(&self, client: &OAuthClient) -> bool {
        self.settings.support_refresh_token && client.allows_grant(&GrantType::RefreshToken)
    }

    /// Mint and store a new access token, plus a refresh token when allowed
    pub async fn create_access_token(
        &self,
        client: &OAuthClient,
        user_id: Option<&str>,
        scopes: &HashSet<String>,
        allow_refresh: bool,
    ) -> Result<TokenResponse, OAuthError> {
        let scope = (!scopes.is_empty()).then(|| join_scopes(scopes));
        let now = Utc::now();

        let refresh_token = if allow_refresh && self.supports_refresh(client) {
            Some(generate_token())
        } else {
            None
        };

        let access_token = self
            .store_access_token(client, user_id, scope.clone(), refresh_token.clone())
            .await?;

        if let Some(refresh_token) = &refresh_token {
            let refresh_token_record = RefreshToken {
                token: refresh_token.clone(),
                access_token: access_token.token.clone(),
                client_id: client.client_id.clone(),
                user_id: user_id.map(str::to_string),
                scope: scope.clone(),
                created_at: now,
                expires_at: Some(now + self.refresh_token_validity(client)),
            };

            self.store
                .store_refresh_token(&refresh_token_record)
                .await
                .map_err(|e| {
                    OAuthError::ServerError(format!("Failed to store refresh token: {:?}", e))
                })?;
        }

        Ok(self.to_response(client, access_token, refresh_token))
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The token must belong to `client`. `requested_scopes` may narrow the
    /// original grant but never widen it.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client: &OAuthClient,
        requested_scopes: Option<HashSet<String>>,
    ) -> Result<TokenResponse, OAuthError> {
        if !self.settings.support_refresh_token {
            return Err(OAuthError::InvalidGrant(
                "Refresh tokens are not supported".to_string(),
            ));
        }

        // Ownership is checked before redemption so another client cannot burn the token.
        let existing = self
            .store
            .get_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid refresh token".to_string()))?;

        if existing.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                "refresh token presented by a client it was not issued to"
            );
            return Err(OAuthError::InvalidGrant(
                "Refresh token was issued to another client".to_string(),
            ));
        }

        let original_scopes = existing
            .scope
            .as_deref()
            .map(parse_scope)
            .unwrap_or_default();
        let scopes = match requested_scopes {
            Some(requested) if !requested.is_subset(&original_scopes) => {
                return Err(OAuthError::InvalidScope(
                    "Requested scope exceeds the scope of the refresh token".to_string(),
                ));
            }
            Some(requested) => requested,
            None => original_scopes,
        };

        let refresh_record = if self.settings.reuse_refresh_token {
            existing
        } else {
            self.store
                .consume_refresh_token(refresh_token)
                .await?
                .ok_or_else(|| OAuthError::InvalidGrant("Invalid refresh token".to_string()))?
        };

        self.store.revoke_token(&refresh_record.access_token).await?;

        let next_refresh_token = if self.settings.reuse_refresh_token {
            refresh_record.token.clone()
        } else {
            generate_token()
        };

        let scope = (!scopes.is_empty()).then(|| join_scopes(&scopes));
        let access_token = self
            .store_access_token(
                client,
                refresh_record.user_id.as_deref(),
                scope,
                Some(next_refresh_token.clone()),
            )
            .await?;

        let now = Utc::now();
        let refresh_token_record = RefreshToken {
            token: next_refresh_token.clone(),
            access_token: access_token.token.clone(),
            client_id: client.client_id.clone(),
            user_id: refresh_record.user_id.clone(),
            scope: refresh_record.scope.clone(),
            created_at: if self.settings.reuse_refresh_token {
                refresh_record.created_at
            } else {
                now
            },
            expires_at: if self.settings.reuse_refresh_token {
                refresh_record.expires_at
            } else {
                Some(now + self.refresh_token_validity(client))
            },
        };

        self.store
            .store_refresh_token(&refresh_token_record)
            .await
            .map_err(|e| {
                OAuthError::ServerError(format!("Failed to store refresh token: {:?}", e))
            })?;

        Ok(self.to_response(client, access_token, Some(next_refresh_token)))
    }

    async fn store_access_token(
        &self,
        client: &OAuthClient,
        user_id: Option<&str>,
        scope: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<AccessToken, OAuthError> {
        let now = Utc::now();
        let access_token_record = AccessToken {
            token: generate_token(),
            token_type: TokenType::Bearer,
            client_id: client.client_id.clone(),
            user_id: user_id.map(str::to_string),
            scope,
            refresh_token,
            created_at: now,
            expires_at: now + self.access_token_validity(client),
        };

        self.store
            .store_token(&access_token_record)
            .await
            .map_err(|e| {
                OAuthError::ServerError(format!("Failed to store access token: {:?}", e))
            })?;

        Ok(access_token_record)
    }

    fn to_response(
        &self,
        client: &OAuthClient,
        access_token: AccessToken,
        refresh_token: Option<String>,
    ) -> TokenResponse {
        TokenResponse::new(
            access_token.token,
            access_token.token_type,
            self.access_token_validity(client).num_seconds().max(0) as u64,
            refresh_token,
            access_token.scope,
        )
    }

    /// Remove expired access and refresh tokens
    pub async fn cleanup(&self) -> Result<usize, OAuthError> {
        let access = self.store.cleanup_expired_tokens().await?;
        let refresh = self.store.cleanup_expired_refresh_tokens().await?;
        Ok(access + refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory::MemoryOAuthStorage;
    use crate::storage::traits::AccessTokenStore;

    fn client(id: &str) -> OAuthClient {
        OAuthClient {
            client_id: id.to_string(),
            client_secret: Some("secret".to_string()),
            client_name: None,
            redirect_uris: vec![],
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            scope: Some("read write".to_string()),
            token_endpoint_auth_method: ClientAuthMethod::ClientSecretBasic,
            access_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            created_at: Utc::now(),
        }
    }

    fn services(settings: TokenSettings) -> (Arc<MemoryOAuthStorage>, TokenServices) {
        let storage = Arc::new(MemoryOAuthStorage::new());
        (storage.clone(), TokenServices::new(storage, settings))
    }

    #[tokio::test]
    async fn test_create_access_token_with_refresh() {
        let (storage, services) = services(TokenSettings::default());
        let c1 = client("c1");
        let response = services
            .create_access_token(&c1, Some("alice"), &parse_scope("read"), true)
            .await
            .unwrap();

        assert!(response.refresh_token.is_some());
        assert_eq!(response.scope.as_deref(), Some("read"));
        assert_eq!(response.expires_in, 12 * 60 * 60);

        let stored = storage
            .get_token(&response.access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id.as_deref(), Some("alice"));
        assert_eq!(stored.refresh_token, response.refresh_token);
    }

    #[tokio::test]
    async fn test_no_refresh_without_client_grant() {
        let (_, services) = services(TokenSettings::default());
        let mut c1 = client("c1");
        c1.grant_types = vec![GrantType::AuthorizationCode];
        c1.access_token_validity_seconds = Some(60);

        let response = services
            .create_access_token(&c1, Some("alice"), &HashSet::new(), true)
            .await
            .unwrap();
        assert!(response.refresh_token.is_none());
        assert!(response.scope.is_none());
        assert_eq!(response.expires_in, 60);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_revokes() {
        let (storage, services) = services(TokenSettings::default());
        let c1 = client("c1");
        let first = services
            .create_access_token(&c1, Some("alice"), &parse_scope("read write"), true)
            .await
            .unwrap();
        let refresh_token = first.refresh_token.clone().unwrap();

        let second = services
            .refresh_access_token(&refresh_token, &c1, Some(parse_scope("read")))
            .await
            .unwrap();

        assert_eq!(second.scope.as_deref(), Some("read"));
        assert_ne!(second.refresh_token.as_deref(), Some(refresh_token.as_str()));
        assert!(storage.get_token(&first.access_token).await.unwrap().is_none());

        // The rotated-out token is gone
        assert!(matches!(
            services.refresh_access_token(&refresh_token, &c1, None).await,
            Err(OAuthError::InvalidGrant(_))
        ));

        // The new refresh token still carries the original scope
        let third = services
            .refresh_access_token(second.refresh_token.as_deref().unwrap(), &c1, None)
            .await
            .unwrap();
        assert_eq!(third.scopes(), parse_scope("read write"));
    }

    #[tokio::test]
    async fn test_refresh_reuse_keeps_token() {
        let settings = TokenSettings {
            reuse_refresh_token: true,
            ..TokenSettings::default()
        };
        let (_, services) = services(settings);
        let c1 = client("c1");
        let first = services
            .create_access_token(&c1, Some("alice"), &parse_scope("read"), true)
            .await
            .unwrap();
        let refresh_token = first.refresh_token.unwrap();

        let second = services
            .refresh_access_token(&refresh_token, &c1, None)
            .await
            .unwrap();
        assert_eq!(second.refresh_token.as_deref(), Some(refresh_token.as_str()));
        assert!(
            services
                .refresh_access_token(&refresh_token, &c1, None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_refresh_rejects_other_client_and_wider_scope() {
        let (_, services) = services(TokenSettings::default());
        let c1 = client("c1");
        let c2 = client("c2");
        let issued = services
            .create_access_token(&c2, Some("bob"), &parse_scope("read"), true)
            .await
            .unwrap();
        let refresh_token = issued.refresh_token.unwrap();

        assert!(matches!(
            services.refresh_access_token(&refresh_token, &c1, None).await,
            Err(OAuthError::InvalidGrant(_))
        ));
        assert!(matches!(
            services
                .refresh_access_token(&refresh_token, &c2, Some(parse_scope("read write")))
                .await,
            Err(OAuthError::InvalidScope(_))
        ));
        // Neither failure consumed the token
        assert!(
            services
                .refresh_access_token(&refresh_token, &c2, None)
                .await
                .is_ok()
        );
    }
}
