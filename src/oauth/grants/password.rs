use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{ConfigError, OAuthError};
use crate::oauth::granter::{TokenGranter, ensure_grant_allowed};
use crate::oauth::token_services::TokenServices;
use crate::oauth::types::*;

/// Resource owner credential check used by the password grant
#[async_trait]
pub trait UserAuthenticator: Send + Sync {
    /// Returns the user id for valid credentials, `None` otherwise
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<Option<String>, OAuthError>;
}

#[derive(Deserialize)]
struct UserRecord {
    username: String,
    password: String,
}

/// Fixed set of users, typically loaded from a JSON file at startup
#[derive(Default)]
pub struct StaticUserAuthenticator {
    users: HashMap<String, String>,
}

impl StaticUserAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.users
            .insert(username.to_string(), password.to_string());
        self
    }

    /// Load `[{"username": ..., "password": ...}]` from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileLoadFailed(display.clone(), e.to_string()))?;
        let records: Vec<UserRecord> = serde_json::from_str(&content)
            .map_err(|e| ConfigError::FileLoadFailed(display, e.to_string()))?;

        Ok(Self {
            users: records
                .into_iter()
                .map(|record| (record.username, record.password))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserAuthenticator for StaticUserAuthenticator {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<String>, OAuthError> {
        Ok(self
            .users
            .get(username)
            .filter(|expected| expected.as_str() == password)
            .map(|_| username.to_string()))
    }
}

/// Resource owner password credentials grant
pub struct ResourceOwnerPasswordTokenGranter {
    authenticator: Arc<dyn UserAuthenticator>,
    token_services: Arc<TokenServices>,
}

impl ResourceOwnerPasswordTokenGranter {
    pub fn new(
        authenticator: Arc<dyn UserAuthenticator>,
        token_services: Arc<TokenServices>,
    ) -> Self {
        Self {
            authenticator,
            token_services,
        }
    }
}

#[async_trait]
impl TokenGranter for ResourceOwnerPasswordTokenGranter {
    fn grant_type(&self) -> GrantType {
        GrantType::Password
    }

    async fn grant(
        &self,
        request: &TokenRequest,
        client: &OAuthClient,
    ) -> Result<TokenResponse, OAuthError> {
        ensure_grant_allowed(client, &GrantType::Password)?;

        let username = request.require("username")?;
        let password = request.require("password")?;

        let user_id = self
            .authenticator
            .authenticate(username, password)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("Bad credentials".to_string()))?;

        let scopes = resolve_scopes(request.requested_scopes(), client)?;

        self.token_services
            .create_access_token(client, Some(&user_id), &scopes, true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::token_services::TokenSettings;
    use crate::storage::inmemory::MemoryOAuthStorage;
    use chrono::Utc;

    fn client(grant_types: Vec<GrantType>) -> OAuthClient {
        OAuthClient {
            client_id: "cli".to_string(),
            client_secret: Some("secret".to_string()),
            client_name: None,
            redirect_uris: vec![],
            grant_types,
            scope: Some("read".to_string()),
            token_endpoint_auth_method: ClientAuthMethod::ClientSecretBasic,
            access_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            created_at: Utc::now(),
        }
    }

    fn granter() -> ResourceOwnerPasswordTokenGranter {
        let storage = Arc::new(MemoryOAuthStorage::new());
        ResourceOwnerPasswordTokenGranter::new(
            Arc::new(StaticUserAuthenticator::new().with_user("alice", "wonderland")),
            Arc::new(TokenServices::new(storage, TokenSettings::default())),
        )
    }

    fn login(password: &str) -> TokenRequest {
        TokenRequest::new(GrantType::Password)
            .with_parameter("username", "alice")
            .with_parameter("password", password)
    }

    #[tokio::test]
    async fn test_password_grant() {
        let c = client(vec![GrantType::Password, GrantType::RefreshToken]);
        let response = granter().grant(&login("wonderland"), &c).await.unwrap();
        assert!(response.refresh_token.is_some());
        assert_eq!(response.scope.as_deref(), Some("read"));
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let c = client(vec![GrantType::Password]);
        assert!(matches!(
            granter().grant(&login("nope"), &c).await,
            Err(OAuthError::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn test_client_without_password_grant() {
        let c = client(vec![GrantType::AuthorizationCode]);
        assert!(matches!(
            granter().grant(&login("wonderland"), &c).await,
            Err(OAuthError::UnauthorizedClient(_))
        ));
    }

    #[test]
    fn test_users_file() {
        let path = std::env::temp_dir().join(format!("authgate-users-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"[{"username": "bob", "password": "builder"}]"#).unwrap();
        let authenticator = StaticUserAuthenticator::from_file(&path).unwrap();
        assert_eq!(authenticator.len(), 1);
        std::fs::remove_file(&path).unwrap();

        assert!(StaticUserAuthenticator::from_file(&path).is_err());
    }
}
