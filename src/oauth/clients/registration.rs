//! Client registration: validation, credential generation and the JSON registration file.

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use crate::errors::{ClientRegistrationError, ConfigError};
use crate::oauth::types::*;
use crate::storage::traits::OAuthClientStore;

/// Request to register a new client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientRegistrationRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub scope: Option<String>,
    pub token_endpoint_auth_method: Option<ClientAuthMethod>,
    pub access_token_validity_seconds: Option<i64>,
    pub refresh_token_validity_seconds: Option<i64>,
}

/// Client Registration Service
pub struct ClientRegistrationService {
    storage: Arc<dyn OAuthClientStore>,
    /// Default token endpoint auth method
    default_auth_method: ClientAuthMethod,
    /// Maximum number of redirect URIs per client
    max_redirect_uris: usize,
}

impl ClientRegistrationService {
    pub fn new(storage: Arc<dyn OAuthClientStore>) -> Self {
        Self {
            storage,
            default_auth_method: ClientAuthMethod::ClientSecretBasic,
            max_redirect_uris: 10,
        }
    }

    /// Register a new client with generated credentials
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<OAuthClient, ClientRegistrationError> {
        let auth_method = request
            .token_endpoint_auth_method
            .unwrap_or(self.default_auth_method.clone());
        let client_secret = if auth_method == ClientAuthMethod::None {
            None
        } else {
            Some(generate_token())
        };
        let grant_types = if request.grant_types.is_empty() {
            vec![GrantType::AuthorizationCode]
        } else {
            request.grant_types
        };

        let client = OAuthClient {
            client_id: uuid::Uuid::new_v4().to_string(),
            client_secret,
            client_name: request.client_name,
            redirect_uris: request.redirect_uris,
            grant_types,
            scope: request.scope,
            token_endpoint_auth_method: auth_method,
            access_token_validity_seconds: request.access_token_validity_seconds,
            refresh_token_validity_seconds: request.refresh_token_validity_seconds,
            created_at: Utc::now(),
        };

        self.validate_client(&client)?;
        self.store(&client).await?;
        Ok(client)
    }

    /// Populate the registry from pre-registered clients, rejecting duplicates
    pub async fn load_clients(
        &self,
        clients: Vec<OAuthClient>,
    ) -> Result<usize, ClientRegistrationError> {
        let mut seen = HashSet::new();
        for client in &clients {
            if !seen.insert(client.client_id.as_str()) {
                return Err(ClientRegistrationError::DuplicateClientId(
                    client.client_id.clone(),
                ));
            }
            self.validate_client(client)?;
        }

        for client in &clients {
            self.store(client).await?;
        }

        tracing::info!(count = clients.len(), "client registry loaded");
        Ok(clients.len())
    }

    async fn store(&self, client: &OAuthClient) -> Result<(), ClientRegistrationError> {
        self.storage.store_client(client).await.map_err(|e| {
            ClientRegistrationError::InvalidClientMetadata(format!(
                "Failed to store client: {:?}",
                e
            ))
        })
    }

    /// Validate a client registration
    pub fn validate_client(&self, client: &OAuthClient) -> Result<(), ClientRegistrationError> {
        if client.client_id.trim().is_empty() {
            return Err(ClientRegistrationError::InvalidClientMetadata(
                "client_id must not be empty".to_string(),
            ));
        }

        if client.redirect_uris.len() > self.max_redirect_uris {
            return Err(ClientRegistrationError::InvalidRedirectUri(format!(
                "Too many redirect URIs: {} (max: {})",
                client.redirect_uris.len(),
                self.max_redirect_uris
            )));
        }

        for uri in &client.redirect_uris {
            validate_redirect_uri(uri)?;
        }

        let redirect_based = client.allows_grant(&GrantType::AuthorizationCode)
            || client.allows_grant(&GrantType::Implicit);
        if redirect_based && client.redirect_uris.is_empty() {
            return Err(ClientRegistrationError::InvalidClientMetadata(
                "authorization_code and implicit grants require a redirect URI".to_string(),
            ));
        }

        if client.client_type() == ClientType::Public
            && client.allows_grant(&GrantType::ClientCredentials)
        {
            return Err(ClientRegistrationError::InvalidClientMetadata(
                "client_credentials grant requires a client secret".to_string(),
            ));
        }

        if client.token_endpoint_auth_method != ClientAuthMethod::None
            && client.client_secret.is_none()
        {
            return Err(ClientRegistrationError::InvalidClientMetadata(format!(
                "client {} has no secret but does not use auth method none",
                client.client_id
            )));
        }

        Ok(())
    }
}

/// Validate a redirect URI
fn validate_redirect_uri(uri: &str) -> Result<(), ClientRegistrationError> {
    let parsed = Url::parse(uri).map_err(|e| {
        ClientRegistrationError::InvalidRedirectUri(format!("Invalid URI format: {}", e))
    })?;

    // Must use HTTPS (except for localhost for development)
    match parsed.scheme() {
        "https" => {}
        "http" => match parsed.host_str() {
            Some(host) if host == "localhost" || host == "127.0.0.1" => {}
            _ => {
                return Err(ClientRegistrationError::InvalidRedirectUri(
                    "HTTP redirect URIs only allowed for localhost".to_string(),
                ));
            }
        },
        _ => {
            return Err(ClientRegistrationError::InvalidRedirectUri(
                "Redirect URI must use HTTP or HTTPS".to_string(),
            ));
        }
    }

    if parsed.fragment().is_some() {
        return Err(ClientRegistrationError::InvalidRedirectUri(
            "Redirect URI must not contain fragment".to_string(),
        ));
    }

    Ok(())
}

/// Read the JSON client registration file
pub fn load_clients_file(path: &Path) -> Result<Vec<OAuthClient>, ConfigError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::FileLoadFailed(display.clone(), e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::FileLoadFailed(display, e.to_string()))
}

/// Write the JSON client registration file
pub fn save_clients_file(path: &Path, clients: &[OAuthClient]) -> Result<(), ConfigError> {
    let display = path.display().to_string();
    let content = serde_json::to_string_pretty(clients)
        .map_err(|e| ConfigError::FileLoadFailed(display.clone(), e.to_string()))?;
    std::fs::write(path, content).map_err(|e| ConfigError::FileLoadFailed(display, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory::MemoryOAuthStorage;

    fn service() -> (Arc<MemoryOAuthStorage>, ClientRegistrationService) {
        let storage = Arc::new(MemoryOAuthStorage::new());
        (storage.clone(), ClientRegistrationService::new(storage))
    }

    #[tokio::test]
    async fn test_client_registration() {
        let (storage, service) = service();

        let client = service
            .register_client(ClientRegistrationRequest {
                client_name: Some("Test Client".to_string()),
                redirect_uris: vec!["https://example.com/callback".to_string()],
                scope: Some("read write".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(client.client_secret.is_some());
        assert_eq!(client.grant_types, vec![GrantType::AuthorizationCode]);
        assert!(storage.get_client(&client.client_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_public_client_registration() {
        let (_, service) = service();
        let client = service
            .register_client(ClientRegistrationRequest {
                redirect_uris: vec!["http://localhost:3000/cb".to_string()],
                grant_types: vec![GrantType::Implicit],
                token_endpoint_auth_method: Some(ClientAuthMethod::None),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(client.client_type(), ClientType::Public);

        let rejected = service
            .register_client(ClientRegistrationRequest {
                grant_types: vec![GrantType::ClientCredentials],
                token_endpoint_auth_method: Some(ClientAuthMethod::None),
                ..Default::default()
            })
            .await;
        assert!(matches!(
            rejected,
            Err(ClientRegistrationError::InvalidClientMetadata(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_redirect_uris() {
        let (_, service) = service();
        for uri in [
            "not a uri",
            "http://example.com/cb",
            "ftp://example.com/cb",
            "https://example.com/cb#frag",
        ] {
            let result = service
                .register_client(ClientRegistrationRequest {
                    redirect_uris: vec![uri.to_string()],
                    ..Default::default()
                })
                .await;
            assert!(
                matches!(result, Err(ClientRegistrationError::InvalidRedirectUri(_))),
                "{uri} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_load_clients_rejects_duplicates() {
        let (_, service) = service();
        let client = service
            .register_client(ClientRegistrationRequest {
                redirect_uris: vec!["https://app/cb".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            service.load_clients(vec![client.clone(), client.clone()]).await,
            Err(ClientRegistrationError::DuplicateClientId(client.client_id))
        );
    }

    #[test]
    fn test_clients_file_round_trip() {
        let path = std::env::temp_dir().join(format!("authgate-clients-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"[{
                "client_id": "c1",
                "client_secret": "secret",
                "redirect_uris": ["https://app/cb"],
                "grant_types": ["authorization_code", "urn:example:otp"],
                "scope": "read"
            }]"#,
        )
        .unwrap();

        let clients = load_clients_file(&path).unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(
            clients[0].grant_types,
            vec![
                GrantType::AuthorizationCode,
                GrantType::Custom("urn:example:otp".to_string())
            ]
        );
        assert_eq!(
            clients[0].token_endpoint_auth_method,
            ClientAuthMethod::ClientSecretBasic
        );

        save_clients_file(&path, &clients).unwrap();
        assert_eq!(load_clients_file(&path).unwrap()[0].client_id, "c1");
        std::fs::remove_file(&path).unwrap();
    }
}
