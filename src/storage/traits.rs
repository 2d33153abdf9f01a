//! Storage trait definitions for OAuth data.
//!
//! Defines async storage interfaces for clients, authorization codes and tokens
//! that can be implemented by various backend providers.

use crate::errors::StorageError;
use crate::oauth::types::*;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing and retrieving OAuth clients
///
/// This is the client registry: populated once at startup, read-only afterwards.
#[async_trait]
pub trait OAuthClientStore: Send + Sync {
    /// Store a new OAuth client
    async fn store_client(&self, client: &OAuthClient) -> Result<()>;

    /// Retrieve a client by ID
    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>>;

    /// List all clients (for admin purposes)
    async fn list_clients(&self, limit: Option<usize>) -> Result<Vec<OAuthClient>>;
}

/// Trait for storing and retrieving authorization codes
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Store a new authorization code
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()>;

    /// Retrieve and consume an authorization code.
    ///
    /// Implementations must check existence, expiry and the used flag and mark
    /// the code used as one atomic step. Returns `None` for unknown, expired or
    /// already consumed codes.
    async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Clean up expired codes
    async fn cleanup_expired_codes(&self) -> Result<usize>;
}

/// Trait for storing and retrieving access tokens
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    /// Store a new access token
    async fn store_token(&self, token: &AccessToken) -> Result<()>;

    /// Retrieve an access token
    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>>;

    /// Revoke a token
    async fn revoke_token(&self, token: &str) -> Result<()>;

    /// Clean up expired tokens
    async fn cleanup_expired_tokens(&self) -> Result<usize>;
}

/// Trait for storing and retrieving refresh tokens
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store a new refresh token, replacing any record with the same value
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()>;

    /// Retrieve a refresh token without consuming it
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Retrieve and consume a refresh token
    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Cleanup expired refresh tokens
    async fn cleanup_expired_refresh_tokens(&self) -> Result<usize>;
}

/// Token store used by token services
pub trait TokenStore: AccessTokenStore + RefreshTokenStore + Send + Sync {}

impl<T> TokenStore for T where T: AccessTokenStore + RefreshTokenStore + Send + Sync {}

/// Combined OAuth storage trait
pub trait OAuthStorage:
    OAuthClientStore + AuthorizationCodeStore + AccessTokenStore + RefreshTokenStore + Send + Sync
{
}
