//! Mutex-guarded maps backing every store trait, for single-process deployments and tests.

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Default)]
pub struct MemoryOAuthStorage {
    clients: Mutex<HashMap<String, OAuthClient>>,
    auth_codes: Mutex<HashMap<String, AuthorizationCode>>,
    access_tokens: Mutex<HashMap<String, AccessToken>>,
    refresh_tokens: Mutex<HashMap<String, RefreshToken>>,
}

impl MemoryOAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StorageError::LockPoisoned(format!("Lock error: {}", e)))
}

#[async_trait]
impl OAuthClientStore for MemoryOAuthStorage {
    async fn store_client(&self, client: &OAuthClient) -> Result<()> {
        lock(&self.clients)?.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>> {
        Ok(lock(&self.clients)?.get(client_id).cloned())
    }

    async fn list_clients(&self, limit: Option<usize>) -> Result<Vec<OAuthClient>> {
        let clients = lock(&self.clients)?;
        let mut result: Vec<_> = clients.values().cloned().collect();
        result.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryOAuthStorage {
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()> {
        let mut codes = lock(&self.auth_codes)?;
        if codes.contains_key(&code.code) {
            return Err(StorageError::InvalidData(
                "Authorization code already exists".to_string(),
            ));
        }
        codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        // The whole check-and-mark runs under one guard.
        let mut codes = lock(&self.auth_codes)?;

        let expired = match codes.get(code) {
            Some(auth_code) => auth_code.expires_at <= Utc::now(),
            None => return Ok(None),
        };

        if expired {
            codes.remove(code);
            return Ok(None);
        }

        let Some(auth_code) = codes.get_mut(code) else {
            return Ok(None);
        };

        if auth_code.used {
            return Ok(None);
        }

        auth_code.used = true;
        Ok(Some(auth_code.clone()))
    }

    async fn cleanup_expired_codes(&self) -> Result<usize> {
        let mut codes = lock(&self.auth_codes)?;

        let now = Utc::now();
        let initial_count = codes.len();
        codes.retain(|_, code| code.expires_at > now);

        Ok(initial_count - codes.len())
    }
}

#[async_trait]
impl AccessTokenStore for MemoryOAuthStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        let mut tokens = lock(&self.access_tokens)?;
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let tokens = lock(&self.access_tokens)?;
        Ok(tokens
            .get(token)
            .filter(|access_token| access_token.expires_at > Utc::now())
            .cloned())
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        lock(&self.access_tokens)?.remove(token);
        Ok(())
    }

    async fn cleanup_expired_tokens(&self) -> Result<usize> {
        let mut tokens = lock(&self.access_tokens)?;

        let now = Utc::now();
        let initial_count = tokens.len();
        tokens.retain(|_, token| token.expires_at > now);

        Ok(initial_count - tokens.len())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryOAuthStorage {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let mut tokens = lock(&self.refresh_tokens)?;
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let tokens = lock(&self.refresh_tokens)?;
        Ok(tokens
            .get(token)
            .filter(|refresh_token| {
                refresh_token
                    .expires_at
                    .is_none_or(|expires_at| expires_at > Utc::now())
            })
            .cloned())
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        // Removal is the redemption; an expired token is dropped either way.
        let removed = lock(&self.refresh_tokens)?.remove(token);
        let now = Utc::now();
        Ok(removed.filter(|refresh_token| {
            refresh_token
                .expires_at
                .is_none_or(|expires_at| expires_at > now)
        }))
    }

    async fn cleanup_expired_refresh_tokens(&self) -> Result<usize> {
        let mut tokens = lock(&self.refresh_tokens)?;

        let now = Utc::now();
        let initial_count = tokens.len();
        tokens.retain(|_, token| token.expires_at.is_none_or(|expires_at| expires_at > now));

        Ok(initial_count - tokens.len())
    }
}

impl OAuthStorage for MemoryOAuthStorage {}
