//! Authorization code issuance and single-use redemption.

use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::types::{AuthorizationCode, generate_token, join_scopes};
use crate::storage::traits::AuthorizationCodeStore;

/// Default authorization code lifetime
pub const DEFAULT_CODE_LIFETIME_MINUTES: i64 = 5;

/// Number of attempts made to store a freshly generated code before giving up
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Issues and redeems authorization codes on top of an [`AuthorizationCodeStore`].
pub struct AuthorizationCodeServices {
    store: Arc<dyn AuthorizationCodeStore>,
    lifetime: Duration,
}

impl AuthorizationCodeServices {
    pub fn new(store: Arc<dyn AuthorizationCodeStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    pub fn with_default_lifetime(store: Arc<dyn AuthorizationCodeStore>) -> Self {
        Self::new(store, Duration::minutes(DEFAULT_CODE_LIFETIME_MINUTES))
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Generate, store and return a new authorization code
    pub async fn issue(
        &self,
        client_id: &str,
        user_id: &str,
        scopes: &HashSet<String>,
        redirect_uri: &str,
    ) -> Result<String, OAuthError> {
        let scope = (!scopes.is_empty()).then(|| join_scopes(scopes));

        let mut last_error = None;
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let now = Utc::now();
            let auth_code = AuthorizationCode {
                code: generate_token(),
                client_id: client_id.to_string(),
                user_id: user_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
                scope: scope.clone(),
                created_at: now,
                expires_at: now + self.lifetime,
                used: false,
            };

            match self.store.store_code(&auth_code).await {
                Ok(()) => {
                    tracing::debug!(client_id, "issued authorization code");
                    return Ok(auth_code.code);
                }
                Err(err) => last_error = Some(err),
            }
        }

        Err(OAuthError::ServerError(format!(
            "Failed to store auth code: {:?}",
            last_error
        )))
    }

    /// Redeem a code exactly once.
    ///
    /// Unknown, expired and already redeemed codes all fail with `invalid_grant`.
    pub async fn consume(&self, code: &str) -> Result<AuthorizationCode, OAuthError> {
        self.store
            .consume_code(code)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid authorization code".to_string()))
    }

    /// Remove expired codes from the backing store
    pub async fn cleanup(&self) -> Result<usize, OAuthError> {
        Ok(self.store.cleanup_expired_codes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::parse_scope;
    use crate::storage::inmemory::MemoryOAuthStorage;

    fn services(lifetime: Duration) -> AuthorizationCodeServices {
        AuthorizationCodeServices::new(Arc::new(MemoryOAuthStorage::new()), lifetime)
    }

    #[tokio::test]
    async fn test_issue_then_consume_once() {
        let services = services(Duration::minutes(5));
        let code = services
            .issue("c1", "alice", &parse_scope("read write"), "https://app/cb")
            .await
            .unwrap();

        let redeemed = services.consume(&code).await.unwrap();
        assert_eq!(redeemed.client_id, "c1");
        assert_eq!(redeemed.redirect_uri, "https://app/cb");
        assert_eq!(redeemed.scope.as_deref(), Some("read write"));

        assert!(matches!(
            services.consume(&code).await,
            Err(OAuthError::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_code_fails() {
        let services = services(Duration::zero());
        let code = services
            .issue("c1", "alice", &HashSet::new(), "https://app/cb")
            .await
            .unwrap();

        assert!(matches!(
            services.consume(&code).await,
            Err(OAuthError::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn test_codes_are_unique() {
        let services = services(Duration::minutes(5));
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let code = services
                .issue("c1", "alice", &HashSet::new(), "https://app/cb")
                .await
                .unwrap();
            assert!(seen.insert(code));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_single_winner() {
        let services = Arc::new(services(Duration::minutes(5)));
        let code = services
            .issue("c1", "alice", &HashSet::new(), "https://app/cb")
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let services = services.clone();
                let code = code.clone();
                tokio::spawn(async move { services.consume(&code).await })
            })
            .collect();

        let mut successes = 0;
        let mut failures = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(OAuthError::InvalidGrant(_)) => failures += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(failures, 15);
    }
}
