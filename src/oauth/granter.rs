//! Token granter contract and ordered dispatch across granters.

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::{BuildError, OAuthError};
use crate::oauth::types::{GrantType, OAuthClient, TokenRequest, TokenResponse};

/// A handler for one grant type
#[async_trait]
pub trait TokenGranter: Send + Sync {
    /// The grant type this granter answers for
    fn grant_type(&self) -> GrantType;

    /// Issue a token for an already authenticated client
    async fn grant(
        &self,
        request: &TokenRequest,
        client: &OAuthClient,
    ) -> Result<TokenResponse, OAuthError>;
}

/// Fail with `unauthorized_client` unless the client is registered for `grant_type`
pub fn ensure_grant_allowed(client: &OAuthClient, grant_type: &GrantType) -> Result<(), OAuthError> {
    if client.allows_grant(grant_type) {
        Ok(())
    } else {
        Err(OAuthError::UnauthorizedClient(format!(
            "Client is not authorized for grant type {}",
            grant_type
        )))
    }
}

/// Dispatches token requests to the granter registered for their grant type.
///
/// Granters are consulted in registration order and each grant type may be
/// registered at most once.
#[derive(Default)]
pub struct CompositeTokenGranter {
    granters: Vec<Arc<dyn TokenGranter>>,
}

impl CompositeTokenGranter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a granter, rejecting a second granter for the same grant type
    pub fn register(&mut self, granter: Arc<dyn TokenGranter>) -> Result<(), BuildError> {
        let grant_type = granter.grant_type();
        if self.handles(&grant_type) {
            return Err(BuildError::DuplicateGrantType(grant_type.to_string()));
        }
        self.granters.push(granter);
        Ok(())
    }

    pub fn handles(&self, grant_type: &GrantType) -> bool {
        self.granters
            .iter()
            .any(|granter| granter.grant_type() == *grant_type)
    }

    /// Registered grant types in registration order
    pub fn grant_types(&self) -> Vec<GrantType> {
        self.granters.iter().map(|g| g.grant_type()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.granters.is_empty()
    }

    pub async fn grant(
        &self,
        request: &TokenRequest,
        client: &OAuthClient,
    ) -> Result<TokenResponse, OAuthError> {
        let Some(granter) = self
            .granters
            .iter()
            .find(|granter| granter.grant_type() == request.grant_type)
        else {
            tracing::debug!(grant_type = %request.grant_type, "no granter registered");
            return Err(OAuthError::UnsupportedGrantType(request.grant_type.to_string()));
        };

        ensure_grant_allowed(client, &request.grant_type)?;

        tracing::debug!(
            grant_type = %request.grant_type,
            client_id = %client.client_id,
            "dispatching token request"
        );

        let result = granter.grant(request, client).await;
        if let Err(err) = &result {
            tracing::warn!(
                grant_type = %request.grant_type,
                client_id = %client.client_id,
                error = %err,
                "grant rejected"
            );
        }
        result
    }
}
