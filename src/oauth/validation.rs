//! Authorization request validation against the client registry.

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::types::*;
use crate::storage::traits::OAuthClientStore;

/// An authorization request that passed every check
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub client: OAuthClient,
    pub response_type: ResponseType,
    /// Registered redirect URI the response goes to
    pub redirect_uri: String,
    pub scopes: HashSet<String>,
    pub state: Option<String>,
}

/// Why an authorization request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The client or redirect URI could not be verified; never redirect
    Untrusted(OAuthError),
    /// The redirect URI is verified and the error goes back to the client
    Redirectable {
        redirect_uri: String,
        state: Option<String>,
        error: OAuthError,
        /// Deliver in the URI fragment rather than the query
        fragment: bool,
    },
}

impl ValidationError {
    pub fn error(&self) -> &OAuthError {
        match self {
            ValidationError::Untrusted(error) => error,
            ValidationError::Redirectable { error, .. } => error,
        }
    }
}

pub struct AuthorizationRequestValidator {
    clients: Arc<dyn OAuthClientStore>,
    supported_response_types: Vec<ResponseType>,
}

impl AuthorizationRequestValidator {
    pub fn new(
        clients: Arc<dyn OAuthClientStore>,
        supported_response_types: Vec<ResponseType>,
    ) -> Self {
        Self {
            clients,
            supported_response_types,
        }
    }

    pub fn supported_response_types(&self) -> &[ResponseType] {
        &self.supported_response_types
    }

    /// Validate a raw authorization request.
    ///
    /// The client and redirect URI are checked first; until both are verified
    /// every failure is [`ValidationError::Untrusted`].
    pub async fn validate(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<ValidatedRequest, ValidationError> {
        let client = self
            .clients
            .get_client(&request.client_id)
            .await
            .map_err(|e| ValidationError::Untrusted(e.into()))?
            .ok_or_else(|| {
                ValidationError::Untrusted(OAuthError::InvalidClient(format!(
                    "Unknown client: {}",
                    request.client_id
                )))
            })?;

        let redirect_uri = resolve_redirect_uri(&client, request.redirect_uri.as_deref())
            .map_err(ValidationError::Untrusted)?;

        let redirectable = |error: OAuthError, fragment: bool| ValidationError::Redirectable {
            redirect_uri: redirect_uri.clone(),
            state: request.state.clone(),
            error,
            fragment,
        };

        let raw_response_type = request
            .response_type
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                redirectable(
                    OAuthError::InvalidRequest("Missing response_type".to_string()),
                    false,
                )
            })?;

        // Implicit requests get their errors in the fragment even when implicit is disabled.
        let fragment = ResponseType::parse(raw_response_type) == Some(ResponseType::Token);
        let response_type = ResponseType::parse(raw_response_type)
            .filter(|response_type| self.supported_response_types.contains(response_type))
            .ok_or_else(|| {
                redirectable(
                    OAuthError::UnsupportedResponseType(raw_response_type.to_string()),
                    fragment,
                )
            })?;

        if !client.allows_grant(&response_type.grant_type()) {
            return Err(redirectable(
                OAuthError::UnauthorizedClient(format!(
                    "Client is not authorized for response type {}",
                    response_type.as_str()
                )),
                fragment,
            ));
        }

        let requested = request
            .scope
            .as_deref()
            .map(parse_scope)
            .filter(|scopes| !scopes.is_empty());
        let scopes =
            resolve_scopes(requested, &client).map_err(|error| redirectable(error, fragment))?;

        Ok(ValidatedRequest {
            client,
            response_type,
            redirect_uri,
            scopes,
            state: request.state.clone(),
        })
    }
}

/// Exact match against the registered URIs, or the sole registered URI when omitted
fn resolve_redirect_uri(
    client: &OAuthClient,
    requested: Option<&str>,
) -> Result<String, OAuthError> {
    match requested.filter(|uri| !uri.is_empty()) {
        Some(uri) if client.redirect_uris.iter().any(|registered| registered == uri) => {
            Ok(uri.to_string())
        }
        Some(uri) => Err(OAuthError::InvalidRequest(format!(
            "Redirect URI is not registered for this client: {}",
            uri
        ))),
        None => match client.redirect_uris.as_slice() {
            [only] => Ok(only.clone()),
            [] => Err(OAuthError::InvalidRequest(
                "Client has no registered redirect URI".to_string(),
            )),
            _ => Err(OAuthError::InvalidRequest(
                "A redirect_uri is required when several are registered".to_string(),
            )),
        },
    }
}
