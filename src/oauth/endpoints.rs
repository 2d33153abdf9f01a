//! Authorization and token endpoint protocol logic, independent of the web framework.

use base64::prelude::*;
use http::{HeaderMap, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::errors::OAuthError;
use crate::oauth::approval::{ApprovalDecision, UserApprovalHandler};
use crate::oauth::code_services::AuthorizationCodeServices;
use crate::oauth::granter::CompositeTokenGranter;
use crate::oauth::types::*;
use crate::oauth::validation::{AuthorizationRequestValidator, ValidatedRequest, ValidationError};
use crate::storage::traits::OAuthClientStore;

/// What the HTTP layer should do with an authorization request
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// Redirect the user agent to this verified URI
    Redirect(String),
    /// Render the local error page; the redirect URI could not be trusted
    ErrorPage { error: OAuthError, status: StatusCode },
    /// Ask the user to approve the request
    ApprovalRequired {
        request: ValidatedRequest,
        user_id: String,
    },
}

pub struct AuthorizationEndpoint {
    validator: AuthorizationRequestValidator,
    code_services: Arc<AuthorizationCodeServices>,
    granter: Arc<CompositeTokenGranter>,
    approval_handler: Arc<dyn UserApprovalHandler>,
}

impl AuthorizationEndpoint {
    pub fn new(
        validator: AuthorizationRequestValidator,
        code_services: Arc<AuthorizationCodeServices>,
        granter: Arc<CompositeTokenGranter>,
        approval_handler: Arc<dyn UserApprovalHandler>,
    ) -> Self {
        Self {
            validator,
            code_services,
            granter,
            approval_handler,
        }
    }

    pub fn supported_response_types(&self) -> &[ResponseType] {
        self.validator.supported_response_types()
    }

    /// Handle an authorization request for the user authenticated by the HTTP layer.
    ///
    /// `parameters` holds every request parameter, including the approval answer
    /// when the approval form is posted back.
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
        user_id: Option<&str>,
        parameters: &HashMap<String, String>,
    ) -> AuthorizeOutcome {
        let Some(user_id) = user_id else {
            return AuthorizeOutcome::ErrorPage {
                error: OAuthError::AccessDenied(
                    "User must be authenticated before authorizing a client".to_string(),
                ),
                status: StatusCode::UNAUTHORIZED,
            };
        };

        let validated = match self.validator.validate(request).await {
            Ok(validated) => validated,
            Err(ValidationError::Untrusted(error)) => {
                tracing::warn!(
                    client_id = %request.client_id,
                    error = %error,
                    "refusing authorization request without a trusted redirect"
                );
                let status = error.status_code();
                return AuthorizeOutcome::ErrorPage { error, status };
            }
            Err(ValidationError::Redirectable {
                redirect_uri,
                state,
                error,
                fragment,
            }) => {
                return error_redirect(&redirect_uri, &error, state.as_deref(), fragment);
            }
        };

        let fragment = validated.response_type == ResponseType::Token;

        match self
            .approval_handler
            .decide(&validated, user_id, parameters)
        {
            ApprovalDecision::Pending => {
                return AuthorizeOutcome::ApprovalRequired {
                    request: validated,
                    user_id: user_id.to_string(),
                };
            }
            ApprovalDecision::Denied => {
                return error_redirect(
                    &validated.redirect_uri,
                    &OAuthError::AccessDenied("User denied access".to_string()),
                    validated.state.as_deref(),
                    fragment,
                );
            }
            ApprovalDecision::Approved => {}
        }

        let result = match validated.response_type {
            ResponseType::Code => self.issue_code(&validated, user_id).await,
            ResponseType::Token => self.issue_implicit_token(&validated, user_id).await,
        };

        match result {
            Ok(location) => AuthorizeOutcome::Redirect(location),
            Err(error) => error_redirect(
                &validated.redirect_uri,
                &error,
                validated.state.as_deref(),
                fragment,
            ),
        }
    }

    async fn issue_code(
        &self,
        validated: &ValidatedRequest,
        user_id: &str,
    ) -> Result<String, OAuthError> {
        let code = self
            .code_services
            .issue(
                &validated.client.client_id,
                user_id,
                &validated.scopes,
                &validated.redirect_uri,
            )
            .await?;

        let mut params = vec![("code", code.as_str())];
        if let Some(state) = validated.state.as_deref() {
            params.push(("state", state));
        }
        build_redirect(&validated.redirect_uri, &params, false)
    }

    async fn issue_implicit_token(
        &self,
        validated: &ValidatedRequest,
        user_id: &str,
    ) -> Result<String, OAuthError> {
        let mut token_request = TokenRequest::new(GrantType::Implicit)
            .with_parameter("response_type", ResponseType::Token.as_str())
            .with_resource_owner(user_id);
        if !validated.scopes.is_empty() {
            token_request = token_request.with_scope(join_scopes(&validated.scopes));
        }

        let token = self.granter.grant(&token_request, &validated.client).await?;

        let expires_in = token.expires_in.to_string();
        let mut params = vec![
            ("access_token", token.access_token.as_str()),
            ("token_type", "Bearer"),
            ("expires_in", expires_in.as_str()),
        ];
        if let Some(scope) = token.scope.as_deref() {
            params.push(("scope", scope));
        }
        if let Some(state) = validated.state.as_deref() {
            params.push(("state", state));
        }
        build_redirect(&validated.redirect_uri, &params, true)
    }
}

fn build_redirect(
    redirect_uri: &str,
    params: &[(&str, &str)],
    fragment: bool,
) -> Result<String, OAuthError> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|e| OAuthError::ServerError(format!("Invalid redirect URI: {}", e)))?;

    if fragment {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        url.set_fragment(Some(&encoded));
    } else {
        url.query_pairs_mut().extend_pairs(params);
    }

    Ok(url.to_string())
}

fn error_redirect(
    redirect_uri: &str,
    error: &OAuthError,
    state: Option<&str>,
    fragment: bool,
) -> AuthorizeOutcome {
    let mut params = vec![
        ("error", error.error_code()),
        ("error_description", error.description()),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }

    match build_redirect(redirect_uri, &params, fragment) {
        Ok(location) => AuthorizeOutcome::Redirect(location),
        Err(error) => AuthorizeOutcome::ErrorPage {
            status: error.status_code(),
            error,
        },
    }
}

/// Client credentials presented to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAuthentication {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Extract client credentials from the Basic header or the form body.
///
/// The header wins; a form `client_id` naming a different client is rejected.
pub fn extract_client_auth(
    headers: &HeaderMap,
    form: &HashMap<String, String>,
) -> Result<Option<ClientAuthentication>, OAuthError> {
    let form_client_id = form
        .get("client_id")
        .map(String::as_str)
        .filter(|value| !value.is_empty());

    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| OAuthError::InvalidClient("Invalid authorization header".to_string()))?;

        if let Some(encoded) = auth_str.strip_prefix("Basic ") {
            let decoded = BASE64_STANDARD.decode(encoded.trim()).map_err(|_| {
                OAuthError::InvalidClient("Invalid basic auth encoding".to_string())
            })?;
            let decoded = String::from_utf8(decoded).map_err(|_| {
                OAuthError::InvalidClient("Invalid basic auth encoding".to_string())
            })?;
            let (client_id, client_secret) = decoded.split_once(':').ok_or_else(|| {
                OAuthError::InvalidClient("Invalid basic auth format".to_string())
            })?;

            if form_client_id.is_some_and(|form_id| form_id != client_id) {
                return Err(OAuthError::InvalidClient(
                    "Client id in body does not match authorization header".to_string(),
                ));
            }

            return Ok(Some(ClientAuthentication {
                client_id: client_id.to_string(),
                client_secret: Some(client_secret.to_string()),
            }));
        }
    }

    Ok(form_client_id.map(|client_id| ClientAuthentication {
        client_id: client_id.to_string(),
        client_secret: form.get("client_secret").cloned(),
    }))
}

pub struct TokenEndpoint {
    clients: Arc<dyn OAuthClientStore>,
    granter: Arc<CompositeTokenGranter>,
}

impl TokenEndpoint {
    pub fn new(clients: Arc<dyn OAuthClientStore>, granter: Arc<CompositeTokenGranter>) -> Self {
        Self { clients, granter }
    }

    pub fn granter(&self) -> &CompositeTokenGranter {
        &self.granter
    }

    /// Authenticate the client and dispatch the grant
    pub async fn token(
        &self,
        client_auth: Option<ClientAuthentication>,
        parameters: HashMap<String, String>,
    ) -> Result<TokenResponse, OAuthError> {
        let client_auth = client_auth.ok_or_else(|| {
            OAuthError::InvalidClient("Client authentication required".to_string())
        })?;
        let client = self.authenticate_client(&client_auth).await?;

        let request = TokenRequest::from_parameters(
            parameters
                .into_iter()
                .filter(|(name, _)| name != "client_id" && name != "client_secret"),
        )?;

        if request.grant_type == GrantType::Implicit {
            return Err(OAuthError::UnsupportedGrantType(
                "Implicit grant is only available from the authorization endpoint".to_string(),
            ));
        }

        self.granter.grant(&request, &client).await
    }

    async fn authenticate_client(
        &self,
        client_auth: &ClientAuthentication,
    ) -> Result<OAuthClient, OAuthError> {
        let client = self
            .clients
            .get_client(&client_auth.client_id)
            .await?
            .ok_or_else(|| OAuthError::InvalidClient("Client not found".to_string()))?;

        let presented = client_auth
            .client_secret
            .as_deref()
            .filter(|secret| !secret.is_empty());

        match (client.client_secret.as_deref(), presented) {
            (Some(expected), Some(presented)) if expected == presented => Ok(client),
            (Some(_), _) => Err(OAuthError::InvalidClient(
                "Invalid client credentials".to_string(),
            )),
            (None, None) => Ok(client),
            (None, Some(_)) => Err(OAuthError::InvalidClient(
                "Public client must not present a secret".to_string(),
            )),
        }
    }
}
