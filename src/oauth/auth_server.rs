//! Authorization server assembly.
//!
//! [`AuthorizationServerConfig`] enumerates every wiring option once; calling
//! [`AuthorizationServer::build`] evaluates it into an immutable graph of
//! granters and endpoints. Configuration mistakes fail here, at startup.

use chrono::Duration;
use std::sync::Arc;

use crate::errors::{BuildError, OAuthError};
use crate::oauth::approval::{DEFAULT_APPROVAL_PARAMETER, ParameterApprovalHandler, UserApprovalHandler};
use crate::oauth::code_services::{AuthorizationCodeServices, DEFAULT_CODE_LIFETIME_MINUTES};
use crate::oauth::endpoints::{AuthorizationEndpoint, TokenEndpoint};
use crate::oauth::granter::{CompositeTokenGranter, TokenGranter};
use crate::oauth::grants::*;
use crate::oauth::token_services::TokenServices;
use crate::oauth::types::{GrantType, ResponseType};
use crate::oauth::validation::AuthorizationRequestValidator;
use crate::storage::inmemory::MemoryOAuthStorage;
use crate::storage::traits::OAuthClientStore;

pub const DEFAULT_TOKEN_ENDPOINT_URL: &str = "/oauth/token";
pub const DEFAULT_AUTHORIZATION_ENDPOINT_URL: &str = "/oauth/authorize";
pub const DEFAULT_USER_APPROVAL_PAGE: &str = "approval.html";
pub const DEFAULT_ERROR_PAGE: &str = "error.html";

/// One grant element, evaluated once at build time
#[derive(Clone)]
pub enum GrantConfig {
    AuthorizationCode { disabled: bool },
    RefreshToken { disabled: bool },
    Implicit { disabled: bool },
    ClientCredentials { disabled: bool },
    Password {
        disabled: bool,
        /// Overrides the server-wide user authenticator
        authenticator: Option<Arc<dyn UserAuthenticator>>,
    },
    Custom {
        disabled: bool,
        granter: Arc<dyn TokenGranter>,
    },
}

impl GrantConfig {
    pub fn is_disabled(&self) -> bool {
        match self {
            GrantConfig::AuthorizationCode { disabled }
            | GrantConfig::RefreshToken { disabled }
            | GrantConfig::Implicit { disabled }
            | GrantConfig::ClientCredentials { disabled }
            | GrantConfig::Password { disabled, .. }
            | GrantConfig::Custom { disabled, .. } => *disabled,
        }
    }

    /// Enabled grant element for a grant type name
    pub fn for_grant_type(grant_type: &GrantType) -> Option<Self> {
        match grant_type {
            GrantType::AuthorizationCode => Some(GrantConfig::AuthorizationCode { disabled: false }),
            GrantType::RefreshToken => Some(GrantConfig::RefreshToken { disabled: false }),
            GrantType::Implicit => Some(GrantConfig::Implicit { disabled: false }),
            GrantType::ClientCredentials => Some(GrantConfig::ClientCredentials { disabled: false }),
            GrantType::Password => Some(GrantConfig::Password {
                disabled: false,
                authenticator: None,
            }),
            GrantType::Custom(_) => None,
        }
    }
}

/// Every option the authorization server recognises
pub struct AuthorizationServerConfig {
    pub client_registry: Option<Arc<dyn OAuthClientStore>>,
    pub token_services: Option<Arc<TokenServices>>,
    /// Explicit composite granter; cannot be combined with `grants`
    pub token_granter: Option<Arc<CompositeTokenGranter>>,
    pub grants: Vec<GrantConfig>,
    pub code_services: Option<Arc<AuthorizationCodeServices>>,
    /// Lifetime of codes when `code_services` is not supplied
    pub code_lifetime: Duration,
    pub user_authenticator: Option<Arc<dyn UserAuthenticator>>,
    pub user_approval_handler: Option<Arc<dyn UserApprovalHandler>>,
    pub approval_parameter: String,
    pub user_approval_page: String,
    pub error_page: String,
    pub token_endpoint_url: String,
    pub authorization_endpoint_url: String,
}

impl Default for AuthorizationServerConfig {
    fn default() -> Self {
        Self {
            client_registry: None,
            token_services: None,
            token_granter: None,
            grants: Vec::new(),
            code_services: None,
            code_lifetime: Duration::minutes(DEFAULT_CODE_LIFETIME_MINUTES),
            user_authenticator: None,
            user_approval_handler: None,
            approval_parameter: DEFAULT_APPROVAL_PARAMETER.to_string(),
            user_approval_page: DEFAULT_USER_APPROVAL_PAGE.to_string(),
            error_page: DEFAULT_ERROR_PAGE.to_string(),
            token_endpoint_url: DEFAULT_TOKEN_ENDPOINT_URL.to_string(),
            authorization_endpoint_url: DEFAULT_AUTHORIZATION_ENDPOINT_URL.to_string(),
        }
    }
}

impl AuthorizationServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_registry(mut self, registry: Arc<dyn OAuthClientStore>) -> Self {
        self.client_registry = Some(registry);
        self
    }

    pub fn with_token_services(mut self, token_services: Arc<TokenServices>) -> Self {
        self.token_services = Some(token_services);
        self
    }

    pub fn with_token_granter(mut self, granter: Arc<CompositeTokenGranter>) -> Self {
        self.token_granter = Some(granter);
        self
    }

    pub fn with_grant(mut self, grant: GrantConfig) -> Self {
        self.grants.push(grant);
        self
    }

    pub fn with_code_services(mut self, code_services: Arc<AuthorizationCodeServices>) -> Self {
        self.code_services = Some(code_services);
        self
    }

    pub fn with_code_lifetime(mut self, lifetime: Duration) -> Self {
        self.code_lifetime = lifetime;
        self
    }

    pub fn with_user_authenticator(mut self, authenticator: Arc<dyn UserAuthenticator>) -> Self {
        self.user_authenticator = Some(authenticator);
        self
    }

    pub fn with_user_approval_handler(mut self, handler: Arc<dyn UserApprovalHandler>) -> Self {
        self.user_approval_handler = Some(handler);
        self
    }

    pub fn with_approval_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.approval_parameter = parameter.into();
        self
    }

    pub fn with_user_approval_page(mut self, page: impl Into<String>) -> Self {
        self.user_approval_page = page.into();
        self
    }

    pub fn with_error_page(mut self, page: impl Into<String>) -> Self {
        self.error_page = page.into();
        self
    }

    pub fn with_token_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint_url = url.into();
        self
    }

    pub fn with_authorization_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_endpoint_url = url.into();
        self
    }
}

/// Fully wired, read-only authorization server
pub struct AuthorizationServer {
    pub token_endpoint: TokenEndpoint,
    /// Present only when the granter handles a redirect-based grant
    pub authorization_endpoint: Option<AuthorizationEndpoint>,
    pub granter: Arc<CompositeTokenGranter>,
    pub code_services: Arc<AuthorizationCodeServices>,
    pub token_services: Arc<TokenServices>,
    pub approval_parameter: String,
    pub user_approval_page: String,
    pub error_page: String,
    pub token_endpoint_url: String,
    pub authorization_endpoint_url: String,
}

impl AuthorizationServer {
    pub fn build(config: AuthorizationServerConfig) -> Result<Self, BuildError> {
        let clients = config
            .client_registry
            .ok_or(BuildError::MissingClientRegistry)?;
        let token_services = config
            .token_services
            .ok_or(BuildError::MissingTokenServices)?;

        let shared_code_services = config.code_services.is_some();
        let code_services = config.code_services.unwrap_or_else(|| {
            Arc::new(AuthorizationCodeServices::new(
                Arc::new(MemoryOAuthStorage::new()),
                config.code_lifetime,
            ))
        });

        let granter = match config.token_granter {
            Some(granter) => {
                if let Some(grant) = config.grants.first() {
                    return Err(BuildError::ConflictingGranterConfiguration(
                        describe_grant(grant),
                    ));
                }
                // The endpoint must issue codes into the store the granter redeems from.
                if !shared_code_services && granter.handles(&GrantType::AuthorizationCode) {
                    return Err(BuildError::MissingCodeServices);
                }
                granter
            }
            None => Arc::new(build_composite(
                &config.grants,
                &code_services,
                &token_services,
                config.user_authenticator.as_ref(),
            )?),
        };

        let mut response_types = Vec::new();
        if granter.handles(&GrantType::AuthorizationCode) {
            response_types.push(ResponseType::Code);
        }
        if granter.handles(&GrantType::Implicit) {
            response_types.push(ResponseType::Token);
        }

        let authorization_endpoint = if response_types.is_empty() {
            None
        } else {
            let approval_handler: Arc<dyn UserApprovalHandler> = match config.user_approval_handler
            {
                Some(handler) => handler,
                None => Arc::new(ParameterApprovalHandler::new(
                    config.approval_parameter.clone(),
                )),
            };
            Some(AuthorizationEndpoint::new(
                AuthorizationRequestValidator::new(clients.clone(), response_types),
                code_services.clone(),
                granter.clone(),
                approval_handler,
            ))
        };

        tracing::info!(
            grant_types = ?granter.grant_types(),
            authorization_endpoint = authorization_endpoint.is_some(),
            "authorization server assembled"
        );

        Ok(Self {
            token_endpoint: TokenEndpoint::new(clients, granter.clone()),
            authorization_endpoint,
            granter,
            code_services,
            token_services,
            approval_parameter: config.approval_parameter,
            user_approval_page: config.user_approval_page,
            error_page: config.error_page,
            token_endpoint_url: config.token_endpoint_url,
            authorization_endpoint_url: config.authorization_endpoint_url,
        })
    }

    pub fn grant_types(&self) -> Vec<GrantType> {
        self.granter.grant_types()
    }

    /// Sweep expired codes and tokens
    pub async fn cleanup(&self) -> Result<usize, OAuthError> {
        let codes = self.code_services.cleanup().await?;
        let tokens = self.token_services.cleanup().await?;
        Ok(codes + tokens)
    }
}

fn describe_grant(grant: &GrantConfig) -> String {
    match grant {
        GrantConfig::AuthorizationCode { .. } => GrantType::AuthorizationCode.to_string(),
        GrantConfig::RefreshToken { .. } => GrantType::RefreshToken.to_string(),
        GrantConfig::Implicit { .. } => GrantType::Implicit.to_string(),
        GrantConfig::ClientCredentials { .. } => GrantType::ClientCredentials.to_string(),
        GrantConfig::Password { .. } => GrantType::Password.to_string(),
        GrantConfig::Custom { granter, .. } => granter.grant_type().to_string(),
    }
}

fn build_composite(
    grants: &[GrantConfig],
    code_services: &Arc<AuthorizationCodeServices>,
    token_services: &Arc<TokenServices>,
    user_authenticator: Option<&Arc<dyn UserAuthenticator>>,
) -> Result<CompositeTokenGranter, BuildError> {
    let mut composite = CompositeTokenGranter::new();

    for grant in grants.iter().filter(|grant| !grant.is_disabled()) {
        let granter: Arc<dyn TokenGranter> = match grant {
            GrantConfig::AuthorizationCode { .. } => Arc::new(AuthorizationCodeTokenGranter::new(
                code_services.clone(),
                token_services.clone(),
            )),
            GrantConfig::RefreshToken { .. } => {
                Arc::new(RefreshTokenGranter::new(token_services.clone()))
            }
            GrantConfig::Implicit { .. } => {
                Arc::new(ImplicitTokenGranter::new(token_services.clone()))
            }
            GrantConfig::ClientCredentials { .. } => {
                Arc::new(ClientCredentialsTokenGranter::new(token_services.clone()))
            }
            GrantConfig::Password { authenticator, .. } => {
                let authenticator = authenticator
                    .as_ref()
                    .or(user_authenticator)
                    .cloned()
                    .ok_or(BuildError::MissingUserAuthenticator)?;
                Arc::new(ResourceOwnerPasswordTokenGranter::new(
                    authenticator,
                    token_services.clone(),
                ))
            }
            GrantConfig::Custom { granter, .. } => {
                let grant_type = granter.grant_type();
                if grant_type.is_builtin() {
                    return Err(BuildError::ReservedGrantType(grant_type.to_string()));
                }
                granter.clone()
            }
        };

        composite.register(granter)?;
    }

    Ok(composite)
}
