//! OAuth 2.0 authorization server core: grant dispatch, code exchange and endpoint logic.

pub mod approval;
pub mod auth_server;
pub mod clients;
pub mod code_services;
pub mod endpoints;
pub mod granter;
pub mod grants;
pub mod token_services;
pub mod types;
pub mod validation;

// Re-export frequently used items from each module
pub use crate::storage::{
    inmemory::MemoryOAuthStorage,
    traits::{
        AccessTokenStore, AuthorizationCodeStore, OAuthClientStore, OAuthStorage, RefreshTokenStore,
        TokenStore,
    },
};
pub use approval::{
    ApprovalDecision, AutoApprovalHandler, ParameterApprovalHandler, UserApprovalHandler,
};
pub use auth_server::{AuthorizationServer, AuthorizationServerConfig, GrantConfig};
pub use clients::ClientRegistrationService;
pub use code_services::AuthorizationCodeServices;
pub use endpoints::{
    AuthorizationEndpoint, AuthorizeOutcome, ClientAuthentication, TokenEndpoint,
    extract_client_auth,
};
pub use granter::{CompositeTokenGranter, TokenGranter};
pub use grants::{StaticUserAuthenticator, UserAuthenticator};
pub use token_services::{TokenServices, TokenSettings};
pub use types::{
    AccessToken, AuthorizationCode, AuthorizationRequest, ClientAuthMethod, ClientType, GrantType,
    OAuthClient, OAuthErrorResponse, RefreshToken, ResponseType, TokenRequest, TokenResponse,
    TokenType, parse_scope,
};
pub use validation::{AuthorizationRequestValidator, ValidatedRequest, ValidationError};
