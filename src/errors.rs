//! Standardized error types following the `error-authgate-<domain>-<number>` format.

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-authgate-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-authgate-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-authgate-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-authgate-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-authgate-config-5 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when an endpoint path does not start with '/'
    #[error("error-authgate-config-6 Endpoint path must start with '/': {0}")]
    InvalidEndpointPath(String),

    /// Error when a registration file cannot be read or parsed
    #[error("error-authgate-config-7 Failed to load '{0}': {1}")]
    FileLoadFailed(String, String),

    /// Error when a grant type cannot be configured from the environment
    #[error("error-authgate-config-8 Unsupported grant type in configuration: {0}")]
    UnsupportedGrantType(String),
}

/// Errors raised while assembling the authorization server graph.
///
/// These are fatal: they surface from `AuthorizationServer::build` at startup and
/// never at request time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// No client registry was configured
    #[error("error-authgate-build-1 A client registry is mandatory")]
    MissingClientRegistry,

    /// No token services were configured
    #[error("error-authgate-build-2 Token services are mandatory")]
    MissingTokenServices,

    /// Two enabled granters claim the same grant type
    #[error("error-authgate-build-3 Duplicate grant type registration: {0}")]
    DuplicateGrantType(String),

    /// Password grant enabled without a user authenticator
    #[error("error-authgate-build-4 The password grant requires a user authenticator")]
    MissingUserAuthenticator,

    /// Explicit token granter combined with individually configured grants
    #[error(
        "error-authgate-build-5 An explicit token granter cannot be combined with individual grant configuration: {0}"
    )]
    ConflictingGranterConfiguration(String),

    /// A custom grant tried to claim a built-in grant type name
    #[error("error-authgate-build-6 Custom grant cannot use reserved grant type: {0}")]
    ReservedGrantType(String),

    /// Explicit granter redeems codes but no shared code services were given
    #[error(
        "error-authgate-build-7 An explicit token granter handling authorization_code requires code services"
    )]
    MissingCodeServices,
}

/// Client registration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientRegistrationError {
    /// Redirect URI is not an absolute URI without fragment
    #[error("error-authgate-client-1 Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Client metadata is inconsistent
    #[error("error-authgate-client-2 Invalid client metadata: {0}")]
    InvalidClientMetadata(String),

    /// Two registrations share a client id
    #[error("error-authgate-client-3 Duplicate client id: {0}")]
    DuplicateClientId(String),
}

/// HTTP server errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Error when template rendering fails
    #[error("error-authgate-http-1 Template rendering failed: {0}")]
    TemplateRenderingFailed(String),

    /// A configured page template is not available
    #[error("error-authgate-http-2 Template not found: {0}")]
    TemplateNotFound(String),
}

/// OAuth-related errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OAuthError {
    /// Invalid client credentials
    #[error("error-authgate-oauth-1 Invalid client credentials: {0}")]
    InvalidClient(String),

    /// Invalid, expired, consumed or mismatched grant
    #[error("error-authgate-oauth-2 Invalid grant: {0}")]
    InvalidGrant(String),

    /// Invalid scope
    #[error("error-authgate-oauth-3 Invalid scope: {0}")]
    InvalidScope(String),

    /// Invalid request
    #[error("error-authgate-oauth-4 Invalid request: {0}")]
    InvalidRequest(String),

    /// Unauthorized client
    #[error("error-authgate-oauth-5 Unauthorized client: {0}")]
    UnauthorizedClient(String),

    /// Unsupported grant type
    #[error("error-authgate-oauth-6 Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Unsupported response type
    #[error("error-authgate-oauth-7 Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    /// Access denied by the resource owner
    #[error("error-authgate-oauth-8 Access denied: {0}")]
    AccessDenied(String),

    /// Server error
    #[error("error-authgate-oauth-9 Server error: {0}")]
    ServerError(String),
}

impl OAuthError {
    /// OAuth 2.0 wire-format error code (RFC 6749 Section 5.2 / 4.1.2.1)
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidClient(_) => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::UnauthorizedClient(_) => "unauthorized_client",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::UnsupportedResponseType(_) => "unsupported_response_type",
            OAuthError::AccessDenied(_) => "access_denied",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    /// Human readable detail, without the error code prefix
    pub fn description(&self) -> &str {
        match self {
            OAuthError::InvalidClient(detail)
            | OAuthError::InvalidGrant(detail)
            | OAuthError::InvalidScope(detail)
            | OAuthError::InvalidRequest(detail)
            | OAuthError::UnauthorizedClient(detail)
            | OAuthError::UnsupportedGrantType(detail)
            | OAuthError::UnsupportedResponseType(detail)
            | OAuthError::AccessDenied(detail)
            | OAuthError::ServerError(detail) => detail,
        }
    }

    /// HTTP status used when the error is returned from the token endpoint
    pub fn status_code(&self) -> StatusCode {
        match self {
            OAuthError::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when a storage lock is poisoned
    #[error("error-authgate-storage-1 Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Error when data validation fails
    #[error("error-authgate-storage-2 Invalid data: {0}")]
    InvalidData(String),
}

impl From<StorageError> for OAuthError {
    fn from(err: StorageError) -> Self {
        OAuthError::ServerError(err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self, "internal server error");
        (StatusCode::INTERNAL_SERVER_ERROR).into_response()
    }
}
