//! OAuth 2.0 core types and data structures.
//!
//! Defines enums and structs for grants, tokens, clients, and requests.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::errors::OAuthError;

/// OAuth 2.0 Grant Types
///
/// The five grants of RFC 6749 plus any extension grant registered under its own name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
    Implicit,
    ClientCredentials,
    Password,
    Custom(String),
}

impl GrantType {
    pub fn as_str(&self) -> &str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Implicit => "implicit",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::Password => "password",
            GrantType::Custom(name) => name,
        }
    }

    /// Whether this is one of the RFC 6749 grant types
    pub fn is_builtin(&self) -> bool {
        !matches!(self, GrantType::Custom(_))
    }
}

impl From<&str> for GrantType {
    fn from(value: &str) -> Self {
        match value {
            "authorization_code" => GrantType::AuthorizationCode,
            "refresh_token" => GrantType::RefreshToken,
            "implicit" => GrantType::Implicit,
            "client_credentials" => GrantType::ClientCredentials,
            "password" => GrantType::Password,
            other => GrantType::Custom(other.to_string()),
        }
    }
}

impl From<String> for GrantType {
    fn from(value: String) -> Self {
        GrantType::from(value.as_str())
    }
}

impl From<GrantType> for String {
    fn from(value: GrantType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth 2.0 Response Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
    Token,
}

impl ResponseType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(ResponseType::Code),
            "token" => Some(ResponseType::Token),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }

    /// The grant a client must be registered for to use this response type
    pub fn grant_type(&self) -> GrantType {
        match self {
            ResponseType::Code => GrantType::AuthorizationCode,
            ResponseType::Token => GrantType::Implicit,
        }
    }
}

/// OAuth 2.0 Token Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Bearer,
}

/// OAuth 2.0 Client Authentication Methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
    None,
}

/// Client Type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Public,
    Confidential,
}

/// OAuth Client Registration
///
/// Immutable once the registry is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Unique client identifier
    pub client_id: String,
    /// Client secret (absent for public clients)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Client name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Registered redirect URIs
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Grant types allowed for this client
    #[serde(default)]
    pub grant_types: Vec<GrantType>,
    /// Space separated scopes this client may request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Client authentication method at the token endpoint
    #[serde(default)]
    pub token_endpoint_auth_method: ClientAuthMethod,
    /// Access token lifetime override in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_validity_seconds: Option<i64>,
    /// Refresh token lifetime override in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_validity_seconds: Option<i64>,
    /// Registration timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl OAuthClient {
    pub fn client_type(&self) -> ClientType {
        if self.client_secret.is_some()
            && self.token_endpoint_auth_method != ClientAuthMethod::None
        {
            ClientType::Confidential
        } else {
            ClientType::Public
        }
    }

    pub fn allows_grant(&self, grant_type: &GrantType) -> bool {
        self.grant_types.contains(grant_type)
    }

    pub fn allowed_scopes(&self) -> HashSet<String> {
        self.scope.as_deref().map(parse_scope).unwrap_or_default()
    }
}

/// OAuth Authorization Request as received on the authorization endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Requested response type, unparsed
    pub response_type: Option<String>,
    /// Client ID
    pub client_id: String,
    /// Redirect URI, may be omitted when exactly one is registered
    pub redirect_uri: Option<String>,
    /// Requested scope
    pub scope: Option<String>,
    /// State parameter, echoed back verbatim
    pub state: Option<String>,
}

/// OAuth Authorization Code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The authorization code
    pub code: String,
    /// Client ID that requested this code
    pub client_id: String,
    /// Resource owner that approved this code
    pub user_id: String,
    /// Redirect URI used in the authorization request
    pub redirect_uri: String,
    /// Granted scope
    pub scope: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Whether this code has been used
    pub used: bool,
}

/// OAuth Access Token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The access token
    pub token: String,
    /// Token type
    pub token_type: TokenType,
    /// Client ID
    pub client_id: String,
    /// User ID (absent for client credentials)
    pub user_id: Option<String>,
    /// Granted scope
    pub scope: Option<String>,
    /// Linked refresh token, if any
    pub refresh_token: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

/// OAuth Refresh Token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    /// The refresh token
    pub token: String,
    /// Access token most recently issued with this refresh token
    pub access_token: String,
    /// Client ID
    pub client_id: String,
    /// User ID
    pub user_id: Option<String>,
    /// Scope originally granted; refreshed access tokens never exceed it
    pub scope: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp (optional, can be long-lived)
    pub expires_at: Option<DateTime<Utc>>,
}

/// Token Request
///
/// Grant-specific parameters are kept as a map so extension grants can read
/// whatever they define.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// Grant type
    pub grant_type: GrantType,
    /// Requested scope
    pub scope: Option<String>,
    /// All remaining request parameters
    pub parameters: BTreeMap<String, String>,
    /// Resource owner already authenticated by the authorization endpoint
    pub resource_owner: Option<String>,
}

impl TokenRequest {
    pub fn new(grant_type: GrantType) -> Self {
        Self {
            grant_type,
            scope: None,
            parameters: BTreeMap::new(),
            resource_owner: None,
        }
    }

    /// Build a token request from decoded form parameters
    pub fn from_parameters<I>(parameters: I) -> Result<Self, OAuthError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut parameters: BTreeMap<String, String> = parameters.into_iter().collect();
        let grant_type = parameters
            .remove("grant_type")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| OAuthError::InvalidRequest("Missing grant type".to_string()))?;
        let scope = parameters.remove("scope").filter(|value| !value.is_empty());

        Ok(Self {
            grant_type: GrantType::from(grant_type),
            scope,
            parameters,
            resource_owner: None,
        })
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_resource_owner(mut self, user_id: impl Into<String>) -> Self {
        self.resource_owner = Some(user_id.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Fetch a mandatory parameter, failing with `invalid_request`
    pub fn require(&self, name: &str) -> Result<&str, OAuthError> {
        self.parameter(name)
            .ok_or_else(|| OAuthError::InvalidRequest(format!("Missing {}", name)))
    }

    pub fn requested_scopes(&self) -> Option<HashSet<String>> {
        self.scope
            .as_deref()
            .map(parse_scope)
            .filter(|scopes| !scopes.is_empty())
    }
}

/// Token Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type
    pub token_type: TokenType,
    /// Expires in seconds
    pub expires_in: u64,
    /// Refresh token (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn new(
        access_token: String,
        token_type: TokenType,
        expires_in: u64,
        refresh_token: Option<String>,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            token_type,
            expires_in,
            refresh_token,
            scope,
        }
    }

    pub fn scopes(&self) -> HashSet<String> {
        self.scope.as_deref().map(parse_scope).unwrap_or_default()
    }
}

/// OAuth Error Response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code
    pub error: String,
    /// Error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// State parameter (for authorization errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl From<&OAuthError> for OAuthErrorResponse {
    fn from(err: &OAuthError) -> Self {
        Self {
            error: err.error_code().to_string(),
            error_description: Some(err.description().to_string()),
            state: None,
        }
    }
}

/// Generate a secure random token
pub fn generate_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Parse scope string into a set
pub fn parse_scope(scope: &str) -> HashSet<String> {
    scope.split_whitespace().map(|s| s.to_string()).collect()
}

/// Join scopes into a space-separated string
pub fn join_scopes(scopes: &HashSet<String>) -> String {
    let mut scopes: Vec<_> = scopes.iter().collect();
    scopes.sort();
    scopes.into_iter().cloned().collect::<Vec<_>>().join(" ")
}

/// Resolve the scopes to grant a client.
///
/// No requested scope means every scope the client is allowed; a requested scope
/// must be a subset of the allowed set.
pub fn resolve_scopes(
    requested: Option<HashSet<String>>,
    client: &OAuthClient,
) -> Result<HashSet<String>, OAuthError> {
    let allowed = client.allowed_scopes();
    match requested {
        None => Ok(allowed),
        Some(requested) if requested.is_subset(&allowed) => Ok(requested),
        Some(_) => Err(OAuthError::InvalidScope(
            "Requested scope exceeds allowed scope".to_string(),
        )),
    }
}
