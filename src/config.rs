//! Environment-based configuration types for authgate server runtime settings.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::oauth::auth_server::{
    DEFAULT_AUTHORIZATION_ENDPOINT_URL, DEFAULT_ERROR_PAGE, DEFAULT_TOKEN_ENDPOINT_URL,
    DEFAULT_USER_APPROVAL_PAGE, GrantConfig,
};
use crate::oauth::approval::DEFAULT_APPROVAL_PARAMETER;
use crate::oauth::token_services::TokenSettings;
use crate::oauth::types::GrantType;

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// Grant types listed in a space or comma separated variable
#[derive(Clone, Debug, Default)]
pub struct OAuthGrantTypes(Vec<GrantType>);

/// Lifetime configured with a duration string such as `5m` or `30d`
#[derive(Clone, Debug)]
pub struct Lifetime(chrono::Duration);

/// Boolean feature flag
#[derive(Clone, Debug)]
pub struct FeatureFlag(bool);

/// Path an endpoint is mounted on
#[derive(Clone, Debug)]
pub struct EndpointPath(String);

/// Interval of the expired code and token sweeper
#[derive(Clone, Debug)]
pub struct CleanupInterval(Duration);

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub http_templates_path: Option<String>,
    pub external_base: String,
    pub clients_file: String,
    pub users_file: Option<String>,
    pub oauth_grant_types: OAuthGrantTypes,
    pub oauth_disabled_grant_types: OAuthGrantTypes,
    pub authorization_code_lifetime: Lifetime,
    pub access_token_validity: Lifetime,
    pub refresh_token_validity: Lifetime,
    pub support_refresh_token: FeatureFlag,
    pub reuse_refresh_token: FeatureFlag,
    pub token_endpoint_path: EndpointPath,
    pub authorization_endpoint_path: EndpointPath,
    pub user_approval_page: String,
    pub error_page: String,
    pub approval_parameter: String,
    pub authenticated_user_header: String,
    pub cleanup_interval: CleanupInterval,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let http_templates_path = optional_env("HTTP_TEMPLATES_PATH");
        let external_base = require_env("EXTERNAL_BASE")?;
        let clients_file = require_env("CLIENTS_FILE")?;
        let users_file = optional_env("USERS_FILE");
        let oauth_grant_types: OAuthGrantTypes =
            default_env("OAUTH_GRANT_TYPES", "authorization_code refresh_token").try_into()?;
        let oauth_disabled_grant_types: OAuthGrantTypes =
            default_env("OAUTH_DISABLED_GRANT_TYPES", "").try_into()?;
        let authorization_code_lifetime: Lifetime =
            default_env("AUTHORIZATION_CODE_LIFETIME", "5m").try_into()?;
        let access_token_validity: Lifetime =
            default_env("ACCESS_TOKEN_VALIDITY", "12h").try_into()?;
        let refresh_token_validity: Lifetime =
            default_env("REFRESH_TOKEN_VALIDITY", "30d").try_into()?;
        let support_refresh_token: FeatureFlag =
            default_env("SUPPORT_REFRESH_TOKEN", "true").try_into()?;
        let reuse_refresh_token: FeatureFlag =
            default_env("REUSE_REFRESH_TOKEN", "false").try_into()?;
        let token_endpoint_path: EndpointPath =
            default_env("TOKEN_ENDPOINT_PATH", DEFAULT_TOKEN_ENDPOINT_URL).try_into()?;
        let authorization_endpoint_path: EndpointPath = default_env(
            "AUTHORIZATION_ENDPOINT_PATH",
            DEFAULT_AUTHORIZATION_ENDPOINT_URL,
        )
        .try_into()?;
        let user_approval_page = default_env("USER_APPROVAL_PAGE", DEFAULT_USER_APPROVAL_PAGE);
        let error_page = default_env("ERROR_PAGE", DEFAULT_ERROR_PAGE);
        let approval_parameter = default_env("APPROVAL_PARAMETER", DEFAULT_APPROVAL_PARAMETER);
        let authenticated_user_header =
            default_env("AUTHENTICATED_USER_HEADER", "x-authenticated-user").to_lowercase();
        let cleanup_interval: CleanupInterval = default_env("CLEANUP_INTERVAL", "1m").try_into()?;

        Ok(Self {
            version: version()?,
            http_port,
            http_templates_path,
            external_base,
            clients_file,
            users_file,
            oauth_grant_types,
            oauth_disabled_grant_types,
            authorization_code_lifetime,
            access_token_validity,
            refresh_token_validity,
            support_refresh_token,
            reuse_refresh_token,
            token_endpoint_path,
            authorization_endpoint_path,
            user_approval_page,
            error_page,
            approval_parameter,
            authenticated_user_header,
            cleanup_interval,
        })
    }

    /// Grant elements in configured order, flagging the disabled ones
    pub fn grant_configs(&self) -> Vec<GrantConfig> {
        let disabled = self.oauth_disabled_grant_types.as_ref();
        self.oauth_grant_types
            .as_ref()
            .iter()
            .filter_map(|grant_type| {
                let mut grant = GrantConfig::for_grant_type(grant_type)?;
                if disabled.contains(grant_type) {
                    set_disabled(&mut grant);
                }
                Some(grant)
            })
            .collect()
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_token_validity: *self.access_token_validity.as_ref(),
            refresh_token_validity: *self.refresh_token_validity.as_ref(),
            support_refresh_token: *self.support_refresh_token.as_ref(),
            reuse_refresh_token: *self.reuse_refresh_token.as_ref(),
        }
    }
}

fn set_disabled(grant: &mut GrantConfig) {
    match grant {
        GrantConfig::AuthorizationCode { disabled }
        | GrantConfig::RefreshToken { disabled }
        | GrantConfig::Implicit { disabled }
        | GrantConfig::ClientCredentials { disabled }
        | GrantConfig::Password { disabled, .. }
        | GrantConfig::Custom { disabled, .. } => *disabled = true,
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for OAuthGrantTypes {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut grant_types = Vec::new();
        for name in value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
        {
            let grant_type = GrantType::from(name);
            // Extension grants need code, not an environment variable.
            if !grant_type.is_builtin() {
                return Err(ConfigError::UnsupportedGrantType(name.to_string()));
            }
            if !grant_types.contains(&grant_type) {
                grant_types.push(grant_type);
            }
        }
        Ok(Self(grant_types))
    }
}

impl AsRef<Vec<GrantType>> for OAuthGrantTypes {
    fn as_ref(&self) -> &Vec<GrantType> {
        &self.0
    }
}

impl TryFrom<String> for Lifetime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(chrono::Duration::from_std(duration)?))
    }
}

impl AsRef<chrono::Duration> for Lifetime {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for FeatureFlag {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" => Ok(Self(false)),
            _ => Err(ConfigError::BoolParsingFailed(value).into()),
        }
    }
}

impl AsRef<bool> for FeatureFlag {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}

impl TryFrom<String> for EndpointPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.starts_with('/') {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidEndpointPath(value))
        }
    }
}

impl AsRef<String> for EndpointPath {
    fn as_ref(&self) -> &String {
        &self.0
    }
}

impl TryFrom<String> for CleanupInterval {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        duration_str::parse(&value)
            .map(Self)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
    }
}

impl AsRef<Duration> for CleanupInterval {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_types_parsing() {
        let parsed: OAuthGrantTypes = "authorization_code, refresh_token password"
            .to_string()
            .try_into()
            .unwrap();
        assert_eq!(
            parsed.as_ref(),
            &vec![
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::Password
            ]
        );

        let empty: OAuthGrantTypes = String::new().try_into().unwrap();
        assert!(empty.as_ref().is_empty());

        let custom: Result<OAuthGrantTypes, _> = "urn:example:otp".to_string().try_into();
        assert!(matches!(custom, Err(ConfigError::UnsupportedGrantType(_))));
    }

    #[test]
    fn test_lifetime_parsing() {
        let lifetime: Lifetime = "5m".to_string().try_into().unwrap();
        assert_eq!(lifetime.as_ref(), &chrono::Duration::minutes(5));

        let lifetime: Lifetime = "30d".to_string().try_into().unwrap();
        assert_eq!(lifetime.as_ref(), &chrono::Duration::days(30));

        let invalid: Result<Lifetime, _> = "soon".to_string().try_into();
        assert!(invalid.is_err());
    }

    #[test]
    fn test_feature_flag_parsing() {
        let flag: FeatureFlag = "yes".to_string().try_into().unwrap();
        assert!(*flag.as_ref());
        let flag: FeatureFlag = "OFF".to_string().try_into().unwrap();
        assert!(!*flag.as_ref());
        let invalid: Result<FeatureFlag, _> = "maybe".to_string().try_into();
        assert!(invalid.is_err());
    }

    #[test]
    fn test_endpoint_path_validation() {
        let path: EndpointPath = "/oauth/token".to_string().try_into().unwrap();
        assert_eq!(path.as_ref(), "/oauth/token");
        let invalid: Result<EndpointPath, _> = "oauth/token".to_string().try_into();
        assert!(matches!(invalid, Err(ConfigError::InvalidEndpointPath(_))));
    }

    #[test]
    fn test_cleanup_interval_parsing() {
        let interval: CleanupInterval = "1m".to_string().try_into().unwrap();
        assert_eq!(interval.as_ref(), &Duration::from_secs(60));
    }
}
