//! Router-level tests driving the axum handlers with in-process requests.

use authgate::config::Config;
use authgate::http::{AppEngine, AppState, build_router};
use authgate::oauth::{
    AuthorizationServer, AuthorizationServerConfig, ClientAuthMethod, GrantType,
    MemoryOAuthStorage, OAuthClient, OAuthClientStore, TokenServices, TokenSettings,
};
use authgate::templates::build_env;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use base64::prelude::*;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const REDIRECT: &str = "https://app.example.com/callback";
const USER_HEADER: &str = "x-authenticated-user";

fn test_config() -> Config {
    Config {
        version: "test".to_string(),
        http_port: "8080".to_string().try_into().unwrap(),
        http_templates_path: None,
        external_base: "https://auth.example.com".to_string(),
        clients_file: "clients.json".to_string(),
        users_file: None,
        oauth_grant_types: "authorization_code refresh_token client_credentials"
            .to_string()
            .try_into()
            .unwrap(),
        oauth_disabled_grant_types: String::new().try_into().unwrap(),
        authorization_code_lifetime: "5m".to_string().try_into().unwrap(),
        access_token_validity: "12h".to_string().try_into().unwrap(),
        refresh_token_validity: "30d".to_string().try_into().unwrap(),
        support_refresh_token: "true".to_string().try_into().unwrap(),
        reuse_refresh_token: "false".to_string().try_into().unwrap(),
        token_endpoint_path: "/oauth/token".to_string().try_into().unwrap(),
        authorization_endpoint_path: "/oauth/authorize".to_string().try_into().unwrap(),
        user_approval_page: "approval.html".to_string(),
        error_page: "error.html".to_string(),
        approval_parameter: "user_oauth_approval".to_string(),
        authenticated_user_header: USER_HEADER.to_string(),
        cleanup_interval: "1m".to_string().try_into().unwrap(),
    }
}

async fn app_with(config: Config) -> Router {
    let storage = Arc::new(MemoryOAuthStorage::new());
    storage
        .store_client(&OAuthClient {
            client_id: "c1".to_string(),
            client_secret: Some("s1".to_string()),
            client_name: Some("Example App".to_string()),
            redirect_uris: vec![REDIRECT.to_string()],
            grant_types: vec![
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::ClientCredentials,
            ],
            scope: Some("read write".to_string()),
            token_endpoint_auth_method: ClientAuthMethod::ClientSecretBasic,
            access_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let token_services = Arc::new(TokenServices::new(storage.clone(), TokenSettings::default()));
    let mut server_config = AuthorizationServerConfig::new()
        .with_client_registry(storage)
        .with_token_services(token_services)
        .with_token_endpoint_url(config.token_endpoint_path.as_ref().clone())
        .with_authorization_endpoint_url(config.authorization_endpoint_path.as_ref().clone());
    for grant in config.grant_configs() {
        server_config = server_config.with_grant(grant);
    }
    let server = AuthorizationServer::build(server_config).unwrap();

    build_router(AppState {
        config: Arc::new(config),
        server: Arc::new(server),
        template_env: AppEngine::from(build_env(None, "test").unwrap()),
    })
}

async fn app() -> Router {
    app_with(test_config()).await
}

fn basic(client_id: &str, secret: &str) -> String {
    format!(
        "Basic {}",
        BASE64_STANDARD.encode(format!("{client_id}:{secret}"))
    )
}

fn token_request(authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_client_credentials_token_response() {
    let response = app()
        .await
        .oneshot(token_request(
            Some(&basic("c1", "s1")),
            "grant_type=client_credentials&scope=read",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "read");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body.get("refresh_token").is_none_or(Value::is_null));
}

#[tokio::test]
async fn test_bad_client_secret_challenges() {
    let response = app()
        .await
        .oneshot(token_request(
            Some(&basic("c1", "wrong")),
            "grant_type=client_credentials",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_disabled_grant_unsupported() {
    let response = app()
        .await
        .oneshot(token_request(
            Some(&basic("c1", "s1")),
            "grant_type=password&username=alice&password=wonderland",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unsupported_grant_type");
}

fn authorize_query(extra: &str) -> String {
    format!(
        "response_type=code&client_id=c1&redirect_uri={}&state=abc{}",
        urlencode(REDIRECT),
        extra
    )
}

#[tokio::test]
async fn test_approval_parameter_ignored_on_get() {
    let request = Request::builder()
        .uri(format!(
            "/oauth/authorize?{}",
            authorize_query("&user_oauth_approval=true")
        ))
        .header(USER_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key(header::LOCATION));
    let html = body_text(response).await;
    assert!(html.contains("name=\"user_oauth_approval\""));
}

#[tokio::test]
async fn test_authorization_code_round_trip() {
    let app = app().await;

    let page = Request::builder()
        .uri(format!("/oauth/authorize?{}", authorize_query("")))
        .header(USER_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(page).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Example App"));

    let approve = Request::builder()
        .method("POST")
        .uri("/oauth/authorize")
        .header(USER_HEADER, "alice")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(authorize_query("&user_oauth_approval=true")))
        .unwrap();
    let response = app.clone().oneshot(approve).await.unwrap();
    assert!(response.status().is_redirection());

    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with(REDIRECT));
    let code = url::Url::parse(&location)
        .unwrap()
        .query_pairs()
        .find(|(name, _)| name == "code")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let body = format!(
        "grant_type=authorization_code&code={}&redirect_uri={}",
        urlencode(&code),
        urlencode(REDIRECT)
    );
    let response = app
        .clone()
        .oneshot(token_request(Some(&basic("c1", "s1")), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await;
    assert!(token["refresh_token"].as_str().is_some());

    let replay = app
        .oneshot(token_request(Some(&basic("c1", "s1")), &body))
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(replay).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_untrusted_redirect_renders_error_page() {
    let request = Request::builder()
        .uri(format!(
            "/oauth/authorize?response_type=code&client_id=c1&redirect_uri={}",
            urlencode("https://evil.example.com/cb")
        ))
        .header(USER_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.headers().contains_key(header::LOCATION));
    assert!(body_text(response).await.contains("invalid_request"));
}

#[tokio::test]
async fn test_approval_page_rendered() {
    let request = Request::builder()
        .uri("/oauth/authorize?response_type=code&client_id=c1&scope=read")
        .header(USER_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Example App"));
    assert!(html.contains("name=\"user_oauth_approval\""));
}

#[tokio::test]
async fn test_unauthenticated_authorize() {
    let request = Request::builder()
        .uri("/oauth/authorize?response_type=code&client_id=c1")
        .body(Body::empty())
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorization_endpoint_absent_without_redirect_grants() {
    let mut config = test_config();
    config.oauth_grant_types = "client_credentials".to_string().try_into().unwrap();
    let app = app_with(config).await;

    let request = Request::builder()
        .uri("/oauth/authorize?response_type=code&client_id=c1")
        .header(USER_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let metadata = Request::builder()
        .uri("/.well-known/oauth-authorization-server")
        .body(Body::empty())
        .unwrap();
    let body = body_json(app.oneshot(metadata).await.unwrap()).await;
    assert!(body.get("authorization_endpoint").is_none());
    assert_eq!(body["grant_types_supported"], serde_json::json!(["client_credentials"]));
}

#[tokio::test]
async fn test_server_metadata() {
    let request = Request::builder()
        .uri("/.well-known/oauth-authorization-server")
        .body(Body::empty())
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["issuer"], "https://auth.example.com");
    assert_eq!(body["token_endpoint"], "https://auth.example.com/oauth/token");
    assert_eq!(
        body["authorization_endpoint"],
        "https://auth.example.com/oauth/authorize"
    );
    assert_eq!(body["response_types_supported"], serde_json::json!(["code"]));
    assert_eq!(
        body["grant_types_supported"],
        serde_json::json!(["authorization_code", "refresh_token", "client_credentials"])
    );
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
