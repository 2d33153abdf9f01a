//! authgate server binary.
//!
//! Loads the client registry, assembles the authorization server from the
//! environment and serves it with graceful shutdown.

use anyhow::Result;
use authgate::{
    config::Config,
    http::{AppEngine, AppState, build_router},
    oauth::{
        AuthorizationServer, AuthorizationServerConfig, ClientRegistrationService,
        StaticUserAuthenticator, TokenServices,
        clients::load_clients_file,
    },
    storage::{StorageBackend, create_storage_backend},
    templates::{build_env, ensure_templates},
};
use std::{env, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "authgate=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = authgate::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting authgate");

    let config = Config::new()?;

    let template_env = build_env(config.http_templates_path.as_deref(), &version)?;

    let storage = create_storage_backend(StorageBackend::Memory)?;

    let clients = load_clients_file(Path::new(&config.clients_file))?;
    ClientRegistrationService::new(storage.clone())
        .load_clients(clients)
        .await?;

    let token_services = Arc::new(TokenServices::new(
        storage.clone(),
        config.token_settings(),
    ));

    let mut server_config = AuthorizationServerConfig::new()
        .with_client_registry(storage.clone())
        .with_token_services(token_services)
        .with_code_lifetime(*config.authorization_code_lifetime.as_ref())
        .with_approval_parameter(config.approval_parameter.clone())
        .with_user_approval_page(config.user_approval_page.clone())
        .with_error_page(config.error_page.clone())
        .with_token_endpoint_url(config.token_endpoint_path.as_ref().clone())
        .with_authorization_endpoint_url(config.authorization_endpoint_path.as_ref().clone());

    if let Some(users_file) = &config.users_file {
        let authenticator = StaticUserAuthenticator::from_file(Path::new(users_file))?;
        tracing::info!(count = authenticator.len(), "users loaded");
        server_config = server_config.with_user_authenticator(Arc::new(authenticator));
    }

    for grant in config.grant_configs() {
        server_config = server_config.with_grant(grant);
    }

    let server = Arc::new(AuthorizationServer::build(server_config)?);

    let mut pages = vec![server.error_page.as_str()];
    if server.authorization_endpoint.is_some() {
        pages.push(server.user_approval_page.as_str());
    }
    ensure_templates(&template_env, &pages)?;
    let template_env = AppEngine::from(template_env);

    let app_context = AppState {
        config: Arc::new(config.clone()),
        server: server.clone(),
        template_env,
    };

    // Build the router
    let app = build_router(app_context);

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(err) => {
                    tracing::error!("failed to install signal handler: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Sweep expired codes and tokens
    {
        let interval = *config.cleanup_interval.as_ref();
        let inner_token = token.clone();
        let server = server.clone();
        tracker.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = inner_token.cancelled() => break,
                    _ = ticker.tick() => {
                        match server.cleanup().await {
                            Ok(0) => {}
                            Ok(removed) => tracing::debug!(removed, "expired codes and tokens removed"),
                            Err(err) => tracing::error!(error = %err, "cleanup failed"),
                        }
                    }
                }
            }
        });
    }

    // Start HTTP server
    {
        let http_port = *config.http_port.as_ref();
        let inner_token = token.clone();
        let bind_address = format!("0.0.0.0:{http_port}");
        let listener = TcpListener::bind(&bind_address).await?;
        tracing::info!("Starting server on {bind_address}");

        tracker.spawn(async move {
            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    tokio::select! {
                        () = shutdown_token.cancelled() => { }
                    }
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!("axum task failed: {}", err);
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}
