//! authgate client registration CLI
//!
//! Manages the JSON client registration file read by the `authgate` server at
//! startup (`CLIENTS_FILE`).
//!
//! ```bash
//! authgate-clients --file clients.json register \
//!   --name "My App" \
//!   --redirect-uri "https://app.example.com/callback" \
//!   --grant-type authorization_code \
//!   --grant-type refresh_token \
//!   --scope "read write"
//!
//! authgate-clients --file clients.json list --format table
//! authgate-clients --file clients.json remove --client-id <id>
//! ```

use anyhow::Result;
use authgate::oauth::{
    ClientRegistrationService, MemoryOAuthStorage, OAuthClientStore,
    clients::{ClientRegistrationRequest, load_clients_file, save_clients_file},
    types::{ClientAuthMethod, GrantType, OAuthClient},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Client authentication methods accepted at the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
enum AuthMethod {
    /// HTTP Basic Authentication with client credentials
    ClientSecretBasic,
    /// Client credentials in POST body
    ClientSecretPost,
    /// No client authentication (public clients)
    None,
}

impl From<AuthMethod> for ClientAuthMethod {
    fn from(value: AuthMethod) -> Self {
        match value {
            AuthMethod::ClientSecretBasic => ClientAuthMethod::ClientSecretBasic,
            AuthMethod::ClientSecretPost => ClientAuthMethod::ClientSecretPost,
            AuthMethod::None => ClientAuthMethod::None,
        }
    }
}

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "authgate-clients",
    about = "Manage the authgate client registration file",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Client registration file
    #[arg(long, env = "CLIENTS_FILE", default_value = "clients.json")]
    file: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "json-pretty")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// JSON formatted output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
    /// Human-readable table format
    Table,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Register a new client with generated credentials
    Register(RegisterArgs),
    /// List registered clients
    List,
    /// Remove a client
    Remove(RemoveArgs),
}

/// Arguments for client registration
#[derive(Args)]
struct RegisterArgs {
    /// Human-readable name for the client
    #[arg(long)]
    name: Option<String>,

    /// Redirect URI (can be specified multiple times)
    #[arg(long = "redirect-uri")]
    redirect_uris: Vec<String>,

    /// Grant type, including extension grant names (can be specified multiple times)
    #[arg(long = "grant-type")]
    grant_types: Vec<String>,

    /// Space-separated scopes the client may request
    #[arg(long)]
    scope: Option<String>,

    /// Client authentication method
    #[arg(long = "auth-method", value_enum)]
    auth_method: Option<AuthMethod>,

    /// Access token lifetime override in seconds
    #[arg(long)]
    access_token_validity: Option<i64>,

    /// Refresh token lifetime override in seconds
    #[arg(long)]
    refresh_token_validity: Option<i64>,
}

/// Arguments for client removal
#[derive(Args)]
struct RemoveArgs {
    /// Client ID
    #[arg(long)]
    client_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Register(args) => {
            let client = register(&cli.file, args).await?;
            print_clients(&[client], &cli.format)?;
        }
        Commands::List => {
            let clients = read_clients(&cli.file)?;
            print_clients(&clients, &cli.format)?;
        }
        Commands::Remove(args) => {
            let mut clients = read_clients(&cli.file)?;
            let before = clients.len();
            clients.retain(|client| client.client_id != args.client_id);
            if clients.len() == before {
                anyhow::bail!("client {} is not registered", args.client_id);
            }
            save_clients_file(&cli.file, &clients)?;
            eprintln!("Removed client {}", args.client_id);
        }
    }

    Ok(())
}

fn read_clients(path: &Path) -> Result<Vec<OAuthClient>> {
    if path.exists() {
        Ok(load_clients_file(path)?)
    } else {
        Ok(Vec::new())
    }
}

async fn register(path: &Path, args: RegisterArgs) -> Result<OAuthClient> {
    let storage = Arc::new(MemoryOAuthStorage::new());
    let service = ClientRegistrationService::new(storage.clone());
    service.load_clients(read_clients(path)?).await?;

    let client = service
        .register_client(ClientRegistrationRequest {
            client_name: args.name,
            redirect_uris: args.redirect_uris,
            grant_types: args.grant_types.into_iter().map(GrantType::from).collect(),
            scope: args.scope,
            token_endpoint_auth_method: args.auth_method.map(ClientAuthMethod::from),
            access_token_validity_seconds: args.access_token_validity,
            refresh_token_validity_seconds: args.refresh_token_validity,
        })
        .await?;

    let clients = storage.list_clients(None).await?;
    save_clients_file(path, &clients)?;
    Ok(client)
}

fn print_clients(clients: &[OAuthClient], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(clients)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(clients)?),
        OutputFormat::Table => {
            println!("{:<38} {:<24} {:<40} SCOPE", "CLIENT ID", "NAME", "GRANT TYPES");
            for client in clients {
                let grant_types = client
                    .grant_types
                    .iter()
                    .map(|grant_type| grant_type.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                println!(
                    "{:<38} {:<24} {:<40} {}",
                    client.client_id,
                    client.client_name.as_deref().unwrap_or("-"),
                    grant_types,
                    client.scope.as_deref().unwrap_or("-"),
                );
            }
        }
    }
    Ok(())
}
