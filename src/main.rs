use anyhow::Result;
use clap::Parser;
use crmbridge::api::{AppState, HttpApiServer};
use crmbridge::auth::{InMemoryTokenStore, OAuthClient, TokenStore};
use crmbridge::config::Config;
use crmbridge::crm::{CrmService, EntityGateway};
use crmbridge::mcp::{McpServer, ToolContext, ToolRegistry};
use crmbridge::upstream::UpstreamClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = crmbridge::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(short, long)]
    log_level: Option<String>,

    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(Some(&cli.config), cli.host, cli.port).map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_logging(
        cli.log_level.as_deref().unwrap_or(&config.logging.level),
        &config.logging.format,
    );

    info!(
        "crmbridge {} starting for subdomain {}",
        crmbridge::VERSION,
        config.crm.subdomain
    );

    let config = Arc::new(config);
    let tokens: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());

    let upstream = Arc::new(
        UpstreamClient::new(config.clone(), tokens.clone()).map_err(|e| {
            error!("Failed to build upstream client: {}", e);
            e
        })?,
    );
    let gateway = Arc::new(EntityGateway::new(upstream.clone(), config.defaults.clone()));
    let service = Arc::new(CrmService::new(upstream, gateway));
    let oauth = Arc::new(OAuthClient::new(config.clone(), tokens.clone())?);

    let registry = Arc::new(ToolRegistry::new());
    info!("Tool registry loaded: {} tools", registry.len());
    let mcp = Arc::new(McpServer::new(
        registry,
        ToolContext {
            service: service.clone(),
        },
    ));

    let state = AppState {
        config,
        service,
        tokens,
        oauth,
        mcp,
    };

    HttpApiServer::new(state).start().await?;
    Ok(())
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(env_filter)
            .init();
    }
}
