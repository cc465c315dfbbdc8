//! lexgate - secure content delivery gateway.
//!
//! This binary starts the HTTP server and configures all components.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lexgate::{
    config::{Cli, Command, MintConfig, MintOutputFormat, ServeConfig},
    create_s3_client, BucketNames, GatewayServices, Grant, HttpDirectory, RouterConfig,
    S3BlobStore, TokenCodec,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Mint(config) => run_mint(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    // Fail closed on incomplete configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let buckets = BucketNames::new(
        config.document_bucket.clone().unwrap_or_default(),
        config.video_bucket.clone().unwrap_or_default(),
    );
    let directory_url = config.directory_url.clone().unwrap_or_default();

    info!("lexgate v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Document bucket: {}", buckets.document);
    info!("  Video bucket: {}", buckets.video);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!("  Directory: {}", directory_url);
    info!(
        "  Token TTL: {}s document, {}s video",
        config.document_token_ttl, config.video_token_ttl
    );
    info!(
        "  Rate limits: issue {}/{}s, serve {}/{}s",
        config.issue_rate_limit,
        config.issue_rate_window,
        config.serve_rate_limit,
        config.serve_rate_window
    );

    if config.insecure_cookies {
        warn!("  Cookies: Secure attribute DISABLED - use only over plain-HTTP development setups");
    }
    if config.admin_token.is_none() {
        info!("  Hooks: disabled (no admin token)");
    }

    // Shared store: Redis when configured, otherwise a bounded local map
    let store = match lexgate::connect_store(
        config.store_url.as_deref(),
        config.local_store_capacity,
        config.store_pool_size,
        config.store_timeout(),
    )
    .await
    {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to shared store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if store.mode() == "local" {
        warn!("  Store: local - rate limits and caches are per instance");
    } else {
        info!("  Store: {}", store.mode());
    }

    let directory = match HttpDirectory::new(
        &directory_url,
        config.directory_api_key.clone(),
        config.directory_timeout(),
    ) {
        Ok(directory) => directory,
        Err(e) => {
            error!("Failed to configure directory client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;

    let services = GatewayServices {
        codec: TokenCodec::new(config.signing_secret_or_empty()),
        blobs: Arc::new(S3BlobStore::new(s3_client, buckets)),
        directory: Arc::new(directory),
        store,
    };

    let router = lexgate::create_router(services, build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);

    if let Err(e) = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "lexgate=debug,tower_http=debug"
    } else {
        "lexgate=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_token_ttl(config.token_ttl())
        .with_cache_ttls(
            Duration::from_secs(config.metadata_cache_ttl),
            Duration::from_secs(config.entitlement_cache_ttl),
        )
        .with_private_max_age(config.private_max_age)
        .with_secure_cookies(!config.insecure_cookies)
        .with_rate_limits(config.issue_policy(), config.serve_policy())
        .with_trust_forwarded_for(config.trust_forwarded_for)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    if let Some(ref token) = config.admin_token {
        router_config = router_config.with_admin_token(token.clone());
    }

    router_config
}

// =============================================================================
// Mint Command
// =============================================================================

fn run_mint(config: MintConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let codec = TokenCodec::new(&config.secret);
    let grant = Grant::new(&config.subject, &config.key, config.bucket_class);
    let minted = codec.mint(&grant, config.ttl());

    match config.format {
        MintOutputFormat::Token => {
            println!("{}", minted.token);
        }
        MintOutputFormat::Json => {
            let json = serde_json::json!({
                "token": minted.token,
                "subject": minted.claims.subject,
                "key": minted.claims.resource_key,
                "bucket_class": minted.claims.bucket_class,
                "issued_at": minted.claims.issued_at,
                "expires_at": minted.claims.expires_at,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
