use std::{env, sync::Arc};

use signet_auth::authorizer::ClaimAuthorizer;
use signet_auth::config::TrustMode;
use signet_auth::http::TokenState;
use signet_auth::registry::{
    CustodyKeyProvider, KeyProvider, StaticKeyProvider, TenantRegistry,
};
use signet_auth::token::IssuanceService;
use signet_server::ServerBuilder;
use signet_server::config::loader::load_config;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From SIGNET_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (signet.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (SIGNET_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    signet_server::observability::init_tracing();

    // Parse config path from CLI, environment, or use default
    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    signet_server::observability::apply_logging_level(&cfg.logging.level);

    // Build the tenant registry; any unresolvable or malformed signing key
    // is fatal here so a misconfigured process never serves requests.
    let provider: Box<dyn KeyProvider> = match cfg.issuance.mode {
        TrustMode::Trusted => Box::new(StaticKeyProvider::from_entries(&cfg.issuance.tenants)),
        TrustMode::Custody => Box::new(CustodyKeyProvider),
    };
    let registry = match TenantRegistry::from_config(&cfg.issuance, provider.as_ref()).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Tenant registry initialization failed: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(
        tenants = registry.len(),
        mode = ?cfg.issuance.mode,
        "Tenant registry initialized"
    );

    let service = Arc::new(IssuanceService::new(
        Arc::new(registry),
        ClaimAuthorizer::new(cfg.issuance.mode),
    ));

    let server = ServerBuilder::new(TokenState::new(service))
        .with_config(cfg)
        .build();

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: SIGNET_CONFIG
/// 3. Default: signet.toml
fn resolve_config_path() -> (String, ConfigSource) {
    // 1. Check CLI: --config <path>
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    // 2. Check environment variable
    if let Ok(path) = env::var("SIGNET_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    // 3. Default to signet.toml
    ("signet.toml".to_string(), ConfigSource::Default)
}
