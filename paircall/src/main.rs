mod server;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use paircall_core::{
    logging,
    service::JoinCredentialService,
    store::{DocumentStore, MemoryStore},
    Config,
};

use server::PairCallServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (optional file path via PAIRCALL_CONFIG)
    let config_path = std::env::var("PAIRCALL_CONFIG").ok().map(PathBuf::from);
    let config = Config::load(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    // 1.5. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        // Transport credential warnings are non-fatal (the token endpoint
        // reports them per-request)
        let fatal: Vec<_> = errors
            .iter()
            .filter(|e| !e.contains("transport credentials"))
            .collect();
        if !fatal.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration validation failed with {} error(s)",
                fatal.len()
            ));
        }
        eprintln!("Continuing with transport credential warnings");
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("PairCall server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Initialize the document store
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

    // 4. Join credential service (absent until API keys are configured)
    let credential_service = match JoinCredentialService::new(&config.transport) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            warn!("Join tokens unavailable: {e}");
            warn!("Set transport.api_key and transport.api_secret to enable the token endpoint");
            None
        }
    };

    // 5. Start the HTTP server
    let server = PairCallServer::new(config, store, credential_service);
    server.start().await?;

    Ok(())
}
