//! cropstage - an upload/stage/crop backend for browser image croppers.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cropstage::{
    config::Config,
    server::{create_router, AppState, RouterConfig},
    session::{InMemorySlotStore, SlotStore},
    stage::ValidationRules,
    CropCommitter, UploadStager,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  Web root: {}", config.web_root.display());
    info!(
        "  Temp storage: {} ({})",
        config.temp_dir.display(),
        config.temp_url
    );
    info!(
        "  Committed storage: {} ({})",
        config.dest_dir.display(),
        config.dest_url
    );
    info!("  Allowed extensions: {}", config.extensions.join(", "));
    info!("  Upload size cap: {} bytes", config.max_upload_bytes);
    info!("  Unique staged names: {}", config.unique_names);
    info!("  Overwrite previous: {}", config.overwrite_previous);

    // One slot store shared by the stager and the committer; both sides of
    // the lifecycle must see the same binding.
    let slots: Arc<dyn SlotStore> = Arc::new(InMemorySlotStore::new());

    let rules = ValidationRules::new(
        config.extensions.clone(),
        config.max_upload_bytes,
        config.check_content_type,
    );

    let stager = match UploadStager::new(
        &config.temp_dir,
        &config.temp_url,
        config.unique_names,
        rules,
        slots.clone(),
    ) {
        Ok(stager) => stager,
        Err(e) => {
            error!("Failed to initialize upload staging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let committer = match CropCommitter::new(
        &config.web_root,
        &config.dest_dir,
        &config.dest_url,
        slots,
    ) {
        Ok(committer) => committer
            .with_overwrite_previous(config.overwrite_previous)
            .with_persist_full_path(config.persist_full_path),
        Err(e) => {
            error!("Failed to initialize crop committing: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(stager, committer);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("Server listening on: http://{}", addr);
    info!("");
    info!("Try these endpoints:");
    info!("  curl http://{}/health", addr);
    info!(
        "  curl -F img=@photo.jpg -H 'X-Session-Id: s1' http://{}/upload",
        addr
    );
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "cropstage=debug,tower_http=debug"
    } else {
        "cropstage=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config =
        RouterConfig::new().with_max_upload_bytes(config.max_upload_bytes);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}
