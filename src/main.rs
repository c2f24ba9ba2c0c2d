use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use larold_sync::config::Config;
use larold_sync::http::ReqwestClient;
use larold_sync::logging::init_logging;
use larold_sync::source::AirtableFetcher;
use larold_sync::sprite::palette::PaletteProvider;
use larold_sync::sprite::transform::PixelArtTransform;
use larold_sync::state::blob::LocalBlobStore;
use larold_sync::state::library::SqliteRecordStore;
use larold_sync::trigger::handle_sync_request;
use larold_sync::{Collaborators, SyncOrchestrator};

/// Request timeout for catalog and image downloads
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the production collaborators from configuration
fn build_orchestrator(config: &Config) -> larold_sync::Result<SyncOrchestrator> {
    let http = ReqwestClient::with_timeout(HTTP_TIMEOUT)?;
    let source = AirtableFetcher::new(http.inner().clone(), config.airtable.clone());
    let records = SqliteRecordStore::open(&config.database_path)?;

    let collaborators = Collaborators {
        source: Arc::new(source),
        records: Arc::new(records),
        blobs: Arc::new(LocalBlobStore::new(&config.blob_root)),
        http: Arc::new(http),
        transform: Arc::new(PixelArtTransform),
        palette: Arc::new(PaletteProvider::new(&config.palette_path)),
    };

    Ok(SyncOrchestrator::new(collaborators, &config.scratch_root))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = match build_orchestrator(&config) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "Failed to initialize collaborators");
            return ExitCode::FAILURE;
        }
    };

    let response = handle_sync_request(&orchestrator).await;
    if !response.is_success() {
        return ExitCode::FAILURE;
    }

    if let Err(err) = tokio::fs::write(&config.output_path, &response.body).await {
        error!(path = %config.output_path.display(), error = %err, "Failed to write archive");
        return ExitCode::FAILURE;
    }

    info!(
        path = %config.output_path.display(),
        bytes = response.body.len(),
        "Wrote archive"
    );
    ExitCode::SUCCESS
}
