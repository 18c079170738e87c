use tracing::{error, info};

use nimbus::{Config, StorageQuota, UploadEngine};

fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = nimbus::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        nimbus::logging::init_console_only(&config.logging.level);
    }

    info!("Nimbus - personal cloud file store");

    let engine = match UploadEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to start upload engine: {}", e);
            std::process::exit(1);
        }
    };

    // Request handlers share the engine as an `Arc<UploadEngine>`: each
    // handler calls `init_upload` once per file, then `submit_fragment` per
    // received chunk, and watches `subscribe()` for completion and failures.
    info!(
        "Storage at {} (max {} concurrent writers, max upload {} MB)",
        engine.storage().base_path().display(),
        engine.admission().max_concurrent_writers(),
        config.storage.max_upload_size_mb
    );

    let quota = StorageQuota::new(
        engine.storage().clone(),
        config.storage.dedicated_space_bytes(),
    );
    match engine.quota_report(&quota) {
        Ok(report) => info!(
            "Quota: {} bytes used, {} bytes available of {}",
            report.used,
            report.available(),
            report.dedicated
        ),
        Err(e) => error!("Failed to read storage usage: {}", e),
    }
}
