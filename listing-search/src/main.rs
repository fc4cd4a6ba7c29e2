//! Listing Search Worker Entry Point
//!
//! Wires the discovery service from the environment, optionally rebuilds the
//! search corpus from the catalog and keeps the trending cache fresh.

use dotenv::dotenv;
use listing_search::{AppError, Dependencies};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_search=info,listing_search_repository=info"));

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "listing-search",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "listing-search",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing();

    info!("Starting listing search worker");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!(
                backend = deps.service.backend_name(),
                "Dependencies initialized successfully"
            );
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match deps.worker.run().await {
        Ok(report) => {
            info!(
                refreshes = report.refreshes,
                failed_refreshes = report.failed_refreshes,
                "Listing search worker stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Listing search worker failed");
            Err(e)
        }
    }
}
