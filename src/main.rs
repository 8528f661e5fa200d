//! docdump
//!
//! Exports a document-store collection to a JSON Lines file and restores
//! such a file back into a collection.
//!
//! # Usage
//!
//! ```bash
//! # Export shop/orders to ./orders.json
//! docdump export -e https://shop.documents.azure.com:443/ -k $KEY -d shop -c orders
//!
//! # Upsert ./orders.json back into shop/orders
//! docdump restore -e https://shop.documents.azure.com:443/ -k $KEY -d shop -c orders
//! ```

use tracing_subscriber::EnvFilter;

use docdump::cli::{CliInterface, Commands};
use docdump::connection;
use docdump::error::Result;
use docdump::export::{ExportPager, ExportSummary};
use docdump::restore::{RestoreDriver, RestoreSummary};
use docdump::store::MongoStore;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Build the client and run the selected operation
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    let settings = cli.connection_settings();
    let client = connection::connect(&settings, &cli.config().connection).await?;
    let store = MongoStore::new(client, settings.database.clone());
    let collection = cli.store_args().collection.clone();

    match &cli.args().command {
        Commands::Export { .. } => {
            let pager = ExportPager::new(&store, cli.export_options()?);
            let summary = pager.export(&collection).await?;
            print_export_summary(&summary);
        }
        Commands::Restore { .. } => {
            let input = cli.restore_input()?;
            let driver = RestoreDriver::new(&store, cli.restore_options());
            let summary = driver.restore(&collection, &input).await?;
            print_restore_summary(&summary);
        }
    }

    Ok(())
}

fn print_export_summary(summary: &ExportSummary) {
    println!(
        "Exported {} documents from {} to {} ({} bytes, {} ms)",
        summary.exported,
        summary.collection,
        summary.path.display(),
        summary.file_size_bytes,
        summary.elapsed_ms
    );
}

fn print_restore_summary(summary: &RestoreSummary) {
    println!(
        "Restored {} documents into {} in {} batches: {} inserted, {} modified, {} failed ({} ms)",
        summary.submitted,
        summary.collection,
        summary.batches,
        summary.outcome.upserted,
        summary.outcome.modified,
        summary.outcome.failed,
        summary.elapsed_ms
    );
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Arguments
/// * `cli` - CLI interface with the resolved logging configuration
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
