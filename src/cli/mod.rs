//! Command-line interface for docdump
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Applying argument overrides to the configuration
//! - Building the options each pipeline runs with

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::connection::ConnectionSettings;
use crate::error::Result;
use crate::export::ExportOptions;
use crate::restore::RestoreOptions;
use crate::store::RetryPolicy;

/// Export and restore document-store collections as JSON Lines
#[derive(Parser, Debug)]
#[command(
    name = "docdump",
    version,
    about = "Export and restore document-store collections as JSON Lines",
    long_about = "Streams every document of a collection into <collection>.json (one JSON
document per line), or upserts such a file back into a collection in small batches.
Works with Cosmos DB's API for MongoDB and with MongoDB deployments."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress", global = true)]
    pub no_progress: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Operation to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments identifying the store and collection
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// URI for the endpoint (not a connection string)
    #[arg(short = 'e', long = "endpoint-uri", env = "DOCDUMP_ENDPOINT_URI")]
    pub endpoint_uri: String,

    /// API key
    #[arg(
        short = 'k',
        long = "api-key",
        env = "DOCDUMP_API_KEY",
        hide_env_values = true
    )]
    pub api_key: String,

    /// User name the key belongs to (defaults to the account name)
    #[arg(short = 'u', long, value_name = "USERNAME")]
    pub username: Option<String>,

    /// Database name
    #[arg(short = 'd', long)]
    pub database: String,

    /// Collection name
    #[arg(short = 'c', long)]
    pub collection: String,
}

/// Subcommands for docdump
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write every document of a collection to <output>/<collection>.json
    Export {
        #[command(flatten)]
        store: StoreArgs,

        /// Output directory (default = current directory)
        #[arg(short = 'o', long = "output", value_name = "DIR")]
        output: Option<PathBuf>,

        /// Maximum documents buffered per page
        #[arg(long, value_name = "N")]
        page_size: Option<u32>,
    },

    /// Upsert a JSON Lines file into an existing collection
    Restore {
        #[command(flatten)]
        store: StoreArgs,

        /// Input file containing JSON documents, one per line
        /// (default = <collection>.json)
        #[arg(short = 'i', long = "input-file", value_name = "FILE")]
        input_file: Option<PathBuf>,

        /// Documents per bulk-upsert call
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build the interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, &args);
        config.validate()?;

        Ok(Self { args, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Store arguments of the selected subcommand
    pub fn store_args(&self) -> &StoreArgs {
        match &self.args.command {
            Commands::Export { store, .. } | Commands::Restore { store, .. } => store,
        }
    }

    /// Connection settings for the selected subcommand
    pub fn connection_settings(&self) -> ConnectionSettings {
        let store = self.store_args();
        ConnectionSettings {
            endpoint_uri: store.endpoint_uri.clone(),
            api_key: store.api_key.clone(),
            username: store.username.clone(),
            database: store.database.clone(),
        }
    }

    /// Export options; the output directory defaults to the working directory
    pub fn export_options(&self) -> Result<ExportOptions> {
        let output_dir = match &self.args.command {
            Commands::Export {
                output: Some(dir), ..
            } => dir.clone(),
            _ => std::env::current_dir()?,
        };

        Ok(ExportOptions {
            output_dir,
            page_size: self.config.transfer.page_size,
            progress_bar: self.config.transfer.progress_bar,
        })
    }

    /// Restore options built from configuration
    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions {
            batch_size: self.config.transfer.batch_size,
            init_retry: self.config.initialization_retry(),
            transfer_retry: RetryPolicy::none(),
            progress_bar: self.config.transfer.progress_bar,
        }
    }

    /// Restore input path, resolved against the working directory
    ///
    /// Defaults to `<collection>.json`, the file an export produces.
    pub fn restore_input(&self) -> Result<PathBuf> {
        let relative = match &self.args.command {
            Commands::Restore {
                input_file: Some(path),
                ..
            } => path.clone(),
            _ => PathBuf::from(format!("{}.json", self.store_args().collection)),
        };
        Ok(std::env::current_dir()?.join(relative))
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        Self::apply_transfer_args(config, args);

        if let Some(timeout) = args.timeout {
            config.connection.timeout = timeout;
        }
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply transfer-related CLI arguments to configuration
    fn apply_transfer_args(config: &mut Config, args: &CliArgs) {
        if args.no_progress {
            config.transfer.progress_bar = false;
        }

        match &args.command {
            Commands::Export {
                page_size: Some(n), ..
            } => config.transfer.page_size = *n,
            Commands::Restore {
                batch_size: Some(n),
                ..
            } => config.transfer.batch_size = *n,
            _ => {}
        }
    }
}
