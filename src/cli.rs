use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use df_core::config::Config;

#[derive(Parser)]
#[command(name = "docforge")]
#[command(author, version, about = "Document conversion service backed by headless LibreOffice")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP conversion server
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Convert a single local file
    Convert {
        /// Document to convert (left untouched)
        #[arg(required = true)]
        input: PathBuf,

        /// Directory for the converted file (defaults to the current directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Check that the conversion engine is available
    CheckEngine,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Settings that can be supplied through the environment or flags and take
/// precedence over the config file.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Directory for stored uploads
    #[arg(long, env = "UPLOADS_DIR", global = true)]
    pub uploads_dir: Option<PathBuf>,

    /// Maximum upload size in bytes
    #[arg(long, env = "MAX_FILE_SIZE", global = true)]
    pub max_file_size: Option<u64>,

    /// Per-conversion deadline in milliseconds
    #[arg(long, env = "CONVERSION_TIMEOUT_MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Maximum number of simultaneous conversions
    #[arg(long, env = "CONVERSION_CONCURRENCY", global = true)]
    pub concurrency: Option<usize>,

    /// Path to the soffice executable
    #[arg(long, env = "SOFFICE_PATH", global = true)]
    pub soffice_path: Option<PathBuf>,
}

impl Overrides {
    /// Apply every override that was supplied.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref dir) = self.uploads_dir {
            config.uploads.dir = dir.clone();
        }
        if let Some(size) = self.max_file_size {
            config.uploads.max_file_size = size;
        }
        if let Some(ms) = self.timeout_ms {
            config.conversion.timeout_ms = ms;
        }
        if let Some(n) = self.concurrency {
            config.conversion.concurrency = n;
        }
        if let Some(ref path) = self.soffice_path {
            config.conversion.engine_path = Some(path.clone());
        }
    }
}
