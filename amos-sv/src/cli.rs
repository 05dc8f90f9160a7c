//! Command-line arguments
//!
//! Every flag has an environment variable fallback; both take precedence
//! over the TOML config file.

use std::path::PathBuf;

use amos_common::config::ConfigOverrides;
use amos_common::Backend;
use clap::Parser;

/// Command-line arguments for amos-sv
#[derive(Parser, Debug)]
#[command(name = "amos-sv")]
#[command(about = "Accent similarity survey service")]
#[command(version)]
pub struct Args {
    /// Config file (default: <config dir>/amos/config.toml)
    #[arg(short, long, env = "AMOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "AMOS_PORT")]
    pub port: Option<u16>,

    /// Trial catalog CSV
    #[arg(long, env = "AMOS_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Directory for progress snapshots, exports or the row database
    #[arg(long, env = "AMOS_RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// Persistence backend: "rows" or "local"
    #[arg(long, env = "AMOS_BACKEND")]
    pub backend: Option<Backend>,

    /// Directory served under /audio
    #[arg(long, env = "AMOS_AUDIO_ROOT")]
    pub audio_root: Option<PathBuf>,

    /// Trials per participant (capped at the catalog size)
    #[arg(long, env = "AMOS_TOTAL_TRIALS")]
    pub total_trials: Option<usize>,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            catalog_path: self.catalog.clone(),
            results_dir: self.results_dir.clone(),
            backend: self.backend,
            audio_root: self.audio_root.clone(),
            total_trials: self.total_trials,
        }
    }
}
