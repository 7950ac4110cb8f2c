//! Setup shared by the commands.

use super::ProgressReporter;
use super::config::Config;
use crate::Result;
use crate::fetch::HttpVersionSource;
use crate::update::UpdateOrchestrator;
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use core::time::Duration;
use directories::BaseDirs;
use ohno::IntoAppError;
use std::io::{IsTerminal, stderr};
use std::path::PathBuf;

const USER_AGENT: &str = concat!("tatoeba-sync/", env!("CARGO_PKG_VERSION"));

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by every command that touches the data directory
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Directory holding the local copy of the corpus (default is the platform data directory)
    #[arg(long, value_name = "PATH", env = "TATOEBA_SYNC_DATA_DIR", global = true)]
    pub data_dir: Option<Utf8PathBuf>,

    /// Path to configuration file (default is `tatoeba-sync.toml` in the data directory)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Resolved data directory, configuration and output settings
#[derive(Debug)]
pub struct Common {
    pub data_dir: PathBuf,
    pub config: Config,
    color: ColorMode,
    log_level: LogLevel,
}

impl Common {
    /// Initialize logging, then resolve the data directory and load the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined or the configuration is invalid
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let data_dir = resolve_data_dir(args)?;
        let config = Config::load(&data_dir, args.config.as_deref())?;

        Ok(Self {
            data_dir,
            config,
            color: args.color,
            log_level: args.log_level,
        })
    }

    /// An HTTP client for the download site
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built
    pub fn client() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .into_app_err("creating the HTTP client")
    }

    /// A listing source honoring the configured cache TTL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn version_source(&self) -> Result<HttpVersionSource> {
        Ok(HttpVersionSource::new(Self::client()?, self.config.listing_cache_ttl))
    }

    /// An orchestrator for the data directory, configured from the loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built
    pub fn orchestrator(&self) -> Result<UpdateOrchestrator<HttpVersionSource>> {
        let base_url = self.config.base_url()?;
        Ok(
            UpdateOrchestrator::new(&self.data_dir, &base_url, self.version_source()?, Self::client()?)
                .with_split_buffer(self.config.split_buffer_bytes)
                .with_diffs(self.config.compute_diffs),
        )
    }

    /// A progress bar on stderr, held back while logs are being written
    #[must_use]
    pub fn progress_reporter(&self) -> ProgressReporter {
        let delay = if self.log_level == LogLevel::None {
            Duration::from_millis(300)
        } else {
            Duration::from_hours(365 * 24)
        };

        let use_colors = match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stderr().is_terminal(),
        };

        ProgressReporter::new(delay, use_colors)
    }
}

/// The `--data-dir` argument, or `tatoeba-sync` under the platform data directory.
///
/// # Errors
///
/// Returns an error if no data directory was given and the platform has none
pub fn resolve_data_dir(args: &CommonArgs) -> Result<PathBuf> {
    if let Some(path) = &args.data_dir {
        return Ok(path.as_std_path().to_path_buf());
    }

    Ok(BaseDirs::new()
        .into_app_err("could not determine the platform data directory")?
        .data_dir()
        .join("tatoeba-sync"))
}

/// Initialize the logger for `log_level`; `RUST_LOG` takes precedence when set.
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // A second command in the same process keeps the first logger.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}
