//! Command-line interface for tatoeba-sync
//!
//! This module implements the CLI commands on top of the update orchestrator and the corpus
//! reader. It handles argument parsing, configuration and logging setup, and output.
//!
//! # Implementation Model
//!
//! ## Commands
//!
//! - **update**: Validate a set of tables and languages, then download, split and compare
//!   whatever is stale in the data directory
//! - **tables**: List the supported tables and how each is published and split
//! - **languages**: List the language codes the download site publishes
//! - **read**: Print local rows of a table, optionally only those that changed with the last update
//! - **parallel**: Print sentences of one language alongside their translations in another
//! - **init**: Generate a default configuration file
//!
//! ## Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes to the appropriate
//! handler. Handlers that touch the data directory start from the `common` module, which sets up
//! logging, resolves the data directory and loads the configuration (`tatoeba-sync.toml` in the
//! data directory unless `--config` says otherwise).
//!
//! All output goes through the [`Host`] trait so commands can be exercised in tests.

mod common;
mod config;
mod host;
mod init;
mod languages;
mod parallel;
mod progress_reporter;
mod read;
mod run;
mod tables;
mod update;

pub use common::{ColorMode, Common, CommonArgs, LogLevel, resolve_data_dir};
pub use config::{CONFIG_FILE_NAME, Config, DEFAULT_CONFIG_TOML};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use languages::list_languages;
pub use parallel::{ParallelArgs, print_parallel};
pub use progress_reporter::ProgressReporter;
pub use read::{ReadArgs, read_rows};
pub use run::run;
pub use tables::list_tables;
pub use update::{UpdateArgs, update_tables};
