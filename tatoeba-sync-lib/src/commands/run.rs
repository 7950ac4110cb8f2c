//! Command dispatch logic for tatoeba-sync

use super::common::CommonArgs;
use super::{
    InitArgs, ParallelArgs, ReadArgs, UpdateArgs, init_config, list_languages, list_tables, print_parallel, read_rows, update_tables,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "tatoeba-sync", version, author, long_about = None)]
#[command(about = "Keep a local, per-language copy of the Tatoeba corpus exports up to date")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download, split and compare the files needed for some tables and languages
    Update(UpdateArgs),
    /// List the supported tables
    Tables,
    /// List the language codes published by the download site
    Languages,
    /// Print rows from the local copy
    Read(ReadArgs),
    /// Print sentences of one language alongside their translations in another
    Parallel(ParallelArgs),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);

    match &cli.command {
        Command::Update(update_args) => update_tables(host, &cli.common, update_args).await,
        Command::Tables => {
            list_tables(host);
            Ok(())
        }
        Command::Languages => list_languages(host, &cli.common).await,
        Command::Read(read_args) => read_rows(host, &cli.common, read_args),
        Command::Parallel(parallel_args) => print_parallel(host, &cli.common, parallel_args).await,
        Command::Init(init_args) => init_config(host, &cli.common, init_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_arguments_after_subcommand() {
        let cli = Cli::try_parse_from(["tatoeba-sync", "update", "--table", "links", "--lang", "eng", "--lang", "fra", "--data-dir", "/tmp/corpus"]).unwrap();
        assert_eq!(cli.common.data_dir.as_deref().map(camino::Utf8Path::as_str), Some("/tmp/corpus"));
        let Command::Update(args) = cli.command else {
            panic!("expected the update command");
        };
        assert_eq!(args.tables, ["links"]);
        assert_eq!(args.languages, ["eng", "fra"]);
        assert!(!args.pair);
    }

    #[test]
    fn test_update_requires_languages() {
        assert!(Cli::try_parse_from(["tatoeba-sync", "update", "--table", "links"]).is_err());
    }

    #[test]
    fn test_read_scope() {
        let cli = Cli::try_parse_from(["tatoeba-sync", "read", "-t", "tags", "-l", "eng", "--scope", "added", "--limit", "3"]).unwrap();
        let Command::Read(args) = cli.command else {
            panic!("expected the read command");
        };
        assert_eq!(args.scope, crate::corpus::Scope::Added);
        assert_eq!(args.limit, Some(3));
    }

    #[test]
    fn test_parallel_arguments() {
        let cli = Cli::try_parse_from(["tatoeba-sync", "parallel", "-s", "fra", "-t", "eng", "--distance", "indirect"]).unwrap();
        let Command::Parallel(args) = cli.command else {
            panic!("expected the parallel command");
        };
        assert_eq!((args.source.as_str(), args.target.as_str()), ("fra", "eng"));
        assert_eq!(args.distance, crate::corpus::Distance::Indirect);
        assert!(!args.update);
    }
}
