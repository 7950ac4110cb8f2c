use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::corpus::{Corpus, Scope};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// Table to read
    #[arg(long, short = 't', value_name = "TABLE")]
    pub table: String,

    /// Language code (none for the multilingual file, two for a language pair)
    #[arg(long = "lang", short = 'l', value_name = "CODE")]
    pub languages: Vec<String>,

    /// Which rows to read
    #[arg(long, value_enum, value_name = "SCOPE", default_value_t = Scope::All)]
    pub scope: Scope,

    /// Maximum number of rows to print
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

pub fn read_rows<H: Host>(host: &mut H, common: &CommonArgs, args: &ReadArgs) -> Result<()> {
    let common = Common::new(common)?;
    let corpus = Corpus::new(common.data_dir);
    let languages: Vec<&str> = args.languages.iter().map(String::as_str).collect();

    let delimiter = char::from(corpus.reader(&args.table, &languages, args.scope)?.delimiter()).to_string();
    let rows = corpus.rows(&args.table, &languages, args.scope)?;

    let mut out = host.output();
    for row in rows.take(args.limit.unwrap_or(usize::MAX)) {
        let _ = writeln!(out, "{}", row.join(&delimiter));
    }

    Ok(())
}
