use super::Host;
use super::common::{Common, CommonArgs};
use super::update::print_report;
use crate::Result;
use crate::corpus::{Corpus, Distance, parallel_requests};
use crate::fetch::Progress;
use crate::tables::SentenceDetailed;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ParallelArgs {
    /// Language code of the sentences
    #[arg(long, short = 's', value_name = "CODE")]
    pub source: String,

    /// Language code of the translations
    #[arg(long, short = 't', value_name = "CODE")]
    pub target: String,

    /// How far a translation may be from its sentence
    #[arg(long, value_enum, value_name = "DISTANCE", default_value_t = Distance::Direct)]
    pub distance: Distance,

    /// Bring the sentences and links of both languages up to date first
    #[arg(long)]
    pub update: bool,

    /// Maximum number of pairs to print
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Print each sentence with a translation as `id`, `text`, `id`, `text`, tab separated.
pub async fn print_parallel<H: Host>(host: &mut H, common: &CommonArgs, args: &ParallelArgs) -> Result<()> {
    let common = Common::new(common)?;

    if args.update {
        let mut orchestrator = common.orchestrator()?;
        let progress = common.progress_reporter();
        let result = orchestrator.run(&parallel_requests(&args.source, &args.target), &progress).await;
        progress.done();
        let report = result?;

        if report.has_failures() {
            print_report(host, &report);
            host.exit(1);
            return Ok(());
        }
    }

    let pairs = Corpus::new(common.data_dir).parallel(&args.source, &args.target, args.distance)?;

    let mut out = host.output();
    for (sentence, translation) in pairs.take(args.limit.unwrap_or(usize::MAX)) {
        let _ = writeln!(out, "{}\t{}", columns(&sentence), columns(&translation));
    }

    Ok(())
}

fn columns(sentence: &SentenceDetailed) -> String {
    let id = sentence.sentence_id().as_ref().map(ToString::to_string).unwrap_or_default();
    format!("{id}\t{}", sentence.text())
}
