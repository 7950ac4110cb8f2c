use super::common::{Common, CommonArgs};
use super::Host;
use crate::Result;
use crate::fetch::Progress;
use crate::update::{UpdateReport, UpdateRequest};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Table to bring up to date (repeat for several tables)
    #[arg(long = "table", short = 't', value_name = "TABLE", required = true)]
    pub tables: Vec<String>,

    /// Language code of interest, or `*` for every language (repeat for several languages)
    #[arg(long = "lang", short = 'l', value_name = "CODE", required = true)]
    pub languages: Vec<String>,

    /// For paired tables, keep only the pair in the order given
    #[arg(long)]
    pub pair: bool,
}

impl UpdateArgs {
    fn requests(&self) -> Vec<UpdateRequest> {
        self.tables
            .iter()
            .map(|table| {
                let request = UpdateRequest::new(table.as_str(), self.languages.iter().map(String::as_str));
                if self.pair { request.oriented() } else { request }
            })
            .collect()
    }
}

pub async fn update_tables<H: Host>(host: &mut H, common: &CommonArgs, args: &UpdateArgs) -> Result<()> {
    let common = Common::new(common)?;
    let mut orchestrator = common.orchestrator()?;
    let progress = common.progress_reporter();

    let result = orchestrator.run(&args.requests(), &progress).await;
    progress.done();
    let report = result?;

    print_report(host, &report);
    if report.has_failures() {
        host.exit(1);
    }

    Ok(())
}

pub(super) fn print_report<H: Host>(host: &mut H, report: &UpdateReport) {
    let mut out = host.output();
    if report.updated.is_empty() {
        let _ = writeln!(out, "Nothing to update");
    } else {
        let _ = writeln!(out, "Updated {} file(s):", report.updated.len());
        for stem in &report.updated {
            let _ = writeln!(out, "  {stem}");
        }
    }

    if !report.up_to_date.is_empty() {
        let _ = writeln!(out, "Already up to date: {}", report.up_to_date.iter().map(String::as_str).collect::<Vec<_>>().join(", "));
    }
    drop(out);

    let mut err = host.error();
    for url in &report.unavailable {
        let _ = writeln!(err, "Not published: {url}");
    }
    for failure in &report.failed {
        let _ = writeln!(err, "Failed: {}: {}", failure.subject, failure.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use crate::update::Failure;
    use url::Url;

    fn args(pair: bool) -> UpdateArgs {
        UpdateArgs {
            tables: vec!["links".to_string(), "tags".to_string()],
            languages: vec!["eng".to_string(), "fra".to_string()],
            pair,
        }
    }

    #[test]
    fn test_requests() {
        let requests = args(false).requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].table, "links");
        assert_eq!(requests[1].languages, ["eng", "fra"]);
        assert!(!requests[0].oriented_pair);

        assert!(args(true).requests().iter().all(|request| request.oriented_pair));
    }

    #[test]
    fn test_print_report() {
        let mut report = UpdateReport::default();
        let _ = report.updated.insert("eng-fra_links".to_string());
        let _ = report.up_to_date.insert("eng_tags".to_string());
        report.unavailable.push(Url::parse("https://example.org/exports/per_language/xyz/xyz_tags.tsv.bz2").unwrap());
        report.failed.push(Failure {
            subject: "links".to_string(),
            message: "boom".to_string(),
        });

        let mut host = TestHost::default();
        print_report(&mut host, &report);

        let output = host.output_text();
        assert!(output.contains("Updated 1 file(s):\n  eng-fra_links\n"));
        assert!(output.contains("Already up to date: eng_tags"));
        let errors = String::from_utf8(host.error_buf).unwrap();
        assert!(errors.contains("Not published: https://example.org/exports/per_language/xyz/xyz_tags.tsv.bz2"));
        assert!(errors.contains("Failed: links: boom"));
    }
}
