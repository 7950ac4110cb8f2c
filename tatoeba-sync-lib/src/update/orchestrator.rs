use super::request::{check_languages, check_requests};
use super::{UpdateReport, UpdateRequest};
use crate::Result;
use crate::data::{DEFAULT_BUFFER_BYTES, DifferenceFinder, Partitioner, TabularReader};
use crate::fetch::{FetchOutcome, FetchPipeline, Progress, VersionSource};
use crate::store::VersionStore;
use crate::store::path_utils::{file_stem, url_stem};
use crate::tables::{LANGUAGE_INDEX_COLUMNS, LANGUAGE_TABLE, TableDescriptor, languages_url};
use chrono::NaiveDateTime;
use ohno::{EnrichableExt, IntoAppError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use url::Url;

const LOG_TARGET: &str = "    update";

/// One table to handle in a run, after validation.
#[derive(Debug)]
struct Target {
    table: &'static TableDescriptor,
    languages: Vec<String>,
    wildcard: bool,
    oriented_pair: bool,
}

/// Brings a data directory up to date with the remote exports.
#[derive(Debug)]
pub struct UpdateOrchestrator<S> {
    data_dir: PathBuf,
    base_url: Url,
    source: S,
    pipeline: FetchPipeline,
    partitioner: Partitioner,
    compute_diffs: bool,
    store: VersionStore,
}

impl<S: VersionSource> UpdateOrchestrator<S> {
    /// An orchestrator for `data_dir`, downloading from `base_url`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, base_url: &Url, source: S, client: reqwest::Client) -> Self {
        let data_dir = data_dir.into();
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            store: VersionStore::open(&data_dir),
            data_dir,
            base_url,
            source,
            pipeline: FetchPipeline::new(client),
            partitioner: Partitioner::new(DEFAULT_BUFFER_BYTES),
            compute_diffs: true,
        }
    }

    /// Set how many bytes the partitioner buffers per output file.
    #[must_use]
    pub const fn with_split_buffer(mut self, bytes: usize) -> Self {
        self.partitioner = Partitioner::new(bytes);
        self
    }

    /// Enable or disable the comparison of new files with their previous version.
    #[must_use]
    pub const fn with_diffs(mut self, compute_diffs: bool) -> Self {
        self.compute_diffs = compute_diffs;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &VersionStore {
        &self.store
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The language codes published by the remote.
    pub async fn available_languages(&self) -> Result<Vec<String>> {
        let url = languages_url(&self.base_url)?;
        self.source
            .get_names(&url)
            .await
            .map_err(|e| e.enrich("unable to list the published languages"))
    }

    /// Validate `requests`, then fetch, split and diff everything they need.
    ///
    /// Invalid requests fail the whole run before any data is touched. Problems with individual
    /// files are logged and listed in the report instead.
    pub async fn run(&mut self, requests: &[UpdateRequest], progress: &dyn Progress) -> Result<UpdateReport> {
        let start = Instant::now();

        check_requests(requests)?;
        if requests.iter().any(|request| request.codes().next().is_some()) {
            let available = self.available_languages().await?;
            check_languages(requests, &available)?;
        }

        let targets = plan(requests);
        let mut report = UpdateReport::default();

        progress.set_phase("Checking");
        let candidates = self.candidates(&targets, &mut report);
        let remote = self.read_listings(&candidates, &mut report).await;

        let fetched = self.fetch_all(&candidates, &remote, &mut report, progress).await;

        progress.set_phase("Splitting");
        let (split_masters, split_outputs) = self.split_all(&targets, &fetched, &mut report);

        if self.compute_diffs {
            progress.set_phase("Comparing");
            let diff_filters = oriented_pairs(&targets);
            for (table, path) in fetched
                .iter()
                .filter(|(_, path)| !split_masters.contains(path))
                .chain(split_outputs.iter())
            {
                if !table.diffable {
                    continue;
                }
                if let Some(allowed) = diff_filters.get(table.name)
                    && !allowed.contains(file_name(path))
                {
                    continue;
                }
                self.diff(table, path, &mut report);
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Update finished in {:.3}s: {} updated, {} up to date, {} failed",
            start.elapsed().as_secs_f64(),
            report.updated.len(),
            report.up_to_date.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Every remote file the targets need, keyed by URL.
    fn candidates(&self, targets: &[Target], report: &mut UpdateReport) -> BTreeMap<Url, &'static TableDescriptor> {
        let mut candidates = BTreeMap::new();
        for target in targets {
            match target.table.remote_urls(&self.base_url, &target.languages) {
                Ok(urls) => {
                    for url in urls {
                        let _ = candidates.insert(url, target.table);
                    }
                }
                Err(e) => report.fail(target.table.name, format!("{e:#}")),
            }
        }

        candidates
    }

    /// The remote version of every candidate, asking once per directory.
    async fn read_listings(
        &self,
        candidates: &BTreeMap<Url, &'static TableDescriptor>,
        report: &mut UpdateReport,
    ) -> HashMap<Url, NaiveDateTime> {
        let mut by_directory: BTreeMap<Url, Vec<&Url>> = BTreeMap::new();
        for url in candidates.keys() {
            match url.join(".").into_app_err_with(|| format!("unable to find the directory of {url}")) {
                Ok(directory) => by_directory.entry(directory).or_default().push(url),
                Err(e) => report.fail(url, format!("{e:#}")),
            }
        }

        let mut remote = HashMap::new();
        for (directory, urls) in by_directory {
            match self.source.get_versions(&directory).await {
                Ok(listing) => {
                    for url in urls {
                        if let Some(version) = listing.get(url) {
                            let _ = remote.insert(url.clone(), *version);
                        } else {
                            log::debug!(target: LOG_TARGET, "{url} is not published");
                            report.unavailable.push(url.clone());
                        }
                    }
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not read the listing of {directory}: {e:#}");
                    for url in urls {
                        report.fail(url, format!("{e:#}"));
                    }
                }
            }
        }

        remote
    }

    /// Fetch every stale candidate, the language table first.
    async fn fetch_all(
        &mut self,
        candidates: &BTreeMap<Url, &'static TableDescriptor>,
        remote: &HashMap<Url, NaiveDateTime>,
        report: &mut UpdateReport,
        progress: &dyn Progress,
    ) -> Vec<(&'static TableDescriptor, PathBuf)> {
        let mut ordered: Vec<(&Url, &'static TableDescriptor)> = candidates.iter().map(|(url, table)| (url, *table)).collect();
        ordered.sort_by_key(|(_, table)| table.name != LANGUAGE_TABLE);

        let mut fetched = Vec::new();
        for (url, table) in ordered {
            let Some(version) = remote.get(url) else {
                continue;
            };

            let out_dir = table.local_dir(&self.data_dir);
            match self.pipeline.fetch(url, *version, &out_dir, &mut self.store, progress).await {
                FetchOutcome::UpToDate => {
                    let _ = report.up_to_date.insert(url_stem(url).to_string());
                }
                FetchOutcome::Fetched(paths) => {
                    report.updated.extend(paths.iter().map(|path| file_stem(path).to_string()));
                    fetched.extend(paths.into_iter().map(|path| (table, path)));
                }
                FetchOutcome::Failed { state, error } => {
                    report.fail(url, format!("{error:#} (stopped after '{state}')"));
                }
            }
        }

        fetched
    }

    /// Split the masters that changed, whose language index changed, or that still lack a
    /// requested partition.
    ///
    /// Returns the masters that were split and the split files whose content may have changed.
    fn split_all(
        &mut self,
        targets: &[Target],
        fetched: &[(&'static TableDescriptor, PathBuf)],
        report: &mut UpdateReport,
    ) -> (HashSet<PathBuf>, Vec<(&'static TableDescriptor, PathBuf)>) {
        let languages_changed = fetched.iter().any(|(table, _)| table.name == LANGUAGE_TABLE);
        let index_languages: BTreeSet<&str> = targets
            .iter()
            .filter(|target| target.table.needs_language_index() && !target.wildcard)
            .flat_map(|target| target.languages.iter().map(String::as_str))
            .collect();

        let mut index: Option<HashMap<String, String>> = None;
        let mut split_tables = HashSet::new();
        let mut masters = HashSet::new();
        let mut outputs = Vec::new();

        for target in targets {
            let table = target.table;
            let Some(rule) = table.split else {
                continue;
            };
            if !split_tables.insert(table.name) {
                continue;
            }

            let needs_index = table.needs_language_index();
            let wildcard_only = targets
                .iter()
                .filter(|other| other.table.name == table.name)
                .all(|other| other.wildcard);
            if needs_index && wildcard_only {
                log::debug!(target: LOG_TARGET, "Not splitting '{}' for every language", table.name);
                continue;
            }

            let dir = table.local_dir(&self.data_dir);
            let master = dir.join(table.master_file_name());
            let master_fetched = fetched.iter().any(|(_, path)| *path == master);
            let missing = expected_partitions(table, targets).into_iter().find(|name| {
                let path = dir.join(name);
                !path.is_file() || self.store.get(file_stem(&path)).is_none()
            });

            let content_changed = master_fetched || (needs_index && languages_changed && master.is_file());
            if !content_changed {
                let Some(name) = missing.filter(|_| master.is_file()) else {
                    continue;
                };
                log::debug!(target: LOG_TARGET, "'{name}' has not been produced yet, splitting '{}'", master.display());
            }

            let key_index = if needs_index {
                Some(&*index.get_or_insert_with(|| self.language_index(&index_languages)))
            } else {
                None
            };

            let reader = TabularReader::for_table(&master, table);
            match self.partitioner.split(&reader, rule.columns, key_index, &mut self.store) {
                Ok(produced) => {
                    let _ = masters.insert(master);
                    for path in produced {
                        let _ = report.updated.insert(file_stem(&path).to_string());
                        if content_changed {
                            outputs.push((table, path));
                        }
                    }
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not split '{}': {e:#}", master.display());
                    report.fail(master.display(), format!("{e:#}"));
                }
            }
        }

        (masters, outputs)
    }

    /// Map sentence ids to their language, from the local files of `languages`.
    fn language_index(&self, languages: &BTreeSet<&str>) -> HashMap<String, String> {
        let table = TableDescriptor::language_table();
        let dir = table.local_dir(&self.data_dir);
        let (key, value) = LANGUAGE_INDEX_COLUMNS;

        let mut index = HashMap::new();
        for lang in languages {
            let path = dir.join(table.slice_file_name(&[*lang]));
            index.extend(TabularReader::for_table(&path, table).index(key, value));
        }

        log::info!(target: LOG_TARGET, "Mapped {} sentences to their language", index.len());
        index
    }

    fn diff(&mut self, table: &TableDescriptor, path: &Path, report: &mut UpdateReport) {
        let finder = DifferenceFinder::for_table(table);
        let result = finder
            .find_changes(path, &[])
            .and_then(|changes| changes.map(|changes| finder.write_changes(path, &changes, &mut self.store)).transpose());

        if let Err(e) = result {
            log::warn!(target: LOG_TARGET, "Skipping the comparison of '{}': {e:#}", path.display());
            report.fail(path.display(), format!("{e:#}"));
        }
    }
}

/// Turn requests into targets, adding the language table where a split needs it.
fn plan(requests: &[UpdateRequest]) -> Vec<Target> {
    let mut targets = Vec::new();
    for request in requests {
        let Some(table) = TableDescriptor::lookup(&request.table) else {
            continue;
        };

        let target = Target {
            table,
            languages: request.languages.clone(),
            wildcard: request.is_wildcard(),
            oriented_pair: request.oriented_pair && table.is_paired(),
        };

        if table.needs_language_index() && !target.wildcard {
            targets.push(Target {
                table: TableDescriptor::language_table(),
                languages: request.codes().map(str::to_string).collect(),
                wildcard: false,
                oriented_pair: false,
            });
        }
        targets.push(target);
    }

    targets
}

/// File names of the partitions of `table` that the targets ask for.
///
/// Paired tables expect every ordered pair of a target's languages, or only the requested pair
/// for an oriented target.
fn expected_partitions(table: &TableDescriptor, targets: &[Target]) -> Vec<String> {
    let mut names = Vec::new();
    for target in targets.iter().filter(|target| target.table.name == table.name && !target.wildcard) {
        let languages: Vec<&str> = target.languages.iter().map(String::as_str).collect();
        if target.oriented_pair {
            names.push(table.slice_file_name(&languages));
        } else if table.is_paired() {
            for first in &languages {
                for second in &languages {
                    names.push(table.slice_file_name(&[*first, *second]));
                }
            }
        } else {
            names.extend(languages.iter().map(|lang| table.slice_file_name(&[*lang])));
        }
    }

    names
}

/// For paired tables only requested as oriented pairs, the partition files worth comparing.
fn oriented_pairs(targets: &[Target]) -> HashMap<&'static str, HashSet<String>> {
    let mut pairs: HashMap<&'static str, HashSet<String>> = HashMap::new();
    let unrestricted: HashSet<&str> = targets
        .iter()
        .filter(|target| target.table.is_paired() && !target.oriented_pair)
        .map(|target| target.table.name)
        .collect();

    for target in targets.iter().filter(|target| target.oriented_pair) {
        if unrestricted.contains(target.table.name) {
            continue;
        }
        let languages: Vec<&str> = target.languages.iter().map(String::as_str).collect();
        let _ = pairs
            .entry(target.table.name)
            .or_default()
            .insert(target.table.slice_file_name(&languages));
    }

    pairs
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_adds_language_table() {
        let targets = plan(&[UpdateRequest::new("links", ["eng", "fra"]), UpdateRequest::new("tags", ["eng"])]);
        let names: Vec<&str> = targets.iter().map(|target| target.table.name).collect();
        assert_eq!(names, [LANGUAGE_TABLE, "links", "tags"]);
        assert_eq!(targets[0].languages, ["eng", "fra"]);
    }

    #[test]
    fn test_plan_wildcard_needs_no_language_table() {
        let targets = plan(&[UpdateRequest::new("links", ["*"])]);
        assert_eq!(targets.len(), 1);
        assert!(targets[0].wildcard);
    }

    #[test]
    fn test_expected_partitions() {
        let links = TableDescriptor::lookup("links").unwrap();
        let targets = plan(&[UpdateRequest::new("links", ["eng", "deu"])]);
        assert_eq!(
            expected_partitions(links, &targets),
            ["eng-eng_links.tsv", "eng-deu_links.tsv", "deu-eng_links.tsv", "deu-deu_links.tsv"]
        );

        let oriented = plan(&[UpdateRequest::new("links", ["fra", "eng"]).oriented()]);
        assert_eq!(expected_partitions(links, &oriented), ["fra-eng_links.tsv"]);

        let queries = TableDescriptor::lookup("queries").unwrap();
        let targets = plan(&[UpdateRequest::new("queries", ["eng", "fra"]), UpdateRequest::new("queries", ["*"])]);
        assert_eq!(expected_partitions(queries, &targets), ["eng_queries.csv", "fra_queries.csv"]);
    }

    #[test]
    fn test_oriented_pairs() {
        let oriented = plan(&[UpdateRequest::new("links", ["fra", "eng"]).oriented()]);
        let pairs = oriented_pairs(&oriented);
        assert_eq!(pairs["links"], HashSet::from(["fra-eng_links.tsv".to_string()]));

        let mixed = plan(&[
            UpdateRequest::new("links", ["fra", "eng"]).oriented(),
            UpdateRequest::new("links", ["eng", "deu"]),
        ]);
        assert!(oriented_pairs(&mixed).is_empty());
    }
}
