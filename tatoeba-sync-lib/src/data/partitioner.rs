use super::writer::write_rows;
use super::{Row, TabularReader};
use crate::Result;
use crate::store::VersionStore;
use crate::store::path_utils::{file_stem, part_path, retire_existing, sanitize_path_component};
use crate::tables::is_null;
use ohno::{IntoAppError, bail};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const LOG_TARGET: &str = "     split";

/// Default number of bytes buffered per output file before it is flushed.
pub const DEFAULT_BUFFER_BYTES: usize = 1024 * 1024;

#[derive(Debug, Default)]
struct Pending {
    rows: Vec<Row>,
    bytes: usize,
}

/// Accumulates rows per output file and writes them in batches.
///
/// Rows go to `<name>.part` while the split runs. [`finalize`](Self::finalize) renames each part
/// to its final name, so an interrupted split never leaves a final file with partial content.
#[derive(Debug)]
pub struct Buffer {
    out_dir: PathBuf,
    delimiter: u8,
    max_bytes: usize,
    entries: HashMap<String, Pending>,
}

impl Buffer {
    #[must_use]
    pub fn new(out_dir: impl Into<PathBuf>, delimiter: u8, max_bytes: usize) -> Self {
        Self {
            out_dir: out_dir.into(),
            delimiter,
            max_bytes,
            entries: HashMap::new(),
        }
    }

    /// Queue `row` for the output file called `name`.
    ///
    /// The first row for a name discards any part file left behind by an interrupted run.
    pub fn add(&mut self, name: &str, row: Row) -> Result<()> {
        let pending = match self.entries.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let part = part_path(&self.out_dir.join(name));
                if part.exists() {
                    log::debug!(target: LOG_TARGET, "Discarding stale '{}'", part.display());
                    fs::remove_file(&part).into_app_err_with(|| format!("unable to remove '{}'", part.display()))?;
                }
                entry.insert(Pending::default())
            }
        };

        pending.bytes += estimated_size(&row);
        pending.rows.push(row);

        if pending.bytes >= self.max_bytes {
            flush(&self.out_dir.join(name), self.delimiter, pending)?;
        }

        Ok(())
    }

    /// The names of the output files seen so far.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Write out everything still buffered and give every output its final name.
    ///
    /// A file already holding the final name is kept as the previous version.
    pub fn finalize(mut self) -> Result<BTreeSet<PathBuf>> {
        let mut outputs = BTreeSet::new();

        for (name, pending) in &mut self.entries {
            let target = self.out_dir.join(name);
            flush(&target, self.delimiter, pending)?;

            let part = part_path(&target);
            let _ = retire_existing(&target)?;
            fs::rename(&part, &target)
                .into_app_err_with(|| format!("unable to rename '{}' to '{}'", part.display(), target.display()))?;
            let _ = outputs.insert(target);
        }

        Ok(outputs)
    }
}

fn flush(target: &Path, delimiter: u8, pending: &mut Pending) -> Result<()> {
    let part = part_path(target);
    let written = write_rows(&part, delimiter, true, &pending.rows)?;
    log::trace!(target: LOG_TARGET, "Flushed {written} rows to '{}'", part.display());
    pending.rows.clear();
    pending.bytes = 0;
    Ok(())
}

fn estimated_size(row: &Row) -> usize {
    row.iter().map(|field| field.len() + 1).sum()
}

/// Splits a multilingual file into one file per key.
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    max_buffer_bytes: usize,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_BYTES)
    }
}

impl Partitioner {
    #[must_use]
    pub const fn new(max_buffer_bytes: usize) -> Self {
        Self { max_buffer_bytes }
    }

    /// Distribute the rows of `source` into files named after their key.
    ///
    /// The key of a row is the value of each of `key_columns`, mapped through `index` when one is
    /// given, joined with `-`. A row goes to `<key>_<source stem>.<tsv|csv>` next to the source only
    /// if every part of its key resolves to a non-empty value; other rows are dropped. Every output
    /// inherits the recorded version of the source.
    pub fn split(
        &self,
        source: &TabularReader,
        key_columns: &[usize],
        index: Option<&HashMap<String, String>>,
        store: &mut VersionStore,
    ) -> Result<BTreeSet<PathBuf>> {
        let Some(path) = source.path() else {
            bail!("only files can be split");
        };
        if key_columns.is_empty() {
            bail!("splitting '{}' needs at least one key column", path.display());
        }

        let start = Instant::now();
        let stem = file_stem(path).to_string();
        let extension = if source.delimiter() == b'\t' { "tsv" } else { "csv" };
        let out_dir = path.parent().unwrap_or_else(|| Path::new("."));

        log::info!(target: LOG_TARGET, "Splitting '{}'", path.display());

        let mut buffer = Buffer::new(out_dir, source.delimiter(), self.max_buffer_bytes);
        let mut kept = 0_usize;
        let mut dropped = 0_usize;

        for row in source.try_rows()? {
            match partition_key(&row, key_columns, index) {
                Some(key) => {
                    buffer.add(&format!("{key}_{stem}.{extension}"), row)?;
                    kept += 1;
                }
                None => dropped += 1,
            }
        }

        let outputs = buffer.finalize()?;

        if dropped > 0 {
            log::debug!(target: LOG_TARGET, "Dropped {dropped} rows of '{stem}' whose key did not resolve");
        }
        log::info!(
            target: LOG_TARGET,
            "Split {kept} rows of '{stem}' into {} files in {:.3}s",
            outputs.len(),
            start.elapsed().as_secs_f64()
        );

        match store.get(&stem) {
            Some(version) => {
                for output in &outputs {
                    store.set(file_stem(output), version)?;
                }
            }
            None => log::debug!(target: LOG_TARGET, "No recorded version for '{stem}', outputs are left unversioned"),
        }

        Ok(outputs)
    }
}

/// The partition name of `row`, or `None` if any part of the key does not resolve.
fn partition_key(row: &[String], key_columns: &[usize], index: Option<&HashMap<String, String>>) -> Option<String> {
    let mut parts = Vec::with_capacity(key_columns.len());
    for &column in key_columns {
        let value = row.get(column)?;
        let resolved = match index {
            Some(index) => index.get(value)?,
            None => value,
        };

        if is_null(resolved) {
            return None;
        }
        parts.push(sanitize_path_component(resolved));
    }

    Some(parts.join("-"))
}
