use super::RowFilter;
use crate::Result;
use crate::tables::TableDescriptor;
use core::fmt::{Debug, Formatter};
use ohno::app_err;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_TARGET: &str = "    reader";

/// An ordered sequence of string fields.
pub type Row = Vec<String>;

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
    Rows(Arc<[Row]>),
}

/// Reads delimited text written without quoting.
///
/// The exports do not quote fields, so a text field can contain the delimiter or a line break and
/// a naive split produces too many fields or too many lines. With a text column and an expected
/// width configured, the reader stitches such rows back together:
///
/// - an escaped line break (a line holding only a backslash) becomes two spaces, and a backslash
///   before delimiters becomes one space;
/// - extra fields are joined back into the text column with the delimiter;
/// - a physical line with a single field continues the previous row's last field after a space;
/// - an empty physical line adds a space to the previous row's last field;
/// - any other width mismatch is dropped.
///
/// Every call to [`rows`](Self::rows) starts again from the beginning of the source.
#[derive(Debug, Clone)]
pub struct TabularReader {
    source: Source,
    delimiter: u8,
    text_column: Option<isize>,
    columns: Option<usize>,
}

impl TabularReader {
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self::new(Source::Path(path.into()), delimiter)
    }

    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, delimiter: u8) -> Self {
        Self::new(Source::Bytes(Arc::from(bytes.into())), delimiter)
    }

    #[must_use]
    pub fn from_rows(rows: Vec<Row>, delimiter: u8) -> Self {
        Self::new(Source::Rows(Arc::from(rows)), delimiter)
    }

    /// A reader for a file of `table`, configured with the table's dialect.
    #[must_use]
    pub fn for_table(path: impl Into<PathBuf>, table: &TableDescriptor) -> Self {
        Self::from_path(path, table.delimiter)
            .with_columns(table.columns)
            .with_text_column(table.text_column)
    }

    const fn new(source: Source, delimiter: u8) -> Self {
        Self {
            source,
            delimiter,
            text_column: None,
            columns: None,
        }
    }

    /// Set the column that may contain the delimiter. Negative values count from the end.
    #[must_use]
    pub const fn with_text_column(mut self, text_column: Option<isize>) -> Self {
        self.text_column = text_column;
        self
    }

    /// Set the number of fields every row must have.
    #[must_use]
    pub const fn with_columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns);
        self
    }

    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        self.delimiter
    }

    #[must_use]
    pub const fn columns(&self) -> Option<usize> {
        self.columns
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            Source::Bytes(_) | Source::Rows(_) => None,
        }
    }

    /// Whether there is anything to read.
    #[must_use]
    pub fn exists(&self) -> bool {
        match &self.source {
            Source::Path(path) => path.is_file(),
            Source::Bytes(_) | Source::Rows(_) => true,
        }
    }

    /// The rows of the source.
    ///
    /// A file that does not exist yet reads as empty.
    #[must_use]
    pub fn rows(&self) -> Rows {
        match self.physical_rows() {
            Ok(physical) => self.reconstruct(physical),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "{e:#}");
                self.reconstruct(Box::new(core::iter::empty()))
            }
        }
    }

    /// The rows of the source, failing when a file is missing or cannot be opened.
    pub fn try_rows(&self) -> Result<Rows> {
        Ok(self.reconstruct(self.physical_rows()?))
    }

    /// Map the values of `key_column` to the values of `value_column`.
    ///
    /// The last row wins for duplicate keys; rows too short for either column are ignored.
    #[must_use]
    pub fn index(&self, key_column: usize, value_column: usize) -> HashMap<String, String> {
        let mut index = HashMap::new();
        for row in self.rows() {
            if let (Some(key), Some(value)) = (row.get(key_column), row.get(value_column)) {
                let _ = index.insert(key.clone(), value.clone());
            }
        }

        log::debug!(target: LOG_TARGET, "Indexed {} keys from {}", index.len(), self.describe());
        index
    }

    /// The rows accepted by every filter.
    pub fn filter<'a>(&self, filters: &'a [RowFilter]) -> impl Iterator<Item = Row> + 'a {
        self.rows().filter(move |row| filters.iter().all(|filter| filter.accepts(row)))
    }

    /// Each row reduced to `columns`, in that order. Rows too short are skipped.
    pub fn select<'a>(&self, columns: &'a [usize]) -> impl Iterator<Item = Row> + 'a {
        self.rows()
            .filter_map(move |row| columns.iter().map(|&column| row.get(column).cloned()).collect())
    }

    fn describe(&self) -> String {
        match &self.source {
            Source::Path(path) => format!("'{}'", path.display()),
            Source::Bytes(bytes) => format!("{} bytes in memory", bytes.len()),
            Source::Rows(rows) => format!("{} rows in memory", rows.len()),
        }
    }

    fn physical_rows(&self) -> Result<PhysicalIter> {
        match &self.source {
            Source::Path(path) => {
                let file = File::open(path).map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        app_err!("no local data at '{}'", path.display())
                    } else {
                        app_err!("unable to open '{}': {e}", path.display())
                    }
                })?;
                Ok(Box::new(PhysicalRows::new(
                    BufReader::new(file),
                    self.delimiter,
                    self.text_column.is_some(),
                    self.describe(),
                )))
            }
            Source::Bytes(bytes) => Ok(Box::new(PhysicalRows::new(
                Cursor::new(Arc::clone(bytes)),
                self.delimiter,
                self.text_column.is_some(),
                self.describe(),
            ))),
            Source::Rows(rows) => {
                let rows = Arc::clone(rows);
                Ok(Box::new((0..rows.len()).map_while(move |i| rows.get(i).cloned())))
            }
        }
    }

    fn reconstruct(&self, physical: PhysicalIter) -> Rows {
        Rows {
            physical,
            pending: None,
            delimiter: char::from(self.delimiter).to_string(),
            text_index: resolve_text_column(self.text_column, self.columns),
            columns: self.columns,
            skipped: 0,
        }
    }
}

type PhysicalIter = Box<dyn Iterator<Item = Row>>;

/// Resolve a possibly negative text column against the row width.
fn resolve_text_column(text_column: Option<isize>, columns: Option<usize>) -> Option<usize> {
    let (column, width) = (text_column?, columns?);
    let index = if column < 0 {
        width.checked_sub(column.unsigned_abs())?
    } else {
        usize::try_from(column).ok()?
    };

    (index < width).then_some(index)
}

/// Splits lines on the delimiter without any quoting rules.
///
/// With `unescape` set, a line holding a lone `\` joins its neighbors with two spaces, and a
/// backslash followed by delimiters becomes a single space.
struct PhysicalRows<R> {
    reader: R,
    delimiter: u8,
    unescape: bool,
    lookahead: Option<Line>,
    origin: String,
}

/// A physical line without its terminator, and whether it had one.
type Line = (Vec<u8>, bool);

impl<R: BufRead> PhysicalRows<R> {
    fn new(reader: R, delimiter: u8, unescape: bool, origin: String) -> Self {
        Self {
            reader,
            delimiter,
            unescape,
            lookahead: None,
            origin,
        }
    }

    fn read_line(&mut self) -> Option<Line> {
        if let Some(line) = self.lookahead.take() {
            return Some(line);
        }

        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            Ok(_) => {
                let terminated = line.last() == Some(&b'\n');
                if terminated {
                    let _ = line.pop();
                }
                if line.last() == Some(&b'\r') {
                    let _ = line.pop();
                }
                Some((line, terminated))
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Stopped reading {} early: {e}", self.origin);
                None
            }
        }
    }

    /// Append the lines that follow an escaped line break to `line`.
    fn join_escaped_breaks(&mut self, line: &mut Vec<u8>, mut terminated: bool) {
        while terminated {
            match self.read_line() {
                Some((next, true)) if next == b"\\" => match self.read_line() {
                    Some((rest, rest_terminated)) => {
                        line.extend_from_slice(b"  ");
                        line.extend_from_slice(&rest);
                        terminated = rest_terminated;
                    }
                    None => {
                        self.lookahead = Some((next, true));
                        return;
                    }
                },
                Some(next) => {
                    self.lookahead = Some(next);
                    return;
                }
                None => return,
            }
        }
    }
}

/// Replace each backslash followed by one or more `delimiter`s with a space.
fn unescape_delimiters(line: &[u8], delimiter: u8) -> Vec<u8> {
    let mut cleaned = Vec::with_capacity(line.len());
    let mut i = 0;
    while i < line.len() {
        if line[i] == b'\\' && line.get(i + 1) == Some(&delimiter) {
            cleaned.push(b' ');
            i += 1;
            while line.get(i) == Some(&delimiter) {
                i += 1;
            }
        } else {
            cleaned.push(line[i]);
            i += 1;
        }
    }

    cleaned
}

impl<R: BufRead> Iterator for PhysicalRows<R> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let (mut line, terminated) = self.read_line()?;
        if self.unescape {
            self.join_escaped_breaks(&mut line, terminated);
            line = unescape_delimiters(&line, self.delimiter);
        }

        if line.is_empty() {
            return Some(Row::new());
        }

        let text = String::from_utf8_lossy(&line);
        Some(text.split(char::from(self.delimiter)).map(str::to_string).collect())
    }
}

/// Lazy sequence of reconstructed rows.
pub struct Rows {
    physical: PhysicalIter,
    pending: Option<Row>,
    delimiter: String,
    text_index: Option<usize>,
    columns: Option<usize>,
    skipped: usize,
}

impl Rows {
    /// Number of physical rows dropped so far because their width could not be reconciled.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    fn rejoin_text(&self, fields: &mut Row, width: usize) {
        let Some(text_index) = self.text_index else {
            return;
        };

        let end = text_index + (fields.len() - width) + 1;
        let tail = fields.split_off(end);
        let text = fields.split_off(text_index);
        fields.push(text.join(&self.delimiter));
        fields.extend(tail);
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let Some(width) = self.columns else {
            return self.physical.by_ref().find(|row| !row.is_empty());
        };

        loop {
            let Some(mut fields) = self.physical.next() else {
                return self.pending.take();
            };

            if fields.len() > width {
                self.rejoin_text(&mut fields, width);
            }

            if fields.len() == width {
                if let Some(complete) = self.pending.replace(fields) {
                    return Some(complete);
                }
                continue;
            }

            let last = self.pending.as_mut().and_then(|row| row.last_mut());
            match (fields.as_slice(), last) {
                ([], Some(last)) => last.push(' '),
                ([continuation], Some(last)) => {
                    last.push(' ');
                    last.push_str(continuation);
                }
                _ => {
                    self.skipped += 1;
                    log::debug!(target: LOG_TARGET, "Skipping a row with {} fields where {width} were expected", fields.len());
                }
            }
        }
    }
}

impl Debug for Rows {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rows")
            .field("pending", &self.pending)
            .field("delimiter", &self.delimiter)
            .field("text_index", &self.text_index)
            .field("columns", &self.columns)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}
