use super::Row;
use crate::Result;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use ohno::IntoAppError;
use std::fs::OpenOptions;
use std::path::Path;

/// Write rows in the export dialect: one line per row, fields never quoted.
///
/// With `append` the rows are added to the end of the file, otherwise the file is replaced.
pub fn write_rows<'a>(path: &Path, delimiter: u8, append: bool, rows: impl IntoIterator<Item = &'a Row>) -> Result<usize> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .into_app_err_with(|| format!("unable to open '{}' for writing", path.display()))?;

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .has_headers(false)
        .flexible(true)
        .from_writer(file);

    let mut written = 0;
    for row in rows {
        writer
            .write_record(row)
            .into_app_err_with(|| format!("unable to write to '{}'", path.display()))?;
        written += 1;
    }

    writer.flush().into_app_err_with(|| format!("unable to flush '{}'", path.display()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_fields_are_never_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![vec!["1".to_string(), "say \"hi\", then go".to_string()]];

        assert_eq!(write_rows(&path, b',', false, &rows).unwrap(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "1,say \"hi\", then go\n");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_append_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let first = vec![vec!["1".to_string(), "a".to_string()]];
        let second = vec![vec!["2".to_string(), "b".to_string()]];

        let _ = write_rows(&path, b'\t', true, &first).unwrap();
        let _ = write_rows(&path, b'\t', true, &second).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\ta\n2\tb\n");

        let _ = write_rows(&path, b'\t', false, &second).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2\tb\n");
    }
}
