use crate::Result;
use ohno::bail;
use std::collections::HashSet;

/// Normalizes a field before it is compared with the allowed values.
pub type Converter = fn(&str) -> String;

/// Keeps the rows whose value in one column belongs to a set.
#[derive(Debug, Clone)]
pub struct RowFilter {
    column: usize,
    allowed: HashSet<String>,
    converter: Option<Converter>,
}

impl RowFilter {
    /// A filter accepting rows whose field at `column` is one of `allowed`.
    ///
    /// # Errors
    ///
    /// Fails when `allowed` is empty, since such a filter would reject every row.
    pub fn new<I, S>(column: usize, allowed: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: HashSet<String> = allowed.into_iter().map(Into::into).collect();
        if allowed.is_empty() {
            bail!("a row filter on column {column} needs at least one allowed value");
        }

        Ok(Self {
            column,
            allowed,
            converter: None,
        })
    }

    /// Convert each field before testing it.
    #[must_use]
    pub const fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    /// Whether `row` passes the filter. Rows without the column never do.
    #[must_use]
    pub fn accepts(&self, row: &[String]) -> bool {
        let Some(value) = row.get(self.column) else {
            return false;
        };

        match self.converter {
            Some(convert) => self.allowed.contains(&convert(value)),
            None => self.allowed.contains(value),
        }
    }
}
