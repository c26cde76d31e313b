use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MissingColumn(String);

impl MissingColumn {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for MissingColumn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "column '{}' was not found in the uploaded sheet", self.0)
    }
}

impl StdError for MissingColumn {}

/// The header row of a sheet. Maps header text to column index.
///
/// Headers are matched exactly after trimming surrounding whitespace. When a header appears more
/// than once the first occurrence wins.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Columns {
    headers: Vec<String>,
    header_map: HashMap<String, usize>,
}

impl Columns {
    pub fn new<S, I>(headers: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .collect();
        let mut header_map = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            if !header.is_empty() {
                header_map.entry(header.clone()).or_insert(idx);
            }
        }
        Self {
            headers,
            header_map,
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns the index of `header`, or an error naming the missing column.
    pub fn index(&self, header: &str) -> Result<usize, MissingColumn> {
        self.header_map
            .get(header)
            .copied()
            .ok_or_else(|| MissingColumn(header.to_string()))
    }
}
