use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::errors::GraphError;

static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*):(\d+):(\d+)$").unwrap());

/// A position in a source file, relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: PathBuf,
    pub row: u32,
    pub column: u32,
}

impl Location {
    /// Parse a location as reported by the build tool, i.e. `path/to/file:row:column`.
    ///
    /// # Errors
    /// `GraphError::MalformedLocation` when the string does not match the pattern or the
    /// row/column are not positive integers; `GraphError::AbsoluteLocation` when the path
    /// is absolute.
    pub fn parse(raw: &str) -> Result<Self, GraphError> {
        let malformed = || GraphError::MalformedLocation(raw.to_string());
        let caps = LOCATION_RE.captures(raw).ok_or_else(malformed)?;
        let file = caps.get(1).map_or("", |m| m.as_str());
        if file.is_empty() {
            return Err(malformed());
        }
        if file.starts_with('/') || Path::new(file).is_absolute() {
            return Err(GraphError::AbsoluteLocation(raw.to_string()));
        }
        let row: u32 = caps[2].parse().map_err(|_| malformed())?;
        let column: u32 = caps[3].parse().map_err(|_| malformed())?;
        if row == 0 || column == 0 {
            return Err(malformed());
        }
        Ok(Location { file: PathBuf::from(file), row, column })
    }
}

impl FromStr for Location {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.row, self.column)
    }
}
