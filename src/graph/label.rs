use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::GraphError;

/// A fully-qualified build target identifier such as `//foo/bar:baz` or
/// `@maven//:com_google_guava_guava`.
///
/// Labels are compared and hashed by their canonical string form. The `//pkg`
/// shorthand is normalised to `//pkg:pkg` on parse so both spellings map to the
/// same key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(Arc<str>);

impl Label {
    /// Parse and validate a label string.
    ///
    /// # Errors
    /// Returns `GraphError::InvalidLabel` when the string is not of the form
    /// `[@repo]//package[:name]`.
    pub fn parse(raw: &str) -> Result<Self, GraphError> {
        let invalid = || GraphError::InvalidLabel(raw.to_string());
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let slashes = raw.find("//").ok_or_else(invalid)?;
        let repo = &raw[..slashes];
        if !(repo.is_empty() || (repo.starts_with('@') && !repo.contains(':'))) {
            return Err(invalid());
        }
        let rest = &raw[slashes + 2..];
        let (package, name) = match rest.split_once(':') {
            Some((p, n)) => (p, n),
            None => {
                // `//foo/bar` is shorthand for `//foo/bar:bar`
                let last = rest.rsplit('/').next().unwrap_or("");
                if last.is_empty() || rest.starts_with('/') {
                    return Err(invalid());
                }
                return Ok(Label(Arc::from(format!("{raw}:{last}"))));
            }
        };
        if name.is_empty() || name.contains(':') || package.starts_with('/') || package.ends_with('/') {
            return Err(invalid());
        }
        Ok(Label(Arc::from(raw)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// External repository name without the leading `@`, if any.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        let idx = self.0.find("//")?;
        self.0[..idx].strip_prefix('@')
    }

    #[must_use]
    pub fn package(&self) -> &str {
        let start = self.0.find("//").map_or(0, |i| i + 2);
        let end = self.0.rfind(':').unwrap_or(self.0.len());
        &self.0[start..end]
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or("")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({})", self.0)
    }
}

impl FromStr for Label {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::parse(s)
    }
}

impl TryFrom<String> for Label {
    type Error = GraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Label::parse(&value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0.to_string()
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
