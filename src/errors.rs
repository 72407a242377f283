use thiserror::Error;

/// Invariant violations raised while constructing a `BuildGraph` snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate entry for {key} in {map}")]
    DuplicateKey { map: &'static str, key: String },

    #[error("Location not recognized: {0}")]
    MalformedLocation(String),

    #[error(
        "Filename starts with /: {0} (ensure that `--relative_locations=true` was specified in the query invocation)"
    )]
    AbsoluteLocation(String),

    #[error("Invalid label: {0}")]
    InvalidLabel(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed query output at byte {offset}: {source}")]
    Json { offset: usize, source: serde_json::Error },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Failures of one sync attempt. None of them touch the published snapshot.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to start {program}: {source}")]
    Spawn { program: String, source: std::io::Error },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Build tool query failed with {}{}", describe_code(.code), describe_stderr(.stderr))]
    ToolFailed { code: Option<i32>, stderr: Vec<String> },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Could not parse query output: {0}")]
    Parse(#[from] ParseError),

    #[error("Could not build graph: {0}")]
    Graph(#[from] GraphError),
}

impl SyncError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn describe_stderr(stderr: &[String]) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{}", stderr.join("\n"))
    }
}
