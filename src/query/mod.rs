use std::path::{Path, PathBuf};

use crate::graph::{BuildGraph, Label};

/// Query trait implemented by all query types.
///
/// Given an immutable reference to a `BuildGraph` snapshot, returns a result of type `R`.
pub trait Query<R> {
    fn run(&self, graph: &BuildGraph) -> R;
}

/// The rule that builds a given source file.
pub struct OwningTargetQuery {
    pub file: PathBuf,
}

impl OwningTargetQuery {
    /// Construct a query for a workspace-relative file path.
    pub fn new<P: AsRef<Path>>(file: P) -> Self {
        Self { file: file.as_ref().to_path_buf() }
    }
}

impl Query<Option<Label>> for OwningTargetQuery {
    fn run(&self, graph: &BuildGraph) -> Option<Label> {
        graph.owning_target(&self.file).cloned()
    }
}

/// External targets a source file needs, through its owning rule.
pub struct FileDependenciesQuery {
    pub file: PathBuf,
}

impl FileDependenciesQuery {
    pub fn new<P: AsRef<Path>>(file: P) -> Self {
        Self { file: file.as_ref().to_path_buf() }
    }
}

// Labels come out of an ordered set, so the result is already sorted.
impl Query<Vec<Label>> for FileDependenciesQuery {
    fn run(&self, graph: &BuildGraph) -> Vec<Label> {
        graph.file_dependencies(&self.file).iter().cloned().collect()
    }
}

/// External targets reachable from a target.
pub struct TransitiveDepsQuery {
    pub target: Label,
}

impl TransitiveDepsQuery {
    #[must_use]
    pub fn new(target: Label) -> Self {
        Self { target }
    }
}

impl Query<Vec<Label>> for TransitiveDepsQuery {
    fn run(&self, graph: &BuildGraph) -> Vec<Label> {
        graph.transitive_external_dependencies(&self.target).iter().cloned().collect()
    }
}

/// Which source files `SourceFilesQuery` lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Every tracked source file.
    All,
    /// Files listed in a source attribute of a source-language rule.
    Language,
    /// Files owned by an Android rule.
    Android,
    /// Files owned by a rule of exactly this kind, e.g. `java_library`.
    RuleKind(String),
}

pub struct SourceFilesQuery {
    pub kind: SourceKind,
}

impl SourceFilesQuery {
    #[must_use]
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }
}

impl Query<Vec<PathBuf>> for SourceFilesQuery {
    fn run(&self, graph: &BuildGraph) -> Vec<PathBuf> {
        let files: Vec<&Path> = match &self.kind {
            SourceKind::All => graph.all_source_files().collect(),
            SourceKind::Language => graph.language_source_files(),
            SourceKind::Android => graph.android_source_files(),
            SourceKind::RuleKind(kind) => graph.source_files_of_kind(|k| k == kind),
        };
        let mut v: Vec<PathBuf> = files.into_iter().map(Path::to_path_buf).collect();
        v.sort();
        v.dedup();
        v
    }
}

/// Source files whose dependency closure contains a given external target.
///
/// Touches the closure of every owning rule, so on a cold snapshot this costs a
/// full prefetch.
pub struct DependentFilesQuery {
    pub dependency: Label,
}

impl DependentFilesQuery {
    #[must_use]
    pub fn new(dependency: Label) -> Self {
        Self { dependency }
    }
}

impl Query<Vec<PathBuf>> for DependentFilesQuery {
    fn run(&self, graph: &BuildGraph) -> Vec<PathBuf> {
        let mut v: Vec<PathBuf> = graph
            .all_source_files()
            .filter(|f| graph.file_dependencies(f).contains(&self.dependency))
            .map(Path::to_path_buf)
            .collect();
        v.sort();
        v
    }
}
