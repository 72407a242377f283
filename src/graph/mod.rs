//! Build graph model for the crate.
//!
//! A `BuildGraph` is an immutable snapshot of one workspace's rule, source and
//! dependency relationships, produced once per sync by `GraphBuilder`. It answers
//! "which external targets does this source file transitively need?" and caches
//! every closure it computes for the lifetime of the snapshot.
//!
//! Snapshots are never patched: a new sync builds a new one and replaces the old
//! one wholesale (see `crate::sync::CurrentGraph`).
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

pub mod builder;
pub mod closure;
pub mod label;
pub mod location;

pub use builder::{GraphBuilder, TargetRecord, GENERATED_FILE_KIND, SOURCE_FILE_KIND};
pub use closure::{ClosureCache, DepSet};
pub use label::Label;
pub use location::Location;

/// The zero-dependency snapshot in effect before the first successful sync.
pub static EMPTY: LazyLock<Arc<BuildGraph>> = LazyLock::new(|| Arc::new(BuildGraph::empty()));

#[derive(Default)]
pub struct BuildGraph {
    // Target to file on disk, for source targets
    locations: HashMap<Label, Location>,
    // Targets listed in a source attribute of a source-language rule
    source_targets: HashSet<Label>,
    file_to_target: HashMap<PathBuf, Label>,
    // Source target to the rule that builds it
    source_owner: HashMap<Label, Label>,
    // Absent key: not enumerated (leaf). Empty set: enumerated, no deps.
    rule_deps: HashMap<Label, HashSet<Label>>,
    // Targets outside the project boundary
    project_deps: HashSet<Label>,
    android_targets: HashSet<Label>,
    target_to_kind: HashMap<Label, String>,
    closures: ClosureCache,
}

/// Entry counts of a snapshot, used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub source_files: usize,
    pub source_targets: usize,
    pub rules: usize,
    pub project_deps: usize,
    pub android_targets: usize,
}

impl BuildGraph {
    /// A snapshot with every map and set empty.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
            && self.file_to_target.is_empty()
            && self.rule_deps.is_empty()
            && self.project_deps.is_empty()
            && self.target_to_kind.is_empty()
    }

    #[must_use]
    pub fn locations(&self) -> &HashMap<Label, Location> {
        &self.locations
    }

    #[must_use]
    pub fn location(&self, target: &Label) -> Option<&Location> {
        self.locations.get(target)
    }

    #[must_use]
    pub fn source_targets(&self) -> &HashSet<Label> {
        &self.source_targets
    }

    #[must_use]
    pub fn project_deps(&self) -> &HashSet<Label> {
        &self.project_deps
    }

    #[must_use]
    pub fn rule_deps(&self, rule: &Label) -> Option<&HashSet<Label>> {
        self.rule_deps.get(rule)
    }

    #[must_use]
    pub fn target_kind(&self, target: &Label) -> Option<&str> {
        self.target_to_kind.get(target).map(String::as_str)
    }

    #[must_use]
    pub fn is_android_target(&self, target: &Label) -> bool {
        self.android_targets.contains(target)
    }

    /// The closure cache, exposed for instrumentation.
    #[must_use]
    pub fn closure_cache(&self) -> &ClosureCache {
        &self.closures
    }

    #[must_use]
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            source_files: self.file_to_target.len(),
            source_targets: self.source_targets.len(),
            rules: self.rule_deps.len(),
            project_deps: self.project_deps.len(),
            android_targets: self.android_targets.len(),
        }
    }

    /// The rule that builds the source file at `path`, if the file is tracked and owned.
    #[must_use]
    pub fn owning_target(&self, path: &Path) -> Option<&Label> {
        let source = self.file_to_target.get(path)?;
        self.source_owner.get(source)
    }

    /// External targets reachable from `target`. Computed once per snapshot and cached.
    #[must_use]
    pub fn transitive_external_dependencies(&self, target: &Label) -> DepSet {
        self.closures.resolve(target, &self.rule_deps, &self.project_deps)
    }

    /// External targets the file at `path` needs to build; empty when the file has no owner.
    #[must_use]
    pub fn file_dependencies(&self, path: &Path) -> DepSet {
        match self.owning_target(path) {
            Some(owner) => self.transitive_external_dependencies(owner),
            None => closure::empty_deps(),
        }
    }

    /// Every tracked source file, relative to the workspace root, in no particular order.
    pub fn all_source_files(&self) -> impl Iterator<Item = &Path> + '_ {
        self.file_to_target.keys().map(PathBuf::as_path)
    }

    /// Source files whose owning rule kind satisfies `predicate`.
    ///
    /// Only targets listed in a source attribute are considered; targets without a
    /// known owner, kind or location are skipped.
    pub fn source_files_of_kind<F>(&self, predicate: F) -> Vec<&Path>
    where
        F: Fn(&str) -> bool,
    {
        self.source_targets
            .iter()
            .filter(|src| {
                self.source_owner
                    .get(*src)
                    .and_then(|owner| self.target_kind(owner))
                    .is_some_and(&predicate)
            })
            .filter_map(|src| self.locations.get(src))
            .map(|loc| loc.file.as_path())
            .collect()
    }

    /// Files of every target listed in a source attribute of a source-language rule.
    #[must_use]
    pub fn language_source_files(&self) -> Vec<&Path> {
        self.source_targets
            .iter()
            .filter_map(|src| self.locations.get(src))
            .map(|loc| loc.file.as_path())
            .collect()
    }

    /// Files owned by a rule classified as Android.
    #[must_use]
    pub fn android_source_files(&self) -> Vec<&Path> {
        self.source_targets
            .iter()
            .filter(|src| self.source_owner.get(*src).is_some_and(|o| self.android_targets.contains(o)))
            .filter_map(|src| self.locations.get(src))
            .map(|loc| loc.file.as_path())
            .collect()
    }

    /// Compute the closure of every owning rule in parallel so later file lookups are cache hits.
    ///
    /// Returns the number of distinct owning rules visited.
    pub fn prefetch_file_dependencies(&self) -> usize {
        let owners: HashSet<&Label> =
            self.file_to_target.values().filter_map(|src| self.source_owner.get(src)).collect();
        owners.par_iter().for_each(|owner| {
            let _ = self.transitive_external_dependencies(owner);
        });
        owners.len()
    }
}

impl fmt::Debug for BuildGraph {
    // Full contents can be huge; print counts only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildGraph")
            .field("summary", &self.summary())
            .field("cached_closures", &self.closures.computed())
            .finish()
    }
}
