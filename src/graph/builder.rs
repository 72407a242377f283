use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::path::PathBuf;

use super::{BuildGraph, ClosureCache, Label, Location};
use crate::errors::GraphError;

/// Kind reported by the build tool for a checked-in source file target.
pub const SOURCE_FILE_KIND: &str = "source file";
/// Kind reported by the build tool for an output of another rule.
pub const GENERATED_FILE_KIND: &str = "generated file";

const ANDROID_KIND_PREFIX: &str = "android_";

/// One target discovered by the query, as handed to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    pub label: Label,
    /// Rule that lists this target in a source attribute.
    pub owner: Option<Label>,
    pub kind: String,
    /// `None` when dependencies were not enumerated for this target.
    pub deps: Option<Vec<Label>>,
    pub location: Option<Location>,
}

impl TargetRecord {
    #[must_use]
    pub fn new(label: Label, kind: impl Into<String>) -> Self {
        Self { label, owner: None, kind: kind.into(), deps: None, location: None }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Label) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_deps(mut self, deps: impl IntoIterator<Item = Label>) -> Self {
        self.deps = Some(deps.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Accumulates query results and produces one immutable `BuildGraph`.
///
/// Every keyed insert is checked: writing the same value twice is accepted, writing
/// a different value for an existing key fails with `GraphError::DuplicateKey`.
/// Single-threaded by contract; the builder is consumed by `build`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    locations: HashMap<Label, Location>,
    source_targets: HashSet<Label>,
    file_to_target: HashMap<PathBuf, Label>,
    source_owner: HashMap<Label, Label>,
    rule_deps: HashMap<Label, HashSet<Label>>,
    project_deps: HashSet<Label>,
    android_targets: HashSet<Label>,
    target_to_kind: HashMap<Label, String>,
    // Dependencies named by records, candidates for project_deps
    referenced: HashSet<Label>,
}

fn insert_unique<K, V>(
    map: &mut HashMap<K, V>,
    name: &'static str,
    key: K,
    value: V,
) -> Result<(), GraphError>
where
    K: Eq + Hash + Debug,
    V: PartialEq,
{
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
        Entry::Occupied(existing) if *existing.get() == value => Ok(()),
        Entry::Occupied(existing) => {
            Err(GraphError::DuplicateKey { map: name, key: format!("{:?}", existing.key()) })
        }
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// `GraphError::DuplicateKey` if `target` already has a different location.
    pub fn add_location(&mut self, target: Label, location: Location) -> Result<&mut Self, GraphError> {
        insert_unique(&mut self.locations, "locations", target, location)?;
        Ok(self)
    }

    pub fn add_source_target(&mut self, target: Label) -> &mut Self {
        self.source_targets.insert(target);
        self
    }

    /// # Errors
    /// `GraphError::DuplicateKey` if `path` is already owned by a different target.
    pub fn add_file(&mut self, path: PathBuf, target: Label) -> Result<&mut Self, GraphError> {
        insert_unique(&mut self.file_to_target, "fileToTarget", path, target)?;
        Ok(self)
    }

    /// Record `owner` as the rule that builds `source`. Also marks `source` as a source target.
    ///
    /// # Errors
    /// `GraphError::DuplicateKey` if `source` already has a different owner.
    pub fn add_source_owner(&mut self, source: Label, owner: Label) -> Result<&mut Self, GraphError> {
        insert_unique(&mut self.source_owner, "sourceOwner", source.clone(), owner)?;
        self.source_targets.insert(source);
        Ok(self)
    }

    /// # Errors
    /// `GraphError::DuplicateKey` if `rule` already has a different dependency set.
    pub fn add_rule_deps(
        &mut self,
        rule: Label,
        deps: impl IntoIterator<Item = Label>,
    ) -> Result<&mut Self, GraphError> {
        let deps: HashSet<Label> = deps.into_iter().collect();
        insert_unique(&mut self.rule_deps, "ruleDeps", rule, deps)?;
        Ok(self)
    }

    pub fn add_project_dep(&mut self, target: Label) -> &mut Self {
        self.project_deps.insert(target);
        self
    }

    pub fn add_android_target(&mut self, target: Label) -> &mut Self {
        self.android_targets.insert(target);
        self
    }

    /// # Errors
    /// `GraphError::DuplicateKey` if `target` already has a different kind.
    pub fn add_target_kind(&mut self, target: Label, kind: impl Into<String>) -> Result<&mut Self, GraphError> {
        insert_unique(&mut self.target_to_kind, "targetToKind", target, kind.into())?;
        Ok(self)
    }

    /// Fold one query record into the maps.
    ///
    /// Dependencies named here that end up with neither enumerated deps nor a location
    /// are treated as outside the project when the graph is built.
    ///
    /// # Errors
    /// Any `GraphError::DuplicateKey` raised by the underlying inserts.
    pub fn add_record(&mut self, record: TargetRecord) -> Result<&mut Self, GraphError> {
        let TargetRecord { label, owner, kind, deps, location } = record;
        if kind.starts_with(ANDROID_KIND_PREFIX) {
            self.add_android_target(label.clone());
        }
        if let Some(location) = location {
            if kind == SOURCE_FILE_KIND {
                self.add_file(location.file.clone(), label.clone())?;
            }
            self.add_location(label.clone(), location)?;
        }
        if let Some(owner) = owner {
            self.add_source_owner(label.clone(), owner)?;
        }
        if let Some(deps) = deps {
            self.referenced.extend(deps.iter().cloned());
            self.add_rule_deps(label.clone(), deps)?;
        }
        self.add_target_kind(label, kind)?;
        Ok(self)
    }

    /// Fold a whole record stream, stopping at the first invariant violation.
    ///
    /// # Errors
    /// The first `GraphError` raised by `add_record`.
    pub fn extend_records<I>(&mut self, records: I) -> Result<&mut Self, GraphError>
    where
        I: IntoIterator<Item = TargetRecord>,
    {
        for record in records {
            self.add_record(record)?;
        }
        Ok(self)
    }

    /// Finalize into an immutable snapshot.
    #[must_use]
    pub fn build(self) -> BuildGraph {
        let GraphBuilder {
            locations,
            source_targets,
            file_to_target,
            source_owner,
            rule_deps,
            mut project_deps,
            android_targets,
            target_to_kind,
            referenced,
        } = self;

        project_deps.extend(
            referenced
                .into_iter()
                .filter(|dep| !rule_deps.contains_key(dep) && !locations.contains_key(dep)),
        );

        tracing::debug!(
            files = file_to_target.len(),
            rules = rule_deps.len(),
            project_deps = project_deps.len(),
            "built graph snapshot"
        );

        BuildGraph {
            locations,
            source_targets,
            file_to_target,
            source_owner,
            rule_deps,
            project_deps,
            android_targets,
            target_to_kind,
            closures: ClosureCache::new(),
        }
    }

    /// Convenience: fold `records` and build.
    ///
    /// # Errors
    /// The first `GraphError` raised while folding the records.
    pub fn from_records<I>(records: I) -> Result<BuildGraph, GraphError>
    where
        I: IntoIterator<Item = TargetRecord>,
    {
        let mut builder = GraphBuilder::new();
        builder.extend_records(records)?;
        Ok(builder.build())
    }
}
