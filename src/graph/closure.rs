//! Memoized transitive external-dependency closure.
//!
//! Each snapshot owns one `ClosureCache`. A cell per label is created on first
//! request and initialised at most once. A traversal started for a label is also
//! shared: concurrent callers asking for the same label wait for the first walk
//! while callers for other labels proceed. Traversal uses an explicit stack so
//! deep dependency chains cannot overflow the thread stack.
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, OnceLock};

use super::Label;

/// Shared, immutable closure result.
pub type DepSet = Arc<BTreeSet<Label>>;

static NO_DEPS: LazyLock<DepSet> = LazyLock::new(|| Arc::new(BTreeSet::new()));

/// The shared empty result.
#[must_use]
pub fn empty_deps() -> DepSet {
    Arc::clone(&*NO_DEPS)
}

enum Frame {
    Enter(Label),
    Exit(Label),
}

#[derive(Debug, Default)]
pub struct ClosureCache {
    cells: DashMap<Label, Arc<OnceLock<DepSet>>>,
    // Walks in progress, keyed by the label they were started for
    walks: DashMap<Label, Arc<OnceLock<DepSet>>>,
    computed: AtomicUsize,
    expanded: AtomicUsize,
}

impl ClosureCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of closures computed so far. Each label contributes at most one.
    #[must_use]
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// Number of rule nodes expanded by traversals so far.
    #[must_use]
    pub fn expanded(&self) -> usize {
        self.expanded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_cached(&self, label: &Label) -> bool {
        self.cached(label).is_some()
    }

    fn cached(&self, label: &Label) -> Option<DepSet> {
        self.cells.get(label).and_then(|cell| cell.get().cloned())
    }

    fn cell(map: &DashMap<Label, Arc<OnceLock<DepSet>>>, label: &Label) -> Arc<OnceLock<DepSet>> {
        if let Some(cell) = map.get(label) {
            return Arc::clone(cell.value());
        }
        Arc::clone(map.entry(label.clone()).or_default().value())
    }

    fn fill(&self, label: &Label, compute: impl FnOnce() -> DepSet) -> DepSet {
        let cell = Self::cell(&self.cells, label);
        let value = cell.get_or_init(|| {
            self.computed.fetch_add(1, Ordering::Relaxed);
            compute()
        });
        Arc::clone(value)
    }

    /// Labels in `project_deps` reachable from `target` through `rule_deps`.
    ///
    /// A label without a `rule_deps` entry is a leaf and contributes itself; a label
    /// with an entry contributes the union of its dependencies' closures. Every label
    /// visited on the way is memoized too. A dependency edge pointing back to a label
    /// on the current path is logged and ignored so a cyclic input terminates.
    pub fn resolve(
        &self,
        target: &Label,
        rule_deps: &HashMap<Label, HashSet<Label>>,
        project_deps: &HashSet<Label>,
    ) -> DepSet {
        if let Some(done) = self.cached(target) {
            return done;
        }
        let walk = Self::cell(&self.walks, target);
        let result = Arc::clone(walk.get_or_init(|| self.walk(target, rule_deps, project_deps)));
        self.walks.remove(target);
        result
    }

    fn walk(
        &self,
        target: &Label,
        rule_deps: &HashMap<Label, HashSet<Label>>,
        project_deps: &HashSet<Label>,
    ) -> DepSet {
        let mut stack = vec![Frame::Enter(target.clone())];
        let mut on_path: HashSet<Label> = HashSet::new();
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    if on_path.contains(&node) || self.cached(&node).is_some() {
                        continue;
                    }
                    let Some(deps) = rule_deps.get(&node) else {
                        self.fill(&node, || leaf(&node, project_deps));
                        continue;
                    };
                    self.expanded.fetch_add(1, Ordering::Relaxed);
                    on_path.insert(node.clone());
                    stack.push(Frame::Exit(node.clone()));
                    for dep in deps {
                        if on_path.contains(dep) {
                            tracing::error!(from = %node, to = %dep, "dependency cycle detected, ignoring edge");
                            continue;
                        }
                        stack.push(Frame::Enter(dep.clone()));
                    }
                }
                Frame::Exit(node) => {
                    on_path.remove(&node);
                    let deps = rule_deps.get(&node);
                    self.fill(&node, || {
                        union(deps.into_iter().flatten().filter_map(|d| self.cached(d)).collect())
                    });
                }
            }
        }

        self.cached(target).unwrap_or_else(empty_deps)
    }
}

fn leaf(node: &Label, project_deps: &HashSet<Label>) -> DepSet {
    if project_deps.contains(node) {
        Arc::new(BTreeSet::from([node.clone()]))
    } else {
        empty_deps()
    }
}

// Reuses an input set when it already covers the union.
fn union(parts: Vec<DepSet>) -> DepSet {
    let mut parts: Vec<DepSet> = parts.into_iter().filter(|p| !p.is_empty()).collect();
    let Some(largest_idx) = (0..parts.len()).max_by_key(|&i| parts[i].len()) else {
        return empty_deps();
    };
    let largest = parts.swap_remove(largest_idx);
    if parts.iter().all(|p| Arc::ptr_eq(p, &largest) || p.is_subset(&largest)) {
        return largest;
    }
    let mut merged: BTreeSet<Label> = (*largest).clone();
    for p in &parts {
        merged.extend(p.iter().cloned());
    }
    Arc::new(merged)
}
