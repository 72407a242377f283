use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use crate::graph::{BuildGraph, EMPTY};

/// The snapshot readers should use right now.
///
/// Starts out as the shared `EMPTY` graph and is replaced wholesale after every
/// successful sync. Readers take an `Arc` and keep querying that snapshot even if
/// a newer one is published meanwhile; nothing is ever mutated in place.
#[derive(Debug)]
pub struct CurrentGraph {
    snapshot: RwLock<Arc<BuildGraph>>,
    generation: AtomicU64,
}

impl Default for CurrentGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrentGraph {
    #[must_use]
    pub fn new() -> Self {
        Self { snapshot: RwLock::new(Arc::clone(&*EMPTY)), generation: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn load(&self) -> Arc<BuildGraph> {
        Arc::clone(&*self.snapshot.read())
    }

    /// Publish `graph` and return the snapshot it replaces.
    pub fn replace(&self, graph: BuildGraph) -> Arc<BuildGraph> {
        self.publish(Arc::new(graph))
    }

    fn publish(&self, next: Arc<BuildGraph>) -> Arc<BuildGraph> {
        let previous = {
            let mut slot = self.snapshot.write();
            std::mem::replace(&mut *slot, next)
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation, "published new graph snapshot");
        previous
    }

    /// Number of snapshots published so far, resets included.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drop back to the empty snapshot, e.g. when the project is closed.
    pub fn reset(&self) {
        self.publish(Arc::clone(&*EMPTY));
    }
}

static CURRENT: LazyLock<CurrentGraph> = LazyLock::new(CurrentGraph::new);

/// The process-wide current graph.
#[must_use]
pub fn current() -> &'static CurrentGraph {
    &CURRENT
}
