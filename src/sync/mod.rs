//! Sync orchestration: run the build tool query, decode its output, build a
//! snapshot and publish it.
//!
//! A sync either publishes one complete `BuildGraph` or leaves the current one
//! untouched. Cancellation is reported as `SyncError::Cancelled`, separately
//! from failures.
use tokio_util::sync::CancellationToken;

use crate::errors::SyncError;
use crate::graph::{BuildGraph, GraphBuilder, GraphSummary};
use crate::parser::{QueryOutputParser, RuleKinds};
use crate::utils::config::Config;

pub mod current;
pub mod runner;

pub use current::{current, CurrentGraph};
pub use runner::{query_expression, QueryInvocation, QueryOutcome, QueryStatus, PARTIAL_RESULT_EXIT_CODE};

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub kinds: RuleKinds,
    /// Precompute every owning rule's closure before publishing.
    pub warm_cache: bool,
}

impl SyncOptions {
    #[must_use]
    pub fn from_config(cfg: Option<&Config>) -> Self {
        Self {
            kinds: RuleKinds::from_config(cfg.and_then(|c| c.rules.as_ref())),
            warm_cache: cfg.is_some_and(Config::warm_cache),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub status: QueryStatus,
    pub summary: GraphSummary,
    pub generation: u64,
    pub prefetched: usize,
}

/// Decode query output and build a snapshot from it.
///
/// # Errors
/// `SyncError::Parse` for undecodable output, `SyncError::Graph` for invariant violations.
pub fn ingest(bytes: &[u8], kinds: &RuleKinds) -> Result<BuildGraph, SyncError> {
    let records = QueryOutputParser::new(kinds.clone()).parse(bytes)?;
    let graph = GraphBuilder::from_records(records)?;
    Ok(graph)
}

/// Build from already captured output and publish into `target`.
///
/// # Errors
/// See `ingest`; `SyncError::Cancelled` if `cancel` fires before publishing.
pub fn sync_from_output(
    outcome: QueryOutcome,
    options: &SyncOptions,
    cancel: &CancellationToken,
    target: &CurrentGraph,
) -> Result<SyncReport, SyncError> {
    let graph = ingest(&outcome.stdout, &options.kinds)?;
    let prefetched = if options.warm_cache { graph.prefetch_file_dependencies() } else { 0 };
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    let summary = graph.summary();
    target.replace(graph);
    let report = SyncReport { status: outcome.status, summary, generation: target.generation(), prefetched };
    tracing::info!(
        generation = report.generation,
        files = summary.source_files,
        rules = summary.rules,
        project_deps = summary.project_deps,
        partial = matches!(report.status, QueryStatus::Partial),
        "sync complete"
    );
    Ok(report)
}

/// Run `invocation`, then build and publish its result.
///
/// # Errors
/// Any `SyncError`; on error the snapshot in `target` is unchanged.
pub fn run_sync(
    invocation: &QueryInvocation,
    options: &SyncOptions,
    cancel: &CancellationToken,
    target: &CurrentGraph,
) -> Result<SyncReport, SyncError> {
    let outcome = invocation.run(cancel)?;
    sync_from_output(outcome, options, cancel, target).inspect_err(|e| {
        if !e.is_cancelled() {
            tracing::warn!(error = %e, "sync failed, keeping previous graph");
        }
    })
}
