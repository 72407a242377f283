//! querysync: build graph snapshots for IDE project sync
//!
//! Run a dependency query against a Bazel-style build tool, turn its output into an
//! immutable `BuildGraph`, and answer "which external targets does this source file
//! transitively need?" from that snapshot.
//!
//! # Features
//! - Streamed JSON query output decoding with configurable source rule kinds
//! - Immutable snapshots with a memoized, single-flight transitive closure per target
//! - Cancellable build tool invocation; partial results (exit code 3) are kept
//! - Queries: owning target, file dependencies, target closure, source file listings
//!
//! # Quickstart (Library)
//! ```no_run
//! use querysync::parser::RuleKinds;
//! use querysync::sync::ingest;
//!
//! let bytes = std::fs::read("query_output.jsonl").expect("read query output");
//! let graph = ingest(&bytes, &RuleKinds::default()).expect("build graph");
//! let deps = graph.file_dependencies(std::path::Path::new("java/com/foo/Bar.java"));
//! println!("{} external deps", deps.len());
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! querysync sync --path .
//! querysync query deps --input query_output.jsonl --file java/com/foo/Bar.java --format json
//! ```
pub mod app;
pub mod cli;
pub mod errors;
pub mod graph;
pub mod parser;
pub mod query;
pub mod sync;
pub mod utils;
