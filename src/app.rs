use crate::cli::{Cli, Commands, GraphSource, OutputFormat, QueryCommands, SourceKindArg};
use crate::graph::{BuildGraph, Label};
use crate::query::{
    DependentFilesQuery, FileDependenciesQuery, OwningTargetQuery, Query, SourceFilesQuery, SourceKind,
    TransitiveDepsQuery,
};
use crate::sync::{self, QueryInvocation, QueryOutcome, QueryStatus, SyncOptions, SyncReport};
use crate::utils::config::{load_config_at, load_config_near, Config};
use crate::utils::project_root::effective_path_opt;
use clap::CommandFactory;
use clap_complete::generate;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A workspace with its configuration, resolved from `GraphSource` flags.
struct Workspace {
    root: PathBuf,
    config: Option<Config>,
}

impl Workspace {
    fn resolve(source: &GraphSource) -> Self {
        let root = effective_path_opt(source.path.as_deref());
        let config = match source.config.as_deref() {
            Some(p) => load_config_at(Path::new(p)),
            None => load_config_near(&root),
        };
        Self { root, config }
    }

    // Where the build tool runs; `root` in the config is relative to the workspace.
    fn query_dir(&self) -> PathBuf {
        match self.config.as_ref().and_then(|c| c.root.as_deref()) {
            Some(r) => self.root.join(r),
            None => self.root.clone(),
        }
    }

    fn format(&self, requested: OutputFormat) -> OutputFormat {
        match self.config.as_ref().and_then(Config::default_format) {
            Some("json") => OutputFormat::Json,
            Some("text") => OutputFormat::Text,
            _ => requested,
        }
    }

    // Graph keys are workspace-relative; accept absolute paths under the root too.
    fn relative(&self, file: &Path) -> PathBuf {
        file.strip_prefix(&self.root).map_or_else(|_| file.to_path_buf(), Path::to_path_buf)
    }
}

/// Build and publish a snapshot from captured output or a live build tool query.
fn sync_workspace(ws: &Workspace, source: &GraphSource) -> Result<SyncReport, String> {
    let options = SyncOptions::from_config(ws.config.as_ref());
    let cancel = CancellationToken::new();
    let target = sync::current();
    if let Some(input) = &source.input {
        let stdout = fs::read(input).map_err(|e| format!("Failed to read query output {}: {e}", input.display()))?;
        let outcome = QueryOutcome { status: QueryStatus::Complete, stdout };
        return sync::sync_from_output(outcome, &options, &cancel, target).map_err(|e| format!("Sync failed: {e}"));
    }
    let invocation = QueryInvocation::build_tool_query(ws.config.as_ref().and_then(|c| c.query.as_ref()), &ws.query_dir());
    sync::run_sync(&invocation, &options, &cancel, target).map_err(|e| format!("Sync failed: {e}"))
}

fn load_graph(ws: &Workspace, source: &GraphSource) -> Result<Arc<BuildGraph>, String> {
    sync_workspace(ws, source)?;
    Ok(sync::current().load())
}

fn parse_label(raw: &str) -> Result<Label, i32> {
    Label::parse(raw).map_err(|e| {
        eprintln!("Invalid label {raw}: {e}");
        2
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            eprintln!("JSON encode error: {e}");
            1
        }
    }
}

fn print_labels(labels: &[Label], fmt: OutputFormat) -> i32 {
    if matches!(fmt, OutputFormat::Json) {
        let out: Vec<&str> = labels.iter().map(Label::as_str).collect();
        return print_json(&out);
    }
    let rows: Vec<Vec<String>> =
        labels.iter().enumerate().map(|(i, l)| vec![format!("{}", i + 1), l.to_string()]).collect();
    println!("{}", crate::utils::table::render(&["#", "Label"], &rows));
    0
}

fn print_paths(paths: &[PathBuf], fmt: OutputFormat) -> i32 {
    if matches!(fmt, OutputFormat::Json) {
        let out: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        return print_json(&out);
    }
    let rows: Vec<Vec<String>> =
        paths.iter().enumerate().map(|(i, p)| vec![format!("{}", i + 1), p.display().to_string()]).collect();
    println!("{}", crate::utils::table::render(&["#", "Path"], &rows));
    0
}

#[derive(Serialize)]
struct SyncRow<'a> {
    workspace: String,
    status: &'a str,
    generation: u64,
    prefetched: usize,
    #[serde(flatten)]
    summary: crate::graph::GraphSummary,
}

fn status_name(status: QueryStatus) -> &'static str {
    match status {
        QueryStatus::Complete => "complete",
        QueryStatus::Partial => "partial",
    }
}

/// Run the CLI logic in-process.
///
/// Returns an exit code (0 = success, 1 = failure, 2 = invalid argument).
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = env!("CARGO_PKG_NAME");
            let mut out = io::stdout();
            generate(shell, &mut cmd, bin_name, &mut out);
            0
        }
        Commands::Sync { source, format } => {
            let ws = Workspace::resolve(&source);
            let report = match sync_workspace(&ws, &source) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("{e}");
                    return 1;
                }
            };
            let row = SyncRow {
                workspace: ws.root.display().to_string(),
                status: status_name(report.status),
                generation: report.generation,
                prefetched: report.prefetched,
                summary: report.summary,
            };
            if matches!(ws.format(format), OutputFormat::Json) {
                return print_json(&row);
            }
            if matches!(report.status, QueryStatus::Partial) {
                eprintln!("Warning: the build tool reported a partial result; some targets may be missing");
            }
            if !cli.quiet {
                let s = row.summary;
                let body = vec![
                    vec!["source files".to_string(), s.source_files.to_string()],
                    vec!["source targets".to_string(), s.source_targets.to_string()],
                    vec!["rules".to_string(), s.rules.to_string()],
                    vec!["external targets".to_string(), s.project_deps.to_string()],
                    vec!["android rules".to_string(), s.android_targets.to_string()],
                ];
                println!("{}", crate::utils::table::render(&["Entry", "Count"], &body));
                println!("Sync {} for workspace: {}", row.status, row.workspace);
            }
            0
        }
        Commands::Query { query } => match query {
            QueryCommands::Owner { source, file, format } => {
                let ws = Workspace::resolve(&source);
                let graph = match load_graph(&ws, &source) {
                    Ok(g) => g,
                    Err(e) => {
                        eprintln!("{e}");
                        return 1;
                    }
                };
                let file = ws.relative(&file);
                let owner = OwningTargetQuery::new(&file).run(&graph);
                if matches!(ws.format(format), OutputFormat::Json) {
                    #[derive(Serialize)]
                    struct Row {
                        file: String,
                        owner: Option<String>,
                    }
                    return print_json(&Row { file: file.display().to_string(), owner: owner.map(String::from) });
                }
                match owner {
                    Some(o) => println!("{o}"),
                    None => println!("<no owning target>"),
                }
                0
            }
            QueryCommands::Deps { source, file, format } => {
                let ws = Workspace::resolve(&source);
                let graph = match load_graph(&ws, &source) {
                    Ok(g) => g,
                    Err(e) => {
                        eprintln!("{e}");
                        return 1;
                    }
                };
                let deps = FileDependenciesQuery::new(ws.relative(&file)).run(&graph);
                print_labels(&deps, ws.format(format))
            }
            QueryCommands::Closure { source, target, format } => {
                let target = match parse_label(&target) {
                    Ok(l) => l,
                    Err(code) => return code,
                };
                let ws = Workspace::resolve(&source);
                let graph = match load_graph(&ws, &source) {
                    Ok(g) => g,
                    Err(e) => {
                        eprintln!("{e}");
                        return 1;
                    }
                };
                let deps = TransitiveDepsQuery::new(target).run(&graph);
                print_labels(&deps, ws.format(format))
            }
            QueryCommands::Sources { source, kind, rule_kind, format } => {
                let ws = Workspace::resolve(&source);
                let graph = match load_graph(&ws, &source) {
                    Ok(g) => g,
                    Err(e) => {
                        eprintln!("{e}");
                        return 1;
                    }
                };
                let kind = match (rule_kind, kind) {
                    (Some(k), _) => SourceKind::RuleKind(k),
                    (None, SourceKindArg::All) => SourceKind::All,
                    (None, SourceKindArg::Language) => SourceKind::Language,
                    (None, SourceKindArg::Android) => SourceKind::Android,
                };
                let files = SourceFilesQuery::new(kind).run(&graph);
                print_paths(&files, ws.format(format))
            }
            QueryCommands::Dependents { source, dependency, format } => {
                let dependency = match parse_label(&dependency) {
                    Ok(l) => l,
                    Err(code) => return code,
                };
                let ws = Workspace::resolve(&source);
                let graph = match load_graph(&ws, &source) {
                    Ok(g) => g,
                    Err(e) => {
                        eprintln!("{e}");
                        return 1;
                    }
                };
                let files = DependentFilesQuery::new(dependency).run(&graph);
                print_paths(&files, ws.format(format))
            }
        },
    }
}
