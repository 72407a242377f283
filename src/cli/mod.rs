use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "querysync",
    version,
    about = "Build graph snapshots for IDE project sync",
    long_about = "Run a dependency query against a Bazel-style build tool and answer which external targets each source file transitively needs. Use --input to work from a previously captured `query --output=streamed_jsonproto` result instead of invoking the tool."
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Suppress informational output on stdout
    #[arg(short, long, default_value_t = false, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKindArg {
    All,
    Language,
    Android,
}

/// Where a command gets its graph from.
#[derive(Debug, Clone, Default, Args)]
pub struct GraphSource {
    /// Workspace root. Defaults to the nearest ancestor with a MODULE.bazel or WORKSPACE file
    #[arg(short, long)]
    pub path: Option<PathBuf>,
    /// Path to a TOML configuration file (default: querysync.toml in the workspace root)
    #[arg(long)]
    pub config: Option<String>,
    /// Captured streamed_jsonproto query output to use instead of running the build tool
    #[arg(long)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the build tool query and build a graph snapshot
    Sync {
        #[command(flatten)]
        source: GraphSource,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run queries over a graph snapshot
    Query {
        #[command(subcommand)]
        query: QueryCommands,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum QueryCommands {
    /// Show the rule that builds a source file
    Owner {
        #[command(flatten)]
        source: GraphSource,
        /// Source file, relative to the workspace root or absolute
        #[arg(long)]
        file: PathBuf,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List the external targets a source file transitively depends on
    Deps {
        #[command(flatten)]
        source: GraphSource,
        /// Source file, relative to the workspace root or absolute
        #[arg(long)]
        file: PathBuf,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List the external targets reachable from a target
    Closure {
        #[command(flatten)]
        source: GraphSource,
        /// Target label, e.g. //java/com/foo:bar
        #[arg(long)]
        target: String,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List tracked source files
    Sources {
        #[command(flatten)]
        source: GraphSource,
        /// Which files to list
        #[arg(long, value_enum, default_value_t = SourceKindArg::All)]
        kind: SourceKindArg,
        /// Only files owned by rules of this kind (e.g. java_library); overrides --kind
        #[arg(long)]
        rule_kind: Option<String>,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List source files whose dependencies include an external target
    Dependents {
        #[command(flatten)]
        source: GraphSource,
        /// External target label, e.g. @maven//:com_google_guava_guava
        #[arg(long)]
        dependency: String,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
