use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::SyncError;
use crate::utils::config::QueryConfig;

/// Exit code the build tool uses for a usable but possibly incomplete result,
/// e.g. when a queried directory does not exist.
pub const PARTIAL_RESULT_EXIT_CODE: i32 = 3;

const DEFAULT_BINARY: &str = "bazel";
const DEFAULT_TARGET_PATTERN: &str = "//...";
const MAX_LOGGED_COMMAND_LEN: usize = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Trailing stderr lines kept for the error of a failed run.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Complete,
    /// Exit code 3: keep the result, but it may be missing targets.
    Partial,
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub status: QueryStatus,
    pub stdout: Vec<u8>,
}

/// One external build tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInvocation {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl QueryInvocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), working_dir: None, env: Vec::new() }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The standard dependency-graph query for `workspace`:
    /// `<binary> query --output=streamed_jsonproto --relative_locations=true <flags> <expr>`.
    #[must_use]
    pub fn build_tool_query(cfg: Option<&QueryConfig>, workspace: &Path) -> Self {
        let binary = cfg.and_then(|c| c.binary.clone()).unwrap_or_else(|| DEFAULT_BINARY.to_string());
        let targets = cfg.and_then(|c| c.targets.clone()).unwrap_or_default();
        let flags = cfg.and_then(|c| c.flags.clone()).unwrap_or_default();
        Self::new(binary)
            .args(["query", "--output=streamed_jsonproto", "--relative_locations=true"])
            .args(flags)
            .arg(query_expression(&targets))
            .working_dir(workspace)
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Printable command line, shortened for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|a| if a.contains(char::is_whitespace) { format!("'{a}'") } else { a.to_string() })
            .collect::<Vec<_>>()
            .join(" ");
        if line.len() > MAX_LOGGED_COMMAND_LEN {
            let mut cut = MAX_LOGGED_COMMAND_LEN;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
            line.push_str("...");
        }
        line
    }

    /// Run to completion, capturing stdout and logging stderr line by line.
    /// The last stderr lines are attached to `ToolFailed`.
    ///
    /// Blocks the calling thread. `cancel` is polled while the process runs; once it
    /// fires the process is killed and `SyncError::Cancelled` is returned with no output.
    ///
    /// # Errors
    /// `Spawn` if the program cannot be started, `Cancelled` on cancellation,
    /// `ToolFailed` for any exit code other than 0 or 3, `Io` for pipe failures.
    pub fn run(&self, cancel: &CancellationToken) -> Result<QueryOutcome, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        tracing::info!(command = %self.command_line(), "running build tool query");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        let mut child = cmd
            .spawn()
            .map_err(|source| SyncError::Spawn { program: self.program.clone(), source })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_reader = thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            if let Some(mut s) = stdout {
                s.read_to_end(&mut buf)?;
            }
            Ok(buf)
        });
        let err_reader = thread::spawn(move || {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(s) = stderr {
                for line in BufReader::new(s).lines().map_while(Result::ok) {
                    tracing::info!(target: "querysync::build_tool", "{line}");
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail
        });

        // Readers are left to drain on their own after an abort; a grandchild may still hold the pipes.
        let status = loop {
            if cancel.is_cancelled() {
                abort(&mut child);
                tracing::info!(program = %self.program, "build tool query cancelled");
                return Err(SyncError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    abort(&mut child);
                    tracing::warn!(program = %self.program, error = %err, "lost track of build tool process");
                    return Err(err.into());
                }
            }
        };

        let stdout = out_reader.join().map_err(|_| io::Error::other("stdout reader panicked"))??;
        let stderr: Vec<String> = err_reader.join().map(Vec::from).unwrap_or_default();

        match status.code() {
            Some(0) => Ok(QueryOutcome { status: QueryStatus::Complete, stdout }),
            Some(PARTIAL_RESULT_EXIT_CODE) => {
                tracing::warn!("build tool reported a partial result (exit code 3)");
                Ok(QueryOutcome { status: QueryStatus::Partial, stdout })
            }
            code => Err(SyncError::ToolFailed { code, stderr }),
        }
    }
}

fn abort(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Union of `targets` in query syntax; the whole workspace when empty.
#[must_use]
pub fn query_expression(targets: &[String]) -> String {
    let parts: Vec<&str> = targets.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if parts.is_empty() {
        DEFAULT_TARGET_PATTERN.to_string()
    } else {
        parts.join(" + ")
    }
}
