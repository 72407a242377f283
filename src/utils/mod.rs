pub mod table {
    // Helper to render a separator line
    fn sep(widths: &[usize]) -> String {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    }

    // Helper to render a row line
    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (i, cell) in cells.iter().enumerate() {
            let w = widths[i];
            s.push(' ');
            s.push_str(cell);
            let len = cell.chars().count();
            if len < w {
                s.push_str(&" ".repeat(w - len));
            }
            s.push_str(" |");
        }
        s
    }

    /// Render an ASCII table given headers and rows. Missing cells render empty.
    #[must_use]
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let cols = headers.len();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (c, w) in widths.iter_mut().enumerate().take(cols) {
                *w = (*w).max(row.get(c).map_or(0, |cell| cell.chars().count()));
            }
        }

        let mut out = String::new();
        out.push_str(&sep(&widths));
        out.push('\n');
        let header_cells: Vec<String> = headers.iter().map(|s| (*s).to_string()).collect();
        out.push_str(&line(&header_cells, &widths));
        out.push('\n');
        out.push_str(&sep(&widths));
        out.push('\n');
        for row in rows {
            let cells: Vec<String> = (0..cols).map(|i| row.get(i).cloned().unwrap_or_default()).collect();
            out.push_str(&line(&cells, &widths));
            out.push('\n');
        }
        out.push_str(&sep(&widths));
        out
    }

}

pub mod config {
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    pub const CONFIG_FILE_NAME: &str = "querysync.toml";

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct QueryConfig {
        pub binary: Option<String>,
        pub targets: Option<Vec<String>>,
        pub flags: Option<Vec<String>>,
        pub default_format: Option<String>, // "text" | "json"
        pub warm_cache: Option<bool>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct RulesConfig {
        pub source_kinds: Option<Vec<String>>,
        pub source_attributes: Option<Vec<String>>,
        pub dependency_attributes: Option<Vec<String>>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    pub struct Config {
        pub root: Option<String>,
        pub query: Option<QueryConfig>,
        pub rules: Option<RulesConfig>,
    }

    impl Config {
        #[must_use]
        pub fn default_format(&self) -> Option<&str> {
            self.query.as_ref().and_then(|q| q.default_format.as_deref())
        }

        #[must_use]
        pub fn warm_cache(&self) -> bool {
            self.query.as_ref().and_then(|q| q.warm_cache).unwrap_or(false)
        }
    }

    fn default_config_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    #[must_use]
    pub fn load_config_at(path: &Path) -> Option<Config> {
        let data = fs::read_to_string(path).ok()?;
        match toml::from_str::<Config>(&data) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                None
            }
        }
    }

    #[must_use]
    pub fn load_config_near(root: &Path) -> Option<Config> {
        let p = default_config_path(root);
        if p.exists() {
            load_config_at(&p)
        } else {
            None
        }
    }
}

pub mod project_root {
    use std::env;
    use std::path::{Path, PathBuf};

    const WORKSPACE_MARKERS: &[&str] = &["MODULE.bazel", "WORKSPACE.bazel", "WORKSPACE"];

    fn is_workspace_root(dir: &Path) -> bool {
        WORKSPACE_MARKERS.iter().any(|m| dir.join(m).is_file())
    }

    /// Detect the workspace root by walking ancestors looking for a workspace marker file.
    #[must_use]
    pub fn detect(start: Option<&Path>) -> PathBuf {
        let fallback = || env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut cur = start.map_or_else(fallback, Path::to_path_buf);
        loop {
            if is_workspace_root(&cur) {
                return cur;
            }
            match cur.parent() {
                Some(parent) => cur = parent.to_path_buf(),
                None => return fallback(),
            }
        }
    }

    /// None or "." resolve to the detected workspace root; any other path is returned as-is.
    #[must_use]
    pub fn effective_path_opt(p: Option<&Path>) -> PathBuf {
        match p {
            None => detect(None),
            Some(path) if path == Path::new(".") => detect(None),
            Some(path) => path.to_path_buf(),
        }
    }

}

pub mod logging {
    use tracing_subscriber::EnvFilter;

    /// Install a stderr subscriber. `RUST_LOG` wins over `verbosity`
    /// (0 = warn, 1 = info, 2 = debug, 3+ = trace). Safe to call more than once.
    pub fn init(verbosity: u8) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            let level = match verbosity {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(format!("querysync={level}"))
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    }
}
