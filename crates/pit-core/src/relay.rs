use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::config::MARKER_DIR;

pub const START_SCRIPT: &str = "start.sh";
pub const STOP_SCRIPT: &str = "stop.sh";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to write relay file: {0}")]
    Io(#[from] std::io::Error),
}

/// Passes a single shell command to the invoking shell. The wrapper script
/// sources the relay file right after this process exits, so the file always
/// holds exactly one command and is safe to overwrite on every run.
pub struct Relay {
    path: PathBuf,
}

impl Relay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn emit(&self, command: &str) -> Result<(), RelayError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{command}\n"))?;
        debug!("relayed {command:?} via {}", self.path.display());
        Ok(())
    }
}

fn quote_path(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// `goto` — change the shell's working directory to the project.
pub fn goto_command(project_path: &Path) -> String {
    format!("cd {}", quote_path(project_path))
}

/// `start`/`stop` — source the per-project script from the marker directory,
/// or nothing when the script does not exist.
pub fn script_command(project_path: &Path, script: &str) -> Option<String> {
    let script_path = project_path.join(MARKER_DIR).join(script);
    if !script_path.is_file() {
        return None;
    }
    Some(format!(". {}", quote_path(&script_path)))
}

/// `open` — an action appropriate to the pit's group: environments are
/// activated in the invoking shell, everything else goes to the platform
/// opener.
pub fn open_command(group: Option<&str>, location: &str) -> String {
    match group {
        Some("env") => {
            let path = Path::new(location);
            let activate = if path.is_file() {
                path.to_path_buf()
            } else {
                path.join("bin").join("activate")
            };
            format!(". {}", quote_path(&activate))
        }
        _ => format!(
            "{} {}",
            opener(),
            shell_words::quote(location).into_owned()
        ),
    }
}

fn opener() -> &'static str {
    for candidate in ["xdg-open", "open"] {
        if which::which(candidate).is_ok() {
            return candidate;
        }
    }
    "xdg-open"
}
