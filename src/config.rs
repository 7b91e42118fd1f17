//! # Build Configuration
//!
//! Everything the pipeline needs is resolved once, up front, into a [`BuildConfig`].
//! The interpreter override (`PYTHON`) is read exactly once here and then threaded
//! through the orchestrator as a plain value, so no step ever consults the
//! environment on its own.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::debug;

/// Environment variable that overrides the interpreter executable.
pub const INTERPRETER_ENV: &str = "PYTHON";

/// Interpreter used when [`INTERPRETER_ENV`] is unset or empty.
pub const DEFAULT_INTERPRETER: &str = "python";

/// Name of the persistent build log, written beside the project.
pub const LOG_FILE_NAME: &str = "build.log";

/// Name of the packaged executable (without platform suffix).
pub const EXE_NAME: &str = "barcode-reader";

/// Resolved settings for a single build run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory every relative path is resolved against.
    pub project_dir: PathBuf,
    /// Interpreter used as the leading token of every invocation.
    pub interpreter: String,
    /// Dependency list handed to pip, relative to `project_dir`.
    pub requirements: PathBuf,
    /// Application entry point handed to the packager.
    pub entry_point: PathBuf,
    /// Extra import path for the packager (`--paths`).
    pub search_path: PathBuf,
    /// Base name of the produced executable.
    pub exe_name: String,
    /// Packager scratch directory.
    pub build_dir: PathBuf,
    /// Packager output directory.
    pub dist_dir: PathBuf,
    /// Absolute path of the build log when the log variant is enabled.
    pub log_file: Option<PathBuf>,
}

impl BuildConfig {
    /// Creates a configuration with the standard project layout.
    pub fn new(project_dir: impl Into<PathBuf>, interpreter: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            interpreter: interpreter.into(),
            requirements: PathBuf::from("requirements.txt"),
            entry_point: PathBuf::from("app").join("cli.py"),
            search_path: PathBuf::from("app"),
            exe_name: EXE_NAME.to_string(),
            build_dir: PathBuf::from("build"),
            dist_dir: PathBuf::from("dist"),
            log_file: None,
        }
    }

    /// Builds the configuration from the process environment.
    ///
    /// This is the only place [`INTERPRETER_ENV`] is read.
    pub fn from_env(project_dir: impl Into<PathBuf>, log: bool) -> Self {
        let interpreter = resolve_interpreter(std::env::var(INTERPRETER_ENV).ok());
        debug!("Interpreter resolved to {:?}", interpreter);

        let config = Self::new(project_dir, interpreter);
        if log { config.with_log_file() } else { config }
    }

    /// Enables the log variant, placing the log file beside the project.
    #[must_use]
    pub fn with_log_file(mut self) -> Self {
        self.log_file = Some(self.project_dir.join(LOG_FILE_NAME));
        self
    }

    /// The executable file name including the platform suffix (`.exe` on Windows).
    pub fn exe_file_name(&self) -> String {
        format!("{}{}", self.exe_name, std::env::consts::EXE_SUFFIX)
    }

    /// Expected location of the packaged executable, relative to the project.
    pub fn artifact_path(&self) -> PathBuf {
        self.dist_dir.join(self.exe_file_name())
    }

    /// The interpreter as the build will resolve it once inside the project directory.
    ///
    /// A bare name (`python3.11`) is left for a `PATH` search. A relative path
    /// (`venv/bin/python`) is anchored at the project directory.
    pub fn interpreter_location(&self) -> String {
        let path = Path::new(&self.interpreter);
        if path.is_relative() && path.components().count() > 1 {
            self.project_dir.join(path).to_string_lossy().into_owned()
        } else {
            self.interpreter.clone()
        }
    }

    /// Resolves a project-relative path to an absolute one.
    pub fn project_path(&self, relative: &Path) -> PathBuf {
        self.project_dir.join(relative)
    }
}

/// Picks the interpreter: the override if it is non-empty, otherwise [`DEFAULT_INTERPRETER`].
pub fn resolve_interpreter(override_value: Option<String>) -> String {
    override_value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string())
}

/// Determines the project directory.
///
/// Order of preference:
/// 1. The explicit `--project-dir` value.
/// 2. The directory holding the running executable, if it contains `requirements.txt`.
/// 3. The current working directory.
pub fn locate_project_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return std::fs::canonicalize(&dir)
            .with_context(|| format!("Project directory {} does not exist", dir.display()));
    }

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        if exe_dir.join("requirements.txt").is_file() {
            return Ok(exe_dir);
        }
    }

    std::env::current_dir().context("Failed to read the current working directory")
}
