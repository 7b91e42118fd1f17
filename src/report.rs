//! Machine-readable summary of a build run (`--report <PATH>`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::Serialize;
use crate::config::BuildConfig;
use crate::orchestrator::{BuildOutcome, StepRecord};

#[derive(Debug, Serialize)]
pub struct BuildReport<'a> {
    pub interpreter: &'a str,
    pub project_dir: &'a Path,
    pub artifact: &'a Path,
    pub log_file: Option<&'a Path>,
    pub succeeded: bool,
    pub exit_code: i32,
    pub message: String,
    pub steps: &'a [StepRecord],
}

impl<'a> BuildReport<'a> {
    pub fn new(config: &'a BuildConfig, outcome: &'a BuildOutcome) -> Self {
        Self {
            interpreter: &config.interpreter,
            project_dir: &config.project_dir,
            artifact: &outcome.artifact,
            log_file: outcome.log_file.as_deref(),
            succeeded: outcome.succeeded(),
            exit_code: outcome.exit_code(),
            message: outcome.message(),
            steps: &outcome.records,
        }
    }
}

/// Writes the report as pretty JSON to `path`, resolved against the project directory if relative.
pub fn write(config: &BuildConfig, outcome: &BuildOutcome, path: &Path) -> Result<PathBuf> {
    let target = config.project_path(path);
    let file = File::create(&target)
        .with_context(|| format!("Failed to create report at {}", target.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &BuildReport::new(config, outcome))
        .context("Failed to serialise build report")?;
    writer.flush()?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_log::BuildLog;
    use crate::orchestrator::run_build;
    use crate::system::MockSystem;

    #[test]
    fn report_captures_steps_and_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::new(dir.path(), "python");
        let system = MockSystem::new().exit_with("PyInstaller", 3);
        let outcome = run_build(&config, &system, &mut BuildLog::disabled());

        let written = write(&config, &outcome, Path::new("report.json")).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written).unwrap()).unwrap();

        assert_eq!(json["succeeded"], false);
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["interpreter"], "python");
        let steps = json["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0]["step"], "upgrade_pip");
        assert_eq!(steps[2]["exit_code"], serde_json::Value::Null);
        assert_eq!(steps[3]["step"], "package");
        assert_eq!(steps[3]["status"], "failed");
        assert_eq!(steps[3]["exit_code"], 3);
    }
}
