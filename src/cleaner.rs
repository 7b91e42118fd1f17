//! # Cleaner Logic
//!
//! Removes the packager's previous outputs (`build/` then `dist/`) before a new
//! package step. Removal is best-effort: a directory that cannot be deleted is
//! logged as a warning and the build carries on, since the packager recreates
//! both directories anyway.

use std::path::PathBuf;
use log::debug;
use crate::build_log::BuildLog;
use crate::config::BuildConfig;
use crate::system::SystemOps;

/// What the clean step did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanSummary {
    /// Directories that were present and removed.
    pub removed: Vec<PathBuf>,
    /// Directories that were present but could not be removed.
    pub failed: Vec<PathBuf>,
}

impl CleanSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The output directories that currently exist, relative to the project.
pub fn present_outputs(config: &BuildConfig, system: &impl SystemOps) -> Vec<PathBuf> {
    [&config.build_dir, &config.dist_dir]
        .into_iter()
        .filter(|relative| system.dir_exists(&config.project_path(relative)))
        .cloned()
        .collect()
}

/// Deletes the build and dist directories of `config`, in that order.
pub fn clean_outputs(config: &BuildConfig, system: &impl SystemOps, log: &mut BuildLog) -> CleanSummary {
    let mut summary = CleanSummary::default();

    for relative in [&config.build_dir, &config.dist_dir] {
        let dir = config.project_path(relative);
        if !system.dir_exists(&dir) {
            debug!("{:?} not present, nothing to remove", dir);
            continue;
        }

        match system.remove_dir(&dir) {
            Ok(entries) => {
                log.record(&format!("Removed {} ({} entries)", relative.display(), entries));
                summary.removed.push(relative.clone());
            }
            Err(e) => {
                log.record_warning(&format!("Could not remove {}: {:#}", relative.display(), e));
                summary.failed.push(relative.clone());
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{HostSystem, MockSystem};

    #[test]
    fn removes_build_then_dist() {
        let config = BuildConfig::new("/project", "python");
        let system = MockSystem::new()
            .with_dir("/project/build")
            .with_dir("/project/dist");

        let summary = clean_outputs(&config, &system, &mut BuildLog::disabled());

        assert_eq!(summary.removed, vec![PathBuf::from("build"), PathBuf::from("dist")]);
        assert!(summary.is_clean());
        assert!(system.dirs.lock().unwrap().is_empty());
    }

    #[test]
    fn present_outputs_only_reports_existing_dirs() {
        let config = BuildConfig::new("/project", "python");
        let system = MockSystem::new().with_dir("/project/dist");
        assert_eq!(present_outputs(&config, &system), vec![PathBuf::from("dist")]);
        assert!(system.dir_exists(std::path::Path::new("/project/dist")));
    }

    #[test]
    fn second_clean_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("build").join("barcode-reader")).unwrap();
        std::fs::create_dir_all(root.path().join("dist")).unwrap();
        let config = BuildConfig::new(root.path(), "python");

        let first = clean_outputs(&config, &HostSystem, &mut BuildLog::disabled());
        let second = clean_outputs(&config, &HostSystem, &mut BuildLog::disabled());

        assert_eq!(first.removed.len(), 2);
        assert_eq!(second, CleanSummary::default());
        assert!(!root.path().join("build").exists());
        assert!(!root.path().join("dist").exists());
    }

    #[test]
    fn locked_directory_is_a_warning_not_an_abort() {
        let root = tempfile::tempdir().unwrap();
        let log_path = root.path().join("build.log");
        let config = BuildConfig::new("/project", "python");
        let system = MockSystem::new()
            .with_locked_dir("/project/build")
            .with_dir("/project/dist");

        let mut log = BuildLog::create(&log_path).unwrap();
        let summary = clean_outputs(&config, &system, &mut log);
        drop(log);

        assert_eq!(summary.failed, vec![PathBuf::from("build")]);
        assert_eq!(summary.removed, vec![PathBuf::from("dist")]);
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Could not remove build"));
    }
}
