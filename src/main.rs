//! # barcode-build: The Main Entry Point
//!
//! This module handles Command Line Interface (CLI) parsing, logging initialization,
//! and dispatching to the build pipeline, the preflight doctor, or the standalone clean.
//!
//! Running with no sub-command performs the full build:
//! upgrade pip, install `requirements.txt`, remove `build/` and `dist/`, then package
//! `app/cli.py` into a single-file `barcode-reader` executable with PyInstaller.

use std::path::{Path, PathBuf};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use simplelog::{Config, SimpleLogger};

mod build_log;
mod cleaner;
mod config;
mod doctor;
mod invariant_ppt;
mod orchestrator;
mod report;
mod steps;
mod system;

use config::BuildConfig;
use system::{HostSystem, SystemOps};

/// The primary Command Line Interface (CLI) configuration.
#[derive(Parser)]
#[command(name = "barcode-build")]
#[command(about = "Builds the barcode-reader CLI into a single-file executable", long_about = None)]
struct Cli {
    /// Optional sub-command. Without one, the full build runs.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Turn on verbose logging.
    ///
    /// - `-v`: Debug
    /// - `-vv`: Trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Duplicate all output, with timestamps, into `build.log` beside the project.
    #[arg(long, global = true)]
    log: bool,

    /// Project directory containing `requirements.txt` and `app/`.
    ///
    /// Defaults to the executable's directory when it holds `requirements.txt`,
    /// otherwise the current directory.
    #[arg(long, value_name = "DIR", global = true)]
    project_dir: Option<PathBuf>,

    /// Print what would run or be removed, without changing anything.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Write a JSON summary of the run to this path. Only valid for a build.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Commands {
    /// Check that the interpreter, requirements file and entry point are in place.
    Doctor,
    /// Remove previous `build/` and `dist/` outputs only.
    Clean,
}

/// What a parsed command line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Build { report: Option<PathBuf> },
    Plan,
    Doctor,
    Clean { dry_run: bool },
}

impl Cli {
    fn action(&self) -> anyhow::Result<Action> {
        match &self.command {
            None if self.dry_run => Ok(Action::Plan),
            None => Ok(Action::Build { report: self.report.clone() }),
            Some(_) if self.report.is_some() => {
                anyhow::bail!("--report only applies to a build, not to sub-commands")
            }
            Some(Commands::Doctor) => Ok(Action::Doctor),
            Some(Commands::Clean) => Ok(Action::Clean { dry_run: self.dry_run }),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // Logging failure shouldn't stop a build.
    let _ = SimpleLogger::init(log_level, Config::default());

    let action = match cli.action() {
        Ok(action) => action,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let project_dir = match config::locate_project_dir(cli.project_dir.clone()) {
        Ok(dir) => dir,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    let config = BuildConfig::from_env(project_dir, cli.log);

    std::process::exit(run(action, &config, &HostSystem));
}

/// Carries out `action` and returns the process exit status.
fn run(action: Action, config: &BuildConfig, system: &impl SystemOps) -> i32 {
    match action {
        Action::Plan => {
            println!("Build plan for {} (interpreter '{}'):", config.project_dir.display(), config.interpreter);
            for line in orchestrator::plan(config) {
                println!("  {}", line);
            }
            0
        }
        Action::Build { report } => build(config, system, report.as_deref()),
        Action::Doctor => match doctor::run(config, system) {
            Ok(()) => 0,
            Err(e) => {
                error!("{}", e);
                1
            }
        },
        Action::Clean { dry_run: true } => {
            let present = cleaner::present_outputs(config, system);
            if present.is_empty() {
                println!("Nothing to clean.");
            }
            for dir in present {
                println!("Would remove {}", dir.display());
            }
            0
        }
        Action::Clean { dry_run: false } => clean(config, system),
    }
}

/// Runs the full pipeline and returns the process exit status.
fn build(config: &BuildConfig, system: &impl SystemOps, report_path: Option<&Path>) -> i32 {
    let mut log = match orchestrator::prepare(config, system) {
        Ok(log) => log,
        Err(e) => {
            error!("Build could not start: {:#}", e);
            return 1;
        }
    };

    let outcome = orchestrator::run_build(config, system, &mut log);

    if let Some(path) = report_path {
        match report::write(config, &outcome, path) {
            Ok(written) => info!("Wrote build report to {:?}", written),
            Err(e) => error!("{:#}", e),
        }
    }

    outcome.exit_code()
}

fn clean(config: &BuildConfig, system: &impl SystemOps) -> i32 {
    let mut log = match orchestrator::prepare(config, system) {
        Ok(log) => log,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let summary = cleaner::clean_outputs(config, system, &mut log);
    if summary.removed.is_empty() && summary.failed.is_empty() {
        info!("Nothing to clean.");
    }
    // Removal problems are warnings, same as in a full build.
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::MockSystem;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn no_arguments_means_build() {
        assert_eq!(parse(&["barcode-build"]).action().unwrap(), Action::Build { report: None });
    }

    #[test]
    fn dry_run_before_or_after_clean_is_a_preview() {
        for args in [
            &["barcode-build", "--dry-run", "clean"][..],
            &["barcode-build", "clean", "--dry-run"][..],
        ] {
            assert_eq!(parse(args).action().unwrap(), Action::Clean { dry_run: true });
        }
        assert_eq!(parse(&["barcode-build", "clean"]).action().unwrap(), Action::Clean { dry_run: false });
        assert_eq!(parse(&["barcode-build", "--dry-run"]).action().unwrap(), Action::Plan);
    }

    #[test]
    fn report_with_a_sub_command_is_rejected() {
        assert!(parse(&["barcode-build", "--report", "r.json", "clean"]).action().is_err());
        assert!(parse(&["barcode-build", "--report", "r.json", "doctor"]).action().is_err());
        assert_eq!(
            parse(&["barcode-build", "--report", "r.json"]).action().unwrap(),
            Action::Build { report: Some(PathBuf::from("r.json")) }
        );
    }

    #[test]
    fn clean_preview_removes_nothing() {
        let config = BuildConfig::new("/project", "python");
        let system = MockSystem::new()
            .with_dir("/project/build")
            .with_dir("/project/dist");

        let action = parse(&["barcode-build", "--dry-run", "clean"]).action().unwrap();
        assert_eq!(run(action, &config, &system), 0);

        assert_eq!(system.dirs.lock().unwrap().len(), 2);
        assert!(system.entered.lock().unwrap().is_empty());
    }

    #[test]
    fn clean_removes_outputs_without_running_tools() {
        let config = BuildConfig::new("/project", "python");
        let system = MockSystem::new()
            .with_dir("/project/build")
            .with_dir("/project/dist");

        let action = parse(&["barcode-build", "clean"]).action().unwrap();
        assert_eq!(run(action, &config, &system), 0);

        assert!(system.dirs.lock().unwrap().is_empty());
        assert_eq!(system.call_count(), 0);
    }

    #[test]
    fn plan_runs_nothing() {
        let config = BuildConfig::new("/project", "python");
        let system = MockSystem::new().with_dir("/project/build");

        assert_eq!(run(Action::Plan, &config, &system), 0);
        assert_eq!(system.call_count(), 0);
        assert_eq!(system.dirs.lock().unwrap().len(), 1);
    }

    #[test]
    fn doctor_exit_status_follows_checks() {
        let config = BuildConfig::new("/project", "python");
        assert_eq!(run(Action::Doctor, &config, &MockSystem::new()), 1);

        let healthy = MockSystem::new()
            .with_program("python", "/usr/bin/python")
            .with_file(config.project_path(&config.requirements))
            .with_file(config.project_path(&config.entry_point));
        assert_eq!(run(Action::Doctor, &config, &healthy), 0);
    }

    #[test]
    fn build_writes_report_and_returns_failure_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::new(dir.path(), "python");
        let system = MockSystem::new().exit_with("-r requirements.txt", 1);

        let action = parse(&["barcode-build", "--report", "report.json"]).action().unwrap();
        assert_eq!(run(action, &config, &system), 1);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap()).unwrap();
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["steps"].as_array().unwrap().len(), 2);
        assert!(!system.calls().iter().any(|c| c.contains("PyInstaller")));
    }
}
