//! # Build Orchestrator
//!
//! Drives the pipeline `Start -> UpgradePip -> InstallDependencies -> CleanOutputs -> Package -> Success`.
//! Any external step that fails (non-zero exit, killed, or not startable) moves the run into the
//! absorbing `Failure` stage and nothing after it is invoked.
//!
//! All side effects go through [`SystemOps`] and every progress line goes through [`BuildLog`],
//! so the whole pipeline runs against a `MockSystem` in tests.

use std::path::PathBuf;
use std::time::Instant;
use anyhow::Result;
use log::debug;
use serde::Serialize;
use crate::build_log::BuildLog;
use crate::cleaner;
use crate::config::BuildConfig;
use crate::invariant_ppt::{check, Invariant};
use crate::steps::{Invocation, Step, StepFailure};
use crate::system::SystemOps;

/// Where the pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Running(Step),
    Success,
    Failure,
}

impl Stage {
    /// The stage reached when the current one completes successfully.
    pub fn advance(self) -> Stage {
        match self {
            Stage::Start => Stage::Running(Step::UpgradePip),
            Stage::Running(Step::UpgradePip) => Stage::Running(Step::InstallDependencies),
            Stage::Running(Step::InstallDependencies) => Stage::Running(Step::CleanOutputs),
            Stage::Running(Step::CleanOutputs) => Stage::Running(Step::Package),
            Stage::Running(Step::Package) => Stage::Success,
            Stage::Success | Stage::Failure => self,
        }
    }

    /// The stage reached when the current one fails. Only external steps can fail.
    pub fn fail(self) -> Stage {
        match self {
            Stage::Running(step) if step.is_external() => Stage::Failure,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Success | Stage::Failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    /// Finished, but something non-fatal went wrong (e.g. a directory could not be removed).
    Warned,
    Failed,
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub stage: Stage,
    pub records: Vec<StepRecord>,
    pub failure: Option<StepFailure>,
    /// Expected executable location, relative to the project directory.
    pub artifact: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl BuildOutcome {
    /// Process exit status: `0` on success, `1` on any step failure.
    pub fn exit_code(&self) -> i32 {
        if self.failure.is_some() || self.stage != Stage::Success { 1 } else { 0 }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code() == 0
    }

    /// The final human-readable line of the run.
    pub fn message(&self) -> String {
        match &self.failure {
            None => format!("Build succeeded. Executable available at {}", self.artifact.display()),
            Some(failure) => {
                let hint = match &self.log_file {
                    Some(path) => format!("See {} for details.", path.display()),
                    None => "See the output above for details.".to_string(),
                };
                format!("Build failed: {}. {}", failure, hint)
            }
        }
    }

    /// Steps that actually ran, in order.
    pub fn executed_steps(&self) -> Vec<Step> {
        self.records.iter().map(|r| r.step).collect()
    }
}

/// Enters the project directory and opens the build log (truncating any previous one).
pub fn prepare(config: &BuildConfig, system: &impl SystemOps) -> Result<BuildLog> {
    system.enter_dir(&config.project_dir)?;
    match &config.log_file {
        Some(path) => BuildLog::create(path),
        None => Ok(BuildLog::disabled()),
    }
}

/// Runs the whole pipeline, stopping at the first failing step.
pub fn run_build(config: &BuildConfig, system: &impl SystemOps, log: &mut BuildLog) -> BuildOutcome {
    let mut stage = Stage::Start;
    let mut records: Vec<StepRecord> = Vec::new();
    let mut failure = None;

    log.record(&format!("Starting build of {} using '{}'", config.exe_name, config.interpreter));

    for step in Step::PIPELINE {
        check(Invariant::NothingAfterFailure, !stage.is_terminal());
        let next = stage.advance();
        check(Invariant::StepsInOrder, next == Stage::Running(step));
        stage = next;

        log.record(step.description());
        let started = Instant::now();
        let result = execute(step, config, system, log);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok((status, exit_code)) => {
                records.push(StepRecord { step, status, exit_code, duration_ms });
            }
            Err(f) => {
                records.push(StepRecord {
                    step,
                    status: StepStatus::Failed,
                    exit_code: f.exit_code(),
                    duration_ms,
                });
                stage = stage.fail();
                failure = Some(f);
                break;
            }
        }
    }

    if failure.is_none() {
        stage = stage.advance();
    }

    let expected_records = Step::PIPELINE
        .iter()
        .position(|s| Some(*s) == failure.as_ref().map(StepFailure::step))
        .map_or(Step::PIPELINE.len(), |i| i + 1);
    check(Invariant::EveryStepRecorded, records.len() == expected_records);

    let outcome = BuildOutcome {
        stage,
        records,
        failure,
        artifact: config.artifact_path(),
        log_file: log.path().map(PathBuf::from),
    };

    debug!("Executed steps: {:?}", outcome.executed_steps());
    if outcome.succeeded() {
        log.record(&outcome.message());
    } else {
        log.record_error(&outcome.message());
    }
    outcome
}

fn execute(
    step: Step,
    config: &BuildConfig,
    system: &impl SystemOps,
    log: &mut BuildLog,
) -> Result<(StepStatus, Option<i32>), StepFailure> {
    match step.invocation(config) {
        Some(invocation) => run_external(step, &invocation, system, log).map(|code| (StepStatus::Passed, Some(code))),
        None => {
            let summary = cleaner::clean_outputs(config, system, log);
            let status = if summary.is_clean() { StepStatus::Passed } else { StepStatus::Warned };
            Ok((status, None))
        }
    }
}

fn run_external(
    step: Step,
    invocation: &Invocation,
    system: &impl SystemOps,
    log: &mut BuildLog,
) -> Result<i32, StepFailure> {
    debug!("[{}] {}", step, invocation);

    // The log variant streams tool output so each line is echoed and logged as it arrives.
    let result = if log.path().is_some() {
        let mut tee = |line: &str| {
            println!("{}", line);
            log.record_output(line);
        };
        system.run(invocation, Some(&mut tee))
    } else {
        system.run(invocation, None)
    };
    let output = result.map_err(|e| StepFailure::Spawn { step, reason: format!("{:#}", e) })?;

    match output.code {
        Some(0) => Ok(0),
        Some(code) => Err(StepFailure::ExitCode { step, code }),
        None => Err(StepFailure::Terminated { step }),
    }
}

/// The commands a build would run, without running them.
pub fn plan(config: &BuildConfig) -> Vec<String> {
    Step::PIPELINE
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let action = match step.invocation(config) {
                Some(invocation) => invocation.to_string(),
                None => format!(
                    "remove {} and {} if present",
                    config.build_dir.display(),
                    config.dist_dir.display()
                ),
            };
            format!("{}. {:<22} {}", i + 1, step.to_string(), action)
        })
        .collect()
}
