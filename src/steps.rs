//! Pipeline steps and the external invocations behind them.

use std::fmt;
use serde::Serialize;
use thiserror::Error;
use crate::config::BuildConfig;

/// One stage of the build pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    UpgradePip,
    InstallDependencies,
    CleanOutputs,
    Package,
}

impl Step {
    /// All steps in the order they run.
    pub const PIPELINE: [Step; 4] = [
        Step::UpgradePip,
        Step::InstallDependencies,
        Step::CleanOutputs,
        Step::Package,
    ];

    /// Message announcing the step, used on the console and in the build log.
    pub fn description(self) -> &'static str {
        match self {
            Step::UpgradePip => "Upgrading pip",
            Step::InstallDependencies => "Installing dependencies from requirements.txt",
            Step::CleanOutputs => "Removing previous build outputs",
            Step::Package => "Packaging executable with PyInstaller",
        }
    }

    /// Whether the step shells out to an external process whose exit status can fail the run.
    pub fn is_external(self) -> bool {
        !matches!(self, Step::CleanOutputs)
    }

    /// The external command for this step, if it has one.
    pub fn invocation(self, config: &BuildConfig) -> Option<Invocation> {
        let interpreter = config.interpreter.as_str();
        match self {
            Step::UpgradePip => Some(Invocation::new(
                interpreter,
                ["-m", "pip", "install", "--upgrade", "pip"],
            )),
            Step::InstallDependencies => Some(Invocation::new(
                interpreter,
                [
                    "-m".to_string(),
                    "pip".to_string(),
                    "install".to_string(),
                    "-r".to_string(),
                    config.requirements.to_string_lossy().to_string(),
                ],
            )),
            Step::CleanOutputs => None,
            Step::Package => Some(Invocation::new(
                interpreter,
                [
                    "-m".to_string(),
                    "PyInstaller".to_string(),
                    "--name".to_string(),
                    config.exe_name.clone(),
                    "--onefile".to_string(),
                    "--console".to_string(),
                    config.entry_point.to_string_lossy().to_string(),
                    "--paths".to_string(),
                    config.search_path.to_string_lossy().to_string(),
                ],
            )),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::UpgradePip => "upgrade-pip",
            Step::InstallDependencies => "install-dependencies",
            Step::CleanOutputs => "clean-outputs",
            Step::Package => "package",
        };
        f.write_str(name)
    }
}

/// A fully-formed external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Why a step aborted the run.
///
/// Every variant leads to the same place: abort, report, exit 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    #[error("step '{step}' exited with status {code}")]
    ExitCode { step: Step, code: i32 },
    #[error("step '{step}' was terminated before reporting an exit status")]
    Terminated { step: Step },
    #[error("step '{step}' could not be started: {reason}")]
    Spawn { step: Step, reason: String },
}

impl StepFailure {
    pub fn step(&self) -> Step {
        match self {
            StepFailure::ExitCode { step, .. }
            | StepFailure::Terminated { step }
            | StepFailure::Spawn { step, .. } => *step,
        }
    }

    /// The child's exit code, when it got far enough to report one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepFailure::ExitCode { code, .. } => Some(*code),
            _ => None,
        }
    }
}
