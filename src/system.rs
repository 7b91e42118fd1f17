use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use anyhow::{Context, Result};
use log::{debug, trace};
use walkdir::WalkDir;
use crate::steps::Invocation;

/// Receives each line of a child's combined stdout/stderr as soon as it is written.
pub type LineSink<'a> = &'a mut dyn FnMut(&str);

/// What an external process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Number of output lines handed to the sink. Zero when output was not captured.
    pub lines: usize,
}

/// Abstraction for everything the build touches outside the process (child processes, file system).
/// This allows us to stub out pip and PyInstaller in tests.
pub trait SystemOps {
    /// Make `dir` the working directory for all later invocations.
    fn enter_dir(&self, dir: &Path) -> Result<()>;

    /// Run an external command to completion.
    ///
    /// With a `sink`, stdout and stderr share one pipe and every line reaches the sink
    /// in the order the child wrote it. Without one, output goes straight to the terminal.
    /// An `Err` means the process never started.
    fn run(&self, invocation: &Invocation, sink: Option<LineSink<'_>>) -> Result<ProcessOutput>;

    /// Check if a directory exists.
    fn dir_exists(&self, path: &Path) -> bool;

    /// Recursively delete a directory, returning how many entries it held.
    fn remove_dir(&self, path: &Path) -> Result<usize>;

    /// Check if a regular file exists.
    fn file_exists(&self, path: &Path) -> bool;

    /// Resolve a program name (or path) to an executable on disk.
    fn locate_program(&self, program: &str) -> Option<PathBuf>;
}

/// The real host implementation (production).
pub struct HostSystem;

impl SystemOps for HostSystem {
    fn enter_dir(&self, dir: &Path) -> Result<()> {
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to change directory to {}", dir.display()))?;
        debug!("Working directory set to {:?}", dir);
        Ok(())
    }

    fn run(&self, invocation: &Invocation, sink: Option<LineSink<'_>>) -> Result<ProcessOutput> {
        debug!("Running: {}", invocation);

        let Some(sink) = sink else {
            let status = Command::new(&invocation.program)
                .args(&invocation.args)
                .status()
                .with_context(|| format!("Failed to execute {}", invocation.program))?;
            return Ok(ProcessOutput { code: status.code(), lines: 0 });
        };

        // Both streams write into the same pipe so interleaving is preserved.
        // The temporary `Command` owns the parent's write ends and drops them once spawned,
        // so the reader sees EOF when the child exits.
        let (reader, writer) = std::io::pipe().context("Failed to create output pipe")?;
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(writer.try_clone().context("Failed to duplicate output pipe")?)
            .stderr(writer)
            .spawn()
            .with_context(|| format!("Failed to execute {}", invocation.program))?;

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut lines = 0;
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).context("Failed to read tool output")?;
            if read == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buf);
            sink(text.trim_end_matches(['\n', '\r']));
            lines += 1;
        }

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for {}", invocation.program))?;
        trace!("{} produced {} lines of output", invocation.program, lines);

        Ok(ProcessOutput { code: status.code(), lines })
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn remove_dir(&self, path: &Path) -> Result<usize> {
        // The root itself is not counted.
        let entries = WalkDir::new(path)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .count();
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(entries)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn locate_program(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

#[cfg(test)]
pub use mock::MockSystem;
