//! Preflight checks for the build inputs. Read-only.

use anyhow::{Result, bail};
use crate::config::BuildConfig;
use crate::system::SystemOps;

/// Outcome of a single preflight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub ok: bool,
    pub detail: String,
}

/// Runs every check and returns them in report order.
pub fn checks(config: &BuildConfig, system: &impl SystemOps) -> Vec<Check> {
    let mut out = Vec::new();

    match system.locate_program(&config.interpreter_location()) {
        Some(path) => out.push(Check {
            ok: true,
            detail: format!("interpreter '{}' -> {}", config.interpreter, path.display()),
        }),
        None => out.push(Check {
            ok: false,
            detail: format!(
                "interpreter '{}' not found (set PYTHON to override)",
                config.interpreter
            ),
        }),
    }

    for (label, relative) in [
        ("requirements file", &config.requirements),
        ("entry point", &config.entry_point),
    ] {
        let path = config.project_path(relative);
        let ok = system.file_exists(&path);
        let detail = if ok {
            format!("{} {}", label, relative.display())
        } else {
            format!("missing {}: {}", label, path.display())
        };
        out.push(Check { ok, detail });
    }

    out
}

/// Prints the preflight report and fails if any check failed.
pub fn run(config: &BuildConfig, system: &impl SystemOps) -> Result<()> {
    let results = checks(config, system);
    for check in &results {
        let tag = if check.ok { "[OK]" } else { "[FAIL]" };
        eprintln!("{} {}", tag, check.detail);
    }

    if results.iter().any(|c| !c.ok) {
        bail!("doctor checks failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::MockSystem;

    #[test]
    fn healthy_project_passes() {
        let config = BuildConfig::new("/project", "python");
        let system = MockSystem::new()
            .with_program("python", "/usr/bin/python")
            .with_file(config.project_path(&config.requirements))
            .with_file(config.project_path(&config.entry_point));

        assert!(run(&config, &system).is_ok());
        assert!(checks(&config, &system).iter().all(|c| c.ok));
    }

    #[test]
    fn relative_interpreter_is_looked_up_inside_the_project() {
        let config = BuildConfig::new("/project", "venv/bin/python");
        let system = MockSystem::new()
            .with_program(&config.interpreter_location(), "/project/venv/bin/python")
            .with_program("venv/bin/python", "/elsewhere/venv/bin/python");

        let interpreter = &checks(&config, &system)[0];
        assert!(interpreter.ok);
        assert!(interpreter.detail.ends_with("/project/venv/bin/python"));
    }

    #[test]
    fn missing_interpreter_and_entry_point_are_reported() {
        let config = BuildConfig::new("/project", "python3.11");
        let system = MockSystem::new().with_file(config.project_path(&config.requirements));

        let results = checks(&config, &system);
        let failed: Vec<&str> = results.iter().filter(|c| !c.ok).map(|c| c.detail.as_str()).collect();

        assert_eq!(failed.len(), 2);
        assert!(failed[0].contains("python3.11"));
        assert!(failed[1].contains("entry point"));
        assert!(run(&config, &system).is_err());
    }
}
