//! Pipeline invariants checked while a build runs.
//!
//! Each check that holds is remembered, so tests can prove the orchestrator really
//! performs it rather than trusting that it does.

use std::collections::HashSet;
use std::sync::Mutex;
use lazy_static::lazy_static;
use log::error;

lazy_static! {
    static ref HELD: Mutex<HashSet<Invariant>> = Mutex::new(HashSet::new());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invariant {
    /// A step starts only when the previous one completed.
    StepsInOrder,
    /// A failed run never starts another step.
    NothingAfterFailure,
    /// Every attempted step, and only those, ends up in the outcome's records.
    EveryStepRecorded,
}

impl Invariant {
    #[cfg(test)]
    pub const ALL: [Invariant; 3] = [
        Invariant::StepsInOrder,
        Invariant::NothingAfterFailure,
        Invariant::EveryStepRecorded,
    ];

    pub fn description(self) -> &'static str {
        match self {
            Invariant::StepsInOrder => "steps run in pipeline order",
            Invariant::NothingAfterFailure => "no step starts after a failed step",
            Invariant::EveryStepRecorded => "every attempted step has a record",
        }
    }
}

/// Checks `invariant` against `holds`.
///
/// A broken invariant is logged; debug builds also stop on it.
pub fn check(invariant: Invariant, holds: bool) {
    if holds {
        if let Ok(mut held) = HELD.lock() {
            held.insert(invariant);
        }
        return;
    }
    error!("Pipeline invariant broken: {}", invariant.description());
    debug_assert!(holds, "pipeline invariant broken: {}", invariant.description());
}

/// Whether `invariant` has held at least once in this process.
#[cfg(test)]
pub fn was_checked(invariant: Invariant) -> bool {
    HELD.lock().map(|held| held.contains(&invariant)).unwrap_or(false)
}
