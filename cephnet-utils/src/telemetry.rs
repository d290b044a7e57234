//! Optional timing instrumentation for the pipeline hot paths.
//!
//! Stages wrap themselves in a [`TimingGuard`]; when the guard drops it logs
//! the elapsed wall time under the [`TARGET`] log target. Whether a guard
//! logs at all is decided when it is created, from two gates: the
//! process-wide telemetry state set via [`configure`], and the `log` crate's
//! own filter for the telemetry target. With telemetry off a guard is just a
//! timestamp and a bool, cheap enough to leave in release builds.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use log::{Level, LevelFilter, log, log_enabled};

/// Log target used for all telemetry output.
pub const TARGET: &str = "cephnet::telemetry";

// Packed gate: 0 disables telemetry, 1..=5 is the maximum armed level
// (the log crate's Error..Trace discriminants).
static GATE: AtomicU8 = AtomicU8::new(0);

/// Set the process-wide telemetry gate.
///
/// Passing `enabled = false` (or `LevelFilter::Off`) silences every guard
/// regardless of the log filter. Callers re-invoke this whenever the user's
/// telemetry settings change.
pub fn configure(enabled: bool, level: LevelFilter) {
    let gate = if enabled { level as u8 } else { 0 };
    GATE.store(gate, Ordering::Relaxed);
}

/// `true` when telemetry is on and `level` is within the configured gate.
pub fn telemetry_allows(level: Level) -> bool {
    level as u8 <= GATE.load(Ordering::Relaxed)
}

/// RAII timer that logs its label and elapsed wall time when dropped.
///
/// Created via [`timing_guard`]; an unarmed guard does nothing on drop.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    started: Instant,
    armed: bool,
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.armed {
            log!(
                target: TARGET,
                self.level,
                "{} took {:.2?}",
                self.label,
                self.started.elapsed()
            );
        }
    }
}

/// Time the enclosing scope, logging at `level` when both the telemetry gate
/// and the log filter allow it.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    let armed = telemetry_allows(level) && log_enabled!(target: TARGET, level);
    TimingGuard {
        label: label.into(),
        level,
        started: Instant::now(),
        armed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the gate is process-global and parallel tests would race.
    #[test]
    fn gate_tracks_configuration() {
        configure(false, LevelFilter::Trace);
        assert!(!telemetry_allows(Level::Error));

        configure(true, LevelFilter::Debug);
        assert!(telemetry_allows(Level::Error));
        assert!(telemetry_allows(Level::Debug));
        assert!(!telemetry_allows(Level::Trace));

        configure(true, LevelFilter::Off);
        assert!(!telemetry_allows(Level::Error));

        configure(false, LevelFilter::Off);
    }
}
