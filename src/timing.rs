// Startup phase timing
//
// Records named phases of the boot sequence and warns when a phase exceeds
// its threshold. The records are observability only; nothing reads them for
// control flow.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One completed startup phase.
#[derive(Debug, Clone)]
pub struct PhaseRecord {
    pub name: String,
    pub duration: Duration,
    pub threshold: Duration,
}

impl PhaseRecord {
    pub fn exceeded_threshold(&self) -> bool {
        self.duration > self.threshold
    }
}

/// Ordered log of named startup phases.
///
/// Thread-safe so the orchestrator (background loop) and tests (host thread)
/// can both look at it.
#[derive(Debug)]
pub struct StartupPhases {
    records: Mutex<Vec<PhaseRecord>>,
    started: Instant,
}

impl StartupPhases {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            started: Instant::now(),
        }
    }

    /// Begin a named phase. The phase is recorded when the returned timer is
    /// dropped, warning if the given threshold was exceeded.
    pub fn phase(&self, name: &str, threshold: Duration) -> PhaseTimer<'_> {
        tracing::debug!("startup phase started: {}", name);
        PhaseTimer {
            phases: self,
            name: name.to_string(),
            threshold,
            start: Instant::now(),
        }
    }

    /// Time since the recorder was created (whole-sequence clock).
    pub fn total_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Escalated warning when the whole sequence blows its budget.
    pub fn warn_if_total_exceeds(&self, budget: Duration) {
        let total = self.total_elapsed();
        if total > budget {
            tracing::warn!(
                "startup sequence exceeded total budget: {:.0}ms (budget {:.0}ms)",
                total.as_secs_f64() * 1000.0,
                budget.as_secs_f64() * 1000.0
            );
        }
    }

    /// Snapshot of all completed phases, in completion order.
    pub fn records(&self) -> Vec<PhaseRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, record: PhaseRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

impl Default for StartupPhases {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped timer for a single startup phase.
///
/// Records the phase and emits the threshold warning on drop, so a phase is
/// logged even when the guarded code bails out early with `?`.
pub struct PhaseTimer<'a> {
    phases: &'a StartupPhases,
    name: String,
    threshold: Duration,
    start: Instant,
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let record = PhaseRecord {
            name: self.name.clone(),
            duration,
            threshold: self.threshold,
        };

        if record.exceeded_threshold() {
            tracing::warn!(
                "startup bottleneck: phase '{}' took {:.0}ms (threshold {:.0}ms)",
                self.name,
                duration.as_secs_f64() * 1000.0,
                self.threshold.as_secs_f64() * 1000.0
            );
        } else {
            tracing::info!(
                "startup phase '{}' completed in {:.0}ms",
                self.name,
                duration.as_secs_f64() * 1000.0
            );
        }

        self.phases.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_phase_recorded_on_drop() {
        let phases = StartupPhases::new();

        {
            let _timer = phases.phase("load_settings", Duration::from_secs(5));
            thread::sleep(Duration::from_millis(5));
        }

        let records = phases.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "load_settings");
        assert!(records[0].duration >= Duration::from_millis(5));
        assert!(!records[0].exceeded_threshold());
    }

    #[test]
    fn test_phases_kept_in_order() {
        let phases = StartupPhases::new();

        drop(phases.phase("first", Duration::from_secs(1)));
        drop(phases.phase("second", Duration::from_secs(1)));
        drop(phases.phase("third", Duration::from_secs(1)));

        let names: Vec<_> = phases.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_threshold_exceeded_flag() {
        let phases = StartupPhases::new();

        {
            let _timer = phases.phase("slow_phase", Duration::from_millis(1));
            thread::sleep(Duration::from_millis(10));
        }

        assert!(phases.records()[0].exceeded_threshold());
    }

    #[test]
    fn test_total_elapsed_advances() {
        let phases = StartupPhases::new();
        thread::sleep(Duration::from_millis(5));
        assert!(phases.total_elapsed() >= Duration::from_millis(5));
    }
}
