//! Reminder engine implementation.
//!
//! The engine is a synchronous state machine over the latest medicine
//! snapshot. It owns no timer: the caller supplies "now" to `tick()`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = ReminderEngine::new(WindowPolicy::default(), AdherenceAnalyzer::new());
//! engine.replace_snapshot(store.load_all()?, now);
//! // Once a minute:
//! let outcome = engine.tick(now); // outcome.fired holds new reminders
//! ```

use std::sync::Arc;

use chrono::NaiveDateTime;

use super::occurrence::{expand_all, Occurrence};
use super::trigger::{NotificationTrigger, ReminderNotification};
use super::window::WindowPolicy;
use crate::error::DataError;
use crate::medicine::Medicine;
use crate::notify::Permission;
use crate::stats::{AdherenceAnalyzer, AdherenceReport};
use crate::storage::Config;

/// Medicines as of one successful load. Never mutated once installed.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub medicines: Vec<Medicine>,
    /// `None` until the first load.
    pub loaded_at: Option<NaiveDateTime>,
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub now: NaiveDateTime,
    /// Sorted upcoming window, for display.
    pub upcoming: Vec<Occurrence>,
    /// Reminders that entered the alert window for the first time today.
    pub fired: Vec<ReminderNotification>,
    /// Medicines whose schedule could not be expanded.
    pub skipped: Vec<DataError>,
    pub rolled_over: bool,
    pub permission: Permission,
}

/// Core reminder engine.
#[derive(Debug)]
pub struct ReminderEngine {
    policy: WindowPolicy,
    analyzer: AdherenceAnalyzer,
    snapshot: Arc<Snapshot>,
    adherence: Arc<AdherenceReport>,
    trigger: NotificationTrigger,
    permission: Permission,
}

impl ReminderEngine {
    pub fn new(policy: WindowPolicy, analyzer: AdherenceAnalyzer) -> Self {
        let adherence = Arc::new(analyzer.analyze(&[]));
        Self {
            policy,
            analyzer,
            snapshot: Arc::new(Snapshot::default()),
            adherence,
            trigger: NotificationTrigger::new(),
            permission: Permission::Default,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.window_policy(), config.adherence_analyzer())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn adherence(&self) -> Arc<AdherenceReport> {
        Arc::clone(&self.adherence)
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn trigger(&self) -> &NotificationTrigger {
        &self.trigger
    }

    /// Upcoming window at `now` without touching the fired-set.
    ///
    /// Medicines whose schedule cannot be expanded are logged and left out.
    pub fn upcoming(&self, now: NaiveDateTime) -> Vec<Occurrence> {
        let (occurrences, skipped) = expand_all(&self.snapshot.medicines, now);
        for err in &skipped {
            tracing::warn!(error = %err, "skipping medicine in upcoming list");
        }
        self.policy.upcoming(occurrences, now)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_permission(&mut self, permission: Permission) {
        self.permission = permission;
    }

    /// Install a whole new snapshot and recompute adherence from it.
    pub fn replace_snapshot(&mut self, medicines: Vec<Medicine>, loaded_at: NaiveDateTime) {
        self.adherence = Arc::new(self.analyzer.analyze(&medicines));
        self.snapshot = Arc::new(Snapshot {
            medicines,
            loaded_at: Some(loaded_at),
        });
    }

    /// Expand, window and trigger at `now`.
    pub fn tick(&mut self, now: NaiveDateTime) -> TickOutcome {
        let rolled_over = self.trigger.roll_over(now.date());
        if rolled_over {
            tracing::info!(day = %now.date(), "day rolled over, reminder memory cleared");
        }

        let (occurrences, skipped) = expand_all(&self.snapshot.medicines, now);
        for err in &skipped {
            tracing::warn!(error = %err, "skipping medicine for this tick");
        }

        let windows = self.policy.windows(occurrences, now);
        let fired = self.trigger.evaluate(&windows.alert);

        tracing::debug!(
            %now,
            upcoming = windows.upcoming.len(),
            alert = windows.alert.len(),
            fired = fired.len(),
            "tick"
        );

        TickOutcome {
            now,
            upcoming: windows.upcoming,
            fired,
            skipped,
            rolled_over,
            permission: self.permission,
        }
    }
}

impl Default for ReminderEngine {
    fn default() -> Self {
        Self::new(WindowPolicy::default(), AdherenceAnalyzer::new())
    }
}
