//! At-most-once-per-day notification firing.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::occurrence::{Occurrence, OccurrenceKey};

pub const NOTIFICATION_TITLE: &str = "Medicine Reminder";

/// What the host shows the user when a dose is about to be due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderNotification {
    pub key: OccurrenceKey,
    pub title: String,
    pub body: String,
    /// Host-level grouping tag; the medicine name.
    pub tag: String,
    pub medicine_name: String,
    pub dosage: String,
    pub scheduled_for: NaiveDateTime,
}

impl ReminderNotification {
    pub fn for_occurrence(occurrence: &Occurrence) -> Self {
        Self {
            key: occurrence.key(),
            title: NOTIFICATION_TITLE.to_string(),
            body: format!(
                "Time to take {} - {}",
                occurrence.medicine_name, occurrence.dosage
            ),
            tag: occurrence.medicine_name.clone(),
            medicine_name: occurrence.medicine_name.clone(),
            dosage: occurrence.dosage.clone(),
            scheduled_for: occurrence.instant,
        }
    }
}

/// Remembers which occurrence keys already fired today.
#[derive(Debug, Clone, Default)]
pub struct NotificationTrigger {
    day: Option<NaiveDate>,
    fired: HashSet<OccurrenceKey>,
}

impl NotificationTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The calendar day the fired-set belongs to.
    pub fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub fn fired_today(&self) -> usize {
        self.fired.len()
    }

    pub fn has_fired(&self, key: &OccurrenceKey) -> bool {
        self.fired.contains(key)
    }

    /// Move to `today`, forgetting every fired key if the day changed.
    ///
    /// Returns `true` on rollover. The very first call only records the day.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        match self.day {
            Some(day) if day == today => false,
            Some(_) => {
                self.day = Some(today);
                self.fired.clear();
                true
            }
            None => {
                self.day = Some(today);
                false
            }
        }
    }

    /// Fire every occurrence of `alert_window` not yet fired today.
    ///
    /// Keys are recorded before returning, so a second call with the same
    /// window returns nothing.
    pub fn evaluate(&mut self, alert_window: &[Occurrence]) -> Vec<ReminderNotification> {
        alert_window
            .iter()
            .filter(|o| self.fired.insert(o.key()))
            .map(ReminderNotification::for_occurrence)
            .collect()
    }
}
