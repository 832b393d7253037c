//! Expansion of a medicine's daily dose times into concrete instants.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::medicine::{Medicine, TimeOfDay};

/// One scheduled dose of one medicine on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub medicine_id: String,
    pub medicine_name: String,
    pub dosage: String,
    pub time_of_day: TimeOfDay,
    pub instant: NaiveDateTime,
}

/// Identity of an occurrence within a day: medicine id plus `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccurrenceKey {
    pub medicine_id: String,
    pub time_of_day: TimeOfDay,
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.medicine_id, self.time_of_day)
    }
}

impl Occurrence {
    pub fn key(&self) -> OccurrenceKey {
        OccurrenceKey {
            medicine_id: self.medicine_id.clone(),
            time_of_day: self.time_of_day,
        }
    }

    /// `"Now"` once due, otherwise `"in 1h 5m"` / `"in 12m"` (floored).
    pub fn time_remaining_label(&self, now: NaiveDateTime) -> String {
        let diff = self.instant - now;
        if diff <= chrono::Duration::zero() {
            return "Now".to_string();
        }
        let hours = diff.num_hours();
        let minutes = diff.num_minutes() % 60;
        if hours > 0 {
            format!("in {hours}h {minutes}m")
        } else {
            format!("in {minutes}m")
        }
    }
}

/// Produce today's occurrences for `medicine`, "today" being the date of `now`.
///
/// Disabled reminders and empty schedules yield nothing. A single malformed
/// time fails the whole medicine.
pub fn expand_today(medicine: &Medicine, now: NaiveDateTime) -> Result<Vec<Occurrence>, DataError> {
    if !medicine.reminder_enabled || medicine.times.is_empty() {
        return Ok(Vec::new());
    }
    medicine.validate()?;

    let today = now.date();
    let occurrences = medicine
        .schedule_times()?
        .into_iter()
        .map(|time_of_day| Occurrence {
            medicine_id: medicine.id.clone(),
            medicine_name: medicine.name.clone(),
            dosage: medicine.dosage.clone(),
            time_of_day,
            instant: time_of_day.on(today),
        })
        .collect();
    Ok(occurrences)
}

/// Expand every medicine, collecting data errors instead of stopping at them.
pub fn expand_all(
    medicines: &[Medicine],
    now: NaiveDateTime,
) -> (Vec<Occurrence>, Vec<DataError>) {
    let mut occurrences = Vec::new();
    let mut errors = Vec::new();
    for medicine in medicines {
        match expand_today(medicine, now) {
            Ok(mut found) => occurrences.append(&mut found),
            Err(err) => errors.push(err),
        }
    }
    (occurrences, errors)
}
