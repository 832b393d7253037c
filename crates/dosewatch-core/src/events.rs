use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::notify::Permission;
use crate::reminder::ReminderNotification;

/// Every state change of the reminder driver produces an Event.
/// The CLI prints them; other consumers subscribe through the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    DriverStarted {
        permission: Permission,
        interval_secs: u64,
        at: NaiveDateTime,
    },
    DriverStopped {
        at: NaiveDateTime,
    },
    /// A fresh store snapshot replaced the previous one.
    SnapshotReplaced {
        medicines: usize,
        at: NaiveDateTime,
    },
    /// Loading from the store failed; the previous snapshot stays in use.
    RefreshFailed {
        message: String,
        at: NaiveDateTime,
    },
    /// The fired-reminder memory was cleared for a new day.
    DayRolledOver {
        day: NaiveDate,
        at: NaiveDateTime,
    },
    /// A medicine's schedule could not be expanded this tick.
    MedicineSkipped {
        medicine_id: Option<String>,
        reason: String,
        at: NaiveDateTime,
    },
    ReminderFired {
        notification: ReminderNotification,
        /// False when permission is missing or delivery failed.
        delivered: bool,
        at: NaiveDateTime,
    },
    TickCompleted {
        upcoming: usize,
        fired: usize,
        at: NaiveDateTime,
    },
}
