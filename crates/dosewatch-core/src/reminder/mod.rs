//! Reminder pipeline: expand today's dose times, cut them into the upcoming
//! and alert windows, fire each reminder once, and drive it all on a timer.

mod driver;
mod engine;
mod occurrence;
mod trigger;
mod window;

pub use driver::{Clock, DriverOptions, SystemClock, TickDriver};
pub use engine::{ReminderEngine, Snapshot, TickOutcome};
pub use occurrence::{expand_all, expand_today, Occurrence, OccurrenceKey};
pub use trigger::{NotificationTrigger, ReminderNotification, NOTIFICATION_TITLE};
pub use window::{in_window, WindowPolicy, Windows, ALERT_LEAD_MIN, UPCOMING_HORIZON_MIN};
