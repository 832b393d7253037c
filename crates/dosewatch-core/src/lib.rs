//! # Dosewatch Core Library
//!
//! This library provides the core logic for the dosewatch medication
//! reminder. All operations are available through the `dosewatch` CLI;
//! any other front end is meant to be a thin layer over the same crate.
//!
//! ## Architecture
//!
//! - **Schedule model**: medicines, their `HH:MM` dose times and dose logs
//! - **Reminder engine**: a synchronous state machine that expands today's
//!   occurrences, applies the upcoming and alert windows and fires each
//!   reminder at most once per day. The caller supplies "now".
//! - **Tick driver**: a tokio task that ticks the engine once a minute and
//!   publishes results through channels
//! - **Storage**: SQLite-backed medicine store and TOML configuration
//! - **Stats**: per-medicine and overall adherence
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: Core reminder state machine
//! - [`TickDriver`]: Recurring timer around the engine
//! - [`Database`]: Medicine and dose-log persistence
//! - [`Config`]: Application configuration management
//! - [`AdherenceAnalyzer`]: Adherence rates and bands

pub mod error;
pub mod events;
pub mod medicine;
pub mod notify;
pub mod reminder;
pub mod stats;
pub mod storage;

pub use error::{ConfigError, CoreError, DataError, NotifyError, StoreError};
pub use events::Event;
pub use medicine::{
    DoseLogEntry, DoseStatus, Frequency, Medicine, MedicineUpdate, NewMedicine, TimeOfDay,
};
pub use notify::{LogNotifier, NoopNotifier, Notifier, Permission};
pub use reminder::{
    Clock, DriverOptions, Occurrence, OccurrenceKey, ReminderEngine, ReminderNotification,
    SystemClock, TickDriver, TickOutcome, WindowPolicy,
};
pub use stats::{AdherenceAnalyzer, AdherenceBand, AdherenceReport, MedicineAdherence};
pub use storage::{Config, Database, MedicineStore};
