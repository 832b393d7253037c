pub mod config;
pub mod dose;
pub mod medicine;
pub mod reminders;
pub mod stats;

use chrono::{Local, NaiveDateTime};

/// Parse `YYYY-MM-DDTHH:MM[:SS]` (or with a space), defaulting to the local "now".
pub(crate) fn parse_at(value: Option<&str>) -> Result<NaiveDateTime, Box<dyn std::error::Error>> {
    let Some(value) = value else {
        return Ok(Local::now().naive_local());
    };
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    Err(format!("invalid date-time '{value}': expected YYYY-MM-DDTHH:MM").into())
}
