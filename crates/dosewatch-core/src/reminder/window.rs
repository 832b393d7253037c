//! Lookahead windows over today's occurrences.

use chrono::{Duration, NaiveDateTime};

use super::occurrence::Occurrence;

/// Display horizon in minutes (two hours).
pub const UPCOMING_HORIZON_MIN: i64 = 120;

/// Notification lead time in minutes.
pub const ALERT_LEAD_MIN: i64 = 5;

/// Horizons used to cut the occurrence list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub upcoming_horizon: Duration,
    pub alert_lead: Duration,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            upcoming_horizon: Duration::minutes(UPCOMING_HORIZON_MIN),
            alert_lead: Duration::minutes(ALERT_LEAD_MIN),
        }
    }
}

/// Both views of one tick, each sorted ascending by instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Windows {
    pub upcoming: Vec<Occurrence>,
    pub alert: Vec<Occurrence>,
}

impl WindowPolicy {
    pub fn new(upcoming_horizon: Duration, alert_lead: Duration) -> Self {
        Self {
            upcoming_horizon,
            alert_lead,
        }
    }

    pub fn windows(&self, occurrences: Vec<Occurrence>, now: NaiveDateTime) -> Windows {
        let sorted = sort_chronologically(occurrences);
        let alert = within(&sorted, now, self.alert_lead);
        let upcoming = within(&sorted, now, self.upcoming_horizon);
        Windows { upcoming, alert }
    }

    pub fn upcoming(&self, occurrences: Vec<Occurrence>, now: NaiveDateTime) -> Vec<Occurrence> {
        within(&sort_chronologically(occurrences), now, self.upcoming_horizon)
    }

    pub fn alert(&self, occurrences: Vec<Occurrence>, now: NaiveDateTime) -> Vec<Occurrence> {
        within(&sort_chronologically(occurrences), now, self.alert_lead)
    }
}

/// `now < instant <= now + horizon`: anything at or before `now` is gone.
pub fn in_window(instant: NaiveDateTime, now: NaiveDateTime, horizon: Duration) -> bool {
    instant > now && instant <= now + horizon
}

/// Stable: equal instants keep their input order.
fn sort_chronologically(mut occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
    occurrences.sort_by_key(|o| o.instant);
    occurrences
}

fn within(sorted: &[Occurrence], now: NaiveDateTime, horizon: Duration) -> Vec<Occurrence> {
    sorted
        .iter()
        .filter(|o| in_window(o.instant, now, horizon))
        .cloned()
        .collect()
}
