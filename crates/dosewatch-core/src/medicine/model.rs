use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::time_of_day::TimeOfDay;
use crate::error::DataError;

/// How many doses a day the prescription calls for.
///
/// Only informs data entry; the engine treats `Medicine::times` as authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    OnceDaily,
    TwiceDaily,
    ThreeTimesDaily,
    FourTimesDaily,
}

impl Frequency {
    pub fn doses_per_day(&self) -> usize {
        match self {
            Self::OnceDaily => 1,
            Self::TwiceDaily => 2,
            Self::ThreeTimesDaily => 3,
            Self::FourTimesDaily => 4,
        }
    }

    /// Dose times offered when the user picks a frequency without choosing times.
    pub fn default_times(&self) -> Vec<TimeOfDay> {
        let hm: &[(u8, u8)] = match self {
            Self::OnceDaily => &[(9, 0)],
            Self::TwiceDaily => &[(9, 0), (21, 0)],
            Self::ThreeTimesDaily => &[(8, 0), (14, 0), (20, 0)],
            Self::FourTimesDaily => &[(8, 0), (12, 0), (16, 0), (20, 0)],
        };
        hm.iter()
            .filter_map(|&(h, m)| TimeOfDay::new(h, m).ok())
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnceDaily => "once-daily",
            Self::TwiceDaily => "twice-daily",
            Self::ThreeTimesDaily => "three-times-daily",
            Self::FourTimesDaily => "four-times-daily",
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::OnceDaily
    }
}

impl FromStr for Frequency {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "once-daily" => Ok(Self::OnceDaily),
            "twice-daily" => Ok(Self::TwiceDaily),
            "three-times-daily" => Ok(Self::ThreeTimesDaily),
            "four-times-daily" => Ok(Self::FourTimesDaily),
            other => Err(DataError::UnknownFrequency(other.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Taken,
    Missed,
}

impl DoseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Taken => "taken",
            Self::Missed => "missed",
        }
    }
}

impl FromStr for DoseStatus {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "taken" => Ok(Self::Taken),
            "missed" => Ok(Self::Missed),
            other => Err(DataError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appended entry of a medicine's dose history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseLogEntry {
    pub status: DoseStatus,
    pub scheduled_time: NaiveDateTime,
    pub logged_at: NaiveDateTime,
}

/// A medicine as handed over by the persistence collaborator.
///
/// `times` stays in its raw `HH:MM` string form so that one malformed entry
/// only takes down this medicine's occurrences, not the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub dosage: String,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub reminder_enabled: bool,
    #[serde(default)]
    pub dose_logs: Vec<DoseLogEntry>,
}

fn default_true() -> bool {
    true
}

impl Medicine {
    /// Parse every `times` entry, failing on the first malformed one.
    pub fn schedule_times(&self) -> Result<Vec<TimeOfDay>, DataError> {
        self.times
            .iter()
            .map(|t| t.parse::<TimeOfDay>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| DataError::MalformedSchedule {
                medicine_id: self.id.clone(),
                source: Box::new(source),
            })
    }

    /// Check the fields the engine relies on for display.
    pub fn validate(&self) -> Result<(), DataError> {
        require(&self.id, "id", &self.id)?;
        require(&self.id, "name", &self.name)?;
        require(&self.id, "dosage", &self.dosage)?;
        Ok(())
    }

    /// Whether `date` falls inside `[start_date, end_date]` (open ends allowed).
    ///
    /// Occurrence expansion does not consult this.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        let started = self.start_date.map_or(true, |start| start <= date);
        let not_ended = self.end_date.map_or(true, |end| date <= end);
        started && not_ended
    }

    pub fn taken_count(&self) -> usize {
        self.count_status(DoseStatus::Taken)
    }

    pub fn missed_count(&self) -> usize {
        self.count_status(DoseStatus::Missed)
    }

    fn count_status(&self, status: DoseStatus) -> usize {
        self.dose_logs.iter().filter(|l| l.status == status).count()
    }
}

fn require(medicine_id: &str, field: &str, value: &str) -> Result<(), DataError> {
    if value.trim().is_empty() {
        return Err(DataError::MissingField {
            medicine_id: medicine_id.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Input for creating a medicine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub times: Vec<TimeOfDay>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub reminder_enabled: bool,
}

impl NewMedicine {
    /// A medicine with the frequency's default dose times and reminders on.
    pub fn new(name: impl Into<String>, dosage: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            frequency,
            times: frequency.default_times(),
            start_date: None,
            end_date: None,
            notes: None,
            reminder_enabled: true,
        }
    }

    /// Name, dosage and at least one time are required.
    pub fn validate(&self) -> Result<(), DataError> {
        require("(new)", "name", &self.name)?;
        require("(new)", "dosage", &self.dosage)?;
        if self.times.is_empty() {
            return Err(DataError::MissingField {
                medicine_id: "(new)".into(),
                field: "times".into(),
            });
        }
        Ok(())
    }
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicineUpdate {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<Frequency>,
    pub times: Option<Vec<TimeOfDay>>,
    pub notes: Option<String>,
    pub reminder_enabled: Option<bool>,
}

impl MedicineUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply onto a medicine. Dose logs are never touched.
    pub fn apply(&self, medicine: &mut Medicine) -> Result<(), DataError> {
        if let Some(name) = &self.name {
            medicine.name = name.clone();
        }
        if let Some(dosage) = &self.dosage {
            medicine.dosage = dosage.clone();
        }
        if let Some(frequency) = self.frequency {
            medicine.frequency = frequency;
        }
        if let Some(times) = &self.times {
            medicine.times = times.iter().map(ToString::to_string).collect();
        }
        if let Some(notes) = &self.notes {
            medicine.notes = Some(notes.clone());
        }
        if let Some(enabled) = self.reminder_enabled {
            medicine.reminder_enabled = enabled;
        }
        medicine.validate()
    }
}
