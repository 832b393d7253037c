//! Dose adherence statistics
//!
//! Folds each medicine's dose log into counts and a percentage rate, then
//! averages the rates across medicines. Rates are banded into:
//! - **Good**: at or above `good_threshold` (default 80)
//! - **Warning**: at or above `warning_threshold` (default 60)
//! - **Poor**: everything below

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::medicine::Medicine;

/// Rate reported for a medicine with no logged doses yet.
pub const NO_DATA_RATE: u32 = 100;

/// Severity band of an adherence rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdherenceBand {
    Good,
    Warning,
    Poor,
}

impl AdherenceBand {
    /// Display color used by the dashboard bars
    pub fn color(&self) -> &'static str {
        match self {
            Self::Good => "#4caf50",
            Self::Warning => "#ff9800",
            Self::Poor => "#f44336",
        }
    }
}

impl fmt::Display for AdherenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => f.write_str("good"),
            Self::Warning => f.write_str("warning"),
            Self::Poor => f.write_str("poor"),
        }
    }
}

/// Adherence of a single medicine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineAdherence {
    pub medicine_id: String,
    pub name: String,
    pub total_doses: u32,
    pub taken_doses: u32,
    pub missed_doses: u32,
    /// Percentage 0-100
    pub adherence_rate: u32,
    pub band: AdherenceBand,
}

/// Adherence across all medicines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceReport {
    pub total_medicines: u32,
    /// Mean of per-medicine rates; `None` when there are no medicines
    pub average_adherence: Option<u32>,
    /// Logged doses summed over all medicines
    pub total_doses: u32,
    /// Missed doses summed over all medicines
    pub missed_doses: u32,
    pub medicines: Vec<MedicineAdherence>,
}

impl AdherenceReport {
    pub fn get(&self, medicine_id: &str) -> Option<&MedicineAdherence> {
        self.medicines.iter().find(|m| m.medicine_id == medicine_id)
    }
}

/// Analyzer for dose adherence
#[derive(Debug, Clone)]
pub struct AdherenceAnalyzer {
    /// Lowest rate still considered "good"
    pub good_threshold: u32,
    /// Lowest rate still considered "warning"
    pub warning_threshold: u32,
}

impl Default for AdherenceAnalyzer {
    fn default() -> Self {
        Self {
            good_threshold: 80,
            warning_threshold: 60,
        }
    }
}

impl AdherenceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(good_threshold: u32, warning_threshold: u32) -> Self {
        Self {
            good_threshold,
            warning_threshold,
        }
    }

    /// Lower bounds are inclusive.
    pub fn band(&self, rate: u32) -> AdherenceBand {
        if rate >= self.good_threshold {
            AdherenceBand::Good
        } else if rate >= self.warning_threshold {
            AdherenceBand::Warning
        } else {
            AdherenceBand::Poor
        }
    }

    pub fn medicine(&self, medicine: &Medicine) -> MedicineAdherence {
        let total = medicine.dose_logs.len() as u32;
        let taken = medicine.taken_count() as u32;
        let missed = medicine.missed_count() as u32;
        let rate = adherence_rate(taken, total);
        MedicineAdherence {
            medicine_id: medicine.id.clone(),
            name: medicine.name.clone(),
            total_doses: total,
            taken_doses: taken,
            missed_doses: missed,
            adherence_rate: rate,
            band: self.band(rate),
        }
    }

    pub fn analyze(&self, medicines: &[Medicine]) -> AdherenceReport {
        let per_medicine: Vec<MedicineAdherence> =
            medicines.iter().map(|m| self.medicine(m)).collect();
        let rates: Vec<u32> = per_medicine.iter().map(|m| m.adherence_rate).collect();

        AdherenceReport {
            total_medicines: per_medicine.len() as u32,
            average_adherence: average_rate(&rates),
            total_doses: per_medicine.iter().map(|m| m.total_doses).sum(),
            missed_doses: per_medicine.iter().map(|m| m.missed_doses).sum(),
            medicines: per_medicine,
        }
    }
}

/// `round(taken / total * 100)`, half up; [`NO_DATA_RATE`] when nothing was logged.
pub fn adherence_rate(taken: u32, total: u32) -> u32 {
    if total == 0 {
        return NO_DATA_RATE;
    }
    let (taken, total) = (taken as u64, total as u64);
    ((taken * 200 + total) / (2 * total)) as u32
}

/// Arithmetic mean rounded half up; `None` for an empty slice.
pub fn average_rate(rates: &[u32]) -> Option<u32> {
    if rates.is_empty() {
        return None;
    }
    let n = rates.len() as u64;
    let sum: u64 = rates.iter().map(|&r| r as u64).sum();
    Some(((2 * sum + n) / (2 * n)) as u32)
}
