//! Statistics module for dosewatch
//!
//! Adherence tracking over the dose logs of every known medicine.

mod adherence;

pub use adherence::{
    adherence_rate, average_rate, AdherenceAnalyzer, AdherenceBand, AdherenceReport,
    MedicineAdherence, NO_DATA_RATE,
};
