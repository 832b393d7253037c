mod config;
pub mod database;

pub use config::{AdherenceConfig, Config, LoggingConfig, NotificationsConfig, RemindersConfig};
pub use database::Database;

use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::error::{ConfigError, StoreError};
use crate::medicine::{DoseLogEntry, DoseStatus, Medicine, MedicineUpdate, NewMedicine};

/// The persistence collaborator the engine loads its snapshots from.
///
/// Implementations must be callable from any thread; the driver invokes
/// them on the blocking pool.
pub trait MedicineStore: Send + Sync {
    /// Every medicine with its full dose log, in a stable order.
    fn load_all(&self) -> Result<Vec<Medicine>, StoreError>;

    fn get_medicine(&self, id: &str) -> Result<Medicine, StoreError>;

    fn create_medicine(&self, new: &NewMedicine) -> Result<Medicine, StoreError>;

    fn update_medicine(&self, id: &str, update: &MedicineUpdate) -> Result<Medicine, StoreError>;

    /// Removes the medicine and its dose log.
    fn delete_medicine(&self, id: &str) -> Result<(), StoreError>;

    /// Append one entry to the medicine's dose log.
    fn log_dose(
        &self,
        id: &str,
        status: DoseStatus,
        scheduled_time: NaiveDateTime,
    ) -> Result<DoseLogEntry, StoreError>;
}

/// Returns the data directory.
///
/// `DOSEWATCH_HOME` wins when set; otherwise `~/.config/dosewatch[-dev]/`
/// depending on `DOSEWATCH_ENV=dev`. The directory is created if missing.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("DOSEWATCH_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DOSEWATCH_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("dosewatch-dev")
            } else {
                base_dir.join("dosewatch")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
