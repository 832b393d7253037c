//! SQLite-backed medicine store.
//!
//! Provides persistent storage for:
//! - Medicines and their dose times
//! - Append-only dose logs (taken / missed)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, MedicineStore};
use crate::error::StoreError;
use crate::medicine::{DoseLogEntry, DoseStatus, Frequency, Medicine, MedicineUpdate, NewMedicine};

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite database for medicines and dose logs.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data dir>/dosewatch.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open_at(&dir.join("dosewatch.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn().execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS medicines (
                id               TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                dosage           TEXT NOT NULL,
                frequency        TEXT NOT NULL,
                times            TEXT NOT NULL DEFAULT '[]',
                start_date       TEXT,
                end_date         TEXT,
                notes            TEXT,
                reminder_enabled INTEGER NOT NULL DEFAULT 1,
                created_at       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dose_logs (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                medicine_id    TEXT NOT NULL REFERENCES medicines(id) ON DELETE CASCADE,
                status         TEXT NOT NULL,
                scheduled_time TEXT NOT NULL,
                logged_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_dose_logs_medicine_id ON dose_logs(medicine_id);",
        )?;
        Ok(())
    }

    fn fetch_medicine(conn: &Connection, id: &str) -> Result<Option<Medicine>, StoreError> {
        let row = conn
            .query_row(
                "SELECT id, name, dosage, frequency, times, start_date, end_date, notes, reminder_enabled
                 FROM medicines WHERE id = ?1",
                params![id],
                MedicineRow::from_row,
            )
            .optional()?;
        match row {
            Some(row) => {
                let logs = Self::fetch_logs(conn, id)?;
                Ok(Some(row.into_medicine(logs)?))
            }
            None => Ok(None),
        }
    }

    fn fetch_logs(conn: &Connection, id: &str) -> Result<Vec<DoseLogEntry>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT status, scheduled_time, logged_at FROM dose_logs
             WHERE medicine_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (status, scheduled, logged) = row?;
            let corrupt = |message: String| StoreError::Corrupt {
                id: id.to_string(),
                message,
            };
            logs.push(DoseLogEntry {
                status: status.parse::<DoseStatus>().map_err(|e| corrupt(e.to_string()))?,
                scheduled_time: parse_datetime(&scheduled).map_err(corrupt)?,
                logged_at: parse_datetime(&logged).map_err(corrupt)?,
            });
        }
        Ok(logs)
    }

    fn require(conn: &Connection, id: &str) -> Result<Medicine, StoreError> {
        Self::fetch_medicine(conn, id)?.ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }
}

impl MedicineStore for Database {
    fn load_all(&self) -> Result<Vec<Medicine>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, dosage, frequency, times, start_date, end_date, notes, reminder_enabled
             FROM medicines ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map([], MedicineRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut medicines = Vec::with_capacity(rows.len());
        for row in rows {
            let logs = Self::fetch_logs(&conn, &row.id)?;
            medicines.push(row.into_medicine(logs)?);
        }
        tracing::debug!(count = medicines.len(), "loaded medicines");
        Ok(medicines)
    }

    fn get_medicine(&self, id: &str) -> Result<Medicine, StoreError> {
        Self::require(&self.conn(), id)
    }

    fn create_medicine(&self, new: &NewMedicine) -> Result<Medicine, StoreError> {
        new.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let times: Vec<String> = new.times.iter().map(ToString::to_string).collect();
        let times_json =
            serde_json::to_string(&times).map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO medicines
                (id, name, dosage, frequency, times, start_date, end_date, notes, reminder_enabled, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                new.name.trim(),
                new.dosage.trim(),
                new.frequency.as_str(),
                times_json,
                new.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
                new.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                new.notes,
                new.reminder_enabled,
                format_datetime(Local::now().naive_local()),
            ],
        )?;
        tracing::info!(%id, name = %new.name, "medicine created");
        Self::require(&conn, &id)
    }

    fn update_medicine(&self, id: &str, update: &MedicineUpdate) -> Result<Medicine, StoreError> {
        let conn = self.conn();
        let mut medicine = Self::require(&conn, id)?;
        update.apply(&mut medicine)?;

        let times_json = serde_json::to_string(&medicine.times)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        conn.execute(
            "UPDATE medicines
             SET name = ?2, dosage = ?3, frequency = ?4, times = ?5, notes = ?6, reminder_enabled = ?7
             WHERE id = ?1",
            params![
                id,
                medicine.name,
                medicine.dosage,
                medicine.frequency.as_str(),
                times_json,
                medicine.notes,
                medicine.reminder_enabled,
            ],
        )?;
        tracing::info!(%id, "medicine updated");
        Ok(medicine)
    }

    fn delete_medicine(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM medicines WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        tracing::info!(%id, "medicine deleted");
        Ok(())
    }

    fn log_dose(
        &self,
        id: &str,
        status: DoseStatus,
        scheduled_time: NaiveDateTime,
    ) -> Result<DoseLogEntry, StoreError> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM medicines WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        let entry = DoseLogEntry {
            status,
            scheduled_time,
            logged_at: Local::now().naive_local(),
        };
        conn.execute(
            "INSERT INTO dose_logs (medicine_id, status, scheduled_time, logged_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                status.as_str(),
                format_datetime(entry.scheduled_time),
                format_datetime(entry.logged_at),
            ],
        )?;
        tracing::info!(%id, %status, scheduled = %scheduled_time, "dose logged");
        Ok(entry)
    }
}

/// Raw column values; conversion failures become `StoreError::Corrupt`.
struct MedicineRow {
    id: String,
    name: String,
    dosage: String,
    frequency: String,
    times: String,
    start_date: Option<String>,
    end_date: Option<String>,
    notes: Option<String>,
    reminder_enabled: bool,
}

impl MedicineRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            dosage: row.get(2)?,
            frequency: row.get(3)?,
            times: row.get(4)?,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            notes: row.get(7)?,
            reminder_enabled: row.get(8)?,
        })
    }

    fn into_medicine(self, dose_logs: Vec<DoseLogEntry>) -> Result<Medicine, StoreError> {
        let id = self.id;
        let corrupt = |message: String| StoreError::Corrupt {
            id: id.clone(),
            message,
        };
        let frequency = self
            .frequency
            .parse::<Frequency>()
            .map_err(|e| corrupt(e.to_string()))?;
        let times: Vec<String> =
            serde_json::from_str(&self.times).map_err(|e| corrupt(e.to_string()))?;
        let start_date = self
            .start_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(corrupt)?;
        let end_date = self
            .end_date
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(corrupt)?;

        Ok(Medicine {
            id,
            name: self.name,
            dosage: self.dosage,
            frequency,
            times,
            start_date,
            end_date,
            notes: self.notes,
            reminder_enabled: self.reminder_enabled,
            dose_logs,
        })
    }
}

fn format_datetime(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|e| format!("'{value}': {e}"))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| format!("'{value}': {e}"))
}
