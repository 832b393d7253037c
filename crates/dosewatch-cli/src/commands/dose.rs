use clap::Subcommand;
use dosewatch_core::{Database, DoseStatus, MedicineStore};

use super::parse_at;

#[derive(Subcommand)]
pub enum DoseAction {
    /// Record a dose as taken or missed
    Log {
        /// Medicine ID
        id: String,
        /// taken or missed
        status: DoseStatus,
        /// Scheduled date-time of the dose (YYYY-MM-DDTHH:MM); defaults to now
        #[arg(long)]
        scheduled: Option<String>,
    },
}

pub fn run(action: DoseAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        DoseAction::Log {
            id,
            status,
            scheduled,
        } => {
            let scheduled_time = parse_at(scheduled.as_deref())?;
            let entry = db.log_dose(&id, status, scheduled_time)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
    }
    Ok(())
}
