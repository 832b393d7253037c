use chrono::NaiveDate;
use clap::Subcommand;
use dosewatch_core::{Database, Frequency, MedicineStore, MedicineUpdate, NewMedicine, TimeOfDay};

#[derive(Subcommand)]
pub enum MedicineAction {
    /// Add a medicine
    Add {
        /// Display name
        name: String,
        /// Dosage (e.g. "100mg")
        dosage: String,
        /// once-daily, twice-daily, three-times-daily or four-times-daily
        #[arg(long, default_value = "once-daily")]
        frequency: Frequency,
        /// Dose time in HH:MM (repeatable); defaults follow the frequency
        #[arg(long = "time")]
        times: Vec<TimeOfDay>,
        /// First day of the course (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day of the course (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
        /// Create with reminders switched off
        #[arg(long)]
        no_reminder: bool,
    },
    /// List all medicines
    List,
    /// Show one medicine with its dose log
    Show {
        id: String,
    },
    /// Update fields of a medicine
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        dosage: Option<String>,
        #[arg(long)]
        frequency: Option<Frequency>,
        /// Replaces every dose time (repeatable)
        #[arg(long = "time")]
        times: Vec<TimeOfDay>,
        #[arg(long)]
        notes: Option<String>,
        /// Turn reminders on or off
        #[arg(long)]
        reminders: Option<bool>,
    },
    /// Remove a medicine and its dose log
    Remove {
        id: String,
    },
}

pub fn run(action: MedicineAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        MedicineAction::Add {
            name,
            dosage,
            frequency,
            times,
            start,
            end,
            notes,
            no_reminder,
        } => {
            let mut new = NewMedicine::new(name, dosage, frequency);
            if !times.is_empty() {
                new.times = times;
            }
            new.start_date = start;
            new.end_date = end;
            new.notes = notes;
            new.reminder_enabled = !no_reminder;

            let created = db.create_medicine(&new)?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        MedicineAction::List => {
            let medicines = db.load_all()?;
            println!("{}", serde_json::to_string_pretty(&medicines)?);
        }
        MedicineAction::Show { id } => {
            let medicine = db.get_medicine(&id)?;
            println!("{}", serde_json::to_string_pretty(&medicine)?);
        }
        MedicineAction::Update {
            id,
            name,
            dosage,
            frequency,
            times,
            notes,
            reminders,
        } => {
            let update = MedicineUpdate {
                name,
                dosage,
                frequency,
                times: (!times.is_empty()).then_some(times),
                notes,
                reminder_enabled: reminders,
            };
            if update.is_empty() {
                return Err("nothing to update".into());
            }
            let updated = db.update_medicine(&id, &update)?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        MedicineAction::Remove { id } => {
            db.delete_medicine(&id)?;
            println!("{}", serde_json::json!({ "type": "medicine_removed", "id": id }));
        }
    }
    Ok(())
}
