use clap::Subcommand;
use dosewatch_core::{Config, Database, MedicineStore};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Per-medicine and overall adherence
    Adherence {
        /// Only this medicine
        #[arg(long)]
        id: Option<String>,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let analyzer = config.adherence_analyzer();

    match action {
        StatsAction::Adherence { id: None } => {
            let report = analyzer.analyze(&db.load_all()?);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        StatsAction::Adherence { id: Some(id) } => {
            let medicine = db.get_medicine(&id)?;
            let stats = analyzer.medicine(&medicine);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
