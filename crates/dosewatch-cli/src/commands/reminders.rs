use std::sync::Arc;

use clap::Subcommand;
use dosewatch_core::error::NotifyError;
use dosewatch_core::{
    Config, Database, DriverOptions, MedicineStore, Notifier, Permission, ReminderEngine,
    ReminderNotification, SystemClock, TickDriver,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::parse_at;

#[derive(Subcommand)]
pub enum RemindersAction {
    /// Doses due within the upcoming window
    Upcoming {
        /// Reference time (YYYY-MM-DDTHH:MM); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Run the reminder loop until Ctrl-C, printing events as JSON lines
    Watch,
}

#[derive(Serialize)]
struct UpcomingDose {
    medicine_id: String,
    medicine_name: String,
    dosage: String,
    time: String,
    instant: chrono::NaiveDateTime,
    time_remaining: String,
}

/// Rings the terminal bell and prints the reminder on stderr.
struct TerminalNotifier {
    enabled: bool,
}

impl Notifier for TerminalNotifier {
    fn request_permission(&self) -> Permission {
        if self.enabled {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn deliver(&self, notification: &ReminderNotification) -> Result<(), NotifyError> {
        eprintln!(
            "\x07[{}] {}: {}",
            notification.scheduled_for.format("%H:%M"),
            notification.title,
            notification.body
        );
        Ok(())
    }
}

pub fn run(action: RemindersAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match action {
        RemindersAction::Upcoming { at } => {
            let now = parse_at(at.as_deref())?;
            let db = Database::open()?;
            let mut engine = ReminderEngine::from_config(&config);
            engine.replace_snapshot(db.load_all()?, now);

            let upcoming: Vec<UpcomingDose> = engine
                .upcoming(now)
                .into_iter()
                .map(|o| UpcomingDose {
                    time_remaining: o.time_remaining_label(now),
                    time: o.time_of_day.to_string(),
                    medicine_id: o.medicine_id,
                    medicine_name: o.medicine_name,
                    dosage: o.dosage,
                    instant: o.instant,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&upcoming)?);
        }
        RemindersAction::Watch => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(watch(config))?;
        }
    }
    Ok(())
}

async fn watch(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(Database::open()?);
    let notifier = TerminalNotifier {
        enabled: config.notifications.enabled,
    };
    let mut driver = TickDriver::new(
        store,
        notifier,
        SystemClock,
        ReminderEngine::from_config(&config),
        DriverOptions::from_config(&config),
    );
    let mut events = driver.subscribe();

    driver.refresh().await?;
    driver.start();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    driver.stop().await;
    Ok(())
}
