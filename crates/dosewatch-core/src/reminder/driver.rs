//! Tick driver: the recurring timer around [`ReminderEngine`].
//!
//! The driver owns the engine, the store handle and the notifier. It ticks
//! once immediately on `start()` and then every `tick_interval`, publishing
//! the upcoming window and the adherence report through `watch` channels and
//! every state change through a `broadcast` channel of [`Event`]s.
//!
//! The timer task loads a snapshot before its first tick (and before every
//! tick with `reload_on_tick`). Store calls run on the blocking pool and
//! never hold the engine lock. A failed load leaves the previous snapshot
//! in place.
//!
//! Every publication happens under the engine lock after checking the
//! teardown flag, and `stop()` sets that flag under the same lock, so
//! nothing is published once `DriverStopped` has been sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::{ReminderEngine, TickOutcome};
use super::occurrence::Occurrence;
use crate::error::StoreError;
use crate::events::Event;
use crate::medicine::{DoseLogEntry, DoseStatus, Medicine, MedicineUpdate, NewMedicine};
use crate::notify::{Notifier, Permission};
use crate::stats::AdherenceReport;
use crate::storage::{Config, MedicineStore};

const EVENT_CAPACITY: usize = 64;

/// Source of the local wall-clock "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    pub tick_interval: Duration,
    /// Reload the snapshot before every tick, not just the first.
    pub reload_on_tick: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            reload_on_tick: false,
        }
    }
}

impl DriverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_secs(config.reminders.tick_interval_secs.max(1)),
            reload_on_tick: config.reminders.reload_on_tick,
        }
    }
}

struct Shared<S, N, C> {
    store: Arc<S>,
    notifier: N,
    clock: C,
    options: DriverOptions,
    engine: Mutex<ReminderEngine>,
    torn_down: AtomicBool,
    permission_asked: AtomicBool,
    upcoming_tx: watch::Sender<Vec<Occurrence>>,
    adherence_tx: watch::Sender<AdherenceReport>,
    events_tx: broadcast::Sender<Event>,
}

/// Owned scheduler object with a `start()`/`stop()` lifecycle.
pub struct TickDriver<S, N, C = SystemClock> {
    shared: Arc<Shared<S, N, C>>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl<S, N, C> TickDriver<S, N, C>
where
    S: MedicineStore + 'static,
    N: Notifier + 'static,
    C: Clock + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: N,
        clock: C,
        engine: ReminderEngine,
        options: DriverOptions,
    ) -> Self {
        let (upcoming_tx, _) = watch::channel(Vec::new());
        let (adherence_tx, _) = watch::channel((*engine.adherence()).clone());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                store,
                notifier,
                clock,
                options,
                engine: Mutex::new(engine),
                torn_down: AtomicBool::new(false),
                permission_asked: AtomicBool::new(false),
                upcoming_tx,
                adherence_tx,
                events_tx,
            }),
            shutdown,
            task: None,
        }
    }

    // ── Outputs ──────────────────────────────────────────────────────

    /// The sorted upcoming window as of the latest tick.
    pub fn upcoming(&self) -> watch::Receiver<Vec<Occurrence>> {
        self.shared.upcoming_tx.subscribe()
    }

    /// The adherence report as of the latest snapshot.
    pub fn adherence(&self) -> watch::Receiver<AdherenceReport> {
        self.shared.adherence_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events_tx.subscribe()
    }

    /// The wall-clock reference every component of this driver uses.
    pub fn now(&self) -> NaiveDateTime {
        self.shared.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::SeqCst)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Ask for notification permission and begin ticking.
    ///
    /// The first tick runs immediately, on a freshly loaded snapshot.
    /// Calling `start` twice, or after `stop`, does nothing.
    pub fn start(&mut self) {
        if self.task.is_some() || self.is_torn_down() {
            return;
        }

        let permission = {
            let mut engine = self.shared.lock_engine();
            self.shared.ensure_permission(&mut engine)
        };
        tracing::info!(?permission, interval = ?self.shared.options.tick_interval, "reminder driver started");
        self.shared.emit(Event::DriverStarted {
            permission,
            interval_secs: self.shared.options.tick_interval.as_secs(),
            at: self.shared.clock.now(),
        });

        let shared = Arc::clone(&self.shared);
        let mut shutdown = self.shutdown.subscribe();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(shared.options.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut loaded = false;
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.changed() => break,
                }
                if !loaded || shared.options.reload_on_tick {
                    loaded = true;
                    tokio::select! {
                        // Failures are logged and published by refresh itself.
                        _ = shared.refresh() => {}
                        _ = shutdown.changed() => break,
                    }
                }
                shared.tick();
            }
        }));
    }

    /// Cancel the recurrence. Nothing is published after `DriverStopped`.
    pub async fn stop(&mut self) {
        {
            let _engine = self.shared.lock_engine();
            if self.shared.torn_down.swap(true, Ordering::SeqCst) {
                return;
            }
            let _ = self.shared.events_tx.send(Event::DriverStopped {
                at: self.shared.clock.now(),
            });
        }
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!("reminder driver stopped");
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Run one tick right now, outside the timer, on the current snapshot.
    ///
    /// Asks for notification permission first if nobody has yet. Reminders
    /// fired here count as fired for the rest of the day.
    pub fn tick_now(&self) -> Option<TickOutcome> {
        self.shared.tick()
    }

    /// Load a fresh snapshot from the store and install it.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        self.shared.refresh().await
    }

    /// Append a dose log entry, then reload.
    pub async fn log_dose(
        &self,
        medicine_id: &str,
        status: DoseStatus,
        scheduled_time: NaiveDateTime,
    ) -> Result<DoseLogEntry, StoreError> {
        let id = medicine_id.to_string();
        let entry = self
            .with_store(move |store| store.log_dose(&id, status, scheduled_time))
            .await?;
        self.refresh().await?;
        Ok(entry)
    }

    pub async fn create_medicine(&self, new: NewMedicine) -> Result<Medicine, StoreError> {
        let created = self
            .with_store(move |store| store.create_medicine(&new))
            .await?;
        self.refresh().await?;
        Ok(created)
    }

    pub async fn update_medicine(
        &self,
        medicine_id: &str,
        update: MedicineUpdate,
    ) -> Result<Medicine, StoreError> {
        let id = medicine_id.to_string();
        let updated = self
            .with_store(move |store| store.update_medicine(&id, &update))
            .await?;
        self.refresh().await?;
        Ok(updated)
    }

    pub async fn delete_medicine(&self, medicine_id: &str) -> Result<(), StoreError> {
        let id = medicine_id.to_string();
        self.with_store(move |store| store.delete_medicine(&id))
            .await?;
        self.refresh().await?;
        Ok(())
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.shared.store);
        tokio::task::spawn_blocking(move || f(store.as_ref())).await?
    }
}

impl<S, N, C> Shared<S, N, C>
where
    S: MedicineStore + 'static,
    N: Notifier + 'static,
    C: Clock + 'static,
{
    fn lock_engine(&self) -> MutexGuard<'_, ReminderEngine> {
        // A panic mid-tick leaves the engine usable; keep going.
        self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    fn emit(&self, event: Event) {
        if self.is_torn_down() {
            return;
        }
        let _ = self.events_tx.send(event);
    }

    /// Ask the notifier once per driver; later calls return the stored answer.
    fn ensure_permission(&self, engine: &mut ReminderEngine) -> Permission {
        if !self.permission_asked.swap(true, Ordering::SeqCst) {
            engine.set_permission(self.notifier.request_permission());
        }
        engine.permission()
    }

    fn tick(&self) -> Option<TickOutcome> {
        let mut engine = self.lock_engine();
        if self.is_torn_down() {
            return None;
        }
        self.ensure_permission(&mut engine);
        let now = self.clock.now();
        let outcome = engine.tick(now);

        if outcome.rolled_over {
            self.emit(Event::DayRolledOver { day: now.date(), at: now });
        }
        for err in &outcome.skipped {
            self.emit(Event::MedicineSkipped {
                medicine_id: err.medicine_id().map(str::to_string),
                reason: err.to_string(),
                at: now,
            });
        }
        for notification in &outcome.fired {
            let delivered = outcome.permission.is_granted()
                && match self.notifier.deliver(notification) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(error = %err, key = %notification.key, "reminder delivery failed");
                        false
                    }
                };
            tracing::info!(key = %notification.key, delivered, "reminder fired");
            self.emit(Event::ReminderFired {
                notification: notification.clone(),
                delivered,
                at: now,
            });
        }

        self.upcoming_tx.send_replace(outcome.upcoming.clone());
        self.emit(Event::TickCompleted {
            upcoming: outcome.upcoming.len(),
            fired: outcome.fired.len(),
            at: now,
        });
        Some(outcome)
    }

    async fn refresh(&self) -> Result<usize, StoreError> {
        let store = Arc::clone(&self.store);
        let loaded = tokio::task::spawn_blocking(move || store.load_all()).await?;
        let now = self.clock.now();

        let mut engine = self.lock_engine();
        if self.is_torn_down() {
            tracing::debug!("discarding store result that arrived after teardown");
            return loaded.map(|medicines| medicines.len());
        }

        let medicines = match loaded {
            Ok(medicines) => medicines,
            Err(err) => {
                tracing::warn!(error = %err, "refresh failed, keeping previous snapshot");
                self.emit(Event::RefreshFailed {
                    message: err.to_string(),
                    at: now,
                });
                return Err(err);
            }
        };

        let count = medicines.len();
        engine.replace_snapshot(medicines, now);
        self.adherence_tx.send_replace((*engine.adherence()).clone());
        self.emit(Event::SnapshotReplaced {
            medicines: count,
            at: now,
        });
        Ok(count)
    }
}

impl<S, N, C> Drop for TickDriver<S, N, C> {
    fn drop(&mut self) {
        self.shared.torn_down.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
