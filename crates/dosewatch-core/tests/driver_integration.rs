//! Integration tests for the tick driver.
//!
//! Uses an in-memory store that can be told to fail, a settable clock and a
//! notifier that records what it was asked to show.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use dosewatch_core::error::NotifyError;
use dosewatch_core::{
    Clock, Database, DoseLogEntry, DoseStatus, DriverOptions, Event, Frequency, Medicine,
    MedicineStore, MedicineUpdate, NewMedicine, Notifier, Permission, ReminderEngine,
    ReminderNotification, StoreError, TickDriver, TimeOfDay,
};
use tokio::sync::{broadcast, Notify};

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 15)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn medicine(id: &str, times: &[&str]) -> Medicine {
    Medicine {
        id: id.into(),
        name: format!("Med {id}"),
        dosage: "10mg".into(),
        frequency: Frequency::OnceDaily,
        times: times.iter().map(|t| t.to_string()).collect(),
        start_date: None,
        end_date: None,
        notes: None,
        reminder_enabled: true,
        dose_logs: Vec::new(),
    }
}

struct ManualClock(Mutex<NaiveDateTime>);

impl ManualClock {
    fn at(now: NaiveDateTime) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

struct RecordingNotifier {
    permission: Permission,
    fail: bool,
    requests: AtomicUsize,
    delivered: Mutex<Vec<ReminderNotification>>,
}

impl RecordingNotifier {
    fn new(permission: Permission) -> Arc<Self> {
        Arc::new(Self {
            permission,
            fail: false,
            requests: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }

    fn delivered(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn request_permission(&self) -> Permission {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.permission
    }

    fn deliver(&self, notification: &ReminderNotification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::DeliveryFailed("host refused".into()));
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Holds medicines in memory; `load_all` fails while `failing` is set.
#[derive(Default)]
struct MemStore {
    medicines: Mutex<Vec<Medicine>>,
    failing: AtomicBool,
}

impl MemStore {
    fn with(medicines: Vec<Medicine>) -> Arc<Self> {
        Arc::new(Self {
            medicines: Mutex::new(medicines),
            failing: AtomicBool::new(false),
        })
    }

    fn find(&self, id: &str) -> Result<Medicine, StoreError> {
        self.medicines
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.into() })
    }
}

impl MedicineStore for MemStore {
    fn load_all(&self) -> Result<Vec<Medicine>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(self.medicines.lock().unwrap().clone())
    }

    fn get_medicine(&self, id: &str) -> Result<Medicine, StoreError> {
        self.find(id)
    }

    fn create_medicine(&self, new: &NewMedicine) -> Result<Medicine, StoreError> {
        let mut medicines = self.medicines.lock().unwrap();
        let mut created = medicine(&format!("m{}", medicines.len() + 1), &[]);
        created.name = new.name.clone();
        created.times = new.times.iter().map(ToString::to_string).collect();
        medicines.push(created.clone());
        Ok(created)
    }

    fn update_medicine(&self, id: &str, update: &MedicineUpdate) -> Result<Medicine, StoreError> {
        let mut medicines = self.medicines.lock().unwrap();
        let target = medicines
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.into() })?;
        update.apply(target)?;
        Ok(target.clone())
    }

    fn delete_medicine(&self, id: &str) -> Result<(), StoreError> {
        self.medicines.lock().unwrap().retain(|m| m.id != id);
        Ok(())
    }

    fn log_dose(
        &self,
        id: &str,
        status: DoseStatus,
        scheduled_time: NaiveDateTime,
    ) -> Result<DoseLogEntry, StoreError> {
        let mut medicines = self.medicines.lock().unwrap();
        let target = medicines
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.into() })?;
        let entry = DoseLogEntry {
            status,
            scheduled_time,
            logged_at: scheduled_time,
        };
        target.dose_logs.push(entry.clone());
        Ok(entry)
    }
}

fn options(tick_interval: StdDuration, reload_on_tick: bool) -> DriverOptions {
    DriverOptions {
        tick_interval,
        reload_on_tick,
    }
}

async fn next_matching<F>(events: &mut broadcast::Receiver<Event>, mut pred: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(StdDuration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_first_tick_runs_immediately_on_start() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let notifier = RecordingNotifier::new(Permission::Granted);
    let mut driver = TickDriver::new(
        store,
        Arc::clone(&notifier),
        ManualClock::at(at(8, 58)),
        ReminderEngine::default(),
        options(StdDuration::from_secs(3600), false),
    );
    driver.refresh().await.unwrap();
    let mut events = driver.subscribe();
    let mut upcoming = driver.upcoming();

    driver.start();
    assert!(driver.is_running());

    let started = next_matching(&mut events, |e| matches!(e, Event::DriverStarted { .. })).await;
    assert!(matches!(
        started,
        Event::DriverStarted { permission: Permission::Granted, interval_secs: 3600, .. }
    ));
    let fired = next_matching(&mut events, |e| matches!(e, Event::ReminderFired { .. })).await;
    match fired {
        Event::ReminderFired { notification, delivered, .. } => {
            assert!(delivered);
            assert_eq!(notification.key.to_string(), "m1@09:00");
        }
        other => panic!("unexpected event {other:?}"),
    }

    upcoming.changed().await.unwrap();
    assert_eq!(upcoming.borrow().len(), 1);
    assert_eq!(notifier.delivered(), 1);

    driver.stop().await;
}

#[tokio::test]
async fn test_start_loads_before_first_tick() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let notifier = RecordingNotifier::new(Permission::Granted);
    let mut driver = TickDriver::new(
        store,
        Arc::clone(&notifier),
        ManualClock::at(at(8, 58)),
        ReminderEngine::default(),
        options(StdDuration::from_secs(3600), false),
    );
    let mut events = driver.subscribe();
    driver.start();

    let completed = next_matching(&mut events, |e| matches!(e, Event::TickCompleted { .. })).await;
    assert!(
        matches!(completed, Event::TickCompleted { upcoming: 1, fired: 1, .. }),
        "first tick saw {completed:?}"
    );
    assert_eq!(notifier.delivered(), 1);
    assert_eq!(driver.adherence().borrow().total_medicines, 1);
    driver.stop().await;
}

#[tokio::test]
async fn test_reload_on_tick_loads_before_every_tick() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let mut driver = TickDriver::new(
        store,
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 0)),
        ReminderEngine::default(),
        options(StdDuration::from_millis(20), true),
    );
    let mut events = driver.subscribe();
    driver.start();

    let mut ticks = 0;
    let mut loaded_since_last_tick = false;
    while ticks < 3 {
        match next_matching(&mut events, |e| {
            matches!(e, Event::SnapshotReplaced { .. } | Event::TickCompleted { .. })
        })
        .await
        {
            Event::SnapshotReplaced { .. } => loaded_since_last_tick = true,
            _ => {
                assert!(loaded_since_last_tick, "tick {ticks} ran without a reload");
                loaded_since_last_tick = false;
                ticks += 1;
            }
        }
    }
    driver.stop().await;
}

#[tokio::test]
async fn test_five_ticks_fire_one_notification() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let notifier = RecordingNotifier::new(Permission::Granted);
    let clock = ManualClock::at(at(8, 54));
    let driver = TickDriver::new(
        store,
        Arc::clone(&notifier),
        Arc::clone(&clock),
        ReminderEngine::default(),
        DriverOptions::default(),
    );
    driver.refresh().await.unwrap();

    let mut fired = 0;
    for minute in 0..5 {
        clock.set(at(8, 54) + Duration::minutes(minute));
        fired += driver.tick_now().unwrap().fired.len();
    }
    assert_eq!(fired, 1);
    assert_eq!(notifier.delivered(), 1);
}

#[tokio::test]
async fn test_manual_tick_before_start_asks_permission_once() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let notifier = RecordingNotifier::new(Permission::Granted);
    let mut driver = TickDriver::new(
        store,
        Arc::clone(&notifier),
        ManualClock::at(at(8, 58)),
        ReminderEngine::default(),
        options(StdDuration::from_secs(3600), false),
    );
    driver.refresh().await.unwrap();

    let outcome = driver.tick_now().unwrap();
    assert_eq!(outcome.permission, Permission::Granted);
    assert_eq!(outcome.fired.len(), 1);
    assert_eq!(notifier.delivered(), 1);

    let mut events = driver.subscribe();
    driver.start();
    let started = next_matching(&mut events, |e| matches!(e, Event::DriverStarted { .. })).await;
    assert!(matches!(started, Event::DriverStarted { permission: Permission::Granted, .. }));
    next_matching(&mut events, |e| matches!(e, Event::TickCompleted { .. })).await;

    assert_eq!(notifier.requests(), 1);
    assert_eq!(notifier.delivered(), 1);
    driver.stop().await;
}

#[tokio::test]
async fn test_denied_permission_records_without_delivering() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let notifier = RecordingNotifier::new(Permission::Denied);
    let mut driver = TickDriver::new(
        store,
        Arc::clone(&notifier),
        ManualClock::at(at(8, 58)),
        ReminderEngine::default(),
        options(StdDuration::from_secs(3600), false),
    );
    driver.refresh().await.unwrap();
    let mut events = driver.subscribe();
    driver.start();

    let fired = next_matching(&mut events, |e| matches!(e, Event::ReminderFired { .. })).await;
    assert!(matches!(fired, Event::ReminderFired { delivered: false, .. }));
    assert_eq!(notifier.delivered(), 0);

    // Already recorded as fired: nothing new on the next tick
    assert!(driver.tick_now().unwrap().fired.is_empty());
    driver.stop().await;
}

#[tokio::test]
async fn test_delivery_failure_is_not_fatal() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"]), medicine("m2", &["09:01"])]);
    let notifier = Arc::new(RecordingNotifier {
        permission: Permission::Granted,
        fail: true,
        requests: AtomicUsize::new(0),
        delivered: Mutex::new(Vec::new()),
    });
    let mut driver = TickDriver::new(
        store,
        notifier,
        ManualClock::at(at(8, 58)),
        ReminderEngine::default(),
        options(StdDuration::from_secs(3600), false),
    );
    driver.refresh().await.unwrap();
    let mut events = driver.subscribe();
    driver.start();

    for _ in 0..2 {
        let fired = next_matching(&mut events, |e| matches!(e, Event::ReminderFired { .. })).await;
        assert!(matches!(fired, Event::ReminderFired { delivered: false, .. }));
    }
    let completed = next_matching(&mut events, |e| matches!(e, Event::TickCompleted { .. })).await;
    assert!(matches!(completed, Event::TickCompleted { upcoming: 2, fired: 2, .. }));
    assert!(driver.is_running());
    driver.stop().await;
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let driver = TickDriver::new(
        Arc::clone(&store),
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 0)),
        ReminderEngine::default(),
        DriverOptions::default(),
    );
    assert_eq!(driver.refresh().await.unwrap(), 1);
    let mut events = driver.subscribe();

    store.failing.store(true, Ordering::SeqCst);
    let err = driver.refresh().await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert!(matches!(events.recv().await.unwrap(), Event::RefreshFailed { .. }));

    let outcome = driver.tick_now().unwrap();
    assert_eq!(outcome.upcoming.len(), 1);
    assert_eq!(outcome.upcoming[0].medicine_id, "m1");
}

#[tokio::test]
async fn test_malformed_medicine_is_skipped() {
    let store = MemStore::with(vec![medicine("bad", &["9am"]), medicine("good", &["09:00"])]);
    let driver = TickDriver::new(
        store,
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 0)),
        ReminderEngine::default(),
        DriverOptions::default(),
    );
    driver.refresh().await.unwrap();
    let mut events = driver.subscribe();

    let outcome = driver.tick_now().unwrap();
    assert_eq!(outcome.upcoming.len(), 1);
    let skipped = next_matching(&mut events, |e| matches!(e, Event::MedicineSkipped { .. })).await;
    assert!(matches!(
        skipped,
        Event::MedicineSkipped { medicine_id: Some(ref id), .. } if id == "bad"
    ));
}

#[tokio::test]
async fn test_stop_silences_the_driver() {
    let store = MemStore::with(vec![medicine("m1", &["09:00"])]);
    let mut driver = TickDriver::new(
        store,
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 0)),
        ReminderEngine::default(),
        options(StdDuration::from_millis(10), true),
    );
    let mut events = driver.subscribe();
    driver.start();
    next_matching(&mut events, |e| matches!(e, Event::TickCompleted { .. })).await;

    driver.stop().await;
    assert!(driver.is_torn_down());
    assert!(!driver.is_running());
    assert!(driver.tick_now().is_none());

    // Drain: nothing may follow DriverStopped
    let mut after_stop = Vec::new();
    let mut seen_stop = false;
    while let Ok(event) = events.try_recv() {
        if seen_stop {
            after_stop.push(event);
        } else if matches!(event, Event::DriverStopped { .. }) {
            seen_stop = true;
        }
    }
    assert!(seen_stop);
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    while let Ok(event) = events.try_recv() {
        after_stop.push(event);
    }
    assert!(after_stop.is_empty(), "events after stop: {after_stop:?}");

    // A second start after teardown is ignored
    driver.start();
    assert!(!driver.is_running());
}

#[tokio::test]
async fn test_reload_on_tick_picks_up_external_changes() {
    let store = MemStore::with(Vec::new());
    let mut driver = TickDriver::new(
        Arc::clone(&store),
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 0)),
        ReminderEngine::default(),
        options(StdDuration::from_millis(20), true),
    );
    let mut events = driver.subscribe();
    driver.start();

    store.medicines.lock().unwrap().push(medicine("m1", &["09:00"]));
    next_matching(&mut events, |e| {
        matches!(e, Event::SnapshotReplaced { medicines: 1, .. })
    })
    .await;
    next_matching(&mut events, |e| matches!(e, Event::TickCompleted { upcoming: 1, .. })).await;
    assert_eq!(driver.upcoming().borrow().len(), 1);

    driver.stop().await;
}

#[tokio::test]
async fn test_log_dose_reloads_adherence() {
    let store = Arc::new(Database::open_memory().unwrap());
    let driver = TickDriver::new(
        store,
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 0)),
        ReminderEngine::default(),
        DriverOptions::default(),
    );
    let mut new = NewMedicine::new("Aspirin", "100mg", Frequency::OnceDaily);
    new.times = vec![TimeOfDay::new(9, 0).unwrap()];
    let med = driver.create_medicine(new).await.unwrap();

    for status in [DoseStatus::Taken, DoseStatus::Taken, DoseStatus::Taken, DoseStatus::Missed] {
        driver.log_dose(&med.id, status, at(9, 0)).await.unwrap();
    }

    let adherence = driver.adherence();
    let report = adherence.borrow();
    assert_eq!(report.total_medicines, 1);
    assert_eq!(report.average_adherence, Some(75));
    assert_eq!(report.missed_doses, 1);
    drop(report);

    assert_eq!(driver.tick_now().unwrap().upcoming.len(), 1);
    driver.delete_medicine(&med.id).await.unwrap();
    assert_eq!(driver.adherence().borrow().total_medicines, 0);
}

#[tokio::test]
async fn test_log_dose_for_unknown_medicine_errors() {
    let driver = TickDriver::new(
        MemStore::with(Vec::new()),
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 0)),
        ReminderEngine::default(),
        DriverOptions::default(),
    );
    let err = driver
        .log_dose("missing", DoseStatus::Taken, at(9, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

/// `load_all` parks on the blocking pool until the test releases it.
struct GatedStore {
    medicines: Vec<Medicine>,
    entered: Notify,
    release: Mutex<mpsc::Receiver<()>>,
}

impl MedicineStore for GatedStore {
    fn load_all(&self) -> Result<Vec<Medicine>, StoreError> {
        self.entered.notify_one();
        let _ = self.release.lock().unwrap().recv();
        Ok(self.medicines.clone())
    }

    fn get_medicine(&self, _id: &str) -> Result<Medicine, StoreError> {
        Err(StoreError::Unavailable("gated".into()))
    }

    fn create_medicine(&self, _new: &NewMedicine) -> Result<Medicine, StoreError> {
        Err(StoreError::Unavailable("gated".into()))
    }

    fn update_medicine(&self, _id: &str, _update: &MedicineUpdate) -> Result<Medicine, StoreError> {
        Err(StoreError::Unavailable("gated".into()))
    }

    fn delete_medicine(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("gated".into()))
    }

    fn log_dose(
        &self,
        _id: &str,
        _status: DoseStatus,
        _scheduled_time: NaiveDateTime,
    ) -> Result<DoseLogEntry, StoreError> {
        Err(StoreError::Unavailable("gated".into()))
    }
}

#[tokio::test]
async fn test_load_finishing_after_stop_is_discarded() {
    let (release, gate) = mpsc::channel();
    let store = Arc::new(GatedStore {
        medicines: vec![medicine("m1", &["09:00"])],
        entered: Notify::new(),
        release: Mutex::new(gate),
    });
    let mut driver = TickDriver::new(
        Arc::clone(&store),
        RecordingNotifier::new(Permission::Granted),
        ManualClock::at(at(8, 58)),
        ReminderEngine::default(),
        options(StdDuration::from_secs(3600), false),
    );
    let mut events = driver.subscribe();
    let mut adherence = driver.adherence();
    let upcoming = driver.upcoming();
    driver.start();

    tokio::time::timeout(StdDuration::from_secs(5), store.entered.notified())
        .await
        .expect("load never started");
    driver.stop().await;
    release.send(()).unwrap();
    tokio::time::sleep(StdDuration::from_millis(50)).await;

    assert!(!adherence.has_changed().unwrap());
    assert_eq!(adherence.borrow_and_update().total_medicines, 0);
    assert!(!upcoming.has_changed().unwrap());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(
        matches!(seen.last(), Some(Event::DriverStopped { .. })),
        "events: {seen:?}"
    );
    assert!(!seen.iter().any(|e| matches!(e, Event::SnapshotReplaced { .. })));
}
