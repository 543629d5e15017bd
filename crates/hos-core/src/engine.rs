//! Hours-of-service engine

use chrono::NaiveDate;
use hos_api::{CycleDays, DutyStatus, EligibilityResult, HosState, LogEntry, Summary};
use hos_config::Settings;
use hos_store::{AuditEvent, AuditEventType, Store};
use hos_util::{Clock, ClockReading, DriverId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::calculator::{self, Anchor};
use crate::summary::{build_eligibility, build_summary};
use crate::transition::apply_transition;
use crate::{CoreEvent, CoreResult};

/// Engine settings taken from configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Cycle rule for drivers without an override
    pub default_cycle: CycleDays,
    /// Cycle rule new ledgers start with, per driver
    pub driver_cycles: HashMap<DriverId, CycleDays>,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_cycle: settings.default_cycle,
            driver_cycles: settings.driver_cycles.clone(),
        }
    }

    pub fn cycle_for(&self, driver_id: &DriverId) -> CycleDays {
        self.driver_cycles
            .get(driver_id)
            .copied()
            .unwrap_or(self.default_cycle)
    }
}

/// Result of a duty-status change
#[derive(Debug, Clone)]
pub struct TransitionResult {
    /// Summary right after the change (nothing elapsed in the new interval)
    pub summary: Summary,
    pub events: Vec<CoreEvent>,
}

/// The hours-of-service engine.
///
/// Reads project a stored snapshot without locking. Every mutation of a
/// driver's ledger, including its lazy creation, runs under that driver's
/// lock from load to save.
pub struct HosEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    driver_locks: Mutex<HashMap<DriverId, Arc<Mutex<()>>>>,
    anchors: Mutex<HashMap<DriverId, Anchor>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Guarded data is either () or a cache rebuilt from the store
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl HosEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        info!(
            default_cycle = ?config.default_cycle,
            driver_overrides = config.driver_cycles.len(),
            "HOS engine initialized"
        );

        Self {
            store,
            clock,
            config,
            driver_locks: Mutex::new(HashMap::new()),
            anchors: Mutex::new(HashMap::new()),
        }
    }

    /// Check if the backing store is healthy
    pub fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    /// Projected hours summary for a driver
    pub fn get_summary(&self, driver_id: &DriverId) -> CoreResult<Summary> {
        let now = self.clock.now();
        let state = self.snapshot(driver_id, &now)?;
        let projection = calculator::project(&state, self.anchor(driver_id).as_ref(), &now);

        debug!(
            driver_id = %driver_id,
            status = %state.status,
            elapsed_secs = projection.elapsed.as_secs(),
            "Summary projected"
        );

        Ok(build_summary(&state, &projection))
    }

    /// Load-acceptance gate
    pub fn can_accept_load(&self, driver_id: &DriverId) -> CoreResult<EligibilityResult> {
        let now = self.clock.now();
        let state = self.snapshot(driver_id, &now)?;
        let projection = calculator::project(&state, self.anchor(driver_id).as_ref(), &now);
        let result = build_eligibility(&state, &projection);

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::LoadEligibilityChecked {
                driver_id: driver_id.clone(),
                allowed: result.allowed,
                reason: result.reason.clone(),
            }));

        info!(
            driver_id = %driver_id,
            allowed = result.allowed,
            reason = ?result.reason,
            "Load eligibility checked"
        );

        Ok(result)
    }

    /// Record a duty-status change. The only way a ledger's status changes.
    pub fn change_duty_status(
        &self,
        driver_id: &DriverId,
        status: DutyStatus,
        location: Option<String>,
    ) -> CoreResult<TransitionResult> {
        let driver_lock = self.driver_lock(driver_id);
        let _guard = lock(&driver_lock);

        let now = self.clock.now();
        let (mut state, created) = self.load_or_create(driver_id, &now)?;

        let elapsed = calculator::elapsed(&state, self.anchor(driver_id).as_ref(), &now);
        let outcome = apply_transition(&mut state, status, location, elapsed, now.wall);

        self.store.save_ledger(&state, &outcome.archived)?;
        self.set_anchor(driver_id, Anchor::new(state.status_started_at, now.mono));

        let mut events: Vec<CoreEvent> = created.into_iter().collect();
        events.extend(outcome.events);
        for event in &events {
            self.record(event);
        }

        let projection = calculator::project(&state, self.anchor(driver_id).as_ref(), &now);
        Ok(TransitionResult {
            summary: build_summary(&state, &projection),
            events,
        })
    }

    /// Closed log entries for one calendar day.
    ///
    /// The current day comes from the ledger; earlier days from the archive.
    pub fn daily_log(&self, driver_id: &DriverId, day: NaiveDate) -> CoreResult<Vec<LogEntry>> {
        if let Some(state) = self.store.load_ledger(driver_id)? {
            if state.status_started_at.date_naive() == day {
                return Ok(state.today_log);
            }
        }

        Ok(self.store.get_day_log(driver_id, day)?)
    }

    /// Change the cycle rule a driver operates under
    pub fn set_cycle_days(
        &self,
        driver_id: &DriverId,
        cycle_days: CycleDays,
    ) -> CoreResult<TransitionResult> {
        let driver_lock = self.driver_lock(driver_id);
        let _guard = lock(&driver_lock);

        let now = self.clock.now();
        let (mut state, created) = self.load_or_create(driver_id, &now)?;
        let previous = state.cycle_days;

        let mut events: Vec<CoreEvent> = created.into_iter().collect();
        if previous != cycle_days {
            state.cycle_days = cycle_days;
            self.store.save_ledger(&state, &[])?;

            events.push(CoreEvent::CycleChanged {
                driver_id: driver_id.clone(),
                from: previous,
                to: cycle_days,
            });
        }
        for event in &events {
            self.record(event);
        }

        let projection = calculator::project(&state, self.anchor(driver_id).as_ref(), &now);
        Ok(TransitionResult {
            summary: build_summary(&state, &projection),
            events,
        })
    }

    /// Stored ledger, or a freshly created one on first reference
    fn snapshot(&self, driver_id: &DriverId, now: &ClockReading) -> CoreResult<HosState> {
        if let Some(state) = self.store.load_ledger(driver_id)? {
            return Ok(state);
        }

        let driver_lock = self.driver_lock(driver_id);
        let _guard = lock(&driver_lock);
        let (state, created) = self.load_or_create(driver_id, now)?;
        if let Some(event) = &created {
            self.record(event);
        }
        Ok(state)
    }

    /// Must be called with the driver's lock held
    fn load_or_create(
        &self,
        driver_id: &DriverId,
        now: &ClockReading,
    ) -> CoreResult<(HosState, Option<CoreEvent>)> {
        if let Some(state) = self.store.load_ledger(driver_id)? {
            return Ok((state, None));
        }

        let cycle_days = self.config.cycle_for(driver_id);
        let state = HosState::new(driver_id.clone(), cycle_days, now.wall);
        self.store.save_ledger(&state, &[])?;
        self.set_anchor(driver_id, Anchor::new(state.status_started_at, now.mono));

        Ok((
            state,
            Some(CoreEvent::LedgerCreated {
                driver_id: driver_id.clone(),
                cycle_days,
            }),
        ))
    }

    fn driver_lock(&self, driver_id: &DriverId) -> Arc<Mutex<()>> {
        lock(&self.driver_locks)
            .entry(driver_id.clone())
            .or_default()
            .clone()
    }

    fn anchor(&self, driver_id: &DriverId) -> Option<Anchor> {
        lock(&self.anchors).get(driver_id).copied()
    }

    fn set_anchor(&self, driver_id: &DriverId, anchor: Anchor) {
        lock(&self.anchors).insert(driver_id.clone(), anchor);
    }

    /// Log and audit an event
    fn record(&self, event: &CoreEvent) {
        let audit = match event {
            CoreEvent::LedgerCreated {
                driver_id,
                cycle_days,
            } => {
                info!(driver_id = %driver_id, cycle_days = ?cycle_days, "Ledger created");
                AuditEventType::LedgerCreated {
                    driver_id: driver_id.clone(),
                    cycle_days: *cycle_days,
                }
            }
            CoreEvent::DutyStatusChanged {
                driver_id,
                from,
                to,
                at,
                elapsed,
                location,
            } => {
                info!(
                    driver_id = %driver_id,
                    from = ?from,
                    to = ?to,
                    at = %at,
                    elapsed_secs = elapsed.as_secs(),
                    "Duty status changed"
                );
                AuditEventType::DutyStatusChanged {
                    driver_id: driver_id.clone(),
                    from: *from,
                    to: *to,
                    elapsed: *elapsed,
                    location: location.clone(),
                }
            }
            CoreEvent::ViolationRecorded {
                driver_id,
                violation,
            } => {
                warn!(
                    driver_id = %driver_id,
                    kind = ?violation.kind,
                    description = %violation.description,
                    "Violation recorded"
                );
                AuditEventType::ViolationRecorded {
                    driver_id: driver_id.clone(),
                    kind: violation.kind,
                    severity: violation.severity,
                    description: violation.description.clone(),
                }
            }
            CoreEvent::ResetApplied { driver_id, reset } => {
                info!(driver_id = %driver_id, reset = ?reset, "Reset applied");
                AuditEventType::ResetApplied {
                    driver_id: driver_id.clone(),
                    reset: *reset,
                }
            }
            CoreEvent::DayArchived {
                driver_id,
                day,
                entries,
            } => {
                info!(driver_id = %driver_id, day = %day, entries = entries.len(), "Day archived");
                AuditEventType::DayArchived {
                    driver_id: driver_id.clone(),
                    day: *day,
                    entry_count: entries.len(),
                }
            }
            CoreEvent::CycleChanged {
                driver_id,
                from,
                to,
            } => {
                info!(driver_id = %driver_id, from = ?from, to = ?to, "Cycle changed");
                AuditEventType::CycleChanged {
                    driver_id: driver_id.clone(),
                    from: *from,
                    to: *to,
                }
            }
        };

        let _ = self.store.append_audit(AuditEvent::new(audit));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hos_api::{ResetKind, ViolationKind};
    use hos_store::{DayLog, SqliteStore, StoreError, StoreResult};
    use hos_util::{ManualClock, minutes_to_duration};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Harness {
        engine: Arc<HosEngine>,
        clock: Arc<ManualClock>,
        store: Arc<FlakyStore>,
    }

    fn harness_at(hour: u32, minute: u32) -> Harness {
        let store = Arc::new(FlakyStore::new());
        let clock = Arc::new(ManualClock::at(2025, 6, 10, hour, minute).unwrap());
        let engine = Arc::new(HosEngine::new(
            store.clone(),
            clock.clone(),
            EngineConfig::default(),
        ));
        Harness {
            engine,
            clock,
            store,
        }
    }

    fn harness() -> Harness {
        harness_at(6, 0)
    }

    fn driver() -> DriverId {
        DriverId::new("drv-001")
    }

    impl Harness {
        fn change(&self, status: DutyStatus) -> TransitionResult {
            self.engine
                .change_duty_status(&driver(), status, None)
                .unwrap()
        }

        fn ledger(&self) -> HosState {
            self.store.inner.load_ledger(&driver()).unwrap().unwrap()
        }
    }

    /// SQLite store whose writes can be made to fail
    struct FlakyStore {
        inner: SqliteStore,
        fail: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: SqliteStore::in_memory().unwrap(),
                fail: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn check(&self) -> StoreResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(StoreError::Database("disk I/O error".into()))
            } else {
                Ok(())
            }
        }
    }

    impl Store for FlakyStore {
        fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
            self.check()?;
            self.inner.append_audit(event)
        }

        fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
            self.inner.get_recent_audits(limit)
        }

        fn load_ledger(&self, driver_id: &DriverId) -> StoreResult<Option<HosState>> {
            self.check()?;
            self.inner.load_ledger(driver_id)
        }

        fn save_ledger(&self, state: &HosState, archived: &[DayLog]) -> StoreResult<()> {
            self.check()?;
            self.inner.save_ledger(state, archived)
        }

        fn list_drivers(&self) -> StoreResult<Vec<DriverId>> {
            self.inner.list_drivers()
        }

        fn get_day_log(&self, driver_id: &DriverId, day: NaiveDate) -> StoreResult<Vec<LogEntry>> {
            self.check()?;
            self.inner.get_day_log(driver_id, day)
        }

        fn is_healthy(&self) -> bool {
            !self.fail.load(Ordering::SeqCst) && self.inner.is_healthy()
        }
    }

    #[test]
    fn unknown_driver_is_created_off_duty() {
        let h = harness();
        let summary = h.engine.get_summary(&driver()).unwrap();

        assert_eq!(summary.status, DutyStatus::OffDuty);
        assert_eq!(summary.cycle_days, CycleDays::Eight);
        assert!(summary.can_drive);
        assert!(summary.can_accept_load);
        assert_eq!(h.store.inner.list_drivers().unwrap(), vec![driver()]);
    }

    #[test]
    fn new_ledger_uses_configured_cycle() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let clock = Arc::new(ManualClock::at(2025, 6, 10, 6, 0).unwrap());
        let mut config = EngineConfig::default();
        config.driver_cycles.insert(driver(), CycleDays::Seven);
        let engine = HosEngine::new(store, clock, config);

        assert_eq!(
            engine.get_summary(&driver()).unwrap().cycle_days,
            CycleDays::Seven
        );
        assert_eq!(
            engine.get_summary(&DriverId::new("other")).unwrap().cycle_days,
            CycleDays::Eight
        );
    }

    #[test]
    fn accumulators_never_decrease_without_reset() {
        let h = harness();
        h.change(DutyStatus::OnDuty);

        let mut last = h.engine.get_summary(&driver()).unwrap();
        let steps = [
            (DutyStatus::Driving, 40),
            (DutyStatus::OnDuty, 120),
            (DutyStatus::Driving, 15),
            (DutyStatus::OffDuty, 200),
            (DutyStatus::Driving, 25),
        ];
        for (status, minutes) in steps {
            h.clock.advance_minutes(minutes);
            let summary = h.change(status).summary;
            assert!(summary.driving.used_hours >= last.driving.used_hours);
            assert!(summary.on_duty.used_hours >= last.on_duty.used_hours);
            assert!(summary.cycle.used_hours >= last.cycle.used_hours);
            last = summary;
        }
    }

    #[test]
    fn exactly_one_open_interval() {
        let h = harness();
        h.change(DutyStatus::OnDuty);
        h.clock.advance_minutes(30);
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(90);
        h.change(DutyStatus::OnDuty);

        let state = h.ledger();
        let now = h.clock.now().wall;
        assert!(state.status_started_at <= now);
        assert_eq!(state.today_log.len(), 2);
        assert_eq!(
            state.today_log.last().unwrap().end_time,
            state.status_started_at
        );
        for pair in state.today_log.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn ten_hour_reset_zeroes_windows() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(600);
        h.change(DutyStatus::OffDuty);
        assert_eq!(h.ledger().driving_since_reset, minutes_to_duration(600));

        h.clock.advance_minutes(600);
        let result = h.change(DutyStatus::OnDuty);

        let state = h.ledger();
        assert_eq!(state.driving_since_reset, Duration::ZERO);
        assert_eq!(state.on_duty_since_reset, Duration::ZERO);
        assert_eq!(state.driving_since_break, Duration::ZERO);
        assert!(state.last_off_duty_at.is_some());
        assert!(result.events.iter().any(|e| matches!(
            e,
            CoreEvent::ResetApplied {
                reset: ResetKind::TenHour,
                ..
            }
        )));
    }

    #[test]
    fn thirty_minute_break_only_clears_break_timer() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(300);
        h.change(DutyStatus::OffDuty);
        h.clock.advance_minutes(30);
        h.change(DutyStatus::Driving);

        let state = h.ledger();
        assert_eq!(state.driving_since_break, Duration::ZERO);
        assert_eq!(state.driving_since_reset, minutes_to_duration(300));
        assert_eq!(state.on_duty_since_reset, minutes_to_duration(300));
        assert!(state.last_break_at.is_some());
        assert!(state.last_off_duty_at.is_none());
    }

    #[test]
    fn eleven_hour_violation() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(470);
        h.change(DutyStatus::OffDuty);
        h.clock.advance_minutes(30);
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(191);

        let summary = h.engine.get_summary(&driver()).unwrap();
        assert!(summary
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::DrivingLimit && v.is_violation()));
        assert!(!summary.can_drive);
        assert!(!summary.can_accept_load);
    }

    #[test]
    fn violation_survives_until_ten_hour_reset() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(470);
        h.change(DutyStatus::OffDuty);
        h.clock.advance_minutes(30);
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(200);
        let result = h.change(DutyStatus::OffDuty);
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e, CoreEvent::ViolationRecorded { .. })));

        h.clock.advance_minutes(60);
        let summary = h.engine.get_summary(&driver()).unwrap();
        assert!(summary.violations.iter().any(|v| v.is_violation()));
        assert!(!summary.can_drive);

        h.clock.advance_minutes(540);
        let summary = h.change(DutyStatus::OnDuty).summary;
        assert!(summary.violations.is_empty());
        assert!(summary.can_drive);
    }

    #[test]
    fn load_buffer_boundaries() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(419);
        h.change(DutyStatus::OffDuty);
        h.clock.advance_minutes(30);
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(120);
        h.change(DutyStatus::OnDuty);

        // 539 minutes driven: 121 remaining
        let result = h.engine.can_accept_load(&driver()).unwrap();
        assert!(result.allowed, "{:?}", result.reason);
        assert_eq!(result.reason, None);

        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(2);
        h.change(DutyStatus::OnDuty);

        // 119 remaining
        let result = h.engine.can_accept_load(&driver()).unwrap();
        assert!(!result.allowed);
        assert!(result.reason.unwrap().starts_with("driving"));
    }

    #[test]
    fn reads_are_idempotent() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(95);

        let before = h.ledger();
        let first = h.engine.get_summary(&driver()).unwrap();
        let second = h.engine.get_summary(&driver()).unwrap();

        assert_eq!(first, second);
        assert_eq!(h.ledger(), before);
        assert_eq!(first.driving.used_hours, 1.6);
    }

    #[test]
    fn day_rollover_keeps_post_midnight_portion() {
        let h = harness_at(23, 50);
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(20);
        let result = h.change(DutyStatus::OffDuty);

        let state = h.ledger();
        assert_eq!(state.driving_today, minutes_to_duration(10));
        assert_eq!(state.driving_since_reset, minutes_to_duration(20));
        assert_eq!(result.summary.driving_hours_today, 0.2);

        let yesterday = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let archived = h.engine.daily_log(&driver(), yesterday).unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].status, DutyStatus::Driving);
        assert_eq!(archived[0].duration, minutes_to_duration(10));

        let today = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let current = h.engine.daily_log(&driver(), today).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].duration, minutes_to_duration(10));
    }

    #[test]
    fn thirty_four_hour_restart_clears_cycle() {
        let h = harness();
        h.change(DutyStatus::OnDuty);
        h.clock.advance_minutes(600);
        h.change(DutyStatus::OffDuty);
        h.clock.advance_minutes(2040);
        let summary = h.change(DutyStatus::OnDuty).summary;

        assert_eq!(summary.cycle.used_hours, 0.0);
        assert!(summary.last_restart_at.is_some());
    }

    #[test]
    fn wall_clock_step_does_not_change_elapsed() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(60);
        h.clock.step_wall(chrono::Duration::hours(-3));
        h.change(DutyStatus::OnDuty);

        let state = h.ledger();
        assert_eq!(state.driving_since_reset, minutes_to_duration(60));
        assert_eq!(state.today_log[0].duration, minutes_to_duration(60));
        assert!(state.status_started_at <= h.clock.now().wall);
    }

    #[test]
    fn restart_after_wall_clock_step_counts_driving() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(60);
        h.clock.step_wall(chrono::Duration::hours(-3));
        h.change(DutyStatus::Driving);

        // A fresh engine has no monotonic anchors and measures on the wall clock
        let restarted = HosEngine::new(h.store.clone(), h.clock.clone(), EngineConfig::default());
        h.clock.advance_minutes(120);

        let summary = restarted.get_summary(&driver()).unwrap();
        assert_eq!(summary.driving.used_hours, 3.0);
        assert_eq!(summary.status_started_at, h.ledger().status_started_at);
    }

    #[test]
    fn wall_clock_step_past_midnight_rolls_the_day() {
        let h = harness_at(20, 0);
        h.change(DutyStatus::OnDuty);
        h.clock.advance_minutes(30);
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(30);
        h.clock.step_wall(chrono::Duration::hours(6));
        let result = h.change(DutyStatus::OffDuty);

        let state = h.ledger();
        assert_eq!(state.status_started_at, h.clock.now().wall);
        assert_eq!(
            state.status_started_at.date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 11).unwrap()
        );
        assert_eq!(state.today_log.len(), 1);
        assert_eq!(state.driving_today, minutes_to_duration(30));
        assert_eq!(state.on_duty_today, minutes_to_duration(30));
        assert_eq!(state.on_duty_since_reset, minutes_to_duration(60));
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e, CoreEvent::DayArchived { .. })));

        let yesterday = h
            .engine
            .daily_log(&driver(), NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
            .unwrap();
        assert_eq!(yesterday.len(), 1);
        assert_eq!(yesterday[0].status, DutyStatus::OnDuty);
    }

    #[test]
    fn storage_failure_is_an_error_not_a_violation() {
        let h = harness();
        h.change(DutyStatus::Driving);
        h.clock.advance_minutes(30);
        let before = h.ledger();

        h.store.set_failing(true);
        let err = h
            .engine
            .change_duty_status(&driver(), DutyStatus::OffDuty, None)
            .unwrap_err();
        assert!(err.is_infrastructure());
        assert!(h.engine.get_summary(&driver()).unwrap_err().is_infrastructure());
        assert!(!h.engine.is_healthy());

        h.store.set_failing(false);
        assert_eq!(h.ledger(), before);

        // The failed transition left nothing behind; the retry sees the whole interval
        h.change(DutyStatus::OffDuty);
        assert_eq!(h.ledger().driving_since_reset, minutes_to_duration(30));
    }

    #[test]
    fn set_cycle_days_changes_limit() {
        let h = harness();
        let result = h
            .engine
            .set_cycle_days(&driver(), CycleDays::Seven)
            .unwrap();

        assert_eq!(result.summary.cycle.limit_hours, 60.0);
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e, CoreEvent::CycleChanged { .. })));
        assert_eq!(h.ledger().cycle_days, CycleDays::Seven);

        // Unchanged rule emits no change event
        let again = h
            .engine
            .set_cycle_days(&driver(), CycleDays::Seven)
            .unwrap();
        assert!(again.events.is_empty());
    }

    #[test]
    fn transitions_are_audited() {
        let h = harness();
        h.change(DutyStatus::Driving);

        let audits = h.store.inner.get_recent_audits(10).unwrap();
        assert!(audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::DutyStatusChanged { .. })));
        assert!(audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::LedgerCreated { .. })));
    }

    #[test]
    fn concurrent_transitions_on_one_driver() {
        let h = harness();
        h.change(DutyStatus::OnDuty);
        h.clock.advance_minutes(10);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let engine = h.engine.clone();
                scope.spawn(move || {
                    let status = if i % 2 == 0 {
                        DutyStatus::Driving
                    } else {
                        DutyStatus::OnDuty
                    };
                    engine.change_duty_status(&driver(), status, None).unwrap();
                });
            }
        });

        let state = h.ledger();
        // Only the first of the racing transitions closed a non-empty interval
        assert_eq!(state.today_log.len(), 1);
        assert_eq!(state.on_duty_since_reset, minutes_to_duration(10));
        assert_eq!(state.status_started_at, h.clock.now().wall);
    }

    #[test]
    fn concurrent_first_reference_creates_one_ledger() {
        let h = harness();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let engine = h.engine.clone();
                scope.spawn(move || {
                    engine.get_summary(&driver()).unwrap();
                });
            }
        });

        let created = h
            .store
            .inner
            .get_recent_audits(100)
            .unwrap()
            .into_iter()
            .filter(|a| matches!(a.event, AuditEventType::LedgerCreated { .. }))
            .count();
        assert_eq!(created, 1);
    }
}
