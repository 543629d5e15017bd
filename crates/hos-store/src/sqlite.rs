//! SQLite-based store implementation

use chrono::{DateTime, Local, NaiveDate};
use hos_api::{HosState, LogEntry};
use hos_util::DriverId;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, DayLog, Store, StoreError, StoreResult};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- One ledger per driver
            CREATE TABLE IF NOT EXISTS ledgers (
                driver_id TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Closed days
            CREATE TABLE IF NOT EXISTS daily_logs (
                driver_id TEXT NOT NULL,
                day TEXT NOT NULL,
                entries_json TEXT NOT NULL,
                PRIMARY KEY (driver_id, day)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| hos_util::now())
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp: parse_timestamp(&timestamp_str),
                event,
            });
        }

        Ok(events)
    }

    fn load_ledger(&self, driver_id: &DriverId) -> StoreResult<Option<HosState>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM ledgers WHERE driver_id = ?",
                [driver_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn save_ledger(&self, state: &HosState, archived: &[DayLog]) -> StoreResult<()> {
        let state_json = serde_json::to_string(state)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for day_log in archived {
            let day_str = day_log.day.format(DAY_FORMAT).to_string();

            let existing: Option<String> = tx
                .query_row(
                    "SELECT entries_json FROM daily_logs WHERE driver_id = ? AND day = ?",
                    params![day_log.driver_id.as_str(), day_str],
                    |row| row.get(0),
                )
                .optional()?;

            let mut entries: Vec<LogEntry> = match existing {
                Some(s) => serde_json::from_str(&s)?,
                None => Vec::new(),
            };
            entries.extend(day_log.entries.iter().cloned());

            tx.execute(
                r#"
                INSERT INTO daily_logs (driver_id, day, entries_json)
                VALUES (?, ?, ?)
                ON CONFLICT(driver_id, day)
                DO UPDATE SET entries_json = excluded.entries_json
                "#,
                params![
                    day_log.driver_id.as_str(),
                    day_str,
                    serde_json::to_string(&entries)?
                ],
            )?;

            debug!(
                driver_id = %day_log.driver_id,
                day = %day_str,
                entries = entries.len(),
                "Day log archived"
            );
        }

        tx.execute(
            r#"
            INSERT INTO ledgers (driver_id, state_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(driver_id)
            DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at
            "#,
            params![
                state.driver_id.as_str(),
                state_json,
                hos_util::now().to_rfc3339()
            ],
        )?;

        tx.commit()?;

        debug!(driver_id = %state.driver_id, status = %state.status, "Ledger saved");
        Ok(())
    }

    fn list_drivers(&self) -> StoreResult<Vec<DriverId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT driver_id FROM ledgers ORDER BY driver_id")?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut drivers = Vec::new();
        for row in rows {
            drivers.push(DriverId::new(row?));
        }
        Ok(drivers)
    }

    fn get_day_log(&self, driver_id: &DriverId, day: NaiveDate) -> StoreResult<Vec<LogEntry>> {
        let conn = self.conn()?;
        let day_str = day.format(DAY_FORMAT).to_string();

        let json: Option<String> = conn
            .query_row(
                "SELECT entries_json FROM daily_logs WHERE driver_id = ? AND day = ?",
                params![driver_id.as_str(), day_str],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(serde_json::from_str(&s)?),
            None => Ok(Vec::new()),
        }
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditEventType;
    use chrono::TimeZone;
    use hos_api::{CycleDays, DutyStatus};
    use std::time::Duration;

    fn entry(status: DutyStatus, start_hour: u32, end_hour: u32) -> LogEntry {
        let start = Local.with_ymd_and_hms(2025, 6, 10, start_hour, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2025, 6, 10, end_hour, 0, 0).unwrap();
        LogEntry {
            status,
            start_time: start,
            end_time: end,
            duration: Duration::from_secs(u64::from(end_hour - start_hour) * 3600),
            location: None,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::ResetApplied {
                driver_id: DriverId::new("drv-001"),
                reset: hos_api::ResetKind::TenHour,
            }))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        // Newest first
        assert!(matches!(events[0].event, AuditEventType::ResetApplied { .. }));
        assert!(matches!(events[1].event, AuditEventType::ServiceStarted));
    }

    #[test]
    fn test_missing_ledger() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_ledger(&DriverId::new("nobody")).unwrap().is_none());
    }

    #[test]
    fn test_ledger_replaced_on_save() {
        let store = SqliteStore::in_memory().unwrap();
        let driver = DriverId::new("drv-001");
        let mut state = HosState::new(driver.clone(), CycleDays::Eight, hos_util::now());

        store.save_ledger(&state, &[]).unwrap();

        state.status = DutyStatus::Driving;
        state.driving_since_reset = Duration::from_secs(3600);
        store.save_ledger(&state, &[]).unwrap();

        let loaded = store.load_ledger(&driver).unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.list_drivers().unwrap(), vec![driver]);
    }

    #[test]
    fn test_archived_days_accumulate() {
        let store = SqliteStore::in_memory().unwrap();
        let driver = DriverId::new("drv-001");
        let state = HosState::new(driver.clone(), CycleDays::Eight, hos_util::now());

        let first = DayLog {
            driver_id: driver.clone(),
            day: day(),
            entries: vec![entry(DutyStatus::OnDuty, 6, 7)],
        };
        let second = DayLog {
            driver_id: driver.clone(),
            day: day(),
            entries: vec![entry(DutyStatus::Driving, 7, 12)],
        };

        store.save_ledger(&state, &[first]).unwrap();
        store.save_ledger(&state, &[second]).unwrap();

        let log = store.get_day_log(&driver, day()).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].status, DutyStatus::OnDuty);
        assert_eq!(log[1].status, DutyStatus::Driving);

        let other_day = day().succ_opt().unwrap();
        assert!(store.get_day_log(&driver, other_day).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosd.db");
        let driver = DriverId::new("drv-001");

        {
            let store = SqliteStore::open(&path).unwrap();
            let state = HosState::new(driver.clone(), CycleDays::Seven, hos_util::now());
            store.save_ledger(&state, &[]).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_ledger(&driver).unwrap().unwrap();
        assert_eq!(loaded.cycle_days, CycleDays::Seven);
    }
}
