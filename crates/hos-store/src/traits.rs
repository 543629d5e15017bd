//! Store trait definitions

use chrono::NaiveDate;
use hos_api::{HosState, LogEntry};
use hos_util::DriverId;
use serde::{Deserialize, Serialize};

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Ledgers

    /// Load a driver's ledger, if one has been created
    fn load_ledger(&self, driver_id: &DriverId) -> StoreResult<Option<HosState>>;

    /// Replace a driver's ledger and archive closed days in one transaction.
    ///
    /// Archived entries are appended to any entries already stored for the
    /// same driver and day.
    fn save_ledger(&self, state: &HosState, archived: &[DayLog]) -> StoreResult<()>;

    /// All drivers with a stored ledger
    fn list_drivers(&self) -> StoreResult<Vec<DriverId>>;

    // Daily logs

    /// Archived log entries for one driver and calendar day
    fn get_day_log(&self, driver_id: &DriverId, day: NaiveDate) -> StoreResult<Vec<LogEntry>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Closed log entries for one driver and one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayLog {
    pub driver_id: DriverId,
    pub day: NaiveDate,
    pub entries: Vec<LogEntry>,
}
