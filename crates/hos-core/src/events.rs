//! Core events emitted by the engine

use chrono::{DateTime, Local, NaiveDate};
use hos_api::{CycleDays, DutyStatus, LogEntry, ResetKind, Violation};
use hos_util::DriverId;
use std::time::Duration;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A driver was referenced for the first time
    LedgerCreated {
        driver_id: DriverId,
        cycle_days: CycleDays,
    },

    /// The open interval was closed and a new one opened
    DutyStatusChanged {
        driver_id: DriverId,
        from: DutyStatus,
        to: DutyStatus,
        at: DateTime<Local>,
        elapsed: Duration,
        location: Option<String>,
    },

    /// A violation was committed during the closed interval
    ViolationRecorded {
        driver_id: DriverId,
        violation: Violation,
    },

    /// The closed rest interval qualified as a reset
    ResetApplied {
        driver_id: DriverId,
        reset: ResetKind,
    },

    /// A calendar day was closed and its log archived
    DayArchived {
        driver_id: DriverId,
        day: NaiveDate,
        entries: Vec<LogEntry>,
    },

    /// The driver's cycle rule was changed
    CycleChanged {
        driver_id: DriverId,
        from: CycleDays,
        to: CycleDays,
    },
}
