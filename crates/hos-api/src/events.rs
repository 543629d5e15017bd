//! Event types for hosd -> client streaming

use chrono::{DateTime, Local, NaiveDate};
use hos_util::DriverId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{DutyStatus, LogEntry, ResetKind, Summary, Violation, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: hos_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A driver changed duty status
    DutyStatusChanged {
        driver_id: DriverId,
        from: DutyStatus,
        to: DutyStatus,
        at: DateTime<Local>,
        /// Length of the interval that just closed
        elapsed: Duration,
        location: Option<String>,
    },

    /// A violation became part of the driver's open violations
    ViolationRecorded {
        driver_id: DriverId,
        violation: Violation,
    },

    /// A qualifying rest period was recognised
    ResetApplied {
        driver_id: DriverId,
        reset: ResetKind,
    },

    /// A calendar day's log was closed and archived
    DayArchived {
        driver_id: DriverId,
        date: NaiveDate,
        entries: Vec<LogEntry>,
    },

    /// Fresh summary after a mutation
    SummaryUpdated(Summary),

    /// Service is shutting down
    Shutdown,
}
