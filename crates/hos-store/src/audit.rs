//! Audit event types

use chrono::{DateTime, Local, NaiveDate};
use hos_api::{CycleDays, DutyStatus, ResetKind, Severity, ViolationKind};
use hos_util::DriverId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Configuration loaded
    ConfigLoaded { driver_overrides: usize },

    /// First reference to a driver created their ledger
    LedgerCreated {
        driver_id: DriverId,
        cycle_days: CycleDays,
    },

    /// Duty status changed
    DutyStatusChanged {
        driver_id: DriverId,
        from: DutyStatus,
        to: DutyStatus,
        elapsed: Duration,
        location: Option<String>,
    },

    /// Violation became open on a ledger
    ViolationRecorded {
        driver_id: DriverId,
        kind: ViolationKind,
        severity: Severity,
        description: String,
    },

    /// Qualifying rest recognised
    ResetApplied { driver_id: DriverId, reset: ResetKind },

    /// Calendar day closed and archived
    DayArchived {
        driver_id: DriverId,
        day: NaiveDate,
        entry_count: usize,
    },

    /// Load-acceptance gate answered
    LoadEligibilityChecked {
        driver_id: DriverId,
        allowed: bool,
        reason: Option<String>,
    },

    /// Cycle rule changed (admin action)
    CycleChanged {
        driver_id: DriverId,
        from: CycleDays,
        to: CycleDays,
    },

    /// Client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: hos_util::now(),
            event,
        }
    }
}
