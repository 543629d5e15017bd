//! Command types for the hosd protocol

use chrono::NaiveDate;
use hos_util::{ClientId, DriverId};
use serde::{Deserialize, Serialize};

use crate::{
    ClientRole, CycleDays, DutyStatus, EligibilityResult, HealthStatus, LogEntry, Summary,
    API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol.
///
/// Regulatory violations are never errors; they travel inside summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    /// Storage unreachable: eligibility is unknown, not denied
    StoreUnavailable,
    PermissionDenied,
    RateLimited,
    UnsupportedVersion,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Projected hours summary for a driver
    GetSummary { driver_id: DriverId },

    /// Record a duty-status change (the only ledger mutation)
    ChangeDutyStatus {
        driver_id: DriverId,
        status: DutyStatus,
        #[serde(default)]
        location: Option<String>,
    },

    /// Load-acceptance gate
    CanAcceptLoad { driver_id: DriverId },

    /// Closed log entries for one calendar day
    GetDailyLog { driver_id: DriverId, date: NaiveDate },

    /// Change the cycle rule for a driver (admin only)
    SetCycleDays {
        driver_id: DriverId,
        cycle_days: CycleDays,
    },

    GetHealth,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether the command changes a ledger
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::ChangeDutyStatus { .. } | Command::SetCycleDays { .. }
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Summary(Summary),
    Eligibility(EligibilityResult),
    DailyLog {
        driver_id: DriverId,
        date: NaiveDate,
        entries: Vec<LogEntry>,
    },
    Health(HealthStatus),
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}
