//! The per-driver duty-status ledger

use chrono::{DateTime, Local};
use hos_util::DriverId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CycleDays, DutyStatus, Violation};

/// A closed duty-status interval. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub status: DutyStatus,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration: Duration,
    pub location: Option<String>,
}

/// Accumulated hours-of-service state for one driver.
///
/// The open interval is implicit: `status` since `status_started_at`.
/// The `*_today` accumulators and `today_log` belong to the calendar day
/// of `status_started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HosState {
    pub driver_id: DriverId,

    pub status: DutyStatus,
    pub status_started_at: DateTime<Local>,
    /// Location reported when the open interval started
    #[serde(default)]
    pub status_location: Option<String>,

    pub driving_today: Duration,
    pub on_duty_today: Duration,

    /// Since the last 10-hour reset; gates the 11-hour limit
    pub driving_since_reset: Duration,
    /// Since the last 10-hour reset; gates the 14-hour window
    pub on_duty_since_reset: Duration,

    pub cycle_used: Duration,
    pub cycle_days: CycleDays,

    /// Gates the 30-minute break after 8 hours of driving
    pub driving_since_break: Duration,

    pub last_break_at: Option<DateTime<Local>>,
    pub last_off_duty_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub last_restart_at: Option<DateTime<Local>>,

    /// Violations detected and not yet cleared by a qualifying reset
    pub open_violations: Vec<Violation>,
    /// Closed intervals for the current calendar day
    pub today_log: Vec<LogEntry>,
}

impl HosState {
    /// A fresh ledger: off duty since `now`, nothing accumulated
    pub fn new(driver_id: DriverId, cycle_days: CycleDays, now: DateTime<Local>) -> Self {
        Self {
            driver_id,
            status: DutyStatus::OffDuty,
            status_started_at: now,
            status_location: None,
            driving_today: Duration::ZERO,
            on_duty_today: Duration::ZERO,
            driving_since_reset: Duration::ZERO,
            on_duty_since_reset: Duration::ZERO,
            cycle_used: Duration::ZERO,
            cycle_days,
            driving_since_break: Duration::ZERO,
            last_break_at: None,
            last_off_duty_at: None,
            last_restart_at: None,
            open_violations: Vec::new(),
            today_log: Vec::new(),
        }
    }
}
