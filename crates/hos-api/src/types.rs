//! Shared types for the hosd API

use chrono::{DateTime, Local};
use hos_util::DriverId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::LogEntry;

/// Duty status a driver occupies. Exactly one at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyStatus {
    OffDuty,
    Sleeper,
    Driving,
    OnDuty,
}

impl DutyStatus {
    pub const ALL: [DutyStatus; 4] = [
        DutyStatus::OffDuty,
        DutyStatus::Sleeper,
        DutyStatus::Driving,
        DutyStatus::OnDuty,
    ];

    /// Record-of-duty-status code used on paper and ELD logs
    pub fn code(&self) -> &'static str {
        match self {
            DutyStatus::OffDuty => "OFF",
            DutyStatus::Sleeper => "SB",
            DutyStatus::Driving => "D",
            DutyStatus::OnDuty => "ON",
        }
    }

    /// Counts against the driving, on-duty and cycle budgets
    pub fn is_on_duty(&self) -> bool {
        matches!(self, DutyStatus::Driving | DutyStatus::OnDuty)
    }

    /// Off-duty or sleeper berth; long enough stretches qualify as rest
    pub fn is_rest(&self) -> bool {
        !self.is_on_duty()
    }
}

impl fmt::Display for DutyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown duty status: {0}")]
pub struct ParseDutyStatusError(pub String);

impl FromStr for DutyStatus {
    type Err = ParseDutyStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "off" | "off_duty" | "offduty" => Ok(DutyStatus::OffDuty),
            "sb" | "sleeper" | "sleeper_berth" => Ok(DutyStatus::Sleeper),
            "d" | "driving" => Ok(DutyStatus::Driving),
            "on" | "on_duty" | "onduty" => Ok(DutyStatus::OnDuty),
            _ => Err(ParseDutyStatusError(s.to_string())),
        }
    }
}

/// Multi-day cycle rule a driver operates under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleDays {
    /// 60 hours in 7 consecutive days
    #[serde(rename = "60h/7d")]
    Seven,
    /// 70 hours in 8 consecutive days
    #[default]
    #[serde(rename = "70h/8d")]
    Eight,
}

impl CycleDays {
    pub fn days(&self) -> u8 {
        match self {
            CycleDays::Seven => 7,
            CycleDays::Eight => 8,
        }
    }

    /// On-duty limit for the cycle
    pub fn limit(&self) -> Duration {
        match self {
            CycleDays::Seven => Duration::from_secs(60 * 3600),
            CycleDays::Eight => Duration::from_secs(70 * 3600),
        }
    }

    pub fn from_days(days: u8) -> Option<Self> {
        match days {
            7 => Some(CycleDays::Seven),
            8 => Some(CycleDays::Eight),
            _ => None,
        }
    }
}

impl FromStr for CycleDays {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "60h/7d" | "7" | "60/7" => Ok(CycleDays::Seven),
            "70h/8d" | "8" | "70/8" => Ok(CycleDays::Eight),
            other => Err(format!("Unknown cycle '{}', expected \"60h/7d\" or \"70h/8d\"", other)),
        }
    }
}

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Approaching a limit
    Warning,
    /// Limit exceeded
    Violation,
}

/// Regulatory rule a violation refers to. Violations are deduplicated by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DrivingLimit,
    OnDutyWindow,
    CycleLimit,
    MandatoryBreak,
}

impl ViolationKind {
    pub fn regulation_reference(&self) -> &'static str {
        match self {
            ViolationKind::DrivingLimit => "49 CFR 395.3(a)(3)(i)",
            ViolationKind::OnDutyWindow => "49 CFR 395.3(a)(2)",
            ViolationKind::CycleLimit => "49 CFR 395.3(b)",
            ViolationKind::MandatoryBreak => "49 CFR 395.3(a)(3)(ii)",
        }
    }
}

/// A detected rule breach or an approaching limit. Data, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
    pub severity: Severity,
    pub regulation_reference: String,
    pub detected_at: DateTime<Local>,
}

impl Violation {
    pub fn new(
        kind: ViolationKind,
        severity: Severity,
        description: impl Into<String>,
        detected_at: DateTime<Local>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            severity,
            regulation_reference: kind.regulation_reference().to_string(),
            detected_at,
        }
    }

    pub fn is_violation(&self) -> bool {
        self.severity == Severity::Violation
    }
}

/// Qualifying rest events recognised when an off-duty interval closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetKind {
    /// 30 minutes or more: clears the break timer
    Break,
    /// 10 hours or more: clears the driving and on-duty windows
    TenHour,
    /// 34 hours or more: clears the cycle
    ThirtyFourHour,
}

/// One regulated budget as shown to dispatchers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetView {
    /// Hours used, one decimal place
    pub used_hours: f64,
    /// Limit in hours
    pub limit_hours: f64,
    /// Remaining time formatted as "Hh MMm"
    pub remaining: String,
    /// Remaining hours, one decimal place
    pub remaining_hours: f64,
}

/// Up-to-date view of a driver's hours, projected to `as_of`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub driver_id: DriverId,
    pub status: DutyStatus,
    pub status_started_at: DateTime<Local>,
    pub as_of: DateTime<Local>,

    pub driving: BudgetView,
    pub on_duty: BudgetView,
    pub cycle: BudgetView,
    pub cycle_days: CycleDays,

    pub driving_hours_today: f64,
    pub on_duty_hours_today: f64,

    pub break_required: bool,
    /// "Break required now" or the driving time left before a break is due
    pub break_due_in: String,
    /// When the break becomes due if the driver keeps driving (only while driving)
    pub next_break_due: Option<DateTime<Local>>,

    pub last_break_at: Option<DateTime<Local>>,
    pub last_off_duty_at: Option<DateTime<Local>>,
    pub last_restart_at: Option<DateTime<Local>>,

    pub can_drive: bool,
    pub can_accept_load: bool,
    /// One entry per kind. A stored violation takes precedence over a fresh
    /// warning of the same kind and stays until a 10-hour reset.
    pub violations: Vec<Violation>,
    /// Closed intervals for the current calendar day
    pub today_log: Vec<LogEntry>,
}

/// Answer to "may this driver take a load now?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub allowed: bool,
    /// Deficient budgets, in the order driving, on-duty, cycle, break
    pub reason: Option<String>,
    pub summary: Summary,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Dispatch tools and ELD bridges: read and record duty-status changes
    Dispatcher,
    /// Local admin: can also change a driver's cycle rule
    Admin,
    /// Read-only observer (dashboards)
    Observer,
}

impl ClientRole {
    pub fn can_change_status(&self) -> bool {
        matches!(self, ClientRole::Dispatcher | ClientRole::Admin)
    }

    pub fn can_administer(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub mock_time: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_status_parses_codes_and_names() {
        assert_eq!("D".parse::<DutyStatus>().unwrap(), DutyStatus::Driving);
        assert_eq!("off_duty".parse::<DutyStatus>().unwrap(), DutyStatus::OffDuty);
        assert_eq!("Sleeper Berth".parse::<DutyStatus>().unwrap(), DutyStatus::Sleeper);
        assert_eq!("on-duty".parse::<DutyStatus>().unwrap(), DutyStatus::OnDuty);
        assert!("parked".parse::<DutyStatus>().is_err());
    }

    #[test]
    fn duty_status_codes_round_trip_through_parse() {
        for status in DutyStatus::ALL {
            assert_eq!(status.code().parse::<DutyStatus>().unwrap(), status);
        }
    }

    #[test]
    fn only_driving_and_on_duty_count() {
        assert!(DutyStatus::Driving.is_on_duty());
        assert!(DutyStatus::OnDuty.is_on_duty());
        assert!(DutyStatus::OffDuty.is_rest());
        assert!(DutyStatus::Sleeper.is_rest());
    }

    #[test]
    fn cycle_limits() {
        assert_eq!(CycleDays::Seven.limit(), Duration::from_secs(3600 * 60));
        assert_eq!(CycleDays::Eight.limit(), Duration::from_secs(4200 * 60));
        assert_eq!(CycleDays::default(), CycleDays::Eight);
        assert_eq!(CycleDays::from_days(7), Some(CycleDays::Seven));
        assert_eq!(CycleDays::from_days(9), None);
    }

    #[test]
    fn cycle_days_serialization() {
        let json = serde_json::to_string(&CycleDays::Seven).unwrap();
        assert_eq!(json, "\"60h/7d\"");
        assert_eq!("70h/8d".parse::<CycleDays>().unwrap(), CycleDays::Eight);
    }

    #[test]
    fn violation_carries_regulation_reference() {
        let v = Violation::new(
            ViolationKind::DrivingLimit,
            Severity::Violation,
            "11-hour driving limit exceeded",
            hos_util::now(),
        );

        assert!(v.is_violation());
        assert_eq!(v.regulation_reference, "49 CFR 395.3(a)(3)(i)");

        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("driving_limit"));
    }

    #[test]
    fn roles() {
        assert!(ClientRole::Dispatcher.can_change_status());
        assert!(!ClientRole::Dispatcher.can_administer());
        assert!(ClientRole::Admin.can_administer());
        assert!(!ClientRole::Observer.can_change_status());
    }
}
