//! Violation and eligibility evaluator
//!
//! Applies the fixed rule table to a [`Projection`]. Never mutates a ledger.

use chrono::{DateTime, Local};
use hos_api::{DutyStatus, Severity, Violation, ViolationKind};
use hos_util::format_hours_minutes;
use std::time::Duration;

use crate::Projection;
use crate::rules::{
    BREAK_REQUIRED_AFTER, DRIVING_LIMIT, DRIVING_WARNING_MARGIN, LOAD_ACCEPTANCE_BUFFER,
    ON_DUTY_WINDOW,
};

/// Used and remaining time in each regulated budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub driving_used: Duration,
    pub driving_remaining: Duration,
    pub on_duty_used: Duration,
    pub on_duty_remaining: Duration,
    pub cycle_used: Duration,
    pub cycle_limit: Duration,
    pub cycle_remaining: Duration,
    /// Driving time left before the 30-minute break is due
    pub break_remaining: Duration,
    pub break_required: bool,
}

impl Budgets {
    pub fn from_projection(p: &Projection) -> Self {
        let cycle_limit = p.cycle_days.limit();

        Self {
            driving_used: p.driving_since_reset,
            driving_remaining: DRIVING_LIMIT.saturating_sub(p.driving_since_reset),
            on_duty_used: p.on_duty_since_reset,
            on_duty_remaining: ON_DUTY_WINDOW.saturating_sub(p.on_duty_since_reset),
            cycle_used: p.cycle_used,
            cycle_limit,
            cycle_remaining: cycle_limit.saturating_sub(p.cycle_used),
            break_remaining: BREAK_REQUIRED_AFTER.saturating_sub(p.driving_since_break),
            break_required: p.driving_since_break >= BREAK_REQUIRED_AFTER,
        }
    }
}

/// Evaluate the rule table, one result per kind at most
pub fn evaluate(p: &Projection, detected_at: DateTime<Local>) -> Vec<Violation> {
    let budgets = Budgets::from_projection(p);
    let driving = p.status == DutyStatus::Driving;
    let mut found = Vec::new();

    if p.driving_since_reset > DRIVING_LIMIT {
        found.push(Violation::new(
            ViolationKind::DrivingLimit,
            Severity::Violation,
            format!(
                "11-hour driving limit exceeded by {}",
                format_hours_minutes(p.driving_since_reset - DRIVING_LIMIT)
            ),
            detected_at,
        ));
    } else if driving && budgets.driving_remaining <= DRIVING_WARNING_MARGIN {
        found.push(Violation::new(
            ViolationKind::DrivingLimit,
            Severity::Warning,
            format!(
                "Approaching 11-hour driving limit: {} remaining",
                format_hours_minutes(budgets.driving_remaining)
            ),
            detected_at,
        ));
    }

    if p.on_duty_since_reset > ON_DUTY_WINDOW {
        found.push(Violation::new(
            ViolationKind::OnDutyWindow,
            Severity::Violation,
            format!(
                "14-hour on-duty window exceeded by {}",
                format_hours_minutes(p.on_duty_since_reset - ON_DUTY_WINDOW)
            ),
            detected_at,
        ));
    }

    if p.cycle_used > budgets.cycle_limit {
        found.push(Violation::new(
            ViolationKind::CycleLimit,
            Severity::Violation,
            format!(
                "{}-hour/{}-day cycle limit exceeded by {}",
                budgets.cycle_limit.as_secs() / 3600,
                p.cycle_days.days(),
                format_hours_minutes(p.cycle_used - budgets.cycle_limit)
            ),
            detected_at,
        ));
    }

    if driving && budgets.break_required {
        found.push(Violation::new(
            ViolationKind::MandatoryBreak,
            Severity::Violation,
            "Driving after 8 hours without a 30-minute break",
            detected_at,
        ));
    }

    found
}

/// Merge freshly evaluated results into `existing`, keeping one per kind.
///
/// A fresh result replaces an existing one of the same kind, except that a
/// warning never replaces a violation.
pub fn merge_violations(
    existing: &[Violation],
    fresh: impl IntoIterator<Item = Violation>,
) -> Vec<Violation> {
    let mut merged = existing.to_vec();

    for violation in fresh {
        match merged.iter_mut().find(|v| v.kind == violation.kind) {
            Some(current) if current.is_violation() && !violation.is_violation() => {}
            Some(current) => *current = violation,
            None => merged.push(violation),
        }
    }

    merged
}

/// May the driver drive right now?
pub fn can_drive(budgets: &Budgets, violations: &[Violation]) -> bool {
    !budgets.driving_remaining.is_zero()
        && !budgets.on_duty_remaining.is_zero()
        && !budgets.cycle_remaining.is_zero()
        && !budgets.break_required
        && !violations.iter().any(Violation::is_violation)
}

/// May the driver accept a new load? Requires a buffer in every budget.
pub fn can_accept_load(budgets: &Budgets) -> bool {
    budgets.driving_remaining >= LOAD_ACCEPTANCE_BUFFER
        && budgets.on_duty_remaining >= LOAD_ACCEPTANCE_BUFFER
        && budgets.cycle_remaining >= LOAD_ACCEPTANCE_BUFFER
        && !budgets.break_required
}

/// Deficient budgets in the order driving, on-duty, cycle, break
pub fn ineligibility_reason(budgets: &Budgets) -> Option<String> {
    let mut reasons = Vec::new();
    let buffer = format_hours_minutes(LOAD_ACCEPTANCE_BUFFER);

    if budgets.driving_remaining < LOAD_ACCEPTANCE_BUFFER {
        reasons.push(format!(
            "driving time remaining {} is below the {} buffer",
            format_hours_minutes(budgets.driving_remaining),
            buffer
        ));
    }
    if budgets.on_duty_remaining < LOAD_ACCEPTANCE_BUFFER {
        reasons.push(format!(
            "on-duty window remaining {} is below the {} buffer",
            format_hours_minutes(budgets.on_duty_remaining),
            buffer
        ));
    }
    if budgets.cycle_remaining < LOAD_ACCEPTANCE_BUFFER {
        reasons.push(format!(
            "cycle remaining {} is below the {} buffer",
            format_hours_minutes(budgets.cycle_remaining),
            buffer
        ));
    }
    if budgets.break_required {
        reasons.push("30-minute break required".to_string());
    }

    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}
