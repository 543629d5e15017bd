//! Transition controller
//!
//! Closes the open interval, folds it into the ledger, captures violations,
//! recognises qualifying rest, rolls calendar days and opens the new
//! interval. Operates on an in-memory ledger; persistence is the caller's job.

use chrono::{DateTime, Local, NaiveDate};
use hos_api::{DutyStatus, HosState, LogEntry, ResetKind, Severity};
use hos_store::DayLog;
use hos_util::{non_negative, split_at_midnights};
use std::time::Duration;

use crate::calculator::settled;
use crate::evaluator::{evaluate, merge_violations};
use crate::rules::{QUALIFYING_BREAK, TEN_HOUR_RESET, THIRTY_FOUR_HOUR_RESTART};
use crate::CoreEvent;

/// What a transition did to a ledger
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub from: DutyStatus,
    /// Measured length of the closed interval
    pub elapsed: Duration,
    /// Wall-clock instant the new interval starts
    pub switched_at: DateTime<Local>,
    /// Days closed by this transition, to be archived with the ledger
    pub archived: Vec<DayLog>,
    pub events: Vec<CoreEvent>,
}

/// Apply a duty-status change to `state` at wall-clock instant `now`.
///
/// `elapsed` is the measured length of the open interval and is what the
/// accumulators receive. Log timestamps and calendar days come from the
/// wall clock: the closed interval spans `status_started_at` to `now`
/// (never earlier than its start) and the new interval starts at `now`.
pub fn apply_transition(
    state: &mut HosState,
    to: DutyStatus,
    location: Option<String>,
    elapsed: Duration,
    now: DateTime<Local>,
) -> TransitionOutcome {
    let from = state.status;
    let started_at = state.status_started_at;
    let closed_at = now.max(started_at);
    let mut archived = Vec::new();
    let mut events = Vec::new();

    // Close and fold, one piece per calendar day
    let mut log_day = started_at.date_naive();
    for (piece_start, piece_end, duration) in day_pieces(started_at, closed_at, elapsed) {
        let piece_day = piece_start.date_naive();
        if piece_day > log_day {
            roll_day(state, log_day, &mut archived, &mut events);
            log_day = piece_day;
        }

        if duration.is_zero() {
            continue;
        }

        fold(state, from, duration);
        state.today_log.push(LogEntry {
            status: from,
            start_time: piece_start,
            end_time: piece_end,
            duration,
            location: state.status_location.clone(),
        });
    }
    // Interval ended exactly on a midnight
    if closed_at.date_naive() > log_day {
        roll_day(state, log_day, &mut archived, &mut events);
    }

    capture_violations(state, now, &mut events);

    if from.is_rest() {
        apply_resets(state, elapsed, now, &mut events);
    }

    state.status = to;
    state.status_started_at = now;
    state.status_location = location.clone();

    events.insert(
        0,
        CoreEvent::DutyStatusChanged {
            driver_id: state.driver_id.clone(),
            from,
            to,
            at: now,
            elapsed,
            location,
        },
    );

    TransitionOutcome {
        from,
        elapsed,
        switched_at: now,
        archived,
        events,
    }
}

/// Wall-clock pieces of `start..end`, one per calendar day, each with its
/// share of the measured `elapsed`.
///
/// Shares are handed out from the latest day backwards, each capped by its
/// wall length; the earliest piece takes whatever is left. When the clocks
/// agree every piece gets exactly its wall length.
fn day_pieces(
    start: DateTime<Local>,
    end: DateTime<Local>,
    elapsed: Duration,
) -> Vec<(DateTime<Local>, DateTime<Local>, Duration)> {
    let mut spans = split_at_midnights(start, end);
    if spans.is_empty() {
        spans.push((start, end));
    }

    let mut remaining = elapsed;
    let mut pieces: Vec<_> = spans
        .iter()
        .enumerate()
        .rev()
        .map(|(i, &(piece_start, piece_end))| {
            let share = if i == 0 {
                remaining
            } else {
                non_negative(piece_end - piece_start).min(remaining)
            };
            remaining -= share;
            (piece_start, piece_end, share)
        })
        .collect();
    pieces.reverse();
    pieces
}

fn fold(state: &mut HosState, status: DutyStatus, duration: Duration) {
    if status == DutyStatus::Driving {
        state.driving_today += duration;
        state.driving_since_reset += duration;
        state.driving_since_break += duration;
    }
    if status.is_on_duty() {
        state.on_duty_today += duration;
        state.on_duty_since_reset += duration;
        state.cycle_used += duration;
    }
}

fn roll_day(
    state: &mut HosState,
    day: NaiveDate,
    archived: &mut Vec<DayLog>,
    events: &mut Vec<CoreEvent>,
) {
    let entries = std::mem::take(&mut state.today_log);
    state.driving_today = Duration::ZERO;
    state.on_duty_today = Duration::ZERO;

    if entries.is_empty() {
        return;
    }

    events.push(CoreEvent::DayArchived {
        driver_id: state.driver_id.clone(),
        day,
        entries: entries.clone(),
    });
    archived.push(DayLog {
        driver_id: state.driver_id.clone(),
        day,
        entries,
    });
}

/// Violations committed inside the closed interval become durable
fn capture_violations(state: &mut HosState, at: DateTime<Local>, events: &mut Vec<CoreEvent>) {
    let committed: Vec<_> = evaluate(&settled(state, at), at)
        .into_iter()
        .filter(|v| v.severity == Severity::Violation)
        .collect();

    for violation in &committed {
        if !state.open_violations.iter().any(|v| v.kind == violation.kind) {
            events.push(CoreEvent::ViolationRecorded {
                driver_id: state.driver_id.clone(),
                violation: violation.clone(),
            });
        }
    }

    state.open_violations = merge_violations(&state.open_violations, committed);
}

fn apply_resets(
    state: &mut HosState,
    rested: Duration,
    at: DateTime<Local>,
    events: &mut Vec<CoreEvent>,
) {
    let mut applied = Vec::new();

    if rested >= THIRTY_FOUR_HOUR_RESTART {
        state.cycle_used = Duration::ZERO;
        state.last_restart_at = Some(at);
        applied.push(ResetKind::ThirtyFourHour);
    }

    if rested >= TEN_HOUR_RESET {
        state.driving_since_reset = Duration::ZERO;
        state.on_duty_since_reset = Duration::ZERO;
        state.driving_since_break = Duration::ZERO;
        state.open_violations.clear();
        state.last_off_duty_at = Some(at);
        applied.push(ResetKind::TenHour);
    }

    if rested >= QUALIFYING_BREAK {
        state.driving_since_break = Duration::ZERO;
        state.last_break_at = Some(at);
        applied.push(ResetKind::Break);
    }

    events.extend(applied.into_iter().map(|reset| CoreEvent::ResetApplied {
        driver_id: state.driver_id.clone(),
        reset,
    }));
}
