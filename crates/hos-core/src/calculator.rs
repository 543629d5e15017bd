//! Time-accumulation calculator
//!
//! Projects the open duty-status interval onto a ledger as if it had been
//! closed at the sampled instant. Pure: the ledger is never mutated, and the
//! same inputs always give the same projection.

use chrono::{DateTime, Local, NaiveDate};
use hos_api::{CycleDays, DutyStatus, HosState};
use hos_util::{ClockReading, MonotonicInstant, add_duration, local_midnight, non_negative};
use std::time::Duration;

/// Monotonic reference for a driver's open interval.
///
/// Valid only while the stored `status_started_at` equals `started_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub started_at: DateTime<Local>,
    pub mono: MonotonicInstant,
}

impl Anchor {
    pub fn new(started_at: DateTime<Local>, mono: MonotonicInstant) -> Self {
        Self { started_at, mono }
    }
}

/// Accumulator values with the open interval folded in
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub status: DutyStatus,
    pub cycle_days: CycleDays,
    pub started_at: DateTime<Local>,
    /// Wall-clock instant of the projection
    pub as_of: DateTime<Local>,
    pub elapsed: Duration,

    /// Calendar day the `*_today` values belong to
    pub day: NaiveDate,
    /// The open interval crossed at least one local midnight
    pub crossed_midnight: bool,

    pub driving_today: Duration,
    pub on_duty_today: Duration,
    pub driving_since_reset: Duration,
    pub on_duty_since_reset: Duration,
    pub cycle_used: Duration,
    pub driving_since_break: Duration,
}

/// Time spent in the open interval.
///
/// Uses the monotonic clock when `anchor` still describes the open interval,
/// otherwise the wall clock clamped at zero.
pub fn elapsed(state: &HosState, anchor: Option<&Anchor>, now: &ClockReading) -> Duration {
    match anchor {
        Some(anchor) if anchor.started_at == state.status_started_at => {
            now.mono.duration_since(anchor.mono)
        }
        _ => non_negative(now.wall - state.status_started_at),
    }
}

/// Project `state` to `now`.
///
/// Accumulators receive the measured elapsed time; the calendar day comes
/// from the wall clock, never earlier than the interval's start.
pub fn project(state: &HosState, anchor: Option<&Anchor>, now: &ClockReading) -> Projection {
    let as_of = now.wall.max(state.status_started_at);
    project_at(state, elapsed(state, anchor, now), as_of)
}

/// Project `state` with `elapsed` time in the open interval, clocks in step
pub fn project_elapsed(state: &HosState, elapsed: Duration) -> Projection {
    project_at(state, elapsed, add_duration(state.status_started_at, elapsed))
}

/// Project `state` with `elapsed` time in the open interval as of wall time `as_of`
pub fn project_at(state: &HosState, elapsed: Duration, as_of: DateTime<Local>) -> Projection {
    let mut projection = settled(state, as_of);
    projection.elapsed = elapsed;

    let counts_on_duty = state.status.is_on_duty();
    let counts_driving = state.status == DutyStatus::Driving;

    // Only the part of the interval on the projected day counts toward today
    let (today_base_driving, today_base_on_duty, today_elapsed) =
        if as_of.date_naive() > state.status_started_at.date_naive() {
            projection.crossed_midnight = true;
            let since_midnight = non_negative(as_of - local_midnight(as_of.date_naive()));
            (Duration::ZERO, Duration::ZERO, since_midnight.min(elapsed))
        } else {
            (state.driving_today, state.on_duty_today, elapsed)
        };

    projection.driving_today = today_base_driving;
    projection.on_duty_today = today_base_on_duty;

    if counts_driving {
        projection.driving_today += today_elapsed;
        projection.driving_since_reset += elapsed;
        projection.driving_since_break += elapsed;
    }
    if counts_on_duty {
        projection.on_duty_today += today_elapsed;
        projection.on_duty_since_reset += elapsed;
        projection.cycle_used += elapsed;
    }

    projection
}

/// The ledger's stored accumulators, with nothing added for the open interval
pub fn settled(state: &HosState, as_of: DateTime<Local>) -> Projection {
    Projection {
        status: state.status,
        cycle_days: state.cycle_days,
        started_at: state.status_started_at,
        as_of,
        elapsed: Duration::ZERO,
        day: as_of.date_naive(),
        crossed_midnight: false,
        driving_today: state.driving_today,
        on_duty_today: state.on_duty_today,
        driving_since_reset: state.driving_since_reset,
        on_duty_since_reset: state.on_duty_since_reset,
        cycle_used: state.cycle_used,
        driving_since_break: state.driving_since_break,
    }
}
