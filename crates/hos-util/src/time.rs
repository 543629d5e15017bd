//! Time utilities for hosd
//!
//! Every engine call samples a [`ClockReading`] once, carrying both a
//! monotonic instant (for elapsed-time arithmetic) and a wall-clock time
//! (for log timestamps and calendar-day comparisons). Clocks are injected
//! through the [`Clock`] trait so tests can step time deterministically.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `HOS_MOCK_TIME` environment variable shifts the
//! wall clock reported by [`SystemClock`]. The mocked clock keeps advancing
//! at the real rate.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-06-10 23:45:00`)
//!
//! ```bash
//! HOS_MOCK_TIME="2025-06-10 23:45:00" hosd
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "HOS_MOCK_TIME";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // Internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match parse_local_datetime(&mock_time_str) {
                    Some(mock_dt) => {
                        let offset = mock_dt.signed_duration_since(chrono::Local::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    None => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = MOCK_TIME_FORMAT,
                            "Invalid mock time"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Parse `YYYY-MM-DD HH:MM:SS` as a local time.
pub fn parse_local_datetime(s: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(s, MOCK_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // The wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Represents a point in monotonic time.
/// This is immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Duration since `earlier`, or zero if `earlier` is later than `self`
    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}

/// A single sample of "now" from both clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// Wall-clock time, for log timestamps and day boundaries
    pub wall: DateTime<Local>,
    /// Monotonic time, for elapsed-time arithmetic
    pub mono: MonotonicInstant,
}

impl ClockReading {
    pub fn new(wall: DateTime<Local>, mono: MonotonicInstant) -> Self {
        Self { wall, mono }
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> ClockReading;
}

/// Clock backed by the operating system (honours `HOS_MOCK_TIME`)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> ClockReading {
        ClockReading::new(now(), MonotonicInstant::now())
    }
}

/// Manually driven clock for tests and simulations.
///
/// Both clocks advance together through [`ManualClock::advance`];
/// [`ManualClock::step_wall`] moves only the wall clock, modelling an
/// NTP correction or an operator changing the system time.
#[derive(Debug)]
pub struct ManualClock {
    reading: Mutex<ClockReading>,
}

impl ManualClock {
    pub fn new(wall: DateTime<Local>) -> Self {
        Self {
            reading: Mutex::new(ClockReading::new(wall, MonotonicInstant::now())),
        }
    }

    /// Start at the given local date and time.
    ///
    /// `None` when that time is invalid or ambiguous locally (DST).
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        Local
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .map(Self::new)
    }

    pub fn advance(&self, by: Duration) {
        let mut reading = self.reading.lock().unwrap_or_else(|e| e.into_inner());
        reading.mono = reading.mono + by;
        reading.wall += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
    }

    pub fn advance_minutes(&self, minutes: u64) {
        self.advance(minutes_to_duration(minutes));
    }

    /// Move the wall clock without moving the monotonic clock
    pub fn step_wall(&self, by: chrono::Duration) {
        let mut reading = self.reading.lock().unwrap_or_else(|e| e.into_inner());
        reading.wall += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> ClockReading {
        *self.reading.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes * 60)
}

/// Whole minutes in a duration (truncating)
pub fn whole_minutes(d: Duration) -> u64 {
    d.as_secs() / 60
}

/// Hours as a decimal rounded to one place (e.g. 4h 34m -> 4.6)
pub fn decimal_hours(d: Duration) -> f64 {
    (d.as_secs_f64() / 3600.0 * 10.0).round() / 10.0
}

/// Format a duration as `"Hh MMm"` (e.g. `"6h 05m"`), truncating seconds
pub fn format_hours_minutes(d: Duration) -> String {
    let total_minutes = whole_minutes(d);
    format!("{}h {:02}m", total_minutes / 60, total_minutes % 60)
}

/// The local midnight that starts `date`.
///
/// Falls back to the earliest valid instant of the day when midnight does
/// not exist locally (DST transitions at 00:00).
pub fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let mut naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    for _ in 0..4 {
        if let Some(dt) = Local.from_local_datetime(&naive).earliest() {
            return dt;
        }
        naive += chrono::Duration::minutes(30);
    }
    Local.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Split `[start, end)` at every local midnight it crosses.
///
/// Returns the pieces in order; a span within one day yields a single
/// piece. An empty or inverted span yields nothing.
pub fn split_at_midnights(
    start: DateTime<Local>,
    end: DateTime<Local>,
) -> Vec<(DateTime<Local>, DateTime<Local>)> {
    let mut pieces = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let next_midnight = cursor
            .date_naive()
            .succ_opt()
            .map(local_midnight)
            .filter(|m| *m > cursor);

        match next_midnight {
            Some(midnight) if midnight < end => {
                pieces.push((cursor, midnight));
                cursor = midnight;
            }
            _ => {
                pieces.push((cursor, end));
                break;
            }
        }
    }

    pieces
}

/// Convert a chrono span to std, clamping negative spans to zero
pub fn non_negative(span: chrono::Duration) -> Duration {
    span.to_std().unwrap_or(Duration::ZERO)
}

/// `dt + d`, saturating at `dt` if the sum is not representable
pub fn add_duration(dt: DateTime<Local>, d: Duration) -> DateTime<Local> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|span| dt.checked_add_signed(span))
        .unwrap_or(dt)
}
