//! Regulatory thresholds (49 CFR 395.3)

use std::time::Duration;

const fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

/// 11-hour driving limit since the last 10-hour reset
pub const DRIVING_LIMIT: Duration = minutes(660);

/// Warn while driving once this little driving time remains
pub const DRIVING_WARNING_MARGIN: Duration = minutes(60);

/// 14-hour on-duty window since the last 10-hour reset
pub const ON_DUTY_WINDOW: Duration = minutes(840);

/// Cumulative driving after which a 30-minute break is required
pub const BREAK_REQUIRED_AFTER: Duration = minutes(480);

/// Off-duty or sleeper time that clears the break timer
pub const QUALIFYING_BREAK: Duration = minutes(30);

/// Off-duty or sleeper time that resets the driving and on-duty windows
pub const TEN_HOUR_RESET: Duration = minutes(600);

/// Off-duty or sleeper time that restarts the cycle
pub const THIRTY_FOUR_HOUR_RESTART: Duration = minutes(2040);

/// Remaining time required in every budget before accepting a load
pub const LOAD_ACCEPTANCE_BUFFER: Duration = minutes(120);
