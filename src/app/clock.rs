//! Time zone resolution for per-user calendars.
//!
//! Unknown or empty zone names fall back to the server's local offset (UTC
//! when the platform cannot report one) so callers never fail on bad input.

use time::{OffsetDateTime, Time, UtcOffset};
use time_tz::{timezones, OffsetDateTimeExt};

/// Converts an instant into wall-clock time in `time_zone`.
pub fn to_local(now: OffsetDateTime, time_zone: &str) -> OffsetDateTime {
    match timezones::get_by_name(time_zone) {
        Some(tz) => now.to_timezone(tz),
        None => {
            tracing::debug!(time_zone = time_zone, "unresolved time zone, using server local time");
            now.to_offset(server_offset())
        }
    }
}

/// Minutes since local midnight (0..1440).
pub fn local_minutes(now: OffsetDateTime, time_zone: &str) -> u16 {
    let local = to_local(now, time_zone);
    local.hour() as u16 * 60 + local.minute() as u16
}

/// Midnight of the local calendar day containing `now`.
///
/// Uses the offset in force at `now`; a DST shift earlier the same day moves
/// the boundary by the size of the shift.
pub fn start_of_local_day(now: OffsetDateTime, time_zone: &str) -> OffsetDateTime {
    to_local(now, time_zone).replace_time(Time::MIDNIGHT)
}

fn server_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}
