use time::OffsetDateTime;

use crate::app::clock;
use crate::domain::channel_policy::QuietHours;

/// Whether `now` falls inside the user's quiet window.
///
/// The window is `[start, end)` in local minutes and wraps midnight when
/// `start > end`. Empty, equal or malformed bounds disable it.
pub fn is_quiet(now: OffsetDateTime, start: &str, end: &str, time_zone: &str) -> bool {
    if start.is_empty() || end.is_empty() || start == end {
        return false;
    }

    let (Some(start), Some(end)) = (parse_hhmm(start), parse_hhmm(end)) else {
        tracing::debug!(start = start, end = end, "ignoring malformed quiet hours");
        return false;
    };
    if start == end {
        return false;
    }

    let minutes = clock::local_minutes(now, time_zone);
    if start < end {
        minutes >= start && minutes < end
    } else {
        minutes >= start || minutes < end
    }
}

pub fn is_quiet_window(now: OffsetDateTime, quiet_hours: &QuietHours) -> bool {
    is_quiet(
        now,
        &quiet_hours.start,
        &quiet_hours.end,
        &quiet_hours.time_zone,
    )
}

/// Parses "HH:MM" (24h) into minutes since midnight.
pub fn parse_hhmm(value: &str) -> Option<u16> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}
