//! Wall-clock <-> absolute instant conversion.
//!
//! Everything persisted is an absolute UTC instant. Wall-clock strings only
//! exist at the edges: as input (paired with an IANA zone id) and as display
//! output for a viewer's zone.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{AppError, AppResult};

pub const DEFAULT_ZONE: &str = "UTC";

/// Output format of [`to_zoned_display`]; also accepted as input.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

// `%.f` also matches an absent fraction
const WALL_CLOCK_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

pub fn parse_zone(zone_id: &str) -> AppResult<Tz> {
    zone_id
        .parse::<Tz>()
        .map_err(|_| AppError::InvalidTimezone(zone_id.to_owned()))
}

fn parse_wall_clock(wall_clock: &str) -> AppResult<NaiveDateTime> {
    let trimmed = wall_clock.trim();

    WALL_CLOCK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| AppError::InvalidWallClock(wall_clock.to_owned()))
}

/// Pins a local time to a single instant.
///
/// In a fall-back overlap the earlier instant wins. In a spring-forward gap
/// the time is read with the offset in effect before the gap, which moves it
/// forward by the size of the gap.
fn resolve_local(zone: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let before = zone
                .from_local_datetime(&(local - TimeDelta::hours(3)))
                .earliest()?;
            before
                .offset()
                .fix()
                .from_local_datetime(&local)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

/// Interprets an offset-free date-time as occurring in `zone_id`.
pub fn to_absolute_instant(wall_clock: &str, zone_id: &str) -> AppResult<DateTime<Utc>> {
    let zone = parse_zone(zone_id)?;
    let local = parse_wall_clock(wall_clock)?;

    resolve_local(&zone, local).ok_or_else(|| AppError::InvalidWallClock(wall_clock.to_owned()))
}

/// Renders `instant` as `YYYY-MM-DD HH:mm` using the offset `zone_id` has at that instant.
pub fn to_zoned_display(instant: DateTime<Utc>, zone_id: &str) -> AppResult<String> {
    let zone = parse_zone(zone_id)?;
    Ok(instant.with_timezone(&zone).format(DISPLAY_FORMAT).to_string())
}
