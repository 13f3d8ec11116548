use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// Current unix time in whole seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Day stamp `yyyymmdd` for a unix timestamp, evaluated in the given offset.
pub fn day_stamp(unix: i64, offset: FixedOffset) -> u32 {
    let dt: DateTime<FixedOffset> = offset
        .timestamp_opt(unix, 0)
        .single()
        .unwrap_or_else(|| offset.timestamp_opt(0, 0).unwrap());

    let (y, m, d) = (
        chrono::Datelike::year(&dt),
        chrono::Datelike::month(&dt),
        chrono::Datelike::day(&dt),
    );
    (y as u32) * 10_000 + m * 100 + d
}

/// Hour of day (0..24) for a unix timestamp in the given offset.
pub fn hour_of_day(unix: i64, offset: FixedOffset) -> u32 {
    let dt = offset
        .timestamp_opt(unix, 0)
        .single()
        .unwrap_or_else(|| offset.timestamp_opt(0, 0).unwrap());
    chrono::Timelike::hour(&dt)
}

/// Duration from `now` until the next local midnight in the given offset.
/// Used to schedule the daily counter reset.
pub fn until_next_midnight(now_unix: i64, offset: FixedOffset) -> Duration {
    let secs_per_day = 86_400i64;
    let local = now_unix + offset.local_minus_utc() as i64;
    let into_day = local.rem_euclid(secs_per_day);
    let remaining = secs_per_day - into_day;
    Duration::from_secs(remaining as u64)
}

/// Pack a dotted IPv4 string into an integer; malformed input maps to 0 so a
/// bad address still lands in a well-defined counter shard.
pub fn ipv4_to_int(ip: &str) -> u64 {
    let mut parts = ip.split('.');
    let mut sum: u64 = 0;
    for shift in [24u32, 16, 8, 0] {
        match parts.next().and_then(|p| p.parse::<u64>().ok()) {
            Some(octet) if octet <= 255 => sum += octet << shift,
            _ => return 0,
        }
    }
    if parts.next().is_some() {
        return 0;
    }
    sum
}
