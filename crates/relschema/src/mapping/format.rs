//! Parsers for the `date` and `time` string formats

use chrono::{Duration, NaiveDate, NaiveTime};

fn digits(s: &str, len: usize) -> Option<u32> {
    if s.len() == len && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Parse `YYYY-MM-DD` or `YYYYMMDD`, rejecting impossible calendar dates.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let (year, month, day) = match s.len() {
        10 if s.as_bytes()[4] == b'-' && s.as_bytes()[7] == b'-' => {
            (s.get(0..4)?, s.get(5..7)?, s.get(8..10)?)
        }
        8 => (s.get(0..4)?, s.get(4..6)?, s.get(6..8)?),
        _ => return None,
    };
    let year = i32::try_from(digits(year, 4)?).ok()?;
    NaiveDate::from_ymd_opt(year, digits(month, 2)?, digits(day, 2)?)
}

/// Parse `HH:MM`, `HH:MM:SS` or `HH:MM:SS.ffffff`, optionally followed by
/// `Z` or a `+HH[:MM]` / `-HH[:MM]` offset. Offsets are normalized to UTC.
#[must_use]
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let (clock, zone) = match s.find(['Z', '+', '-']) {
        Some(at) => s.split_at(at),
        None => (s, ""),
    };

    let mut parts = clock.split(':');
    let hour = digits(parts.next()?, 2)?;
    let minute = digits(parts.next()?, 2)?;
    let (second, nano) = match parts.next() {
        None => (0, 0),
        Some(seconds) => match seconds.split_once('.') {
            None => (digits(seconds, 2)?, 0),
            Some((whole, fraction)) => (digits(whole, 2)?, nanos(fraction)?),
        },
    };
    if parts.next().is_some() {
        return None;
    }
    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nano)?;

    let offset = utc_offset(zone)?;
    Some(time.overflowing_sub_signed(offset).0)
}

fn nanos(fraction: &str) -> Option<u32> {
    if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let scale = 10u32.pow(9 - u32::try_from(fraction.len()).ok()?);
    fraction.parse::<u32>().ok().map(|n| n * scale)
}

fn utc_offset(zone: &str) -> Option<Duration> {
    if zone.is_empty() || zone == "Z" {
        return Some(Duration::zero());
    }
    let (sign, rest) = match zone.split_at(1) {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((hours, minutes)) => (digits(hours, 2)?, digits(minutes, 2)?),
        None if rest.len() == 4 => (digits(rest.get(0..2)?, 2)?, digits(rest.get(2..4)?, 2)?),
        None => (digits(rest, 2)?, 0),
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(Duration::minutes(sign * i64::from(hours * 60 + minutes)))
}

#[must_use]
pub fn validate_date(s: &str) -> bool {
    parse_date(s).is_some()
}

#[must_use]
pub fn validate_time(s: &str) -> bool {
    parse_time(s).is_some()
}
