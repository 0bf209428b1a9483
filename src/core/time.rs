//! Timestamp and duration parameter parsing.
//!
//! API parameters carry instants either as decimal seconds since the Unix
//! epoch or as RFC 3339 strings. Two boundary instants are accepted
//! literally because their years fall outside what calendar parsers handle:
//!
//! - [`Timestamp::MIN`] formats as `-292273086-05-16T16:47:06Z`
//! - [`Timestamp::MAX`] formats as `292277025-08-18T07:12:54.999999999Z`
//!
//! Durations are decimal seconds or compound literals such as `1h30m`.

use crate::core::error::ApiError;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use std::fmt;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

const MIN_TIME_TEXT: &str = "-292273086-05-16T16:47:06Z";
const MAX_TIME_TEXT: &str = "292277025-08-18T07:12:54.999999999Z";

/// An absolute instant with nanosecond precision.
///
/// Seconds are signed and unbounded by calendar arithmetic, so the two
/// boundary instants are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Earliest instant accepted by the API.
    pub const MIN: Timestamp = Timestamp {
        secs: -9_223_309_901_257_974,
        nanos: 0,
    };

    /// Latest instant accepted by the API.
    pub const MAX: Timestamp = Timestamp {
        secs: 9_223_309_901_257_974,
        nanos: 999_999_999,
    };

    /// Unix epoch.
    pub const EPOCH: Timestamp = Timestamp { secs: 0, nanos: 0 };

    /// Create a timestamp from seconds and sub-second nanoseconds.
    ///
    /// Nanoseconds beyond one second carry into the seconds field.
    pub fn new(secs: i64, nanos: u32) -> Self {
        let carry = (nanos as i64) / NANOS_PER_SEC;
        Self {
            secs: secs.saturating_add(carry),
            nanos: (nanos as i64 % NANOS_PER_SEC) as u32,
        }
    }

    /// Create a timestamp from milliseconds since the epoch.
    pub fn from_millis(ms: i64) -> Self {
        Self {
            secs: ms.div_euclid(1000),
            nanos: (ms.rem_euclid(1000) * NANOS_PER_MILLI) as u32,
        }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Convert from a chrono UTC date-time.
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self::new(dt.timestamp(), dt.timestamp_subsec_nanos())
    }

    /// Whole seconds since the epoch.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Sub-second nanoseconds.
    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Milliseconds since the epoch, truncating sub-millisecond precision.
    pub fn to_millis(&self) -> i64 {
        self.secs
            .saturating_mul(1000)
            .saturating_add(self.nanos as i64 / NANOS_PER_MILLI)
    }

    /// Signed nanoseconds from `earlier` to `self`.
    pub fn nanos_since(&self, earlier: &Timestamp) -> i128 {
        let lhs = self.secs as i128 * NANOS_PER_SEC as i128 + self.nanos as i128;
        let rhs = earlier.secs as i128 * NANOS_PER_SEC as i128 + earlier.nanos as i128;
        lhs - rhs
    }

    /// Shift by a signed duration, saturating at the boundary instants.
    pub fn offset(&self, delta: TimeDelta) -> Self {
        let nanos = delta.num_nanoseconds().map(i128::from).unwrap_or_else(|| {
            i128::from(delta.num_milliseconds()) * NANOS_PER_MILLI as i128
        });
        let total = self.secs as i128 * NANOS_PER_SEC as i128 + self.nanos as i128 + nanos;
        let secs = total.div_euclid(NANOS_PER_SEC as i128);
        let nanos = total.rem_euclid(NANOS_PER_SEC as i128) as u32;
        let candidate = Self {
            secs: secs.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            nanos,
        };
        candidate.clamp(Self::MIN, Self::MAX)
    }

    /// RFC 3339 rendering; the boundary instants render as their literal form.
    pub fn to_rfc3339(&self) -> String {
        if *self == Self::MIN {
            return MIN_TIME_TEXT.to_string();
        }
        if *self == Self::MAX {
            return MAX_TIME_TEXT.to_string();
        }
        match DateTime::<Utc>::from_timestamp(self.secs, self.nanos) {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            None => format!("{}.{:09}", self.secs, self.nanos),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse an API time parameter.
///
/// Decimal seconds are rounded to the nearest millisecond (half away from
/// zero), using the digits as written: `"1.5"` is 1500ms and `"1.0005"` is
/// 1001ms.
pub fn parse_time(text: &str) -> Result<Timestamp, ApiError> {
    if let Some((negative, int_part, frac_part)) = split_decimal(text) {
        if let Some(ms) = decimal_millis(negative, int_part, frac_part) {
            return Ok(Timestamp::from_millis(ms));
        }
        return text
            .parse::<f64>()
            .ok()
            .and_then(float_seconds)
            .ok_or_else(|| {
                ApiError::bad_data(format!(
                    "cannot parse {:?} to a valid timestamp. It overflows int64",
                    text
                ))
            });
    }
    if let Ok(secs) = text.parse::<f64>() {
        if let Some(ts) = float_seconds(secs) {
            return Ok(ts);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(Timestamp::from_datetime(&dt.with_timezone(&Utc)));
    }

    match text {
        MIN_TIME_TEXT => Ok(Timestamp::MIN),
        MAX_TIME_TEXT => Ok(Timestamp::MAX),
        _ => Err(ApiError::bad_data(format!(
            "cannot parse {:?} to a valid timestamp",
            text
        ))),
    }
}

/// Parse an API duration parameter.
pub fn parse_duration(text: &str) -> Result<TimeDelta, ApiError> {
    if let Ok(secs) = text.parse::<f64>() {
        let nanos = secs * NANOS_PER_SEC as f64;
        if nanos.is_nan() || nanos >= i64::MAX as f64 || nanos <= i64::MIN as f64 {
            return Err(ApiError::bad_data(format!(
                "cannot parse {:?} to a valid duration. It overflows int64",
                text
            )));
        }
        return Ok(TimeDelta::nanoseconds(nanos as i64));
    }

    parse_duration_literal(text).ok_or_else(|| {
        ApiError::bad_data(format!("cannot parse {:?} to a valid duration", text))
    })
}

/// Split `[+-]digits[.digits]` into sign, integer digits and fraction digits.
fn split_decimal(text: &str) -> Option<(bool, &str, &str)> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }
    Some((negative, int_part, frac_part))
}

fn decimal_millis(negative: bool, int_part: &str, frac_part: &str) -> Option<i64> {
    let secs: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let digits = frac_part.as_bytes();
    let mut millis: i64 = 0;
    for i in 0..3 {
        millis = millis * 10 + digits.get(i).map_or(0, |d| i64::from(d - b'0'));
    }
    if digits.get(3).is_some_and(|d| *d >= b'5') {
        millis += 1;
    }
    let total = secs.checked_mul(1000)?.checked_add(millis)?;
    Some(if negative { -total } else { total })
}

/// Exponent and other float syntaxes: truncate to seconds, round the
/// remainder to milliseconds.
fn float_seconds(value: f64) -> Option<Timestamp> {
    if !value.is_finite() || value.abs() >= (i64::MAX / 1000) as f64 {
        return None;
    }
    let secs = value.trunc();
    let millis = ((value - secs) * 1000.0).round();
    Some(Timestamp::from_millis(secs as i64 * 1000 + millis as i64))
}

const DURATION_UNITS: [(&str, i64); 7] = [
    ("y", 365 * 24 * 60 * 60 * 1000),
    ("w", 7 * 24 * 60 * 60 * 1000),
    ("d", 24 * 60 * 60 * 1000),
    ("h", 60 * 60 * 1000),
    ("m", 60 * 1000),
    ("s", 1000),
    ("ms", 1),
];

/// Compound duration literal, units in descending order, each at most once.
fn parse_duration_literal(text: &str) -> Option<TimeDelta> {
    if text.is_empty() {
        return None;
    }
    let mut rest = text;
    let mut next_unit = 0;
    let mut total_ms: i64 = 0;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let value: i64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let unit = &rest[..unit_len];
        let index = DURATION_UNITS.iter().position(|(name, _)| *name == unit)?;
        if index < next_unit {
            return None;
        }
        next_unit = index + 1;
        total_ms = total_ms.checked_add(value.checked_mul(DURATION_UNITS[index].1)?)?;
        rest = &rest[unit_len..];
    }
    let nanos = total_ms.checked_mul(NANOS_PER_MILLI)?;
    Some(TimeDelta::nanoseconds(nanos))
}
