use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::Value;

use crate::errors::ApiError;

/// A closed `[start, end]` interval over reading timestamps. `end` is the
/// server clock at resolution time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolves `timedelta` (seconds), `days` and `minutes` parameters into a
/// concrete window reaching back from now. Without any duration parameter
/// the window collapses to `start == end == now`, so callers get no rows
/// unless they ask for a span.
pub fn resolve(params: &[(String, String)]) -> Result<TimeWindow, ApiError> {
    resolve_at(params, Utc::now())
}

pub fn resolve_at(params: &[(String, String)], now: DateTime<Utc>) -> Result<TimeWindow, ApiError> {
    let seconds = parse_duration(params, "timedelta", Duration::try_seconds)?;
    let days = parse_duration(params, "days", Duration::try_days)?;
    let minutes = parse_duration(params, "minutes", Duration::try_minutes)?;

    let span = [seconds, days, minutes]
        .into_iter()
        .try_fold(Duration::zero(), |total, part| total.checked_add(&part));
    let start = span.and_then(|span| now.checked_sub_signed(span));

    match start {
        Some(start) => Ok(TimeWindow { start, end: now }),
        None => Err(ApiError::validation("Requested time span is out of range")),
    }
}

fn parse_duration(
    params: &[(String, String)],
    name: &str,
    to_duration: impl Fn(i64) -> Option<Duration>,
) -> Result<Duration, ApiError> {
    let Some((_, value)) = params.iter().find(|(key, _)| key == name) else {
        return Ok(Duration::zero());
    };

    let count: i64 = value.parse().map_err(|_| {
        ApiError::validation(format!("'{name}' needs to be an integer, got '{value}'"))
    })?;

    // counts that parse but exceed chrono's representable span are client errors
    to_duration(count).ok_or_else(|| {
        ApiError::validation(format!("'{name}' is out of range, got '{value}'"))
    })
}

/// Coerces a write-body timestamp into a UTC instant. Accepts a numeric
/// epoch value (integer or fractional seconds) or an ISO-8601 string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let seconds = number.as_f64()?;
            DateTime::from_timestamp(seconds.trunc() as i64, (seconds.fract() * 1e9) as u32)
        }
        Value::String(raw) => {
            if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
                return Some(datetime.with_timezone(&Utc));
            }

            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .map(|naive| naive.and_utc())
                .ok()
        }
        _ => None,
    }
}
