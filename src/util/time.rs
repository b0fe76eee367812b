//! Range parsing: relative durations (`--last 15m`) and absolute instants
//! (`--gte`/`--lte`), plus the hl-syntax relative-duration rendering used
//! by the hl translator (spec §4.4, §4.5).

use chrono::{DateTime, Duration, Utc};

use crate::errors::{EngineError, EngineResult};
use crate::models::Range;

/// Parse a relative duration like `15m`, `2h`, `7d`, `1w`, or a bare
/// integer number of seconds.
pub fn parse_relative_duration(input: &str) -> EngineResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(EngineError::configuration("empty duration"));
    }
    let (number, unit) = match input.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => input.split_at(idx),
        None => (input, "s"),
    };
    let value: f64 = number
        .parse()
        .map_err(|_| EngineError::configuration(format!("invalid duration '{input}'")))?;
    let seconds = match unit {
        "s" | "" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        "d" => value * 86400.0,
        "w" => value * 604800.0,
        other => {
            return Err(EngineError::configuration(format!(
                "unknown duration unit '{other}' in '{input}'"
            )))
        }
    };
    Ok(Duration::milliseconds((seconds * 1000.0) as i64))
}

/// Parse an absolute instant: RFC3339 first, then Unix-epoch seconds.
pub fn parse_absolute_instant(input: &str) -> EngineResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(secs) = input.trim().parse::<f64>() {
        if let Some(dt) = chrono::TimeZone::timestamp_opt(&Utc, secs.trunc() as i64, 0).single() {
            return Ok(dt);
        }
    }
    Err(EngineError::configuration(format!(
        "invalid absolute timestamp '{input}'"
    )))
}

/// Resolve a [`Range`] to concrete `(from, to)` bounds, `to` defaulting to
/// "now" for relative ranges and open-ended absolute ranges.
pub fn resolve_bounds(range: &Range, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
    match range {
        Range::Relative(duration) => (Some(now - *duration), now),
        Range::Absolute { gte, lte } => (*gte, lte.unwrap_or(now)),
    }
}

/// Render a relative duration in hl's `--since -15m` style: a leading `-`
/// followed by the shortest unit suffix that divides evenly, falling back
/// to seconds (spec §4.4 "hl").
pub fn render_hl_relative(duration: &Duration) -> String {
    let total_seconds = duration.num_seconds();
    if total_seconds % 604800 == 0 && total_seconds != 0 {
        format!("-{}w", total_seconds / 604800)
    } else if total_seconds % 86400 == 0 && total_seconds != 0 {
        format!("-{}d", total_seconds / 86400)
    } else if total_seconds % 3600 == 0 && total_seconds != 0 {
        format!("-{}h", total_seconds / 3600)
    } else if total_seconds % 60 == 0 && total_seconds != 0 {
        format!("-{}m", total_seconds / 60)
    } else {
        format!("-{total_seconds}s")
    }
}
