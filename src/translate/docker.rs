//! Translator for Docker's container-logs API (spec §4.4 "Docker").

use bollard::container::LogsOptions;
use chrono::{DateTime, Utc};

use crate::models::{Query, Range};

use super::bounds;

/// Build `bollard::container::LogsOptions` from a query. Filtering happens
/// client-side after demultiplexing (spec §4.4), so this only carries the
/// transport-level shape: stdout/stderr selection, timestamps, follow, and
/// the `since`/`until`/`tail` window.
pub fn build_logs_options(query: &Query, now: DateTime<Utc>) -> LogsOptions<String> {
    let range = query.range.clone().unwrap_or_default();
    let (gte, lte) = bounds(&range, now);

    LogsOptions {
        follow: query.follow,
        stdout: true,
        stderr: true,
        timestamps: true,
        since: gte.map(|dt| dt.timestamp()).unwrap_or(0),
        until: if query.follow { 0 } else { lte.timestamp() },
        tail: tail_value(query.size),
        ..Default::default()
    }
}

fn tail_value(size: Option<usize>) -> String {
    match size {
        Some(n) if n > 0 => n.to_string(),
        _ => "all".to_string(),
    }
}

/// Whether both stdout and stderr are requested, which per spec §4.4/§4.6
/// requires demultiplexing the combined stream via `stdcopy` framing
/// before lines reach the reader.
pub fn needs_demux(_query: &Query) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_defaults_to_all() {
        assert_eq!(tail_value(None), "all");
        assert_eq!(tail_value(Some(0)), "all");
        assert_eq!(tail_value(Some(200)), "200");
    }

    #[test]
    fn follow_queries_leave_until_open() {
        let mut query = Query::new();
        query.follow = true;
        let now = Utc::now();
        let opts = build_logs_options(&query, now);
        assert!(opts.follow);
        assert_eq!(opts.until, 0);
    }

    #[test]
    fn bounded_queries_set_since_from_relative_range() {
        let mut query = Query::new();
        query.range = Some(Range::Relative(chrono::Duration::minutes(15)));
        let now = DateTime::parse_from_rfc3339("2024-06-24T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let opts = build_logs_options(&query, now);
        assert_eq!(
            opts.since,
            DateTime::parse_from_rfc3339("2024-06-24T15:15:00Z")
                .unwrap()
                .timestamp()
        );
    }
}
