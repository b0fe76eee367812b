//! Translator for Kubernetes pod logs (spec §4.4 "Kubernetes").

use chrono::{DateTime, Utc};
use kube::api::LogParams;

use crate::errors::EngineResult;
use crate::models::{Query, Range};
use crate::util::interpolate::interpolate_map;

use super::bounds;

/// Build `kube::api::LogParams` from a query. `TailLines` comes from
/// `size` (absent if unset); `SinceSeconds` is used for relative ranges,
/// `SinceTime` for absolute ones. Filtering happens client-side. `options`
/// (e.g. `container`) is resolved against `query.variables` here, at query
/// time, rather than once at adapter construction.
pub fn build_log_params(query: &Query, now: DateTime<Utc>) -> EngineResult<LogParams> {
    let range = query.range.clone().unwrap_or_default();

    let (since_seconds, since_time) = match &range {
        Range::Relative(duration) => (Some(duration.num_seconds()), None),
        Range::Absolute { gte, .. } => (None, *gte),
    };
    let _ = bounds(&range, now); // normalize/validate the window even though Kubernetes only wants one bound form

    let options = interpolate_map(&query.options, &query.variables)?;

    Ok(LogParams {
        container: options.get("container").cloned(),
        follow: query.follow,
        tail_lines: query.size.and_then(|n| if n > 0 { Some(n as i64) } else { None }),
        since_seconds,
        since_time,
        timestamps: true,
        ..Default::default()
    })
}
