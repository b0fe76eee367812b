//! Backend translators (C4, spec §4.4): each submodule turns a canonical
//! [`crate::models::Query`] / [`crate::filter::FilterNode`] into the
//! native request shape for one backend family.

pub mod cloudwatch;
pub mod docker;
pub mod elasticsearch;
pub mod hl;
pub mod kubernetes;
pub mod local_cmd;
pub mod splunk;

use chrono::{DateTime, Utc};

use crate::models::Range;
use crate::util::time::resolve_bounds;

/// Resolve a query's range against `now`, shared by every translator that
/// needs concrete bounds rather than the raw `Range` enum.
pub fn bounds(range: &Range, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
    resolve_bounds(range, now)
}
