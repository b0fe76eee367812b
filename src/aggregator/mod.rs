//! Multi-source aggregator (C6, spec §4.7): merges the initial batches
//! and follow streams from several sub-results into a single
//! timestamp-ordered result, tolerating partial failure.

use std::cmp::Ordering;

use tokio::sync::mpsc;
use tracing::warn;

use crate::adapters::QueryResult;
use crate::errors::EngineError;
use crate::models::Entry;

/// One sub-result as handed to the aggregator, tagged with its insertion
/// index so ties break by source order (spec §4.7, §5 "Ordering
/// guarantees").
struct Source {
    index: usize,
    result: Result<QueryResult, EngineError>,
}

#[derive(Default)]
pub struct Aggregator {
    sources: Vec<Source>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept zero-or-more sub-results concurrently, in any order.
    pub fn add(&mut self, result: Result<QueryResult, EngineError>) {
        let index = self.sources.len();
        self.sources.push(Source { index, result });
    }

    /// Gather the initial batches from every sub-result, stably sorted by
    /// timestamp ascending (ties broken by source insertion order), and
    /// spawn the follow-stream merge if any sub-result is open-ended.
    ///
    /// Fails only if every sub-result failed; otherwise the failed ones
    /// are surfaced on the aggregate error channel.
    pub fn finish(self) -> Result<AggregateResult, EngineError> {
        let mut merged = Vec::new();
        let mut follow_sources = Vec::new();
        let mut sub_error_sources = Vec::new();
        let mut failed = Vec::new();
        let mut any_succeeded = false;

        for source in self.sources {
            match source.result {
                Ok(result) => {
                    any_succeeded = true;
                    let index = source.index;
                    merged.extend(result.initial.into_iter().map(|e| (index, e)));
                    if let Some(follow_rx) = result.follow_rx {
                        follow_sources.push((index, follow_rx));
                    }
                    if let Some(err_rx) = result.error_rx {
                        sub_error_sources.push((index, err_rx));
                    }
                }
                Err(e) => {
                    warn!(source = source.index, error = %e, "sub-source failed");
                    failed.push((source.index, e.to_string()));
                }
            }
        }

        if !any_succeeded {
            return Err(EngineError::transport("aggregate", "all sub-sources failed"));
        }

        merged.sort_by(|(ia, a), (ib, b)| compare_entries(*ia, a, *ib, b));
        let initial = merged.into_iter().map(|(_, e)| e).collect();

        let needs_error_channel = !follow_sources.is_empty() || !sub_error_sources.is_empty() || !failed.is_empty();
        let (follow_rx, error_rx) = if needs_error_channel {
            spawn_merge(follow_sources, sub_error_sources, failed)
        } else {
            (None, None)
        };

        Ok(AggregateResult { initial, follow_rx, error_rx })
    }
}

fn compare_entries(index_a: usize, a: &Entry, index_b: usize, b: &Entry) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(ta), Some(tb)) => ta.cmp(&tb).then(index_a.cmp(&index_b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => index_a.cmp(&index_b),
    }
}

pub struct AggregateResult {
    pub initial: Vec<Entry>,
    pub follow_rx: Option<mpsc::Receiver<Vec<Entry>>>,
    pub error_rx: Option<mpsc::Receiver<String>>,
}

/// Merge several follow channels into one, emitting timestamp-ordered
/// batches: read one batch from each open sub-channel, emit the
/// earliest-timestamped batch, and repeat; when a sub-channel closes,
/// continue draining the others (spec §4.7). Construction-time failures
/// and any message on a sub-result's own error channel are forwarded,
/// tagged with the originating source index.
fn spawn_merge(
    follow_sources: Vec<(usize, mpsc::Receiver<Vec<Entry>>)>,
    error_sources: Vec<(usize, mpsc::Receiver<String>)>,
    failed: Vec<(usize, String)>,
) -> (Option<mpsc::Receiver<Vec<Entry>>>, Option<mpsc::Receiver<String>>) {
    let (out_tx, out_rx) = mpsc::channel(64);
    let (err_tx, err_rx) = mpsc::channel(16);

    tokio::spawn(async move {
        for (index, message) in failed {
            if err_tx.send(format!("source {index}: {message}")).await.is_err() {
                return;
            }
        }

        let mut pending: Vec<Option<Vec<Entry>>> = vec![None; follow_sources.len()];
        let mut sources = follow_sources;

        loop {
            for (slot, (_, rx)) in pending.iter_mut().zip(sources.iter_mut()) {
                if slot.is_none() {
                    *slot = rx.recv().await;
                }
            }

            let Some(winner) = pending
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.as_ref().map(|b| (i, earliest_timestamp(b))))
                .min_by(|(_, ta), (_, tb)| ta.cmp(tb))
                .map(|(i, _)| i)
            else {
                break;
            };

            if let Some(batch) = pending[winner].take() {
                if out_tx.send(batch).await.is_err() {
                    break;
                }
            }
        }

        for (index, mut rx) in error_sources {
            while let Some(msg) = rx.recv().await {
                if err_tx.send(format!("source {index}: {msg}")).await.is_err() {
                    return;
                }
            }
        }
    });

    (Some(out_rx), Some(err_rx))
}

fn earliest_timestamp(batch: &[Entry]) -> Option<chrono::DateTime<chrono::Utc>> {
    batch.iter().filter_map(|e| e.timestamp).min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;

    fn entry_at(seconds: i64, message: &str) -> Entry {
        let mut e = Entry::new(message);
        e.timestamp = chrono::DateTime::from_timestamp(seconds, 0);
        e
    }

    #[test]
    fn merges_and_sorts_initial_batches_by_timestamp() {
        let mut agg = Aggregator::new();
        agg.add(Ok(QueryResult::bounded(vec![entry_at(20, "b"), entry_at(5, "a")])));
        agg.add(Ok(QueryResult::bounded(vec![entry_at(10, "c")])));
        let result = agg.finish().unwrap();
        let messages: Vec<_> = result.initial.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "c", "b"]);
    }

    #[test]
    fn ties_break_by_source_insertion_order() {
        let mut agg = Aggregator::new();
        agg.add(Ok(QueryResult::bounded(vec![entry_at(1, "first-source")])));
        agg.add(Ok(QueryResult::bounded(vec![entry_at(1, "second-source")])));
        let result = agg.finish().unwrap();
        let messages: Vec<_> = result.initial.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first-source", "second-source"]);
    }

    #[test]
    fn succeeds_iff_at_least_one_sub_result_succeeded() {
        let mut agg = Aggregator::new();
        agg.add(Ok(QueryResult::bounded(vec![entry_at(1, "ok")])));
        agg.add(Err(EngineError::transport("splunk", "timeout")));
        let result = agg.finish();
        assert!(result.is_ok());
        assert_eq!(result.unwrap().initial.len(), 1);
    }

    #[test]
    fn all_sub_results_failing_is_an_error() {
        let mut agg = Aggregator::new();
        agg.add(Err(EngineError::transport("splunk", "timeout")));
        agg.add(Err(EngineError::transport("es", "refused")));
        assert!(agg.finish().is_err());
    }

    #[tokio::test]
    async fn failed_sub_result_is_reported_on_error_channel() {
        let mut agg = Aggregator::new();
        agg.add(Ok(QueryResult::bounded(vec![entry_at(1, "ok")])));
        agg.add(Err(EngineError::transport("splunk", "timeout")));
        let mut result = agg.finish().unwrap();
        let msg = result.error_rx.as_mut().unwrap().recv().await.unwrap();
        assert!(msg.contains("timeout"));
    }
}
