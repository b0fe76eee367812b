//! End-to-end exercise of the multi-source aggregator: stable timestamp
//! merge across several bounded sub-results, and partial-failure
//! tolerance when one source errors out but at least one other succeeds.

use chrono::{TimeZone, Utc};

use logviewer_engine::adapters::QueryResult;
use logviewer_engine::aggregator::Aggregator;
use logviewer_engine::errors::EngineError;
use logviewer_engine::Entry;

fn entry_at(secs: i64, message: &str) -> Entry {
    let mut e = Entry::new(message);
    e.timestamp = Some(Utc.timestamp_opt(secs, 0).unwrap());
    e
}

#[test]
fn merges_multiple_sources_in_timestamp_order() {
    let mut aggregator = Aggregator::new();
    aggregator.add(Ok(QueryResult::bounded(vec![
        entry_at(100, "source-a first"),
        entry_at(300, "source-a second"),
    ])));
    aggregator.add(Ok(QueryResult::bounded(vec![entry_at(200, "source-b only")])));

    let result = aggregator.finish().expect("at least one source succeeded");
    let messages: Vec<&str> = result.initial.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["source-a first", "source-b only", "source-a second"]);
}

#[test]
fn ties_break_by_source_insertion_order() {
    let mut aggregator = Aggregator::new();
    aggregator.add(Ok(QueryResult::bounded(vec![entry_at(100, "first added")])));
    aggregator.add(Ok(QueryResult::bounded(vec![entry_at(100, "second added")])));

    let result = aggregator.finish().unwrap();
    let messages: Vec<&str> = result.initial.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["first added", "second added"]);
}

#[test]
fn entries_with_no_timestamp_sort_after_timestamped_ones() {
    let mut aggregator = Aggregator::new();
    let mut untimed = Entry::new("no timestamp");
    untimed.timestamp = None;
    aggregator.add(Ok(QueryResult::bounded(vec![untimed, entry_at(50, "has timestamp")])));

    let result = aggregator.finish().unwrap();
    assert_eq!(result.initial[0].message, "has timestamp");
    assert_eq!(result.initial[1].message, "no timestamp");
}

#[test]
fn succeeds_when_at_least_one_source_succeeds() {
    let mut aggregator = Aggregator::new();
    aggregator.add(Ok(QueryResult::bounded(vec![entry_at(1, "ok")])));
    aggregator.add(Err(EngineError::transport("splunk", "connection refused")));

    let result = aggregator.finish().expect("partial failure should not be fatal");
    assert_eq!(result.initial.len(), 1);
}

#[test]
fn fails_only_when_every_source_fails() {
    let mut aggregator = Aggregator::new();
    aggregator.add(Err(EngineError::transport("splunk", "connection refused")));
    aggregator.add(Err(EngineError::transport("elasticsearch", "timeout")));

    assert!(aggregator.finish().is_err());
}
