//! End-to-end exercise of the filter pipeline: parse a boolean expression,
//! pretty-print it, re-parse the printed form, and confirm both trees
//! evaluate identically against a batch of entries.

use std::collections::HashMap;

use logviewer_engine::filter::{combine_filter_flags, parse_query_expression, pretty_print};
use logviewer_engine::models::FieldValue;
use logviewer_engine::{Entry, Query};

fn entry(level: &str, message: &str, service: &str) -> Entry {
    let mut e = Entry::new(message);
    e.level = Some(level.to_string());
    e.fields.insert("service".to_string(), FieldValue::from(service));
    e
}

#[test]
fn parses_pretty_prints_and_reparses_to_an_equivalent_tree() {
    let expr = r#".level = error and (.service ~= "api" or .service ~= "worker")"#;
    let parsed = parse_query_expression(expr).expect("expression should parse");

    let printed = pretty_print(&parsed);
    let reparsed = parse_query_expression(&printed).expect("printed form should reparse");

    let entries = [
        entry("error", "timeout", "api-gateway"),
        entry("error", "timeout", "worker-7"),
        entry("info", "heartbeat", "api-gateway"),
        entry("error", "timeout", "billing"),
    ];

    for e in &entries {
        assert_eq!(
            parsed.matches(e),
            reparsed.matches(e),
            "round trip changed semantics for {:?}",
            e
        );
    }

    assert!(parsed.matches(&entries[0]));
    assert!(parsed.matches(&entries[1]));
    assert!(!parsed.matches(&entries[2]));
    assert!(!parsed.matches(&entries[3]));
}

#[test]
fn combined_filter_flags_and_together() {
    let filter = combine_filter_flags(&[".level = error".to_string(), ".service ~= api".to_string()])
        .expect("flags should combine");

    assert!(filter.matches(&entry("error", "boom", "api-gateway")));
    assert!(!filter.matches(&entry("error", "boom", "billing")));
    assert!(!filter.matches(&entry("info", "boom", "api-gateway")));
}

#[test]
fn query_without_filter_falls_back_to_legacy_fields_map() {
    let mut query = Query::new();
    query.fields = HashMap::from([("service".to_string(), "billing".to_string())]);

    let effective = query.effective_filter();
    assert!(effective.matches(&entry("info", "invoice sent", "billing")));
    assert!(!effective.matches(&entry("info", "invoice sent", "api-gateway")));
}
