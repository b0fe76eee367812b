//! End-to-end exercise of the streaming reader: multiline reassembly,
//! timestamp detection, JSON field extraction, and client-side filtering,
//! all driven through [`read_bounded`] the way a non-follow adapter call
//! would.

use logviewer_engine::filter::{FilterNode, Op};
use logviewer_engine::models::FieldExtraction;
use logviewer_engine::reader::read_bounded;

#[tokio::test]
async fn reassembles_multiline_stack_traces_by_timestamp_boundary() {
    let log = concat!(
        "2024-06-24T15:27:29.000000000Z starting request handler\n",
        "2024-06-24T15:27:29.500000000Z panic: index out of bounds\n",
        "    at handler.rs:42\n",
        "    at main.rs:10\n",
        "2024-06-24T15:27:30.000000000Z request handler recovered\n",
    );

    let field_extraction = FieldExtraction {
        timestamp_regex: Some(r"^\S+".to_string()),
        ..Default::default()
    };

    let output = read_bounded(log.as_bytes(), field_extraction, FilterNode::and(vec![]), false, None)
        .await
        .expect("read should succeed");

    assert_eq!(output.initial.len(), 3);
    assert!(output.initial[1].message.contains("panic: index out of bounds"));
    assert!(output.initial[1].message.contains("at handler.rs:42"));
    assert!(output.initial[1].message.contains("at main.rs:10"));
    assert!(output.initial[0].timestamp.is_some());
}

#[tokio::test]
async fn lifts_json_fields_and_applies_client_side_filter() {
    let log = concat!(
        "{\"level\":\"error\",\"msg\":\"disk full\",\"volume\":\"/data\"}\n",
        "{\"level\":\"info\",\"msg\":\"heartbeat\",\"volume\":\"/data\"}\n",
    );

    let field_extraction = FieldExtraction {
        json_extract: true,
        ..Default::default()
    };
    let filter = FilterNode::leaf("level", Op::Equals, "error");

    let output = read_bounded(log.as_bytes(), field_extraction, filter, false, None)
        .await
        .expect("read should succeed");

    assert_eq!(output.initial.len(), 1);
    assert!(output.discovered_fields.contains("volume"));
    assert!(output.discovered_fields.contains("msg"));
}

#[tokio::test]
async fn pre_filtered_results_skip_client_side_reapplication() {
    let log = "already filtered upstream\nshould also pass through\n";
    let filter = FilterNode::leaf("_", Op::Equals, "nonsense that would normally drop everything");

    let output = read_bounded(log.as_bytes(), FieldExtraction::default(), filter, true, None)
        .await
        .expect("read should succeed");

    assert_eq!(output.initial.len(), 2);
}

#[tokio::test]
async fn size_cap_bounds_the_returned_batch() {
    let log = (0..10).map(|i| format!("line {i}\n")).collect::<String>();

    let output = read_bounded(
        log.as_bytes(),
        FieldExtraction::default(),
        FilterNode::and(vec![]),
        false,
        Some(3),
    )
    .await
    .expect("read should succeed");

    assert_eq!(output.initial.len(), 3);
}
