//! End-to-end exercise of the SSH hybrid command builder: confirms the
//! generated one-liner is syntactically well-formed shell and that a
//! maliciously-named path can never break out of its quoting.

use logviewer_engine::filter::{parse_query_expression, FilterNode, Op};
use logviewer_engine::ssh::{build_command, MarkerMode};
use logviewer_engine::Query;

#[test]
fn falls_back_to_cat_when_hl_is_absent_and_follow_uses_tail() {
    let mut query = Query::new();
    query.filter = Some(FilterNode::leaf("level", Op::Equals, "error"));
    let cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(false));

    assert!(cmd.starts_with("if command -v hl >/dev/null 2>&1; then"));
    assert!(cmd.contains("cat '/var/log/app.log'"));
    assert!(!cmd.contains("tail -f"));

    query.follow = true;
    let follow_cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(false));
    assert!(follow_cmd.contains("tail -f '/var/log/app.log'"));
}

#[test]
fn markers_let_the_caller_distinguish_which_branch_ran() {
    let query = Query::new();
    let cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(true));

    assert!(cmd.contains("echo \"HL_ENGINE=hl\" >&2"));
    assert!(cmd.contains("echo \"HL_ENGINE=native\" >&2"));
}

#[test]
fn a_path_designed_to_break_out_of_quoting_stays_inert() {
    let malicious = "/var/log/'; rm -rf / #.log".to_string();
    let query = Query::new();
    let cmd = build_command(&query, &[malicious], MarkerMode(false));

    // The escaped path must never leave an unquoted "rm -rf /" in the
    // command line: every single quote is closed and re-opened around a
    // literal quote character rather than terminating the string early.
    assert!(!cmd.contains("'; rm -rf / #.log"));
    assert!(cmd.contains(r"'\''"));
}

#[test]
fn a_full_boolean_expression_survives_into_the_hl_branch() {
    let filter = parse_query_expression(".level = error and .service ~= api").unwrap();
    let mut query = Query::new();
    query.filter = Some(filter);
    let cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(false));

    assert!(cmd.contains("hl"));
    assert!(cmd.contains("-q"));
}
