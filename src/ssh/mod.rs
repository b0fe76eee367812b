//! SSH hybrid command builder (spec §4.5): prefers the remote `hl` binary
//! when present, falling back to a plain `cat`/`tail -f` otherwise.

use crate::models::Query;
use crate::shell_escape::escape;
use crate::translate::hl;

/// Whether the build should prepend `echo "HL_ENGINE=..." >&2` markers so
/// the caller can tell, from the error channel, which branch executed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerMode(pub bool);

/// Build the one-liner: `if command -v hl >/dev/null 2>&1; then <hl>;
/// else <fallback>; fi`, optionally capped with `| head -n N` on both
/// branches.
pub fn build_command(query: &Query, paths: &[String], markers: MarkerMode) -> String {
    let hl_argv = hl::build_argv(query, paths);
    let hl_cmd = format!("hl {}", hl_argv.iter().map(|a| escape(a)).collect::<Vec<_>>().join(" "));

    let fallback_cmd = build_fallback(query, paths);

    let (hl_branch, fallback_branch) = if let Some(size) = query.size.filter(|n| *n > 0) {
        (
            format!("{hl_cmd} | head -n {size}"),
            format!("{fallback_cmd} | head -n {size}"),
        )
    } else {
        (hl_cmd, fallback_cmd)
    };

    let (hl_branch, fallback_branch) = if markers.0 {
        (
            format!("echo \"HL_ENGINE=hl\" >&2; {hl_branch}"),
            format!("echo \"HL_ENGINE=native\" >&2; {fallback_branch}"),
        )
    } else {
        (hl_branch, fallback_branch)
    };

    format!(
        "if command -v hl >/dev/null 2>&1; then {hl_branch}; else {fallback_branch}; fi"
    )
}

fn build_fallback(query: &Query, paths: &[String]) -> String {
    let escaped_paths = paths.iter().map(|p| escape(p)).collect::<Vec<_>>().join(" ");
    if query.follow {
        format!("tail -f {escaped_paths}")
    } else {
        format!("cat {escaped_paths}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_query_expression;

    #[test]
    fn builds_hybrid_command_with_fallback() {
        let mut query = Query::new();
        query.filter = Some(parse_query_expression("level=error").unwrap());
        let cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(false));
        assert!(cmd.starts_with("if command -v hl >/dev/null 2>&1; then hl "));
        assert!(cmd.contains("else cat /var/log/app.log; fi"));
    }

    #[test]
    fn follow_mode_falls_back_to_tail() {
        let mut query = Query::new();
        query.follow = true;
        let cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(false));
        assert!(cmd.contains("tail -f /var/log/app.log"));
    }

    #[test]
    fn size_cap_appends_head_to_both_branches() {
        let mut query = Query::new();
        query.size = Some(50);
        let cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(false));
        assert_eq!(cmd.matches("| head -n 50").count(), 2);
    }

    #[test]
    fn marker_mode_prepends_engine_detection_echoes() {
        let query = Query::new();
        let cmd = build_command(&query, &["/var/log/app.log".to_string()], MarkerMode(true));
        assert!(cmd.contains("echo \"HL_ENGINE=hl\" >&2"));
        assert!(cmd.contains("echo \"HL_ENGINE=native\" >&2"));
    }

    #[test]
    fn paths_with_shell_metacharacters_are_escaped() {
        let query = Query::new();
        let cmd = build_command(&query, &["/tmp/a b;rm -rf /".to_string()], MarkerMode(false));
        assert!(cmd.contains("'/tmp/a b;rm -rf /'"));
    }
}
