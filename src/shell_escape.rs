//! POSIX shell single-quote escaping (spec §4.5). This is a hard security
//! invariant: the remote shell must reproduce the original string
//! byte-for-byte via `printf '%s' <escaped>`, no matter what the input
//! contains.

/// Characters safe to emit unquoted.
fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':')
}

/// Escape a single argument for inclusion in a POSIX shell command line.
/// Strings made entirely of safe characters pass through unquoted;
/// everything else is wrapped in single quotes, with embedded single
/// quotes encoded as `'\''`.
pub fn escape(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_safe) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Escape and join multiple arguments with spaces.
pub fn escape_all<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| escape(v.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
