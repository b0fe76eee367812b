//! Streaming reader (C3, spec §4.3): turns a line-producing byte stream
//! into structured [`Entry`] values, handling multiline reassembly,
//! timestamp detection, JSON/named-group/key-value field extraction, and
//! pre-filtered-result awareness.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::filter::FilterNode;
use crate::models::{Entry, FieldExtraction, FieldValue};
use crate::util::cancel::CancelToken;

/// An entry still accumulating continuation lines.
struct Pending {
    timestamp: Option<DateTime<Utc>>,
    message: String,
}

/// Drives the line → entry pipeline described in spec §4.3. Usable both
/// for bounded (non-follow) reads via [`IncrementalReader::finish_all`]
/// and for follow-mode streaming via [`read_follow`], which feeds lines
/// into the same state machine one at a time.
pub struct IncrementalReader {
    field_extraction: FieldExtraction,
    filter: FilterNode,
    pre_filtered: bool,
    timestamp_regex: Option<Regex>,
    named_group_regex: Option<Regex>,
    kv_regex: Option<Regex>,
    pending: Option<Pending>,
    discovered_fields: HashSet<String>,
}

impl IncrementalReader {
    pub fn new(
        field_extraction: FieldExtraction,
        filter: FilterNode,
        pre_filtered: bool,
    ) -> Self {
        let timestamp_regex = field_extraction
            .timestamp_regex
            .as_deref()
            .and_then(|p| compile_timestamp_regex(p).ok());
        let named_group_regex = field_extraction
            .named_group_regex
            .as_deref()
            .and_then(|p| Regex::new(p).ok());
        let kv_regex = field_extraction
            .kv_regex
            .as_deref()
            .and_then(|p| Regex::new(p).ok());

        Self {
            field_extraction,
            filter,
            pre_filtered,
            timestamp_regex,
            named_group_regex,
            kv_regex,
            pending: None,
            discovered_fields: HashSet::new(),
        }
    }

    pub fn discovered_fields(&self) -> &HashSet<String> {
        &self.discovered_fields
    }

    /// Feed one raw line (newline already stripped). Returns a finalized
    /// entry if this line started a new logical entry and a prior one was
    /// pending; entries that fail the filter are silently dropped (spec
    /// §4.3 step 7) unless `pre_filtered` is set.
    pub fn feed_line(&mut self, line: &str) -> Option<Entry> {
        let starts_new = match &self.timestamp_regex {
            None => true,
            Some(re) => re.is_match(line),
        };

        if starts_new {
            let finished = self.pending.take().and_then(|p| self.finalize(p));
            let (timestamp, message) = match &self.timestamp_regex {
                Some(re) => extract_timestamp(re, line),
                None => (None, line.to_string()),
            };
            self.pending = Some(Pending { timestamp, message });
            finished
        } else {
            match self.pending.as_mut() {
                Some(p) => {
                    p.message.push('\n');
                    p.message.push_str(line);
                }
                None => {
                    self.pending = Some(Pending {
                        timestamp: None,
                        message: line.to_string(),
                    });
                }
            }
            None
        }
    }

    /// Flush any entry still pending at EOF/cancellation.
    pub fn finish(&mut self) -> Option<Entry> {
        self.pending.take().and_then(|p| self.finalize(p))
    }

    fn finalize(&mut self, pending: Pending) -> Option<Entry> {
        let mut entry = Entry {
            timestamp: pending.timestamp,
            level: None,
            message: pending.message,
            context_id: None,
            fields: Default::default(),
        };

        if self.field_extraction.json_extract {
            if let Ok(serde_json::Value::Object(map)) =
                serde_json::from_str::<serde_json::Value>(entry.message.trim())
            {
                for (k, v) in map {
                    if let Some(fv) = json_value_to_field(&v) {
                        self.discovered_fields.insert(k.clone());
                        entry.fields.insert(k, fv);
                    }
                }
            }
        }

        if let Some(re) = &self.named_group_regex {
            if let Some(caps) = re.captures(&entry.message) {
                for name in re.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        self.discovered_fields.insert(name.to_string());
                        entry
                            .fields
                            .insert(name.to_string(), FieldValue::String(m.as_str().trim().to_string()));
                    }
                }
            }
        }

        if let Some(re) = &self.kv_regex {
            for caps in re.captures_iter(&entry.message) {
                if caps.len() >= 3 {
                    let key = caps[1].trim().to_string();
                    let value = caps[2].trim().to_string();
                    self.discovered_fields.insert(key.clone());
                    entry.fields.insert(key, FieldValue::String(value));
                }
            }
        }

        if let Some(FieldValue::String(level)) =
            entry.fields.get("level").or_else(|| entry.fields.get("Level"))
        {
            entry.level = Some(level.clone());
        }

        if self.pre_filtered || self.filter.matches(&entry) {
            Some(entry)
        } else {
            None
        }
    }
}

fn json_value_to_field(value: &serde_json::Value) -> Option<FieldValue> {
    match value {
        serde_json::Value::String(s) => Some(FieldValue::String(s.clone())),
        serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
        serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
        _ => None,
    }
}

/// A leading `^` is stripped so the regex can match anywhere in the line,
/// not just at its start (spec §4.3 step 1).
fn compile_timestamp_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
    Regex::new(pattern)
}

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Parse the matched substring trying, in order: RFC3339-nano, RFC3339,
/// `YYYY-MM-DD HH:MM:SS.fff`, `YYYY-MM-DD HH:MM:SS`, then Unix-float
/// seconds. The substring is removed from the emitted message; any byte
/// prefix before the match is preserved verbatim (spec §4.3 step 2).
fn extract_timestamp(re: &Regex, line: &str) -> (Option<DateTime<Utc>>, String) {
    let Some(m) = re.find(line) else {
        return (None, line.to_string());
    };
    let matched = m.as_str();
    let parsed = DateTime::parse_from_rfc3339(matched)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            TIMESTAMP_FORMATS.iter().find_map(|fmt| {
                chrono::NaiveDateTime::parse_from_str(matched, fmt)
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
        })
        .or_else(|| {
            matched
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs.trunc() as i64, 0).single())
        });

    let mut message = String::with_capacity(line.len() - matched.len());
    message.push_str(&line[..m.start()]);
    message.push_str(&line[m.end()..]);
    (parsed, message)
}

/// Output of a streaming query: the initial batch (always fully
/// materialized and, for non-follow queries, fully filtered) plus, for
/// `follow` queries, a channel of further batches and a parallel error
/// channel (spec §4.3 "Follow semantics").
pub struct ReaderOutput {
    pub initial: Vec<Entry>,
    pub follow_rx: Option<mpsc::Receiver<Vec<Entry>>>,
    pub error_rx: Option<mpsc::Receiver<String>>,
    pub discovered_fields: HashSet<String>,
}

/// Read all lines from `source` into a single bounded vector (non-follow
/// path).
pub async fn read_bounded<R: AsyncRead + Unpin>(
    source: R,
    field_extraction: FieldExtraction,
    filter: FilterNode,
    pre_filtered: bool,
    size_cap: Option<usize>,
) -> std::io::Result<ReaderOutput> {
    let mut reader = IncrementalReader::new(field_extraction, filter, pre_filtered);
    let mut buf_reader = BufReader::new(source);
    let mut line = Vec::new();
    let mut entries = Vec::new();

    loop {
        line.clear();
        let n = buf_reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        let text = text.strip_suffix('\r').unwrap_or(text);
        if let Some(entry) = reader.feed_line(text) {
            entries.push(entry);
            if let Some(cap) = size_cap {
                if entries.len() >= cap {
                    break;
                }
            }
        }
    }
    if let Some(entry) = reader.finish() {
        if size_cap.map(|cap| entries.len() < cap).unwrap_or(true) {
            entries.push(entry);
        }
    }

    Ok(ReaderOutput {
        initial: entries,
        follow_rx: None,
        error_rx: None,
        discovered_fields: reader.discovered_fields().clone(),
    })
}

/// Follow mode: spawn a task that owns `source`, reads one line at a time,
/// honors `cancel`, and closes the output channel on EOF or cancellation.
/// On exit, `on_close` is invoked so callers (local/SSH process adapters)
/// can sequence the teardown described in spec §4.3's "Follow semantics"
/// (close stdout, await stderr, reap child, surface exit error, close
/// error channel).
pub fn read_follow<R, F, Fut>(
    source: R,
    field_extraction: FieldExtraction,
    filter: FilterNode,
    pre_filtered: bool,
    cancel: CancelToken,
    on_close: F,
) -> (mpsc::Receiver<Vec<Entry>>, mpsc::Receiver<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Option<String>> + Send + 'static,
{
    let (batch_tx, batch_rx) = mpsc::channel(64);
    let (err_tx, err_rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut reader = IncrementalReader::new(field_extraction, filter, pre_filtered);
        let mut buf_reader = BufReader::new(source);
        let mut line = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("follow reader cancelled");
                    break;
                }
                result = buf_reader.read_until(b'\n', &mut line) => {
                    match result {
                        Ok(0) => break,
                        Ok(_) => {
                            let text = String::from_utf8_lossy(&line);
                            let text = text.strip_suffix('\n').unwrap_or(&text);
                            let text = text.strip_suffix('\r').unwrap_or(text);
                            if let Some(entry) = reader.feed_line(text) {
                                if batch_tx.send(vec![entry]).await.is_err() {
                                    break;
                                }
                            }
                            line.clear();
                        }
                        Err(e) => {
                            warn!("follow reader io error: {e}");
                            let _ = err_tx.send(format!("stream error: {e}")).await;
                            break;
                        }
                    }
                }
            }
        }

        if let Some(entry) = reader.finish() {
            let _ = batch_tx.send(vec![entry]).await;
        }

        if let Some(exit_err) = on_close().await {
            let _ = err_tx.send(exit_err).await;
        }
        // batch_tx and err_tx drop here, closing both channels
        // deterministically (spec §4.3, DESIGN NOTES "process lifecycle").
    });

    (batch_rx, err_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterNode, LogicalOp};

    fn match_all() -> FilterNode {
        FilterNode::Branch {
            logic: LogicalOp::And,
            children: vec![],
        }
    }

    #[test]
    fn docker_multiplexed_line_timestamp_scenario() {
        // spec §8 scenario 3
        let line = "\u{1}\0\0\0\0\0\0\u{80}2024-06-24T15:27:29.669455265Z /hello";
        let mut fe = FieldExtraction::default();
        fe.timestamp_regex = Some(
            r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})".to_string(),
        );
        let mut reader = IncrementalReader::new(fe, match_all(), false);
        assert!(reader.feed_line(line).is_none());
        let entry = reader.finish().unwrap();
        assert_eq!(
            entry.timestamp.unwrap().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            "2024-06-24T15:27:29.669455265+00:00"
        );
        assert_eq!(entry.message, "\u{1}\0\0\0\0\0\0\u{80} /hello");
    }

    #[test]
    fn multiline_reassembly_is_lossless_modulo_timestamp() {
        let mut fe = FieldExtraction::default();
        fe.timestamp_regex = Some(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}".to_string());
        let mut reader = IncrementalReader::new(fe, match_all(), false);
        assert!(reader
            .feed_line("2024-01-01 00:00:00 starting up")
            .is_none());
        assert!(reader.feed_line("  caused by: disk full").is_none());
        assert!(reader.feed_line("  at line 42").is_none());
        let entry = reader
            .feed_line("2024-01-01 00:00:01 next entry")
            .unwrap();
        assert_eq!(
            entry.message,
            " starting up\n  caused by: disk full\n  at line 42"
        );
        let last = reader.finish().unwrap();
        assert_eq!(last.message, " next entry");
    }

    #[test]
    fn no_timestamp_regex_every_line_is_its_own_entry() {
        let reader_entries: Vec<_> = {
            let mut reader = IncrementalReader::new(FieldExtraction::default(), match_all(), false);
            let mut out = Vec::new();
            for line in ["first", "second", "third"] {
                if let Some(e) = reader.feed_line(line) {
                    out.push(e);
                }
            }
            if let Some(e) = reader.finish() {
                out.push(e);
            }
            out
        };
        assert_eq!(reader_entries.len(), 3);
        assert_eq!(reader_entries[0].message, "first");
    }

    #[test]
    fn json_extraction_lifts_fields() {
        let mut fe = FieldExtraction::default();
        fe.json_extract = true;
        let mut reader = IncrementalReader::new(fe, match_all(), false);
        reader.feed_line(r#"{"level":"error","code":500,"ok":false}"#);
        let entry = reader.finish().unwrap();
        assert_eq!(entry.level.as_deref(), Some("error"));
        assert_eq!(entry.fields.get("code"), Some(&FieldValue::Number(500.0)));
        assert_eq!(entry.fields.get("ok"), Some(&FieldValue::Bool(false)));
    }

    #[test]
    fn pre_filtered_marker_skips_client_side_filtering() {
        use crate::filter::Op;
        let deny_all = FilterNode::leaf("level", Op::Equals, "never-matches");

        let mut reader = IncrementalReader::new(FieldExtraction::default(), deny_all.clone(), false);
        reader.feed_line("line one");
        assert!(reader.finish().is_none());

        let mut reader = IncrementalReader::new(FieldExtraction::default(), deny_all, true);
        reader.feed_line("line one");
        assert!(reader.finish().is_some());
    }
}
