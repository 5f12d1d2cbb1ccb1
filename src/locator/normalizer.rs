//! Raw match decoding and line selection.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::trace;

use crate::types::{DefinitionKind, Match, MatchOrigin, RawMatchEvent};

/// Reduce a raw (possibly multi-line) match to the single line to jump to.
///
/// Constructors are declared at the end of a possibly indented continuation,
/// so their span's last line is selected; every other kind starts its span.
pub fn normalize(event: &RawMatchEvent, kind: DefinitionKind) -> Match {
    let body = strip_line_break(&event.text);
    let lines: Vec<&str> = body
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    let offset = match kind {
        DefinitionKind::Constructor => lines.len().saturating_sub(1),
        _ => 0,
    };
    let line_text = lines.get(offset).copied().unwrap_or_default().to_string();
    let first_index = event.line_number.saturating_sub(1) as usize;

    Match {
        kind,
        origin: event.origin.clone(),
        line_index: first_index + offset,
        line_text,
    }
}

fn strip_line_break(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

// ===== ripgrep JSON event stream =====

#[derive(Deserialize)]
struct RgEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<RgMatchData>,
}

#[derive(Deserialize)]
struct RgMatchData {
    #[serde(default)]
    path: Option<RgText>,
    #[serde(default)]
    lines: Option<RgText>,
    #[serde(default)]
    line_number: Option<u64>,
}

/// ripgrep encodes valid UTF-8 as `text` and anything else as `bytes`.
#[derive(Deserialize)]
struct RgText {
    #[serde(default)]
    text: Option<String>,
}

/// Decode ripgrep `--json` output into raw match events.
///
/// Only `match` records are kept. Unparseable lines and records without a
/// line number or UTF-8 text are dropped. With `buffer_search` set every
/// event gets the `Buffer` origin, whatever path ripgrep reported for stdin.
pub fn parse_ripgrep_events(stdout: &str, buffer_search: bool) -> Vec<RawMatchEvent> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let event: RgEvent = match serde_json::from_str(line) {
                Ok(e) => e,
                Err(e) => {
                    trace!(error = %e, "Dropping malformed ripgrep record");
                    return None;
                }
            };
            if event.kind != "match" {
                return None;
            }
            let data = event.data?;
            let line_number = data.line_number?;
            let text = data.lines?.text?;

            let origin = if buffer_search {
                MatchOrigin::Buffer
            } else {
                MatchOrigin::File(PathBuf::from(data.path?.text?))
            };

            Some(RawMatchEvent {
                origin,
                line_number,
                text,
            })
        })
        .collect()
}
