//! Degraded line-by-line scan used when no search engine can run.
//!
//! Applies the catalog's kind rules with plain string inspection. A signature
//! split across lines is only seen when `::` opens the very next line.
//! Constructors are seen on the `data`/`newtype` line itself, on an indented
//! continuation line that starts with `=` or `|`, and as the first word of the
//! indented line right after a head ending in `=`.

use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::locator::executor::effective_globs;
use crate::locator::files::{canonical, list_files, read_source, GlobFilter};
use crate::types::{DefinitionKind, Match, MatchOrigin};

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

fn skip_blank(s: &str) -> &str {
    s.trim_start_matches(is_blank)
}

/// Remainder of `s` after the whole word `word`.
fn strip_word<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(word)?;
    match rest.chars().next() {
        Some(c) if is_ident_char(c) => None,
        _ => Some(rest),
    }
}

/// Remainder of `s` after `keyword` and at least one blank.
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(keyword)?;
    let trimmed = skip_blank(rest);
    (trimmed.len() < rest.len()).then_some(trimmed)
}

/// Whether `identifier` follows any `=` or `|` token in `s`.
fn introduces_constructor(s: &str, identifier: &str) -> bool {
    s.char_indices()
        .filter(|&(_, c)| c == '=' || c == '|')
        .any(|(i, _)| strip_word(skip_blank(&s[i + 1..]), identifier).is_some())
}

/// Head of a class declaration once a single-line superclass context is skipped.
fn class_head_after_context(rest: &str) -> Option<&str> {
    let arrow = rest.find('=')?;
    rest[arrow..]
        .strip_prefix("=>")
        .map(skip_blank)
}

/// Classify every line of `text` that looks like a definition of `identifier`.
pub fn scan_text(identifier: &str, text: &str, origin: &MatchOrigin) -> Vec<Match> {
    if identifier.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    let mut matches = Vec::new();
    let mut in_decl = false;
    let mut after_open_head = false;

    for (index, &line) in lines.iter().enumerate() {
        let mut kinds = Vec::new();
        let indented = line.starts_with(is_blank);
        if !indented {
            in_decl = false;
        }

        if let Some(rest) = strip_word(line, identifier).map(skip_blank) {
            if rest.starts_with("::") {
                kinds.push(DefinitionKind::SignatureSameLine);
            } else if rest.is_empty()
                && lines
                    .get(index + 1)
                    .is_some_and(|next| skip_blank(next).starts_with("::"))
            {
                kinds.push(DefinitionKind::SignatureNextLine);
            } else if rest.starts_with('=') {
                kinds.push(DefinitionKind::Assignment);
            }
        }

        for (keyword, kind) in [
            ("data", DefinitionKind::DataDecl),
            ("type", DefinitionKind::TypeDecl),
            ("newtype", DefinitionKind::NewtypeDecl),
        ] {
            if strip_keyword(line, keyword)
                .and_then(|r| strip_word(r, identifier))
                .is_some()
            {
                kinds.push(kind);
            }
        }

        if let Some(rest) = strip_keyword(line, "class") {
            let plain = strip_word(rest, identifier).is_some();
            let constrained = class_head_after_context(rest)
                .and_then(|h| strip_word(h, identifier))
                .is_some();
            if plain || constrained {
                kinds.push(DefinitionKind::ClassDecl);
            }
        }

        let decl_head = strip_keyword(line, "data").or_else(|| strip_keyword(line, "newtype"));
        if decl_head.is_some() {
            in_decl = true;
        }
        let constructor_span = match decl_head {
            Some(head) => Some(head),
            None if in_decl && indented => {
                Some(skip_blank(line)).filter(|t| t.starts_with(['=', '|']))
            }
            None => None,
        };
        let opens_body =
            after_open_head && indented && strip_word(skip_blank(line), identifier).is_some();
        if opens_body || constructor_span.is_some_and(|s| introduces_constructor(s, identifier)) {
            kinds.push(DefinitionKind::Constructor);
        }
        after_open_head = decl_head.is_some_and(|h| h.trim_end().ends_with('='));

        for (keyword, kind) in [
            ("type", DefinitionKind::TypeFamily),
            ("data", DefinitionKind::DataFamily),
        ] {
            if strip_keyword(line, keyword)
                .and_then(|r| strip_keyword(r, "family"))
                .and_then(|r| strip_word(r, identifier))
                .is_some()
            {
                kinds.push(kind);
            }
        }

        if strip_keyword(line, "pattern")
            .and_then(|r| strip_word(r, identifier))
            .is_some_and(|r| skip_blank(r).starts_with("::"))
        {
            kinds.push(DefinitionKind::PatternSynonym);
        }

        matches.extend(kinds.into_iter().map(|kind| Match {
            kind,
            origin: origin.clone(),
            line_index: index,
            line_text: line.to_string(),
        }));
    }

    matches
}

/// Scan every allowed file under `root`.
///
/// `exclude` must already be canonical. Blocking; run on a blocking thread.
pub fn scan_workspace(
    identifier: &str,
    root: &Path,
    globs: &[String],
    exclude: Option<&Path>,
    max_file_size: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Match>> {
    let filter = GlobFilter::new(&effective_globs(globs));
    let mut matches = Vec::new();

    for path in list_files(root, &filter) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if exclude.is_some_and(|own| canonical(&path) == own) {
            continue;
        }
        let Some(content) = read_source(&path, max_file_size) else {
            continue;
        };
        matches.extend(scan_text(identifier, &content, &MatchOrigin::File(path)));
    }

    Ok(matches)
}
