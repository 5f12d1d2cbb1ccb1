//! Haskell definition locator.
//!
//! # Architecture
//!
//! - `patterns` - Ordered definition pattern catalog
//! - `executor` - Search backend seam (`embedded`, `ripgrep`)
//! - `normalizer` - Raw match decoding and line selection
//! - `resolver` - Best-match resolution
//! - `orchestrator` - Buffer-then-workspace lookup with literal-scan fallback

pub mod embedded;
pub mod executor;
pub mod fallback;
pub mod files;
pub mod normalizer;
pub mod orchestrator;
pub mod patterns;
pub mod resolver;
pub mod ripgrep;

pub use embedded::EmbeddedExecutor;
pub use executor::{SearchExecutor, SearchOutcome, SearchSource, DEFAULT_GLOBS};
pub use orchestrator::Locator;
pub use patterns::build_patterns;
pub use resolver::{resolve, resolve_per_file};
pub use ripgrep::RipgrepExecutor;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

/// The identifier under a 0-based `(line, column)` position.
///
/// A cursor just past the end of a word still selects it. Columns count
/// characters, not bytes.
pub fn identifier_at(text: &str, line: usize, column: usize) -> Option<String> {
    let line = text.split('\n').nth(line)?;
    let line = line.strip_suffix('\r').unwrap_or(line);
    let chars: Vec<char> = line.chars().collect();

    let at = if chars.get(column).is_some_and(|&c| is_word_char(c)) {
        column
    } else if column > 0 && chars.get(column - 1).is_some_and(|&c| is_word_char(c)) {
        column - 1
    } else {
        return None;
    };

    let start = chars[..at]
        .iter()
        .rposition(|&c| !is_word_char(c))
        .map_or(0, |i| i + 1);
    let end = chars[at..]
        .iter()
        .position(|&c| !is_word_char(c))
        .map_or(chars.len(), |i| at + i);

    let word: String = chars[start..end].iter().collect();
    let word = word.trim_start_matches('\'');
    (!word.is_empty()).then(|| word.to_string())
}
