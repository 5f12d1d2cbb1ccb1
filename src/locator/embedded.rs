//! In-process multiline regex engine.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::locator::executor::{effective_globs, SearchExecutor, SearchOutcome, SearchSource};
use crate::locator::files::{list_files, read_source, GlobFilter};
use crate::types::{MatchOrigin, PatternEntry, RawMatchEvent};
use crate::{DEFAULT_SEARCH_TIMEOUT_SECS, MAX_FILE_SIZE};

/// Compiled program size cap per pattern.
const REGEX_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Searches with the `regex` crate, reading each workspace file once per
/// batch of patterns.
///
/// A workspace walk is bounded by `timeout`; on expiry the walk stops at the
/// next file and every pattern reports [`Error::Timeout`].
#[derive(Debug, Clone)]
pub struct EmbeddedExecutor {
    max_file_size: usize,
    timeout: Duration,
}

impl EmbeddedExecutor {
    pub fn new(max_file_size: usize, timeout: Duration) -> Self {
        Self {
            max_file_size,
            timeout,
        }
    }
}

impl Default for EmbeddedExecutor {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE, Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS))
    }
}

fn compile(pattern: &PatternEntry) -> Result<Regex> {
    Ok(RegexBuilder::new(&pattern.pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()?)
}

/// Report every match of `re` in `text`, widened to whole physical lines.
pub(crate) fn find_events(re: &Regex, text: &str, origin: &MatchOrigin) -> Vec<RawMatchEvent> {
    let mut events = Vec::new();
    let mut counted_to = 0;
    let mut line_number = 1u64;

    for m in re.find_iter(text) {
        let start = text[..m.start()].rfind('\n').map_or(0, |i| i + 1);
        // a match ending on a line break already covers its last line
        let end = if m.end() > m.start() && text[..m.end()].ends_with('\n') {
            m.end()
        } else {
            text[m.end()..]
                .find('\n')
                .map_or(text.len(), |i| m.end() + i + 1)
        };

        line_number += text[counted_to..start].matches('\n').count() as u64;
        counted_to = start;

        events.push(RawMatchEvent {
            origin: origin.clone(),
            line_number,
            text: text[start..end].to_string(),
        });
    }

    events
}

fn search_tree(
    root: &Path,
    globs: &[String],
    regexes: &[Option<Regex>],
    max_file_size: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<RawMatchEvent>>> {
    let filter = GlobFilter::new(&effective_globs(globs));
    let files = list_files(root, &filter);
    debug!(root = %root.display(), files = files.len(), "Searching workspace");

    let mut per_pattern: Vec<Vec<RawMatchEvent>> = vec![Vec::new(); regexes.len()];
    for path in files {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Some(content) = read_source(&path, max_file_size) else {
            continue;
        };
        let origin = MatchOrigin::File(path);
        for (re, events) in regexes.iter().zip(per_pattern.iter_mut()) {
            if let Some(re) = re {
                events.extend(find_events(re, &content, &origin));
            }
        }
    }

    Ok(per_pattern)
}

#[async_trait]
impl SearchExecutor for EmbeddedExecutor {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn execute(
        &self,
        pattern: &PatternEntry,
        source: &SearchSource<'_>,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        self.execute_all(std::slice::from_ref(pattern), source, cancel)
            .await
            .pop()
            .map(|(_, outcome)| outcome)
            .unwrap_or(Ok(SearchOutcome::NoMatches))
    }

    async fn execute_all(
        &self,
        patterns: &[PatternEntry],
        source: &SearchSource<'_>,
        cancel: &CancellationToken,
    ) -> Vec<(PatternEntry, Result<SearchOutcome>)> {
        let compiled: Vec<Result<Regex>> = patterns.iter().map(compile).collect();

        let per_pattern = match *source {
            SearchSource::Buffer(text) => compiled
                .iter()
                .map(|re| match re {
                    Ok(re) => find_events(re, text, &MatchOrigin::Buffer),
                    Err(_) => Vec::new(),
                })
                .collect(),
            SearchSource::Directory { root, globs } => {
                let regexes: Vec<Option<Regex>> =
                    compiled.iter().map(|r| r.as_ref().ok().cloned()).collect();
                let root: PathBuf = root.to_path_buf();
                let globs = globs.to_vec();
                let max_file_size = self.max_file_size;
                // child token: expiry must not cancel the caller's request
                let walk = cancel.child_token();
                let token = walk.clone();

                let task = tokio::task::spawn_blocking(move || {
                    search_tree(&root, &globs, &regexes, max_file_size, &token)
                });

                let Ok(joined) = timeout(self.timeout, task).await else {
                    walk.cancel();
                    let seconds = self.timeout.as_secs();
                    warn!(seconds, "Workspace search timed out");
                    return fan_out(patterns, || Error::Timeout { seconds });
                };

                match joined {
                    Ok(Ok(per_pattern)) => per_pattern,
                    Ok(Err(e)) => return fan_out(patterns, || clone_error(&e)),
                    Err(e) => {
                        let message = e.to_string();
                        return fan_out(patterns, || {
                            Error::Internal(format!("search task failed: {}", message))
                        });
                    }
                }
            }
        };

        patterns
            .iter()
            .zip(compiled)
            .zip(per_pattern)
            .map(|((pattern, re), events)| {
                let outcome = re.map(|_| SearchOutcome::from_events(events));
                (pattern.clone(), outcome)
            })
            .collect()
    }
}

fn fan_out(
    patterns: &[PatternEntry],
    make: impl Fn() -> Error,
) -> Vec<(PatternEntry, Result<SearchOutcome>)> {
    patterns.iter().map(|p| (p.clone(), Err(make()))).collect()
}

fn clone_error(err: &Error) -> Error {
    match err {
        Error::Cancelled => Error::Cancelled,
        other => Error::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::patterns::build_patterns;
    use crate::types::DefinitionKind;
    use std::fs;
    use tempfile::TempDir;

    fn pattern(identifier: &str, kind: DefinitionKind) -> PatternEntry {
        build_patterns(identifier)
            .into_iter()
            .find(|p| p.kind == kind)
            .unwrap()
    }

    #[test]
    fn test_find_events_widens_to_lines() {
        let text = "module M where\n\ndata T =\n  A Int\n  | B String\n\nfoo = 1\n";
        let re = Regex::new(&pattern("B", DefinitionKind::Constructor).pattern).unwrap();
        let events = find_events(&re, text, &MatchOrigin::Buffer);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 3);
        assert_eq!(events[0].text, "data T =\n  A Int\n  | B String\n");
    }

    #[test]
    fn test_find_events_counts_lines_across_matches() {
        let text = "foo = 1\nbar = 2\nfoo = 3";
        let re = Regex::new(&pattern("foo", DefinitionKind::Assignment).pattern).unwrap();
        let events = find_events(&re, text, &MatchOrigin::Buffer);
        let lines: Vec<_> = events.iter().map(|e| (e.line_number, e.text.as_str())).collect();
        assert_eq!(lines, vec![(1, "foo = 1\n"), (3, "foo = 3")]);
    }

    #[tokio::test]
    async fn test_execute_buffer() {
        let executor = EmbeddedExecutor::default();
        let cancel = CancellationToken::new();
        let sig = pattern("foo", DefinitionKind::SignatureSameLine);

        let hit = executor
            .execute(&sig, &SearchSource::Buffer("x = 1\nfoo :: Int\n"), &cancel)
            .await
            .unwrap();
        let events = hit.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 2);

        let miss = executor
            .execute(&sig, &SearchSource::Buffer("bar :: Int\n"), &cancel)
            .await
            .unwrap();
        assert_eq!(miss, SearchOutcome::NoMatches);
    }

    #[tokio::test]
    async fn test_execute_all_reports_invalid_pattern_locally() {
        let executor = EmbeddedExecutor::default();
        let cancel = CancellationToken::new();
        let patterns = vec![
            PatternEntry {
                kind: DefinitionKind::Assignment,
                pattern: "(unclosed".to_string(),
            },
            pattern("foo", DefinitionKind::Assignment),
        ];

        let outcomes = executor
            .execute_all(&patterns, &SearchSource::Buffer("foo = 1\n"), &cancel)
            .await;
        assert!(matches!(outcomes[0].1, Err(Error::InvalidPattern(_))));
        assert!(matches!(outcomes[1].1, Ok(SearchOutcome::Matches(_))));
    }

    #[tokio::test]
    async fn test_execute_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/A.hs"), "module A where\n\nfoo :: Int\nfoo = 1\n").unwrap();
        fs::write(dir.path().join("src/B.txt"), "foo :: Int\n").unwrap();

        let executor = EmbeddedExecutor::default();
        let cancel = CancellationToken::new();
        let globs: Vec<String> = Vec::new();
        let source = SearchSource::Directory {
            root: dir.path(),
            globs: &globs,
        };

        let events = executor
            .execute(&pattern("foo", DefinitionKind::SignatureSameLine), &source, &cancel)
            .await
            .unwrap()
            .into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, MatchOrigin::File(dir.path().join("src/A.hs")));
        assert_eq!(events[0].line_number, 3);
    }

    #[tokio::test]
    async fn test_execute_directory_cancelled() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("A.hs"), "foo = 1\n").unwrap();

        let executor = EmbeddedExecutor::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let globs = vec!["*.hs".to_string()];
        let source = SearchSource::Directory {
            root: dir.path(),
            globs: &globs,
        };

        let result = executor
            .execute(&pattern("foo", DefinitionKind::Assignment), &source, &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_execute_directory_times_out() {
        let dir = TempDir::new().unwrap();
        for i in 0..500 {
            fs::write(
                dir.path().join(format!("M{:03}.hs", i)),
                "module M where\n\nfoo :: Int\nfoo = 1\n",
            )
            .unwrap();
        }

        let executor = EmbeddedExecutor::new(MAX_FILE_SIZE, Duration::from_nanos(1));
        let cancel = CancellationToken::new();
        let globs = vec!["*.hs".to_string()];
        let source = SearchSource::Directory {
            root: dir.path(),
            globs: &globs,
        };

        let outcomes = executor
            .execute_all(&build_patterns("foo"), &source, &cancel)
            .await;
        assert!(!outcomes.is_empty());
        for (_, outcome) in &outcomes {
            assert!(matches!(outcome, Err(Error::Timeout { .. })));
        }
        // expiry stays local to the walk
        assert!(!cancel.is_cancelled());
    }
}
