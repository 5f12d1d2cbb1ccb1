//! Search execution seam.
//!
//! A `SearchExecutor` runs one catalog pattern against either an in-memory
//! buffer or a directory tree and reports raw, un-normalized matches.

use async_trait::async_trait;
use futures::future::join_all;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{PatternEntry, RawMatchEvent};

/// Glob used when the caller supplies no allow-list.
pub const DEFAULT_GLOBS: &[&str] = &["*.hs"];

/// What a pattern is searched against.
#[derive(Debug, Clone, Copy)]
pub enum SearchSource<'a> {
    /// In-memory text; matches carry the `Buffer` origin.
    Buffer(&'a str),
    /// A directory tree restricted to files matching `globs`.
    Directory { root: &'a Path, globs: &'a [String] },
}

/// Result of a single successful search.
///
/// Zero matches is a legitimate outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Matches(Vec<RawMatchEvent>),
    NoMatches,
}

impl SearchOutcome {
    pub fn from_events(events: Vec<RawMatchEvent>) -> Self {
        if events.is_empty() {
            Self::NoMatches
        } else {
            Self::Matches(events)
        }
    }

    pub fn into_events(self) -> Vec<RawMatchEvent> {
        match self {
            Self::Matches(events) => events,
            Self::NoMatches => Vec::new(),
        }
    }
}

/// A regex search backend.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Whether the backend can be used at all.
    async fn is_available(&self) -> bool {
        true
    }

    /// Run one pattern against `source`.
    async fn execute(
        &self,
        pattern: &PatternEntry,
        source: &SearchSource<'_>,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome>;

    /// Run every pattern against `source`.
    ///
    /// Searches run concurrently; outcomes are returned in the order of
    /// `patterns`, independent of completion order.
    async fn execute_all(
        &self,
        patterns: &[PatternEntry],
        source: &SearchSource<'_>,
        cancel: &CancellationToken,
    ) -> Vec<(PatternEntry, Result<SearchOutcome>)> {
        let searches = patterns
            .iter()
            .map(|pattern| async move { (pattern.clone(), self.execute(pattern, source, cancel).await) });
        join_all(searches).await
    }
}

/// Resolve the effective glob allow-list.
pub fn effective_globs(globs: &[String]) -> Vec<String> {
    if globs.is_empty() {
        DEFAULT_GLOBS.iter().map(|g| g.to_string()).collect()
    } else {
        globs.to_vec()
    }
}
