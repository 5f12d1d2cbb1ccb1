//! Buffer-then-workspace definition lookup.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument, Span};

use crate::error::{Error, Result};
use crate::locator::executor::{SearchExecutor, SearchSource};
use crate::locator::fallback;
use crate::locator::files::canonical;
use crate::locator::normalizer::normalize;
use crate::locator::patterns::build_patterns;
use crate::locator::resolver::{resolve, resolve_per_file};
use crate::types::{Buffer, LocateRequest, Location, Match, MatchOrigin, PatternEntry};
use crate::MAX_FILE_SIZE;

/// Candidates gathered by one pass of the catalog over a source.
enum Pass {
    Found(Vec<Match>),
    Unavailable,
    Cancelled,
}

/// Locates definition sites with a pluggable search backend.
///
/// Holds no per-request state; one `Locator` can serve concurrent requests.
#[derive(Clone)]
pub struct Locator {
    executor: Arc<dyn SearchExecutor>,
    max_file_size: usize,
    span: Span,
}

impl Locator {
    /// Create a locator logging under the caller's current span.
    pub fn new(executor: Arc<dyn SearchExecutor>) -> Self {
        Self {
            executor,
            max_file_size: MAX_FILE_SIZE,
            span: Span::current(),
        }
    }

    /// Size cap for files read by the fallback scan.
    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Parent span for every request's log records.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn engine_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Find the definition sites of `request.identifier`.
    ///
    /// A hit in the buffer is returned alone. Otherwise the workspace yields
    /// at most one location per file, in path order. Nothing found and a
    /// cancelled request both give an empty list.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use hs_locator::locator::{EmbeddedExecutor, Locator};
    /// use hs_locator::types::{Buffer, LocateRequest};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # tokio_test::block_on(async {
    /// let locator = Locator::new(Arc::new(EmbeddedExecutor::default()));
    /// let request = LocateRequest::new("answer")
    ///     .with_buffer(Buffer::new("answer :: Int\nanswer = 42\n"));
    ///
    /// let locations = locator.locate(&request, &CancellationToken::new()).await.unwrap();
    /// assert_eq!(locations[0].line_text, "answer :: Int");
    /// # });
    /// ```
    pub async fn locate(
        &self,
        request: &LocateRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>> {
        let span = info_span!(
            parent: &self.span,
            "locate",
            identifier = %request.identifier,
            engine = self.executor.name()
        );
        self.locate_inner(request, cancel).instrument(span).await
    }

    async fn locate_inner(
        &self,
        request: &LocateRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>> {
        let identifier = request.identifier.trim();
        if identifier.is_empty() {
            return Err(Error::InvalidIdentifier(request.identifier.clone()));
        }
        let patterns = build_patterns(identifier);

        if !self.executor.is_available().await {
            warn!("Search engine unavailable, using literal scan");
            return self.fallback(identifier, request, cancel).await;
        }

        if let Some(buffer) = &request.buffer {
            match self
                .collect(&patterns, &SearchSource::Buffer(&buffer.text), cancel)
                .await
            {
                Pass::Cancelled => return Ok(Vec::new()),
                Pass::Unavailable => return self.fallback(identifier, request, cancel).await,
                Pass::Found(matches) => {
                    if let Some(best) = resolve(&matches) {
                        debug!(line = best.line_index, kind = %best.kind, "Resolved in buffer");
                        return Ok(vec![buffer_location(best, buffer)]);
                    }
                }
            }
        }

        let Some(root) = &request.workspace_root else {
            return Err(Error::NoWorkspaceRoot);
        };
        let source = SearchSource::Directory {
            root,
            globs: &request.file_globs,
        };

        match self.collect(&patterns, &source, cancel).await {
            Pass::Cancelled => Ok(Vec::new()),
            Pass::Unavailable => self.fallback(identifier, request, cancel).await,
            Pass::Found(matches) => {
                let own = own_file(request);
                let resolved = resolve_per_file(&matches)
                    .into_iter()
                    .filter(|m| match (&own, m.origin.path()) {
                        (Some(own), Some(path)) => canonical(path) != *own,
                        _ => true,
                    })
                    .collect();
                let locations = dedup(resolved);
                debug!(results = locations.len(), "Resolved in workspace");
                Ok(locations)
            }
        }
    }

    /// Run the whole catalog against `source` and normalize every event.
    ///
    /// Failures confined to one pattern are logged and contribute nothing.
    async fn collect(
        &self,
        patterns: &[PatternEntry],
        source: &SearchSource<'_>,
        cancel: &CancellationToken,
    ) -> Pass {
        let outcomes = self.executor.execute_all(patterns, source, cancel).await;
        let mut matches = Vec::new();
        let mut unavailable = false;

        for (pattern, outcome) in outcomes {
            match outcome {
                Ok(outcome) => matches.extend(
                    outcome
                        .into_events()
                        .iter()
                        .map(|event| normalize(event, pattern.kind)),
                ),
                Err(Error::Cancelled) => return Pass::Cancelled,
                Err(e) if e.is_tool_unavailable() => {
                    warn!(kind = %pattern.kind, error = %e, "Search engine could not be started");
                    unavailable = true;
                }
                Err(e) => {
                    warn!(kind = %pattern.kind, error = %e, "Pattern search failed");
                }
            }
        }

        if cancel.is_cancelled() {
            Pass::Cancelled
        } else if unavailable {
            Pass::Unavailable
        } else {
            Pass::Found(matches)
        }
    }

    async fn fallback(
        &self,
        identifier: &str,
        request: &LocateRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>> {
        if let Some(buffer) = &request.buffer {
            let matches = fallback::scan_text(identifier, &buffer.text, &MatchOrigin::Buffer);
            if let Some(best) = resolve(&matches) {
                return Ok(vec![buffer_location(best, buffer)]);
            }
        }

        let Some(root) = request.workspace_root.clone() else {
            warn!("No workspace root for literal scan");
            return Ok(Vec::new());
        };

        let identifier = identifier.to_string();
        let globs = request.file_globs.clone();
        let own = own_file(request);
        let max_file_size = self.max_file_size;
        let token = cancel.clone();

        let scanned = tokio::task::spawn_blocking(move || {
            fallback::scan_workspace(
                &identifier,
                &root,
                &globs,
                own.as_deref(),
                max_file_size,
                &token,
            )
        })
        .await?;

        match scanned {
            Ok(matches) => Ok(dedup(resolve_per_file(&matches))),
            Err(Error::Cancelled) => Ok(Vec::new()),
            Err(e) => {
                warn!(error = %e, "Literal scan failed");
                Ok(Vec::new())
            }
        }
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("engine", &self.executor.name())
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

fn own_file(request: &LocateRequest) -> Option<PathBuf> {
    request
        .buffer
        .as_ref()
        .and_then(|b| b.path.as_deref())
        .map(canonical)
}

/// A buffer hit points at the buffer's file when it has one.
fn buffer_location(best: Match, buffer: &Buffer) -> Location {
    let origin = match &buffer.path {
        Some(path) => MatchOrigin::File(path.clone()),
        None => MatchOrigin::Buffer,
    };
    Location::from(Match { origin, ..best })
}

fn dedup(matches: Vec<Match>) -> Vec<Location> {
    let mut seen: HashSet<(MatchOrigin, usize)> = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert((m.origin.clone(), m.line_index)))
        .map(Location::from)
        .collect()
}
