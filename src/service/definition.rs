//! Definition service - configured lookups on top of the locator.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, Engine, DEFAULT_LANGUAGE};
use crate::error::{Error, Result};
use crate::locator::{identifier_at, EmbeddedExecutor, Locator, RipgrepExecutor, SearchExecutor};
use crate::service::report::{collect_identifiers, DefinitionReport, ReportEntry};
use crate::types::{Buffer, LocateRequest, Location};

/// Lookups in flight at once while building a report.
const DUMP_CONCURRENCY: usize = 8;

/// What to look up.
///
/// The identifier is either given or taken from `position` (0-based line and
/// column) in `file`.
#[derive(Debug, Clone, Default)]
pub struct DefinitionQuery {
    pub identifier: Option<String>,
    /// Open buffer, resolved against the workspace when relative
    pub file: Option<PathBuf>,
    pub position: Option<(usize, usize)>,
    pub language: Option<String>,
    /// Overrides the language's globs when non-empty
    pub globs: Vec<String>,
}

impl DefinitionQuery {
    pub fn identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Self::default()
        }
    }

    pub fn at(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: Some(file.into()),
            position: Some((line, column)),
            ..Self::default()
        }
    }

    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Result of a lookup.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionLookup {
    pub identifier: String,
    pub locations: Vec<Location>,
}

/// Definition service for locating Haskell definitions.
pub struct DefinitionService {
    config: Config,
    locator: Locator,
}

impl DefinitionService {
    /// Create the service, choosing the search engine from the configuration.
    pub async fn new(config: &Config) -> Result<Self> {
        let search_timeout = Duration::from_secs(config.search_timeout_secs);
        let ripgrep = RipgrepExecutor::new(config.rg_path.clone(), search_timeout);
        let embedded = EmbeddedExecutor::new(config.max_file_size, search_timeout);

        let executor: Arc<dyn SearchExecutor> = match config.engine {
            Engine::Embedded => Arc::new(embedded),
            Engine::Ripgrep => Arc::new(ripgrep),
            Engine::Auto => {
                if ripgrep.is_available().await {
                    Arc::new(ripgrep)
                } else {
                    info!(
                        "ripgrep not found at {:?}, using embedded engine",
                        config.rg_path
                    );
                    Arc::new(embedded)
                }
            }
        };

        let locator = Locator::new(executor).with_max_file_size(config.max_file_size);
        info!("Definition service ready (engine: {})", locator.engine_name());

        Ok(Self::with_locator(config, locator))
    }

    pub fn with_locator(config: &Config, locator: Locator) -> Self {
        Self {
            config: config.clone(),
            locator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.config.workspace.as_deref()
    }

    pub fn engine_name(&self) -> &'static str {
        self.locator.engine_name()
    }

    /// Resolve a path argument against the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match self.workspace() {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Look up one identifier.
    pub async fn locate(
        &self,
        query: &DefinitionQuery,
        cancel: &CancellationToken,
    ) -> Result<DefinitionLookup> {
        let file = query.file.as_deref().map(|f| self.resolve_path(f));
        let text = match &file {
            Some(path) => Some(read_source_file(path).await?),
            None => None,
        };

        let identifier = match (&query.identifier, query.position, &text) {
            (Some(identifier), _, _) => identifier.clone(),
            (None, Some((line, column)), Some(text)) => identifier_at(text, line, column)
                .ok_or_else(|| {
                    Error::InvalidIdentifier(format!(
                        "no identifier at line {}, column {}",
                        line + 1,
                        column + 1
                    ))
                })?,
            _ => {
                return Err(Error::InvalidIdentifier(
                    "an identifier or a file position is required".to_string(),
                ))
            }
        };

        let globs = if query.globs.is_empty() {
            self.config
                .extensions_for(query.language.as_deref().unwrap_or(DEFAULT_LANGUAGE))
        } else {
            query.globs.clone()
        };

        let mut request = LocateRequest::new(identifier.clone()).with_globs(globs);
        if let (Some(path), Some(text)) = (file, text) {
            request = request.with_buffer(Buffer::new(text).with_path(path));
        }
        if let Some(root) = self.workspace() {
            request = request.with_workspace(root);
        }

        let locations = self.locator.locate(&request, cancel).await?;
        Ok(DefinitionLookup {
            identifier,
            locations,
        })
    }

    /// Locate every value identifier used in `file`.
    ///
    /// Identifiers whose lookup fails are reported as having no definition.
    pub async fn dump_definitions(
        &self,
        file: &Path,
        cancel: &CancellationToken,
    ) -> Result<DefinitionReport> {
        let path = self.resolve_path(file);
        let text = read_source_file(&path).await?;
        let identifiers = collect_identifiers(&text)?;
        info!(
            "Dumping definitions for {} identifiers in {:?}",
            identifiers.len(),
            path
        );

        let globs = self.config.extensions_for(DEFAULT_LANGUAGE);
        let entries: Vec<ReportEntry> = stream::iter(identifiers)
            .map(|identifier| {
                let mut request = LocateRequest::new(identifier.clone())
                    .with_buffer(Buffer::new(text.clone()).with_path(path.clone()))
                    .with_globs(globs.clone());
                if let Some(root) = self.workspace() {
                    request = request.with_workspace(root);
                }

                async move {
                    let locations = match self.locator.locate(&request, cancel).await {
                        Ok(locations) => locations,
                        Err(e) => {
                            debug!(identifier = %identifier, error = %e, "No definition");
                            Vec::new()
                        }
                    };
                    ReportEntry {
                        identifier,
                        locations,
                    }
                }
            })
            .buffered(DUMP_CONCURRENCY)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(DefinitionReport::new(path, entries))
    }
}

async fn read_source_file(path: &Path) -> Result<String> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(Error::FileNotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
