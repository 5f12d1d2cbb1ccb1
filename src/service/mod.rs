//! Service layer for hs-locator.
//!
//! Wraps the locator with configuration (engine choice, language globs,
//! workspace-relative paths) and provides the higher-level operations used
//! by the CLI and the MCP tools.

pub mod definition;
pub mod report;

pub use definition::{DefinitionLookup, DefinitionQuery, DefinitionService};
pub use report::{DefinitionReport, ReportEntry};
