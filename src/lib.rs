//! hs-locator - Haskell definition locator
//!
//! Finds the line most likely to define a Haskell identifier, searching the
//! open buffer first and then the workspace tree.
//!
//! # Architecture
//!
//! 1. **Locator Layer** (`locator`) - Pattern catalog, search backends, match
//!    normalization and best-match resolution
//! 2. **Service Layer** (`service`) - Configured lookups and definition reports
//! 3. **MCP Layer** (`mcp`) - Protocol implementation, stdio transport
//! 4. **Tools Layer** (`tools`) - `go_to_definition` and `dump_definitions`
//!
//! # Search engines
//!
//! - **Embedded**: in-process multiline `regex` search (default)
//! - **Ripgrep**: one `rg --json --multiline` process per pattern
//!
//! When no engine can run, a literal line scan takes over with weaker
//! multi-line detection.

pub mod config;
pub mod error;
pub mod locator;
pub mod mcp;
pub mod service;
pub mod tools;
pub mod types;

pub use error::{Error, Result};

/// Crate version reported by the CLI and the MCP server
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a file read during a workspace search (1MB)
pub const MAX_FILE_SIZE: usize = 1024 * 1024;

/// Default bound on a single external search, in seconds
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 5;
