//! Code navigation tools for jumping to Haskell definitions.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::mcp::handler::{
    error_result, get_optional_string_arg, get_optional_usize_arg, get_string_arg,
    get_string_array_arg, success_result, ToolHandler,
};
use crate::mcp::protocol::{Tool, ToolResult};
use crate::service::{DefinitionLookup, DefinitionQuery, DefinitionService};

/// Cancellation propagates; every other failure is reported to the client.
fn failure(context: &str, e: Error) -> Result<ToolResult> {
    match e {
        Error::Cancelled => Err(Error::Cancelled),
        e => Ok(error_result(format!("{}: {}", context, e))),
    }
}

/// Convert a 1-based argument to a 0-based index.
fn zero_based(args: &HashMap<String, Value>, name: &str) -> Result<Option<usize>> {
    match get_optional_usize_arg(args, name)? {
        Some(0) => Err(Error::InvalidToolArguments(format!(
            "{} is 1-based and must be at least 1",
            name
        ))),
        n => Ok(n.map(|n| n - 1)),
    }
}

fn render_lookup(lookup: &DefinitionLookup) -> String {
    if lookup.locations.is_empty() {
        return format!("No definition found for `{}`", lookup.identifier);
    }

    let mut out = format!("# Definition of `{}`\n\n", lookup.identifier);
    for location in &lookup.locations {
        out.push_str(&format!(
            "- `{}:{}` ({})\n  ```haskell\n  {}\n  ```\n",
            location.origin,
            location.line_index + 1,
            location.kind,
            location.line_text
        ));
    }
    out
}

/// Go to definition tool.
pub struct GoToDefinitionTool {
    service: Arc<DefinitionService>,
}

impl GoToDefinitionTool {
    pub fn new(service: Arc<DefinitionService>) -> Self {
        Self { service }
    }

    fn query(args: &HashMap<String, Value>) -> Result<DefinitionQuery> {
        let line = zero_based(args, "line")?;
        let column = zero_based(args, "column")?;
        let position = match (line, column) {
            (Some(line), Some(column)) => Some((line, column)),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidToolArguments(
                    "line and column must be given together".to_string(),
                ))
            }
        };

        let query = DefinitionQuery {
            identifier: get_optional_string_arg(args, "symbol"),
            file: get_optional_string_arg(args, "file").map(PathBuf::from),
            position,
            language: get_optional_string_arg(args, "language"),
            globs: get_string_array_arg(args, "globs"),
        };

        if query.identifier.is_none() && (query.file.is_none() || query.position.is_none()) {
            return Err(Error::InvalidToolArguments(
                "either symbol, or file with line and column, is required".to_string(),
            ));
        }
        Ok(query)
    }
}

#[async_trait]
impl ToolHandler for GoToDefinitionTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "go_to_definition".to_string(),
            description: "Find where a Haskell identifier is defined. Give the symbol directly, or the file and the 1-based line and column of a use site. Definitions in the file itself win over the rest of the workspace.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "The identifier to look up"
                    },
                    "file": {
                        "type": "string",
                        "description": "File being edited, relative to the workspace or absolute"
                    },
                    "line": {
                        "type": "integer",
                        "description": "1-based line of the identifier in file"
                    },
                    "column": {
                        "type": "integer",
                        "description": "1-based column of the identifier in file"
                    },
                    "language": {
                        "type": "string",
                        "description": "Language whose file extensions are searched (default: haskell)"
                    },
                    "globs": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Glob patterns overriding the language's extensions (e.g., '*.hs')"
                    }
                }
            }),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<ToolResult> {
        let query = Self::query(&args)?;

        match self.service.locate(&query, &cancel).await {
            Ok(lookup) => Ok(success_result(render_lookup(&lookup))),
            Err(e) => failure("Failed to locate definition", e),
        }
    }
}

/// Dump definitions tool.
pub struct DumpDefinitionsTool {
    service: Arc<DefinitionService>,
}

impl DumpDefinitionsTool {
    pub fn new(service: Arc<DefinitionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for DumpDefinitionsTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "dump_definitions".to_string(),
            description: "Report where every value identifier used in a Haskell file is defined, as Markdown. Identifiers without a definition are listed separately.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "file": {
                        "type": "string",
                        "description": "File to report on, relative to the workspace or absolute"
                    }
                },
                "required": ["file"]
            }),
        }
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<ToolResult> {
        let file = get_string_arg(&args, "file")?;

        match self
            .service
            .dump_definitions(&PathBuf::from(file), &cancel)
            .await
        {
            Ok(report) => Ok(success_result(report.to_markdown())),
            Err(e) => failure("Failed to dump definitions", e),
        }
    }
}
