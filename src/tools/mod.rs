//! MCP tool implementations.
//!
//! - `navigation` - Definition lookup and per-file definition reports (2 tools)

pub mod navigation;

use std::sync::Arc;

use crate::mcp::handler::McpHandler;
use crate::service::DefinitionService;

/// Register all tools with the handler.
pub fn register_all_tools(handler: &mut McpHandler, definition_service: Arc<DefinitionService>) {
    handler.register(navigation::GoToDefinitionTool::new(
        definition_service.clone(),
    ));
    handler.register(navigation::DumpDefinitionsTool::new(definition_service));
}
