//! hs-locator - Haskell go-to-definition from the command line or over MCP.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hs_locator::config::{Args, Command, Config, LocateArgs, OutputFormat};
use hs_locator::error::{Error, Result};
use hs_locator::mcp::handler::McpHandler;
use hs_locator::mcp::server::McpServer;
use hs_locator::mcp::transport::StdioTransport;
use hs_locator::service::{DefinitionLookup, DefinitionQuery, DefinitionService};
use hs_locator::tools;
use hs_locator::VERSION;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // One-shot commands keep stderr quiet unless asked
    let log_level = match (&args.command, args.debug) {
        (_, true) => Level::DEBUG,
        (Command::Serve, false) => Level::INFO,
        _ => Level::WARN,
    };

    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if std::env::var_os("RUST_LOG").is_some() {
        tracing::subscriber::set_global_default(
            builder.with_env_filter(EnvFilter::from_default_env()).finish(),
        )
    } else {
        tracing::subscriber::set_global_default(builder.with_max_level(log_level).finish())
    };
    installed.map_err(|e| Error::Internal(format!("Failed to set tracing subscriber: {}", e)))?;

    let config = Config::load(&args)?;
    info!("hs-locator v{}", VERSION);
    info!("Workspace: {:?}", config.workspace);

    let service = Arc::new(DefinitionService::new(&config).await?);
    let cancel = CancellationToken::new();

    match args.command {
        Command::Locate(locate) => run_locate(&service, locate, &cancel).await,
        Command::Dump { file, output } => {
            let report = service.dump_definitions(&file, &cancel).await?;
            let markdown = report.to_markdown();
            match output {
                Some(path) => {
                    fs::write(&path, markdown).await?;
                    info!("Report written to {:?}", path);
                }
                None => print!("{}", markdown),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve => {
            let mut handler = McpHandler::new();
            tools::register_all_tools(&mut handler, service.clone());
            info!("Registered {} MCP tools", handler.tool_count());

            info!("Starting stdio transport...");
            let server = McpServer::new(handler, "hs-locator");
            server.run(StdioTransport::new()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exits with 1 when nothing is found, like grep.
async fn run_locate(
    service: &DefinitionService,
    args: LocateArgs,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let position = match (args.line, args.column) {
        (Some(0), _) | (_, Some(0)) => {
            return Err(Error::InvalidIdentifier(
                "--line and --column are 1-based".to_string(),
            ))
        }
        (Some(line), Some(column)) => Some((line - 1, column - 1)),
        (None, None) => None,
        _ => {
            return Err(Error::InvalidIdentifier(
                "--line and --column must be given together".to_string(),
            ))
        }
    };

    let query = DefinitionQuery {
        identifier: args.identifier,
        file: args.file,
        position,
        language: Some(args.language),
        globs: args.globs,
    };

    let lookup = service.locate(&query, cancel).await?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&lookup)?),
        OutputFormat::Text => print_text(&lookup),
    }

    Ok(if lookup.locations.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_text(lookup: &DefinitionLookup) {
    if lookup.locations.is_empty() {
        eprintln!("No definition found for `{}`", lookup.identifier);
        return;
    }
    for location in &lookup.locations {
        println!(
            "{}:{}: {}",
            location.origin,
            location.line_index + 1,
            location.line_text
        );
    }
}
