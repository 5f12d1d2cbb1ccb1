//! Configuration management for hs-locator.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::locator::executor::DEFAULT_GLOBS;
use crate::locator::ripgrep::DEFAULT_RG;
use crate::{DEFAULT_SEARCH_TIMEOUT_SECS, MAX_FILE_SIZE};

/// Language assumed when none is given.
pub const DEFAULT_LANGUAGE: &str = "haskell";

/// Command-line arguments for hs-locator.
#[derive(Parser, Debug, Clone)]
#[command(name = "hs-locator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find where Haskell identifiers are defined")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Workspace root directory
    #[arg(short, long, global = true, env = "HS_LOCATOR_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Search engine: auto, embedded or ripgrep
    #[arg(short, long, global = true, env = "HS_LOCATOR_ENGINE")]
    pub engine: Option<Engine>,

    /// Path to the ripgrep binary
    #[arg(long, global = true, env = "HS_LOCATOR_RG_PATH")]
    pub rg_path: Option<PathBuf>,

    /// Timeout for a single ripgrep invocation (seconds)
    #[arg(long, global = true, env = "HS_LOCATOR_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Maximum size of a searched file (bytes)
    #[arg(long, global = true, env = "HS_LOCATOR_MAX_FILE_SIZE")]
    pub max_file_size: Option<usize>,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "HS_LOCATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, env = "HS_LOCATOR_DEBUG")]
    pub debug: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Find the definition of an identifier
    Locate(LocateArgs),
    /// Write a Markdown report of where each identifier in a file is defined
    Dump {
        /// Haskell source file to report on
        file: PathBuf,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the locator as MCP tools over stdio
    Serve,
}

/// Arguments of `locate`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LocateArgs {
    /// Identifier to look up; taken from --line/--column when omitted
    pub identifier: Option<String>,

    /// File acting as the open buffer, searched before the workspace
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// 1-based cursor line in --file
    #[arg(long, requires = "file", requires = "column")]
    pub line: Option<usize>,

    /// 1-based cursor column in --file
    #[arg(long, requires = "line")]
    pub column: Option<usize>,

    /// Language whose file globs restrict the workspace search
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// Extra file glob (repeatable); replaces the language's globs
    #[arg(short, long = "glob")]
    pub globs: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format of `locate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Search engine selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// ripgrep when it can be started, embedded otherwise
    Auto,
    #[default]
    Embedded,
    Ripgrep,
}

/// Locator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace root directory
    pub workspace: Option<PathBuf>,
    /// Search engine
    pub engine: Engine,
    /// ripgrep binary
    pub rg_path: PathBuf,
    /// Per-invocation search timeout
    pub search_timeout_secs: u64,
    /// Maximum searched file size
    pub max_file_size: usize,
    /// Language id -> file globs
    pub language_extensions: HashMap<String, Vec<String>>,
    /// Debug mode
    pub debug: bool,
}

/// Settings read from the YAML configuration file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub workspace: Option<PathBuf>,
    pub engine: Option<Engine>,
    pub rg_path: Option<PathBuf>,
    pub search_timeout_secs: Option<u64>,
    pub max_file_size: Option<usize>,
    pub language_extensions: Option<HashMap<String, Vec<String>>>,
}

impl Config {
    /// Build the configuration from the config file (if any) and `args`.
    ///
    /// An explicit `--config` must exist; the default location is optional.
    /// Command-line values win over file values.
    pub fn load(args: &Args) -> Result<Self> {
        let path = match &args.config {
            Some(path) if !path.exists() => {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut config = Self::default();
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading config file");
            config.apply_file(FileConfig::from_path(&path)?);
        }
        config.apply_args(args);
        Ok(config)
    }

    /// Overlay the values present in a config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(workspace) = file.workspace {
            self.workspace = Some(workspace);
        }
        if let Some(engine) = file.engine {
            self.engine = engine;
        }
        if let Some(rg_path) = file.rg_path {
            self.rg_path = rg_path;
        }
        if let Some(secs) = file.search_timeout_secs {
            self.search_timeout_secs = secs;
        }
        if let Some(size) = file.max_file_size {
            self.max_file_size = size;
        }
        if let Some(map) = file.language_extensions {
            self.language_extensions.extend(
                map.into_iter()
                    .map(|(language, globs)| (language.to_lowercase(), globs)),
            );
        }
    }

    /// Overlay the values given on the command line.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(workspace) = &args.workspace {
            self.workspace = Some(workspace.clone());
        }
        if let Some(engine) = args.engine {
            self.engine = engine;
        }
        if let Some(rg_path) = &args.rg_path {
            self.rg_path = rg_path.clone();
        }
        if let Some(secs) = args.timeout_secs {
            self.search_timeout_secs = secs;
        }
        if let Some(size) = args.max_file_size {
            self.max_file_size = size;
        }
        self.debug |= args.debug;
    }

    /// File globs for `language`; unknown or empty entries fall back to `*.hs`.
    pub fn extensions_for(&self, language: &str) -> Vec<String> {
        self.language_extensions
            .get(&language.to_lowercase())
            .filter(|globs| !globs.is_empty())
            .cloned()
            .unwrap_or_else(default_globs)
    }
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

fn default_globs() -> Vec<String> {
    DEFAULT_GLOBS.iter().map(|g| g.to_string()).collect()
}

/// `<config dir>/hs-locator/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hs-locator").join("config.yaml"))
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Self::default();
        config.apply_args(&args);
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().ok(),
            engine: Engine::default(),
            rg_path: PathBuf::from(DEFAULT_RG),
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
            max_file_size: MAX_FILE_SIZE,
            language_extensions: HashMap::from([(DEFAULT_LANGUAGE.to_string(), default_globs())]),
            debug: false,
        }
    }
}
