//! CLI parser and command dispatch.

mod config_cmd;
mod extract_cmd;
mod keys;
mod ocr;
mod translate;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::batch::BatchConfig;
use crate::config::Config;
use crate::credentials::{ConfigFileCredentialSource, CredentialPoolManager};

#[derive(Parser)]
#[command(name = "toonlate")]
#[command(about = "Webtoon OCR and translation with pooled API keys")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "TOONLATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Batch overrides shared by the batch commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Maximum concurrent provider calls
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,
    /// Per-attempt timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Retries after the first attempt
    #[arg(long)]
    retries: Option<u32>,
}

impl BatchArgs {
    fn apply(&self, mut config: BatchConfig) -> BatchConfig {
        if let Some(c) = self.concurrency {
            config.concurrency = c;
        }
        if let Some(secs) = self.timeout {
            config.timeout_ms = secs * 1000;
        }
        if let Some(r) = self.retries {
            config.max_retries = r;
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from page images (a directory or a list of files)
    Ocr {
        /// Page images, or a single directory of page images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Write combined text to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Prompt file or inline prompt (overrides config)
        #[arg(long)]
        prompt: Option<String>,
        /// Print the batch result as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Translate one or more scripts
    Translate {
        /// Script files (one chapter each)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Glossary file included in the prompt
        #[arg(short, long)]
        glossary: Option<PathBuf>,
        /// Chapter memory file included in the prompt
        #[arg(short, long)]
        memory: Option<PathBuf>,
        /// Source language
        #[arg(long, default_value = "Korean")]
        from: String,
        /// Target language
        #[arg(long, default_value = "English")]
        to: String,
        /// Write translations next to the inputs with this suffix (e.g. ".en.txt")
        #[arg(long)]
        suffix: Option<String>,
        /// Prompt file or inline prompt (overrides config)
        #[arg(long)]
        prompt: Option<String>,
        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Parse a saved model response into a structured report
    Extract {
        /// Response file (reads stdin when omitted or "-")
        file: Option<PathBuf>,
        /// Compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
        /// Also print the fallbacks taken
        #[arg(long)]
        diagnostics: bool,
    },

    /// Inspect credential pools
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum KeysCommands {
    /// Show masked keys and pool size for each scope
    List {
        /// Scopes to show (default: vision and drive-access)
        scopes: Vec<String>,
    },
    /// Draw keys round-robin and print usage statistics
    Stats {
        /// Scope to inspect
        #[arg(default_value = crate::credentials::VISION_SCOPE)]
        scope: String,
        /// Number of selections to simulate
        #[arg(short, long, default_value = "0")]
        draws: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (keys masked)
    Show {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Print the config file path in use
    Path,
}

/// Shared state built once per invocation.
pub(crate) struct AppContext {
    pub config: Config,
    pub credentials: Arc<CredentialPoolManager>,
}

impl AppContext {
    async fn load(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = match &config_path {
            Some(path) => Config::load_from_path(path).await?,
            None => Config::load().await,
        };
        let source = ConfigFileCredentialSource::new(config.source_path.clone());
        Ok(Self {
            config,
            credentials: Arc::new(CredentialPoolManager::new(Arc::new(source))),
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::load(cli.config).await?;

    match cli.command {
        Commands::Ocr {
            inputs,
            output,
            prompt,
            json,
            batch,
        } => ocr::cmd_ocr(&ctx, inputs, output, prompt, json, &batch).await,
        Commands::Translate {
            files,
            glossary,
            memory,
            from,
            to,
            suffix,
            prompt,
            json,
            batch,
        } => {
            translate::cmd_translate(
                &ctx,
                translate::TranslateArgs {
                    files,
                    glossary,
                    memory,
                    from,
                    to,
                    suffix,
                    prompt,
                    json,
                },
                &batch,
            )
            .await
        }
        Commands::Extract {
            file,
            compact,
            diagnostics,
        } => extract_cmd::cmd_extract(file, compact, diagnostics).await,
        Commands::Keys { command } => match command {
            KeysCommands::List { scopes } => keys::cmd_keys_list(&ctx, scopes).await,
            KeysCommands::Stats { scope, draws, json } => {
                keys::cmd_keys_stats(&ctx, &scope, draws, json).await
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { json } => config_cmd::cmd_config_show(&ctx, json),
            ConfigCommands::Path => config_cmd::cmd_config_path(&ctx),
        },
    }
}
