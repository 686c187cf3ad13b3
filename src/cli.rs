use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::Overrides;

#[derive(Debug, Parser)]
#[command(
    name = "docask",
    version,
    about = "Ask questions about your documents using a remote LLM"
)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/docask/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the model identifier
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load documents and ask questions about them
    Ask(AskArgs),
    /// Print the text extracted from documents
    Extract(ExtractArgs),
    /// List the response-signal and vector-store vocabularies
    Vocab(VocabArgs),
    /// Show the resolved configuration
    Config(ConfigArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// Files or directories to load (.txt and .pdf)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Question to ask. Without it, questions are read from stdin.
    #[arg(short, long)]
    pub question: Option<String>,

    /// Only load files under directories whose relative path matches
    #[arg(long)]
    pub include: Option<String>,

    /// Output answers as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Extract --

#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Files or directories to load (.txt and .pdf)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only load files under directories whose relative path matches
    #[arg(long)]
    pub include: Option<String>,

    /// Print a JSON summary instead of the text
    #[arg(long)]
    pub json: bool,
}

// -- Vocab --

#[derive(Debug, Parser)]
pub struct VocabArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docask",
            &mut std::io::stdout(),
        );
    }
}
