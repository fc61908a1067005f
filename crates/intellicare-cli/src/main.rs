use anyhow::Result;
use clap::{Parser, Subcommand};
use intellicare::providers::ollama::{OLLAMA_CHAT_MODEL, OLLAMA_GENERATE_MODEL, OLLAMA_HOST};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;
mod session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ollama server to talk to
    #[arg(long, global = true, env = "OLLAMA_HOST", default_value = OLLAMA_HOST)]
    host: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the hospital administration assistant
    Chat {
        /// Chat model used by the assistant
        #[arg(short, long, env = "OLLAMA_MODEL", default_value = OLLAMA_CHAT_MODEL)]
        model: String,

        /// JSON file of patient records the assistant may search
        #[arg(long)]
        records: Option<PathBuf>,

        /// Time zone reported to the assistant, defaults to the local UTC offset
        #[arg(long)]
        time_zone: Option<String>,

        /// Show how each reply was reached
        #[arg(long)]
        show_thinking: bool,
    },

    /// Stream a free-form generation to stdout
    Generate {
        prompt: String,

        #[arg(short, long, default_value = OLLAMA_GENERATE_MODEL)]
        model: String,

        /// Wait for the whole completion instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log output would interleave with the interactive prompt, so only warnings by default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Chat {
            model,
            records,
            time_zone,
            show_thinking,
        } => commands::chat::run(cli.host, model, records, time_zone, show_thinking).await,
        Command::Generate {
            prompt,
            model,
            no_stream,
        } => commands::generate::run(cli.host, model, prompt, !no_stream).await,
    }
}
