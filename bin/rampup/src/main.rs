mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rampup")]
#[command(about = "A conversational employee onboarding assistant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize rampup configuration and data directories
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration status
    Status,

    /// Chat with the onboarding assistant
    Chat {
        /// Message to send (interactive mode if not provided)
        #[arg(short, long)]
        message: Option<String>,

        /// Session ID
        #[arg(short, long, default_value = "cli:default")]
        session: String,

        /// Treat the message as a voice transcript
        #[arg(long, requires = "message")]
        voice: bool,

        /// Transcript confidence for --voice (0.0 to 1.0)
        #[arg(long, default_value = "1.0")]
        confidence: f64,
    },

    /// Ingest a directory of onboarding documents into the index
    Ingest {
        /// Directory of .md/.txt documents
        dir: String,

        /// Category tag for the ingested documents
        #[arg(long, default_value = "general")]
        category: String,
    },

    /// Manage conversation sessions
    Sessions {
        #[command(subcommand)]
        command: SessionsCommands,
    },
}

#[derive(Subcommand)]
enum SessionsCommands {
    /// List known sessions
    List,
    /// Remove sessions idle beyond the configured timeout
    Expire,
    /// Delete a session entirely
    Reset {
        /// Session ID
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Chat {
            message,
            session,
            voice,
            confidence,
        } => {
            commands::chat::run(message, session, voice, confidence).await?;
        }
        Commands::Ingest { dir, category } => {
            commands::ingest::run(&dir, &category).await?;
        }
        Commands::Sessions { command } => match command {
            SessionsCommands::List => {
                commands::sessions::list().await?;
            }
            SessionsCommands::Expire => {
                commands::sessions::expire().await?;
            }
            SessionsCommands::Reset { session_id } => {
                commands::sessions::reset(&session_id).await?;
            }
        },
    }

    Ok(())
}
