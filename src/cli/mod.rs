use clap::{Parser, Subcommand};

pub mod reset;
pub mod status;
pub mod version;

#[derive(Parser)]
#[command(name = "wagate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the Wagate WhatsApp gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect the persisted session state
    Status {
        /// Path to the credential store database (optional, uses default if not specified)
        #[arg(long)]
        store_path: Option<String>,
    },

    /// Wipe the persisted session, forcing re-pairing on next initialization
    Reset {
        /// Path to the credential store database (optional, uses default if not specified)
        #[arg(long)]
        store_path: Option<String>,

        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Status { store_path } => status::execute(store_path).await,
        Commands::Reset { store_path, yes } => reset::execute(store_path, yes).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
