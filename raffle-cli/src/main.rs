mod commands;

use clap::{Parser, Subcommand};
use raffle_core::{RaffleError, RaffleStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "raffle")]
#[command(about = "Time- and entropy-gated raffle")]
#[command(version)]
struct Cli {
    /// Data directory for raffle storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new raffle in the data directory
    Init {
        /// Entry fee in satoshis
        #[arg(long, default_value_t = 10_000)]
        fee: u64,
        /// Minimum seconds between round start and the draw
        #[arg(long, default_value_t = 30)]
        interval: u64,
        /// Confirmations the oracle waits for
        #[arg(long, default_value_t = 3)]
        confirmations: u16,
        /// Gas budget for the oracle callback
        #[arg(long, default_value_t = 500_000)]
        gas_limit: u32,
    },
    /// Enter the current round
    Enter {
        /// Player name or address
        player: String,
        /// Stake in satoshis (defaults to the entry fee)
        #[arg(short, long)]
        amount: Option<u64>,
    },
    /// Show the raffle's current state
    Status,
    /// List current-round players
    Players,
    /// Automation collaborator calls
    #[command(subcommand)]
    Upkeep(commands::UpkeepCommands),
    /// Deliver the oracle callback for the pending request
    Fulfill {
        /// Request id (defaults to the pending one)
        #[arg(long)]
        request_id: Option<u64>,
        /// Random word (defaults to a locally drawn one)
        #[arg(long)]
        word: Option<u64>,
    },
    /// Show past round outcomes
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show a player's accumulated winnings
    Balance {
        /// Player name or address
        player: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "raffle={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("raffle")
    });

    let store = Arc::new(RaffleStore::open(&data_dir.join("raffle.db")).await?);

    let result = match cli.command {
        Commands::Init {
            fee,
            interval,
            confirmations,
            gas_limit,
        } => commands::handle_init(&store, fee, interval, confirmations, gas_limit).await,
        Commands::Enter { player, amount } => commands::handle_enter(&store, &player, amount).await,
        Commands::Status => commands::handle_status(&store).await,
        Commands::Players => commands::handle_players(&store).await,
        Commands::Upkeep(cmd) => commands::handle_upkeep(&store, cmd).await,
        Commands::Fulfill { request_id, word } => {
            commands::handle_fulfill(&store, request_id, word).await
        }
        Commands::History { limit } => commands::handle_history(&store, limit).await,
        Commands::Balance { player } => commands::handle_balance(&store, &player).await,
    };

    if let Err(e) = result {
        match e {
            RaffleError::InsufficientFee { required, sent } => {
                eprintln!("Error: Entry fee too low");
                eprintln!("Need: {} sats, Sent: {} sats", required, sent);
            }
            RaffleError::UpkeepNotNeeded {
                balance,
                players,
                state,
            } => {
                eprintln!("Error: Upkeep not needed yet");
                eprintln!(
                    "Pool: {} sats, Players: {}, State: {:?}",
                    balance, players, state
                );
            }
            RaffleError::RoundNotOpen { state } => {
                eprintln!("Error: Round is not open (state: {:?})", state);
                eprintln!("Wait for the pending draw to be fulfilled");
            }
            RaffleError::UnknownRequest { request_id } => {
                eprintln!("Error: No pending randomness request matches id {}", request_id);
            }
            RaffleError::Config(msg) => {
                eprintln!("Error: {}", msg);
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
