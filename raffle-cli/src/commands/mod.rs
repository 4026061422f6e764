use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_core::{
    Amount, CreditPayout, LocalOracle, Raffle, RaffleConfig, RaffleError, RaffleStore, Result,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand)]
pub enum UpkeepCommands {
    /// Read-only eligibility check
    Check,
    /// Trigger the draw if eligible
    Perform,
}

/// Load the data directory's raffle and wire the local collaborators.
async fn load_raffle(store: &Arc<RaffleStore>) -> Result<Raffle> {
    let snapshot = store.load_latest().await?.ok_or_else(|| {
        RaffleError::config("no raffle in this data directory; run 'raffle init' first")
    })?;

    Raffle::restore(
        snapshot,
        Arc::new(LocalOracle::new()),
        Arc::new(CreditPayout::new(store.clone())),
    )
}

/// Write the raffle's snapshot and drained events back to the store.
async fn persist(store: &Arc<RaffleStore>, raffle: &mut Raffle) -> Result<()> {
    store.save_snapshot(&raffle.snapshot()).await?;
    store.append_events(raffle.id(), &raffle.take_events()).await?;
    Ok(())
}

pub async fn handle_init(
    store: &Arc<RaffleStore>,
    fee: u64,
    interval: u64,
    confirmations: u16,
    gas_limit: u32,
) -> Result<()> {
    if store.load_latest().await?.is_some() {
        return Err(RaffleError::config(
            "a raffle already exists in this data directory",
        ));
    }

    let config = RaffleConfig {
        entry_fee: Amount::from_sat(fee),
        interval: Duration::from_secs(interval),
        request_confirmations: confirmations,
        callback_gas_limit: gas_limit,
        num_words: 1,
    };

    let mut raffle = Raffle::new(
        config,
        Arc::new(LocalOracle::new()),
        Arc::new(CreditPayout::new(store.clone())),
    )?;
    persist(store, &mut raffle).await?;

    println!("Created raffle {}", raffle.id());
    println!(
        "  Entry fee: {} sats, interval: {}s",
        raffle.entrance_fee().to_sat(),
        raffle.interval().as_secs()
    );

    Ok(())
}

pub async fn handle_enter(
    store: &Arc<RaffleStore>,
    player: &str,
    amount: Option<u64>,
) -> Result<()> {
    let mut raffle = load_raffle(store).await?;
    let amount = amount
        .map(Amount::from_sat)
        .unwrap_or_else(|| raffle.entrance_fee());

    raffle.enter(player, amount)?;
    persist(store, &mut raffle).await?;

    println!(
        "{} entered with {} sats ({} players, {} sats pooled)",
        player,
        amount.to_sat(),
        raffle.player_count(),
        raffle.pool_balance().to_sat()
    );

    Ok(())
}

pub async fn handle_status(store: &Arc<RaffleStore>) -> Result<()> {
    let raffle = load_raffle(store).await?;

    println!("Raffle {}", raffle.id());
    println!("  State: {:?}", raffle.state());
    println!(
        "  Entry fee: {} sats ({:.8} BTC)",
        raffle.entrance_fee().to_sat(),
        raffle.entrance_fee().to_btc()
    );
    println!("  Interval: {}s", raffle.interval().as_secs());
    println!("  Players: {}", raffle.player_count());
    println!(
        "  Pool: {} sats ({:.8} BTC)",
        raffle.pool_balance().to_sat(),
        raffle.pool_balance().to_btc()
    );
    println!(
        "  Last round start: {}",
        raffle.last_timestamp().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Rounds completed: {}", raffle.rounds_completed());

    match raffle.recent_winner() {
        Some(winner) => println!("  Recent winner: {}", winner),
        None => println!("  Recent winner: none yet"),
    }

    if let Some(request_id) = raffle.pending_request() {
        println!(
            "  Pending randomness request: {} (awaiting oracle fulfillment)",
            request_id
        );
    }

    Ok(())
}

pub async fn handle_players(store: &Arc<RaffleStore>) -> Result<()> {
    let raffle = load_raffle(store).await?;

    if raffle.player_count() == 0 {
        println!("No players in the current round");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Slot", "Player"]);
    for (slot, player) in raffle.players().iter().enumerate() {
        table.add_row(vec![slot.to_string(), player.clone()]);
    }

    println!("{table}");
    println!("Pool: {} sats", raffle.pool_balance().to_sat());

    Ok(())
}

pub async fn handle_upkeep(store: &Arc<RaffleStore>, cmd: UpkeepCommands) -> Result<()> {
    match cmd {
        UpkeepCommands::Check => {
            let raffle = load_raffle(store).await?;
            let check = raffle.check_upkeep();

            if check.needed {
                println!("Upkeep needed: run 'raffle upkeep perform' to start the draw");
            } else {
                println!("Upkeep not needed (blocked by {:?})", check.blocker);
                println!(
                    "  Players: {}, Pool: {} sats, State: {:?}",
                    check.players,
                    check.pool_balance.to_sat(),
                    check.state
                );
            }
        }

        UpkeepCommands::Perform => {
            let mut raffle = load_raffle(store).await?;
            let request_id = raffle.perform_upkeep().await?;
            persist(store, &mut raffle).await?;

            println!("Draw started: randomness request {}", request_id);
            println!("Run 'raffle fulfill' to deliver the oracle callback");
        }
    }

    Ok(())
}

pub async fn handle_fulfill(
    store: &Arc<RaffleStore>,
    request_id: Option<u64>,
    word: Option<u64>,
) -> Result<()> {
    let mut raffle = load_raffle(store).await?;

    let request_id = request_id.or_else(|| raffle.pending_request()).ok_or_else(|| {
        RaffleError::oracle("no randomness request is pending")
    })?;

    let words = match word {
        Some(word) => vec![word],
        None => LocalOracle::new().draw_words(raffle.config().num_words),
    };

    let outcome = raffle.fulfill_random_words(request_id, &words).await?;
    store.record_outcome(raffle.id(), &outcome).await?;
    persist(store, &mut raffle).await?;

    println!(
        "Round {} won by {}: {} sats ({})",
        outcome.round,
        outcome.winner,
        outcome.prize.to_sat(),
        outcome.txid
    );
    println!("Next round is open");

    Ok(())
}

pub async fn handle_history(store: &Arc<RaffleStore>, limit: usize) -> Result<()> {
    let raffle = load_raffle(store).await?;
    let outcomes = store.recent_outcomes(raffle.id(), limit).await?;

    if outcomes.is_empty() {
        println!("No rounds completed yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Round", "Winner", "Prize (sats)", "Players", "Decided at"]);
    for outcome in &outcomes {
        table.add_row(vec![
            outcome.round.to_string(),
            outcome.winner.clone(),
            outcome.prize.to_sat().to_string(),
            outcome.players.len().to_string(),
            outcome.decided_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");

    Ok(())
}

pub async fn handle_balance(store: &Arc<RaffleStore>, player: &str) -> Result<()> {
    let balance = store.credit_balance(player).await?;

    println!(
        "Winnings for {}: {} sats ({:.8} BTC)",
        player,
        balance.to_sat(),
        balance.to_btc()
    );

    Ok(())
}
