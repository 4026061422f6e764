//! Time- and entropy-gated raffle engine.
//!
//! Players stake a fixed entry fee into a pool; once the configured interval
//! has elapsed an automation trigger may start the draw, which asks an
//! external oracle for a random word and, on its asynchronous callback,
//! pays the whole pool to one entrant and opens the next round.

pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod payout;
pub mod round;
pub mod store;
pub mod upkeep;

pub use config::RaffleConfig;
pub use error::{RaffleError, Result};
pub use events::RaffleEvent;
pub use ledger::EntryLedger;
pub use oracle::{LocalOracle, RandomnessOracle, RandomnessRequest, RequestId};
pub use payout::{CreditPayout, InMemoryPayout, PayoutExecutor};
pub use round::{Raffle, RaffleSnapshot, RoundOutcome, RoundState};
pub use store::RaffleStore;
pub use upkeep::{UpkeepBlocker, UpkeepCheck};

pub use bitcoin::Amount;

use std::sync::Arc;

/// Create a new raffle with validated configuration and wired collaborators.
pub fn open_raffle(
    config: RaffleConfig,
    oracle: Arc<dyn RandomnessOracle>,
    payout: Arc<dyn PayoutExecutor>,
) -> Result<Raffle> {
    Raffle::new(config, oracle, payout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn full_round_lifecycle_with_local_oracle() {
        let oracle = Arc::new(LocalOracle::new());
        let payout = Arc::new(InMemoryPayout::new());
        let config = RaffleConfig::new(Amount::from_sat(10_000), Duration::from_secs(30));
        let mut raffle = open_raffle(config, oracle.clone(), payout.clone()).unwrap();

        for player in ["alice", "bob", "carol"] {
            raffle.enter(player, Amount::from_sat(10_000)).unwrap();
        }

        let due = Utc::now() + chrono::Duration::seconds(31);
        assert!(raffle.check_upkeep_at(due).needed);
        raffle.perform_upkeep_at(due).await.unwrap();

        let outcome = oracle.fulfill_next(&mut raffle).await.unwrap();
        assert!(outcome.players.contains(&outcome.winner));
        assert_eq!(outcome.prize, Amount::from_sat(30_000));
        assert_eq!(payout.balance_of(&outcome.winner), Amount::from_sat(30_000));

        assert_eq!(raffle.state(), RoundState::Open);
        assert_eq!(raffle.player_count(), 0);
        assert_eq!(raffle.recent_winner(), Some(outcome.winner.as_str()));
    }
}
