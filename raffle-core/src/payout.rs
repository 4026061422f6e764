use crate::error::Result;
use crate::store::RaffleStore;
use async_trait::async_trait;
use bitcoin::Amount;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Moves the pooled prize to the winner.
///
/// Implementations must either complete the transfer and return a transfer
/// id, or fail without side effects; the finalize transition aborts on any
/// error and leaves the round untouched.
#[async_trait]
pub trait PayoutExecutor: Send + Sync {
    async fn pay(&self, winner: &str, amount: Amount) -> Result<String>;
}

/// Payout executor backed by an in-memory balance map. Suited to unit tests
/// and single-process demos.
pub struct InMemoryPayout {
    balances: Mutex<HashMap<String, Amount>>,
}

impl InMemoryPayout {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub fn balance_of(&self, player: &str) -> Amount {
        self.balances
            .lock()
            .get(player)
            .copied()
            .unwrap_or(Amount::ZERO)
    }
}

impl Default for InMemoryPayout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutExecutor for InMemoryPayout {
    async fn pay(&self, winner: &str, amount: Amount) -> Result<String> {
        let mut balances = self.balances.lock();
        let balance = balances.entry(winner.to_string()).or_insert(Amount::ZERO);
        *balance = *balance + amount;

        let txid = format!("mem-{}", Uuid::new_v4());
        tracing::info!("paid {} sats to {} ({})", amount.to_sat(), winner, txid);
        Ok(txid)
    }
}

/// Payout executor that writes winnings into the durable credit table, so
/// balances survive process restarts. Used by the CLI.
pub struct CreditPayout {
    store: Arc<RaffleStore>,
}

impl CreditPayout {
    pub fn new(store: Arc<RaffleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PayoutExecutor for CreditPayout {
    async fn pay(&self, winner: &str, amount: Amount) -> Result<String> {
        self.store.credit(winner, amount).await?;

        let txid = format!("credit-{}", Uuid::new_v4());
        tracing::info!("credited {} sats to {} ({})", amount.to_sat(), winner, txid);
        Ok(txid)
    }
}
