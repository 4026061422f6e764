use crate::error::{RaffleError, Result};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};

/// Current-round entrants and pooled stake.
///
/// Entrants are kept in insertion order and duplicates are allowed: a player
/// entering twice holds two slots, each with equal selection weight. The
/// mutators are crate-private so only the round state machine can append or
/// reset; everything else gets read access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryLedger {
    players: Vec<String>,
    pool: Amount,
}

impl EntryLedger {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            pool: Amount::ZERO,
        }
    }

    pub(crate) fn from_parts(players: Vec<String>, pool: Amount) -> Self {
        Self { players, pool }
    }

    pub(crate) fn record_entry(&mut self, player: String, amount: Amount) {
        self.players.push(player);
        self.pool = self.pool + amount;
    }

    /// Close out the round: returns the final entrant list and pot, leaving
    /// the ledger empty for the next round.
    pub(crate) fn reset(&mut self) -> (Vec<String>, Amount) {
        let players = std::mem::take(&mut self.players);
        let pool = std::mem::replace(&mut self.pool, Amount::ZERO);
        (players, pool)
    }

    pub fn count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn player_at(&self, index: usize) -> Result<&str> {
        self.players
            .get(index)
            .map(String::as_str)
            .ok_or(RaffleError::IndexOutOfRange {
                index,
                count: self.players.len(),
            })
    }

    pub fn pool_balance(&self) -> Amount {
        self.pool
    }
}

impl Default for EntryLedger {
    fn default() -> Self {
        Self::new()
    }
}
