use crate::error::{RaffleError, Result};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable raffle parameters, fixed when the raffle is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleConfig {
    /// Minimum stake a player must send to enter a round.
    pub entry_fee: Amount,
    /// Minimum time between a round opening and the draw being triggerable.
    pub interval: Duration,
    /// Confirmations the oracle should wait for before answering.
    pub request_confirmations: u16,
    /// Gas budget forwarded to the oracle for the fulfillment callback.
    pub callback_gas_limit: u32,
    /// Random words requested per draw. One word decides one winner.
    pub num_words: u32,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            entry_fee: Amount::from_sat(10_000),
            interval: Duration::from_secs(30),
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            num_words: 1,
        }
    }
}

impl RaffleConfig {
    pub fn new(entry_fee: Amount, interval: Duration) -> Self {
        Self {
            entry_fee,
            interval,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.entry_fee == Amount::ZERO {
            return Err(RaffleError::config("entry fee must be greater than 0"));
        }

        if self.interval.is_zero() {
            return Err(RaffleError::config("interval must be greater than 0"));
        }

        if self.num_words == 0 {
            return Err(RaffleError::config(
                "at least one random word must be requested",
            ));
        }

        Ok(())
    }
}
