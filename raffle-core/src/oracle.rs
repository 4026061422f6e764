use crate::config::RaffleConfig;
use crate::error::{RaffleError, Result};
use crate::round::{Raffle, RoundOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identifier the oracle hands out at request time. Always non-zero.
pub type RequestId = u64;

/// Parameters sent with a randomness request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

impl RandomnessRequest {
    pub fn from_config(config: &RaffleConfig) -> Self {
        Self {
            request_confirmations: config.request_confirmations,
            callback_gas_limit: config.callback_gas_limit,
            num_words: config.num_words,
        }
    }
}

/// Verifiable-randomness provider.
///
/// The request phase is synchronous from the raffle's point of view: the
/// oracle acknowledges with a request id and delivers the random words later
/// through a separate invocation of `Raffle::fulfill_random_words`.
#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    async fn request_random_words(&self, request: RandomnessRequest) -> Result<RequestId>;
}

/// In-process oracle simulation.
///
/// Plays the coordinator's role for tests and the CLI: records pending
/// requests, draws words from the thread RNG, and can drive a raffle's
/// fulfillment directly.
pub struct LocalOracle {
    pending: Mutex<HashMap<RequestId, RandomnessRequest>>,
}

impl LocalOracle {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.pending.lock().keys().copied().collect()
    }

    pub fn take_request(&self, request_id: RequestId) -> Option<RandomnessRequest> {
        self.pending.lock().remove(&request_id)
    }

    pub fn draw_words(&self, num_words: u32) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        (0..num_words).map(|_| rng.gen::<u64>()).collect()
    }

    /// Deliver randomness for the raffle's pending request, as the real
    /// oracle would after enough confirmations.
    pub async fn fulfill_next(&self, raffle: &mut Raffle) -> Result<RoundOutcome> {
        let request_id = raffle
            .pending_request()
            .ok_or_else(|| RaffleError::oracle("no randomness request is pending"))?;

        let request = self
            .take_request(request_id)
            .ok_or_else(|| RaffleError::oracle(format!("request {request_id} was never issued")))?;

        let words = self.draw_words(request.num_words);
        raffle.fulfill_random_words(request_id, &words).await
    }
}

impl Default for LocalOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RandomnessOracle for LocalOracle {
    async fn request_random_words(&self, request: RandomnessRequest) -> Result<RequestId> {
        let request_id = rand::thread_rng().gen_range(1..u64::MAX);
        self.pending.lock().insert(request_id, request);

        tracing::debug!(
            "oracle accepted request {} ({} words, {} confirmations)",
            request_id,
            request.num_words,
            request.request_confirmations
        );

        Ok(request_id)
    }
}
