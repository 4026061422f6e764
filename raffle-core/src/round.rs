use crate::config::RaffleConfig;
use crate::error::{RaffleError, Result};
use crate::events::RaffleEvent;
use crate::ledger::EntryLedger;
use crate::oracle::{RandomnessOracle, RandomnessRequest, RequestId};
use crate::payout::PayoutExecutor;
use crate::upkeep::{self, UpkeepCheck};
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Round lifecycle. `Open` accepts entries; `Calculating` means a randomness
/// request is in flight and only its fulfillment can advance the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    Open,
    Calculating,
}

/// Result of a finalized round. The closed round's entrant list moves into
/// the outcome; the live ledger starts the next round empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u64,
    pub winner: String,
    pub prize: Amount,
    pub txid: String,
    pub players: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

/// Serializable image of a raffle's persisted fields.
///
/// `pending_request` is part of the snapshot on purpose: the request and its
/// fulfillment are separate invocations, possibly separated by a process
/// restart, and the correlation id is the only thing tying them together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleSnapshot {
    pub id: Uuid,
    pub config: RaffleConfig,
    pub state: RoundState,
    pub players: Vec<String>,
    pub pool_balance: Amount,
    pub last_timestamp: DateTime<Utc>,
    pub pending_request: Option<RequestId>,
    pub recent_winner: Option<String>,
    pub rounds_completed: u64,
}

/// One raffle instance: entry ledger, round state machine, and the two-phase
/// randomness protocol that finalizes each round.
///
/// All transitions take `&mut self`, so concurrent triggers are serialized
/// by the host (typically behind a mutex or an actor); the guard check and
/// the state mutation are never observable separately.
pub struct Raffle {
    id: Uuid,
    config: RaffleConfig,
    state: RoundState,
    ledger: EntryLedger,
    last_timestamp: DateTime<Utc>,
    pending_request: Option<RequestId>,
    recent_winner: Option<String>,
    rounds_completed: u64,
    events: Vec<RaffleEvent>,
    oracle: Arc<dyn RandomnessOracle>,
    payout: Arc<dyn PayoutExecutor>,
}

impl Raffle {
    pub fn new(
        config: RaffleConfig,
        oracle: Arc<dyn RandomnessOracle>,
        payout: Arc<dyn PayoutExecutor>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            state: RoundState::Open,
            ledger: EntryLedger::new(),
            last_timestamp: Utc::now(),
            pending_request: None,
            recent_winner: None,
            rounds_completed: 0,
            events: Vec::new(),
            oracle,
            payout,
        })
    }

    /// Rebuild a raffle from a persisted snapshot, reattaching collaborators.
    pub fn restore(
        snapshot: RaffleSnapshot,
        oracle: Arc<dyn RandomnessOracle>,
        payout: Arc<dyn PayoutExecutor>,
    ) -> Result<Self> {
        snapshot.config.validate()?;

        Ok(Self {
            id: snapshot.id,
            config: snapshot.config,
            state: snapshot.state,
            ledger: EntryLedger::from_parts(snapshot.players, snapshot.pool_balance),
            last_timestamp: snapshot.last_timestamp,
            pending_request: snapshot.pending_request,
            recent_winner: snapshot.recent_winner,
            rounds_completed: snapshot.rounds_completed,
            events: Vec::new(),
            oracle,
            payout,
        })
    }

    pub fn snapshot(&self) -> RaffleSnapshot {
        RaffleSnapshot {
            id: self.id,
            config: self.config.clone(),
            state: self.state,
            players: self.ledger.players().to_vec(),
            pool_balance: self.ledger.pool_balance(),
            last_timestamp: self.last_timestamp,
            pending_request: self.pending_request,
            recent_winner: self.recent_winner.clone(),
            rounds_completed: self.rounds_completed,
        }
    }

    /// Stake into the current round. Fails without touching the ledger if
    /// the stake is below the entry fee or the round is not open.
    pub fn enter(&mut self, player: impl Into<String>, amount: Amount) -> Result<()> {
        if amount < self.config.entry_fee {
            return Err(RaffleError::InsufficientFee {
                required: self.config.entry_fee.to_sat(),
                sent: amount.to_sat(),
            });
        }

        if self.state != RoundState::Open {
            return Err(RaffleError::RoundNotOpen { state: self.state });
        }

        let player = player.into();
        self.ledger.record_entry(player.clone(), amount);
        self.events.push(RaffleEvent::PlayerEntered {
            player: player.clone(),
            amount,
            at: Utc::now(),
        });

        tracing::info!(
            "player {} entered raffle {} with {} sats ({} players pooled)",
            player,
            self.id,
            amount.to_sat(),
            self.ledger.count()
        );

        Ok(())
    }

    /// Read-only eligibility check against the current clock.
    pub fn check_upkeep(&self) -> UpkeepCheck {
        self.check_upkeep_at(Utc::now())
    }

    /// Eligibility check at an explicit instant, for keepers that evaluate
    /// on their own clock.
    pub fn check_upkeep_at(&self, now: DateTime<Utc>) -> UpkeepCheck {
        upkeep::evaluate(
            self.state,
            self.last_timestamp,
            now,
            self.config.interval,
            self.ledger.count(),
            self.ledger.pool_balance(),
        )
    }

    /// Trigger the draw: re-validates eligibility, asks the oracle for
    /// random words, and moves the round to `Calculating` with the request
    /// id stored for later correlation. An oracle failure leaves the round
    /// open and unchanged.
    pub async fn perform_upkeep(&mut self) -> Result<RequestId> {
        self.perform_upkeep_at(Utc::now()).await
    }

    pub async fn perform_upkeep_at(&mut self, now: DateTime<Utc>) -> Result<RequestId> {
        let check = self.check_upkeep_at(now);
        if !check.needed {
            tracing::debug!(
                "upkeep rejected for raffle {}: {:?}",
                self.id,
                check.blocker
            );
            return Err(RaffleError::UpkeepNotNeeded {
                balance: check.pool_balance.to_sat(),
                players: check.players,
                state: check.state,
            });
        }

        let request = RandomnessRequest::from_config(&self.config);
        let request_id = self.oracle.request_random_words(request).await?;

        self.state = RoundState::Calculating;
        self.pending_request = Some(request_id);
        self.events.push(RaffleEvent::UpkeepPerformed {
            request_id,
            at: Utc::now(),
        });

        tracing::info!(
            "raffle {} is calculating: randomness request {} covers {} players",
            self.id,
            request_id,
            self.ledger.count()
        );

        Ok(request_id)
    }

    /// Oracle callback: pick the winner and finalize the round.
    ///
    /// The request id must match the pending one; anything else (never
    /// requested, already fulfilled, stale duplicate) fails closed with no
    /// state change. The winner slot is `words[0] % player_count`; the
    /// slight modulo bias is accepted for small pools. Payout runs before
    /// any mutation, so a failed transfer leaves the round `Calculating`
    /// with the pot and the pending request intact.
    pub async fn fulfill_random_words(
        &mut self,
        request_id: RequestId,
        words: &[u64],
    ) -> Result<RoundOutcome> {
        match self.pending_request {
            Some(pending) if pending == request_id => {}
            _ => {
                tracing::warn!(
                    "raffle {} ignoring fulfillment for unknown request {}",
                    self.id,
                    request_id
                );
                return Err(RaffleError::UnknownRequest { request_id });
            }
        }

        let word = words
            .first()
            .copied()
            .ok_or_else(|| RaffleError::oracle("fulfillment carried no random words"))?;

        let count = self.ledger.count();
        if count == 0 {
            return Err(RaffleError::internal("calculating round has no players"));
        }

        let winner_index = (word % count as u64) as usize;
        let winner = self.ledger.player_at(winner_index)?.to_string();
        let prize = self.ledger.pool_balance();

        let txid = self
            .payout
            .pay(&winner, prize)
            .await
            .map_err(|e| match e {
                RaffleError::TransferFailed { .. } => e,
                other => RaffleError::transfer_failed(winner.as_str(), other.to_string()),
            })?;

        let (players, _) = self.ledger.reset();
        self.state = RoundState::Open;
        self.pending_request = None;
        self.recent_winner = Some(winner.clone());
        self.last_timestamp = Utc::now();
        self.rounds_completed += 1;

        self.events.push(RaffleEvent::WinnerPicked {
            winner: winner.clone(),
            prize,
            at: self.last_timestamp,
        });

        tracing::info!(
            "raffle {} round {} won by {} ({} sats, {})",
            self.id,
            self.rounds_completed,
            winner,
            prize.to_sat(),
            txid
        );

        Ok(RoundOutcome {
            round: self.rounds_completed,
            winner,
            prize,
            txid,
            players,
            decided_at: self.last_timestamp,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn entrance_fee(&self) -> Amount {
        self.config.entry_fee
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn player_count(&self) -> usize {
        self.ledger.count()
    }

    pub fn player(&self, index: usize) -> Result<&str> {
        self.ledger.player_at(index)
    }

    pub fn players(&self) -> &[String] {
        self.ledger.players()
    }

    pub fn pool_balance(&self) -> Amount {
        self.ledger.pool_balance()
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.last_timestamp
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending_request
    }

    pub fn recent_winner(&self) -> Option<&str> {
        self.recent_winner.as_deref()
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    pub fn events(&self) -> &[RaffleEvent] {
        &self.events
    }

    /// Drain buffered events for forwarding to a log or bus.
    pub fn take_events(&mut self) -> Vec<RaffleEvent> {
        std::mem::take(&mut self.events)
    }
}

impl std::fmt::Debug for Raffle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raffle")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("players", &self.ledger.count())
            .field("pool_balance", &self.ledger.pool_balance())
            .field("pending_request", &self.pending_request)
            .field("rounds_completed", &self.rounds_completed)
            .finish()
    }
}
