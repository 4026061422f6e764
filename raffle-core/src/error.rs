use crate::oracle::RequestId;
use crate::round::RoundState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaffleError>;

#[derive(Error, Debug)]
pub enum RaffleError {
    #[error("entry fee too low: sent {sent} sats, need {required} sats")]
    InsufficientFee { required: u64, sent: u64 },

    #[error("round is not open (state: {state:?})")]
    RoundNotOpen { state: RoundState },

    #[error("player index {index} out of range ({count} players)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("upkeep not needed: {balance} sats pooled, {players} players, state {state:?}")]
    UpkeepNotNeeded {
        balance: u64,
        players: usize,
        state: RoundState,
    },

    #[error("unknown randomness request: {request_id}")]
    UnknownRequest { request_id: RequestId },

    #[error("prize transfer to {winner} failed: {reason}")]
    TransferFailed { winner: String, reason: String },

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RaffleError {
    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn transfer_failed(winner: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            winner: winner.into(),
            reason: reason.into(),
        }
    }
}
