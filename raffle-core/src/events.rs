use crate::oracle::RequestId;
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable raffle events, one per externally visible transition.
///
/// The aggregate buffers these; hosts drain them after each call and forward
/// them to whatever log or bus they use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RaffleEvent {
    PlayerEntered {
        player: String,
        amount: Amount,
        at: DateTime<Utc>,
    },
    UpkeepPerformed {
        request_id: RequestId,
        at: DateTime<Utc>,
    },
    WinnerPicked {
        winner: String,
        prize: Amount,
        at: DateTime<Utc>,
    },
}

impl RaffleEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::PlayerEntered { at, .. } => *at,
            Self::UpkeepPerformed { at, .. } => *at,
            Self::WinnerPicked { at, .. } => *at,
        }
    }

    /// Short tag for log lines and the durable event table.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerEntered { .. } => "player_entered",
            Self::UpkeepPerformed { .. } => "upkeep_performed",
            Self::WinnerPicked { .. } => "winner_picked",
        }
    }
}
