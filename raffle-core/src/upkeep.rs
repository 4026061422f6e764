use crate::round::RoundState;
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// First condition that blocks an upkeep, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpkeepBlocker {
    RoundNotOpen,
    IntervalNotElapsed,
    NoPlayers,
    EmptyPool,
}

/// Result of an eligibility check, with enough context to see which
/// condition failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpkeepCheck {
    pub needed: bool,
    pub blocker: Option<UpkeepBlocker>,
    pub state: RoundState,
    pub players: usize,
    pub pool_balance: Amount,
}

/// Pure eligibility predicate: the draw may be triggered iff the round is
/// open, the configured interval has elapsed, and at least one player has
/// staked into the pool. Safe to call at any time; never mutates.
pub(crate) fn evaluate(
    state: RoundState,
    last_timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: Duration,
    players: usize,
    pool_balance: Amount,
) -> UpkeepCheck {
    // A clock running behind last_timestamp counts as not-elapsed.
    let interval_elapsed = now
        .signed_duration_since(last_timestamp)
        .to_std()
        .map(|elapsed| elapsed >= interval)
        .unwrap_or(false);

    let blocker = if state != RoundState::Open {
        Some(UpkeepBlocker::RoundNotOpen)
    } else if !interval_elapsed {
        Some(UpkeepBlocker::IntervalNotElapsed)
    } else if players == 0 {
        Some(UpkeepBlocker::NoPlayers)
    } else if pool_balance == Amount::ZERO {
        Some(UpkeepBlocker::EmptyPool)
    } else {
        None
    };

    UpkeepCheck {
        needed: blocker.is_none(),
        blocker,
        state,
        players,
        pool_balance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(30);

    fn check(state: RoundState, elapsed_secs: i64, players: usize, pool: Amount) -> UpkeepCheck {
        let now = Utc::now();
        let last = now - chrono::Duration::seconds(elapsed_secs);
        evaluate(state, last, now, INTERVAL, players, pool)
    }

    #[test]
    fn needed_when_all_conditions_hold() {
        let result = check(RoundState::Open, 31, 1, Amount::from_sat(10_000_000));
        assert!(result.needed);
        assert_eq!(result.blocker, None);
    }

    #[test]
    fn blocked_while_calculating() {
        let result = check(RoundState::Calculating, 31, 1, Amount::from_sat(10_000_000));
        assert!(!result.needed);
        assert_eq!(result.blocker, Some(UpkeepBlocker::RoundNotOpen));
    }

    #[test]
    fn blocked_until_interval_elapses() {
        let result = check(RoundState::Open, 29, 1, Amount::from_sat(10_000_000));
        assert!(!result.needed);
        assert_eq!(result.blocker, Some(UpkeepBlocker::IntervalNotElapsed));

        // Exactly at the boundary counts as elapsed.
        let result = check(RoundState::Open, 30, 1, Amount::from_sat(10_000_000));
        assert!(result.needed);
    }

    #[test]
    fn blocked_without_players() {
        let result = check(RoundState::Open, 31, 0, Amount::ZERO);
        assert!(!result.needed);
        assert_eq!(result.blocker, Some(UpkeepBlocker::NoPlayers));
    }

    #[test]
    fn blocked_when_clock_runs_backwards() {
        let result = check(RoundState::Open, -5, 1, Amount::from_sat(10_000_000));
        assert!(!result.needed);
        assert_eq!(result.blocker, Some(UpkeepBlocker::IntervalNotElapsed));
    }
}
