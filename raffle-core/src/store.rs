use crate::error::{RaffleError, Result};
use crate::events::RaffleEvent;
use crate::round::{RaffleSnapshot, RoundOutcome};
use bitcoin::Amount;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Durable raffle storage: snapshots, round history, an append-only event
/// log, and winner credits.
///
/// The snapshot table is what makes the randomness protocol restart-safe:
/// the pending request id written at trigger time is read back at
/// fulfillment time, however many process lifetimes later.
pub struct RaffleStore {
    conn: Mutex<Connection>,
}

impl RaffleStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RaffleError::internal(format!("failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS raffles (
                id TEXT PRIMARY KEY,
                snapshot TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS round_history (
                raffle_id TEXT NOT NULL,
                round INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                decided_at INTEGER NOT NULL,
                PRIMARY KEY (raffle_id, round)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                raffle_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                event TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS credits (
                player TEXT PRIMARY KEY,
                balance INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn save_snapshot(&self, snapshot: &RaffleSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT OR REPLACE INTO raffles (id, snapshot, updated_at) VALUES (?1, ?2, ?3)",
            params![snapshot.id.to_string(), json, Utc::now().timestamp()],
        )?;

        Ok(())
    }

    pub async fn load_snapshot(&self, id: Uuid) -> Result<Option<RaffleSnapshot>> {
        let conn = self.conn.lock().await;

        let json: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM raffles WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Most recently saved raffle, for hosts that run a single raffle per
    /// data directory.
    pub async fn load_latest(&self) -> Result<Option<RaffleSnapshot>> {
        let conn = self.conn.lock().await;

        let json: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM raffles ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn record_outcome(&self, raffle_id: Uuid, outcome: &RoundOutcome) -> Result<()> {
        let json = serde_json::to_string(outcome)?;
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT OR REPLACE INTO round_history (raffle_id, round, outcome, decided_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                raffle_id.to_string(),
                outcome.round,
                json,
                outcome.decided_at.timestamp()
            ],
        )?;

        Ok(())
    }

    /// Past round outcomes, newest first.
    pub async fn recent_outcomes(&self, raffle_id: Uuid, limit: usize) -> Result<Vec<RoundOutcome>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(
            "SELECT outcome FROM round_history
             WHERE raffle_id = ?1 ORDER BY round DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![raffle_id.to_string(), limit as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut outcomes = Vec::new();
        for json in rows {
            outcomes.push(serde_json::from_str(&json?)?);
        }

        Ok(outcomes)
    }

    pub async fn append_events(&self, raffle_id: Uuid, events: &[RaffleEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().await;
        for event in events {
            let json = serde_json::to_string(event)?;
            conn.execute(
                "INSERT INTO events (raffle_id, kind, event, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    raffle_id.to_string(),
                    event.kind(),
                    json,
                    event.at().timestamp()
                ],
            )?;
        }

        Ok(())
    }

    /// Events after the given sequence number, oldest first. Observers poll
    /// with their last seen cursor instead of holding open listeners.
    pub async fn events_since(
        &self,
        raffle_id: Uuid,
        after_seq: i64,
    ) -> Result<Vec<(i64, RaffleEvent)>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(
            "SELECT seq, event FROM events
             WHERE raffle_id = ?1 AND seq > ?2 ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![raffle_id.to_string(), after_seq], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (seq, json) = row?;
            events.push((seq, serde_json::from_str(&json)?));
        }

        Ok(events)
    }

    pub async fn credit(&self, player: &str, amount: Amount) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT INTO credits (player, balance) VALUES (?1, ?2)
             ON CONFLICT(player) DO UPDATE SET balance = balance + ?2",
            params![player, amount.to_sat() as i64],
        )?;

        Ok(())
    }

    pub async fn credit_balance(&self, player: &str) -> Result<Amount> {
        let conn = self.conn.lock().await;

        let sats: Option<i64> = conn
            .query_row(
                "SELECT balance FROM credits WHERE player = ?1",
                params![player],
                |row| row.get(0),
            )
            .optional()?;

        Ok(Amount::from_sat(sats.unwrap_or(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaffleConfig;
    use crate::round::RoundState;
    use tempfile::tempdir;

    fn snapshot(id: Uuid) -> RaffleSnapshot {
        RaffleSnapshot {
            id,
            config: RaffleConfig::default(),
            state: RoundState::Calculating,
            players: vec!["alice".into(), "bob".into()],
            pool_balance: Amount::from_sat(20_000),
            last_timestamp: Utc::now(),
            pending_request: Some(42),
            recent_winner: None,
            rounds_completed: 3,
        }
    }

    async fn store(dir: &tempfile::TempDir) -> RaffleStore {
        RaffleStore::open(&dir.path().join("raffle.db")).await.unwrap()
    }

    #[tokio::test]
    async fn snapshot_round_trip_keeps_the_pending_request() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;
        let id = Uuid::new_v4();

        store.save_snapshot(&snapshot(id)).await.unwrap();

        let loaded = store.load_snapshot(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.state, RoundState::Calculating);
        assert_eq!(loaded.pending_request, Some(42));
        assert_eq!(loaded.players, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(loaded.rounds_completed, 3);

        assert!(store.load_snapshot(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(store.load_latest().await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn records_and_lists_round_outcomes() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;
        let id = Uuid::new_v4();

        for round in 1..=3 {
            let outcome = RoundOutcome {
                round,
                winner: format!("winner-{round}"),
                prize: Amount::from_sat(40_000),
                txid: format!("tx-{round}"),
                players: vec!["a".into(), "b".into()],
                decided_at: Utc::now(),
            };
            store.record_outcome(id, &outcome).await.unwrap();
        }

        let outcomes = store.recent_outcomes(id, 2).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].round, 3); // newest first
        assert_eq!(outcomes[1].round, 2);
    }

    #[tokio::test]
    async fn event_log_pages_by_cursor() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;
        let id = Uuid::new_v4();

        let events = vec![
            RaffleEvent::PlayerEntered {
                player: "alice".into(),
                amount: Amount::from_sat(10_000),
                at: Utc::now(),
            },
            RaffleEvent::UpkeepPerformed {
                request_id: 42,
                at: Utc::now(),
            },
        ];
        store.append_events(id, &events).await.unwrap();

        let all = store.events_since(id, 0).await.unwrap();
        assert_eq!(all.len(), 2);

        let (last_seq, _) = all[0];
        let rest = store.events_since(id, last_seq).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(matches!(rest[0].1, RaffleEvent::UpkeepPerformed { .. }));
    }

    #[tokio::test]
    async fn credits_accumulate_per_player() {
        let dir = tempdir().unwrap();
        let store = store(&dir).await;

        store.credit("alice", Amount::from_sat(40_000)).await.unwrap();
        store.credit("alice", Amount::from_sat(10_000)).await.unwrap();

        assert_eq!(
            store.credit_balance("alice").await.unwrap(),
            Amount::from_sat(50_000)
        );
        assert_eq!(store.credit_balance("bob").await.unwrap(), Amount::ZERO);
    }
}
