//! Contract event subscription
//!
//! Long-lived listener per game: polls the games node's log cursor and
//! forwards decoded events to the watcher over a channel. The RPC layer may
//! deliver a log twice across poll windows, so the listener suppresses
//! recent duplicates; consumers stay idempotent regardless.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::{ContractEvent, GameKind};
use crate::rpc_client::ContractReader;

/// How many recently-seen event keys to remember per listener
const DEDUP_WINDOW: usize = 1_024;

pub struct EventListener {
    reader: Arc<dyn ContractReader>,
    game: GameKind,
    contract: String,
    sender: mpsc::Sender<ContractEvent>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    cursor: u64,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
}

impl EventListener {
    pub fn new(
        reader: Arc<dyn ContractReader>,
        game: GameKind,
        contract: String,
        sender: mpsc::Sender<ContractEvent>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reader,
            game,
            contract,
            sender,
            poll_interval,
            shutdown,
            cursor: 0,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        }
    }

    /// Main listener loop; returns when shutdown fires or the receiver drops
    pub async fn run(mut self) {
        info!(game = %self.game, contract = %self.contract, "Event listener starting");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(game = %self.game, "Event listener shutting down");
                    return;
                }
                _ = sleep(self.poll_interval) => {}
            }

            match self
                .reader
                .logs_since(&self.contract, self.game, self.cursor)
                .await
            {
                Ok(page) => {
                    self.cursor = page.next_cursor;
                    for event in page.events {
                        if !self.note_seen(&event) {
                            debug!(game = %self.game, round_id = %event.round_id(), "Duplicate event suppressed");
                            continue;
                        }
                        if self.sender.send(event).await.is_err() {
                            info!(game = %self.game, "Event receiver dropped, listener stopping");
                            return;
                        }
                    }
                }
                Err(err) => {
                    // Transient by construction: the RPC layer already
                    // retried. Keep the cursor and try next tick.
                    error!(game = %self.game, error = %err, "Event poll failed");
                    metrics::counter!("event_poll_failures_total").increment(1);
                }
            }
        }
    }

    /// Record the event's identity; false if it was already seen recently
    fn note_seen(&mut self, event: &ContractEvent) -> bool {
        let key = match serde_json::to_string(event) {
            Ok(key) => key,
            // Unserializable events cannot be deduplicated; let them pass.
            Err(_) => return true,
        };

        if !self.seen.insert(key.clone()) {
            return false;
        }

        self.seen_order.push_back(key);
        if self.seen_order.len() > DEDUP_WINDOW {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_shared::types::RoundId;

    fn listener_for_test() -> (EventListener, mpsc::Receiver<ContractEvent>) {
        struct NoopReader;

        #[async_trait::async_trait]
        impl ContractReader for NoopReader {
            async fn round_bank(
                &self,
                _: &str,
                _: RoundId,
            ) -> games_shared::errors::Result<games_shared::types::TokenAmount> {
                unimplemented!("not used in this test")
            }
            async fn bets_count(&self, _: &str, _: RoundId) -> games_shared::errors::Result<u32> {
                unimplemented!("not used in this test")
            }
            async fn round_bets(
                &self,
                _: &str,
                _: GameKind,
                _: RoundId,
            ) -> games_shared::errors::Result<Vec<crate::domain::Bet>> {
                unimplemented!("not used in this test")
            }
            async fn bonus_share(
                &self,
                _: &str,
                _: RoundId,
            ) -> games_shared::errors::Result<primitive_types::U256> {
                unimplemented!("not used in this test")
            }
            async fn round_status(
                &self,
                _: &str,
                _: RoundId,
            ) -> games_shared::errors::Result<crate::rpc_client::RoundStatusReport> {
                unimplemented!("not used in this test")
            }
            async fn logs_since(
                &self,
                _: &str,
                _: GameKind,
                _: u64,
            ) -> games_shared::errors::Result<crate::rpc_client::LogPage> {
                unimplemented!("not used in this test")
            }
        }

        let (tx, rx) = mpsc::channel(16);
        let listener = EventListener::new(
            Arc::new(NoopReader),
            GameKind::Roulette,
            "0xcontract".to_string(),
            tx,
            Duration::from_millis(10),
            CancellationToken::new(),
        );
        (listener, rx)
    }

    #[tokio::test]
    async fn test_duplicate_suppression() {
        let (mut listener, _rx) = listener_for_test();

        let event = ContractEvent::CalculationRequested {
            game: GameKind::Roulette,
            round_id: RoundId::new(7),
        };

        assert!(listener.note_seen(&event));
        assert!(!listener.note_seen(&event));

        let other = ContractEvent::CalculationRequested {
            game: GameKind::Roulette,
            round_id: RoundId::new(8),
        };
        assert!(listener.note_seen(&other));
    }

    #[tokio::test]
    async fn test_dedup_window_is_bounded() {
        let (mut listener, _rx) = listener_for_test();

        for round in 0..(DEDUP_WINDOW as u64 + 10) {
            let event = ContractEvent::CalculationRequested {
                game: GameKind::Roulette,
                round_id: RoundId::new(round),
            };
            assert!(listener.note_seen(&event));
        }

        assert!(listener.seen.len() <= DEDUP_WINDOW);
        assert_eq!(listener.seen.len(), listener.seen_order.len());

        // The oldest key has been evicted and would pass again
        let oldest = ContractEvent::CalculationRequested {
            game: GameKind::Roulette,
            round_id: RoundId::new(0),
        };
        assert!(listener.note_seen(&oldest));
    }
}
