/// Integration tests for the round watcher: snapshot refresh, event-driven
/// lifecycle, stale filtering, and stuck-round recovery
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use primitive_types::U256;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use games_engine::config::EngineConfig;
use games_engine::domain::{Bet, ContractEvent, GameKind, RoundStatus, Selection};
use games_engine::lifecycle::WheelPhase;
use games_engine::round_watcher::{RoundCache, RoundWatcher};
use games_engine::rpc_client::{ContractReader, LogPage, RoundStatusReport};
use games_shared::errors::{Result, ServiceError};
use games_shared::types::{PlayerAddress, RoundId, TokenAmount};

/// Scripted contract reader for watcher tests
struct MockReader {
    bets: Mutex<Vec<Bet>>,
    bank_fails: bool,
    status: Mutex<RoundStatusReport>,
    status_polls: AtomicUsize,
}

impl MockReader {
    fn new() -> Self {
        Self {
            bets: Mutex::new(Vec::new()),
            bank_fails: false,
            status: Mutex::new(RoundStatusReport {
                status: RoundStatus::Accepting,
                winner_offset: None,
                winning_index: None,
            }),
            status_polls: AtomicUsize::new(0),
        }
    }

    fn with_bets(bets: Vec<Bet>) -> Self {
        let reader = Self::new();
        *reader.bets.lock().unwrap() = bets;
        reader
    }
}

#[async_trait]
impl ContractReader for MockReader {
    async fn round_bank(&self, _: &str, _: RoundId) -> Result<TokenAmount> {
        if self.bank_fails {
            return Err(ServiceError::rpc_unavailable("mock rpc down"));
        }
        let bets = self.bets.lock().unwrap();
        Ok(bets
            .iter()
            .fold(TokenAmount::zero(), |acc, b| acc.checked_add(b.amount).unwrap()))
    }

    async fn bets_count(&self, _: &str, _: RoundId) -> Result<u32> {
        Ok(self.bets.lock().unwrap().len() as u32)
    }

    async fn round_bets(&self, _: &str, _: GameKind, round_id: RoundId) -> Result<Vec<Bet>> {
        let bets = self.bets.lock().unwrap();
        Ok(bets
            .iter()
            .filter(|b| b.round_id == round_id)
            .cloned()
            .collect())
    }

    async fn bonus_share(&self, _: &str, _: RoundId) -> Result<U256> {
        Ok(U256::zero())
    }

    async fn round_status(&self, _: &str, _: RoundId) -> Result<RoundStatusReport> {
        self.status_polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.lock().unwrap().clone())
    }

    async fn logs_since(&self, _: &str, _: GameKind, cursor: u64) -> Result<LogPage> {
        Ok(LogPage {
            events: Vec::new(),
            next_cursor: cursor,
        })
    }
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        refresh_interval_ms: 50,
        event_poll_interval_ms: 50,
        spin_timeout_secs: 60,
        settle_delay_ms: 20,
        max_read_retries: 1,
    }
}

fn player(tag: u64) -> PlayerAddress {
    PlayerAddress::try_from(format!("0x{:0>40x}", tag)).unwrap()
}

fn bet(round_id: RoundId, tag: u64, tokens: u64, order: u32) -> Bet {
    Bet {
        round_id,
        player: player(tag),
        amount: TokenAmount::from_tokens(tokens),
        selection: Selection::Pocket((order % 16) as u8),
        order_index: order,
    }
}

fn watcher_with(
    reader: Arc<MockReader>,
) -> (RoundWatcher, RoundCache, mpsc::Sender<ContractEvent>) {
    let cache: RoundCache = Arc::new(RwLock::new(HashMap::new()));
    let (event_tx, event_rx) = mpsc::channel(32);
    let watcher = RoundWatcher::new(
        GameKind::Roulette,
        "0xroulette".to_string(),
        reader,
        engine_config(),
        cache.clone(),
        event_rx,
        CancellationToken::new(),
    );
    (watcher, cache, event_tx)
}

// Roulette rounds are 60s; unix time 6_000 is round 100, open until 6_060.
const OPEN_TS: u64 = 6_010;
const CLOSED_TS: u64 = 6_070;
const ROUND: RoundId = RoundId::new(100);

const fn round_id(id: u64) -> RoundId {
    RoundId::new(id)
}

#[tokio::test]
async fn test_refresh_populates_authoritative_snapshot() {
    let reader = Arc::new(MockReader::with_bets(vec![
        bet(ROUND, 1, 1_000, 0),
        bet(ROUND, 2, 2_000, 1),
    ]));
    let (mut watcher, cache, _tx) = watcher_with(reader);

    watcher.tick(OPEN_TS).await;

    assert_eq!(watcher.active_round(), ROUND);
    let views = cache.read().await;
    let view = views.get(&ROUND).expect("round view cached");

    assert!(view.bets.is_ready());
    assert!(view.bank.is_ready());
    assert_eq!(view.round.bet_count, 2);
    assert_eq!(view.round.total_volume, TokenAmount::from_tokens(3_000));
    assert_eq!(view.round.status, RoundStatus::Accepting);
    assert_eq!(view.phase, WheelPhase::Standby);
}

#[tokio::test]
async fn test_failed_read_is_marked_failed_not_zero() {
    let mut reader = MockReader::with_bets(vec![bet(ROUND, 1, 500, 0)]);
    reader.bank_fails = true;
    let (mut watcher, cache, _tx) = watcher_with(Arc::new(reader));

    watcher.tick(OPEN_TS).await;

    let views = cache.read().await;
    let view = views.get(&ROUND).unwrap();

    assert!(view.bank.is_failed());
    assert!(view.bets.is_ready());
    // The ledger is still authoritative despite the bank failure
    assert_eq!(view.round.total_volume, TokenAmount::from_tokens(500));
}

#[tokio::test]
async fn test_full_lifecycle_to_stopped() {
    let reader = Arc::new(MockReader::with_bets(vec![
        bet(ROUND, 1, 1_000, 0),
        bet(ROUND, 2, 2_000, 1),
    ]));
    let (mut watcher, cache, _tx) = watcher_with(reader);

    watcher.tick(OPEN_TS).await;
    assert_eq!(watcher.phase(), WheelPhase::Standby);

    // Clock closes the window
    watcher.tick(CLOSED_TS).await;
    assert_eq!(watcher.phase(), WheelPhase::Waiting);

    watcher
        .handle_event(
            ContractEvent::CalculationRequested {
                game: GameKind::Roulette,
                round_id: ROUND,
            },
            CLOSED_TS + 1,
        )
        .await;
    assert_eq!(
        watcher.phase(),
        WheelPhase::Spinning {
            since_unix: CLOSED_TS + 1
        }
    );

    watcher
        .handle_event(
            ContractEvent::WinnerCalculated {
                game: GameKind::Roulette,
                round_id: ROUND,
                offset: 777,
                winning_index: 1,
            },
            CLOSED_TS + 3,
        )
        .await;
    assert_eq!(
        watcher.phase(),
        WheelPhase::Landed {
            offset: 777,
            winning_index: 1
        }
    );

    {
        let views = cache.read().await;
        let view = views.get(&ROUND).unwrap();
        assert_eq!(view.round.status, RoundStatus::Calculated);
        let winner = view.winning_bet().expect("winning bet resolvable");
        assert_eq!(winner.order_index, 1);
        let bonuses = view.settled_bonuses().expect("bonuses derivable");
        assert_eq!(bonuses.len(), 2);
    }

    // The settle timer fires for this round id
    watcher.handle_settle_timer(ROUND).await;
    assert_eq!(
        watcher.phase(),
        WheelPhase::Stopped {
            offset: 777,
            winning_index: 1
        }
    );

    let views = cache.read().await;
    assert_eq!(views.get(&ROUND).unwrap().round.status, RoundStatus::Ended);
}

#[tokio::test]
async fn test_stale_winner_event_does_not_transition() {
    let reader = Arc::new(MockReader::new());
    let (mut watcher, _cache, _tx) = watcher_with(reader);

    watcher.tick(OPEN_TS).await;
    watcher.tick(CLOSED_TS).await;
    assert_eq!(watcher.phase(), WheelPhase::Waiting);

    // Winner event for a round that is not currently visible
    watcher
        .handle_event(
            ContractEvent::WinnerCalculated {
                game: GameKind::Roulette,
                round_id: round_id(99),
                offset: 5,
                winning_index: 0,
            },
            CLOSED_TS + 1,
        )
        .await;

    assert_eq!(watcher.phase(), WheelPhase::Waiting);
}

#[tokio::test]
async fn test_stale_settle_timer_is_ignored() {
    let reader = Arc::new(MockReader::new());
    let (mut watcher, _cache, _tx) = watcher_with(reader);

    watcher.tick(OPEN_TS).await;
    watcher.tick(CLOSED_TS).await;
    watcher
        .handle_event(
            ContractEvent::WinnerCalculated {
                game: GameKind::Roulette,
                round_id: ROUND,
                offset: 5,
                winning_index: 0,
            },
            CLOSED_TS + 1,
        )
        .await;

    // A timer from some earlier round must not stop the current wheel
    watcher.handle_settle_timer(round_id(99)).await;
    assert!(matches!(watcher.phase(), WheelPhase::Landed { .. }));
}

#[tokio::test]
async fn test_bet_events_append_idempotently() {
    let reader = Arc::new(MockReader::new());
    let (mut watcher, cache, _tx) = watcher_with(reader);

    watcher.tick(OPEN_TS).await;

    let placed = ContractEvent::BetPlaced {
        game: GameKind::Roulette,
        round_id: ROUND,
        bet: bet(ROUND, 7, 100, 0),
    };
    watcher.handle_event(placed.clone(), OPEN_TS + 1).await;
    watcher.handle_event(placed, OPEN_TS + 2).await;

    let views = cache.read().await;
    let view = views.get(&ROUND).unwrap();
    let bets = view.bets.ready().unwrap();
    assert_eq!(bets.len(), 1);
    assert_eq!(view.round.bet_count, 1);
    assert_eq!(view.round.total_volume, TokenAmount::from_tokens(100));
}

#[tokio::test]
async fn test_stuck_spin_lands_from_status_poll() {
    let reader = Arc::new(MockReader::with_bets(vec![bet(ROUND, 1, 1_000, 0)]));
    let (mut watcher, cache, _tx) = watcher_with(reader.clone());

    watcher.tick(OPEN_TS).await;
    watcher.tick(CLOSED_TS).await;
    watcher
        .handle_event(
            ContractEvent::CalculationRequested {
                game: GameKind::Roulette,
                round_id: ROUND,
            },
            CLOSED_TS,
        )
        .await;
    assert!(matches!(watcher.phase(), WheelPhase::Spinning { .. }));

    // The contract settled but the winner event never arrived
    *reader.status.lock().unwrap() = RoundStatusReport {
        status: RoundStatus::Calculated,
        winner_offset: Some(41),
        winning_index: Some(0),
    };

    // Just past the spin timeout, before the round is abandoned
    watcher.tick(CLOSED_TS + 61).await;

    assert!(reader.status_polls.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        watcher.phase(),
        WheelPhase::Landed {
            offset: 41,
            winning_index: 0
        }
    );

    let views = cache.read().await;
    assert_eq!(
        views.get(&ROUND).unwrap().round.status,
        RoundStatus::Calculated
    );
}

#[tokio::test]
async fn test_closed_round_is_held_until_stopped() {
    let reader = Arc::new(MockReader::new());
    let (mut watcher, cache, _tx) = watcher_with(reader);

    watcher.tick(OPEN_TS).await;
    assert_eq!(watcher.active_round(), ROUND);

    // Round 101 is current by the clock, but 100 has not settled yet; the
    // wheel stays on 100 so the animation resolves against its ledger.
    watcher.tick(CLOSED_TS).await;
    assert_eq!(watcher.active_round(), ROUND);
    assert_eq!(watcher.phase(), WheelPhase::Waiting);

    // Settle round 100, then the next tick adopts the current round
    watcher
        .handle_event(
            ContractEvent::WinnerCalculated {
                game: GameKind::Roulette,
                round_id: ROUND,
                offset: 1,
                winning_index: 0,
            },
            CLOSED_TS + 1,
        )
        .await;
    watcher.handle_settle_timer(ROUND).await;
    assert!(matches!(watcher.phase(), WheelPhase::Stopped { .. }));

    watcher.tick(CLOSED_TS + 2).await;
    assert_eq!(watcher.active_round(), round_id(101));
    assert_eq!(watcher.phase(), WheelPhase::Standby);

    // Both rounds are cached; the old one keeps its final state
    let views = cache.read().await;
    assert!(views.contains_key(&ROUND));
    assert!(views.contains_key(&round_id(101)));
}

#[tokio::test]
async fn test_unsettled_round_is_abandoned_past_deadline() {
    let reader = Arc::new(MockReader::new());
    let (mut watcher, _cache, _tx) = watcher_with(reader);

    watcher.tick(OPEN_TS).await;
    watcher.tick(CLOSED_TS).await;
    assert_eq!(watcher.phase(), WheelPhase::Waiting);

    // No calculation, no winner, contract never settles: past the abandon
    // deadline (round end + 2x spin timeout) the watcher moves on.
    let past_deadline = ROUND.end_timestamp(60) + 2 * 60 + 1;
    watcher.tick(past_deadline).await;

    assert_ne!(watcher.active_round(), ROUND);
    assert_eq!(watcher.phase(), WheelPhase::Standby);
}
