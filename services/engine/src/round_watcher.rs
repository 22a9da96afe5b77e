//! Per-game round watcher
//!
//! One watcher per game owns that game's lifecycle machine and round cache.
//! Each cycle it derives the current round id from the clock, refreshes the
//! round snapshot with concurrent reads, folds contract events into the
//! lifecycle, and recomputes the derived pool/bonus/odds view. Derived
//! values are never written back anywhere; the cache holds inputs and the
//! consumers recompute.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use primitive_types::U256;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use games_shared::{
    errors::ServiceError,
    fetched::Fetched,
    types::{PlayerAddress, RoundId, TokenAmount},
};

use crate::bonus::{distribute_bonus, BonusScope};
use crate::config::EngineConfig;
use crate::domain::{
    Bet, BonusPopulation, ContractEvent, GameKind, Round, RoundStatus, Selection, Side,
};
use crate::lifecycle::{RoundLifecycle, WheelPhase};
use crate::odds::coefficient;
use crate::pools::{aggregate_by_player, aggregate_by_selection, side_volume, total_volume, PoolTotals};
use crate::rpc_client::ContractReader;

/// Rounds kept in the per-game cache; older entries are pruned
const MAX_CACHED_ROUNDS: usize = 8;

/// Everything the engine knows about one round, inputs and phase
///
/// Each input slot carries its own fetch state so a failed read is never
/// mistaken for an empty round.
#[derive(Debug, Clone)]
pub struct RoundView {
    pub round: Round,
    pub bank: Fetched<TokenAmount>,
    pub bonus_share: Fetched<U256>,
    pub bets: Fetched<Vec<Bet>>,
    pub phase: WheelPhase,
}

impl RoundView {
    fn pending(game: GameKind, id: RoundId, now_unix: u64) -> Self {
        Self {
            round: Round {
                game,
                id,
                status: Round::status_from_clock(game, id, now_unix),
                total_volume: TokenAmount::zero(),
                bet_count: 0,
                observed_at: Utc::now(),
            },
            bank: Fetched::Pending,
            bonus_share: Fetched::Pending,
            bets: Fetched::Pending,
            phase: WheelPhase::Standby,
        }
    }

    /// Per-selection pools; None until the ledger is authoritative
    pub fn pools_by_selection(&self) -> Option<HashMap<Selection, PoolTotals>> {
        self.bets.ready().map(|bets| aggregate_by_selection(bets))
    }

    /// Per-player pools; None until the ledger is authoritative
    pub fn pools_by_player(&self) -> Option<HashMap<PlayerAddress, PoolTotals>> {
        self.bets.ready().map(|bets| aggregate_by_player(bets))
    }

    /// Pre-settlement bonus estimates across the whole round
    pub fn bonus_preview(&self) -> Option<Vec<TokenAmount>> {
        self.bets
            .ready()
            .map(|bets| distribute_bonus(bets, BonusScope::WholeRound))
    }

    /// Final bonus allocation once the winner is known
    ///
    /// Games that reward only the winning side scope the distribution to the
    /// winner's selection; before landing this returns None.
    pub fn settled_bonuses(&self) -> Option<Vec<TokenAmount>> {
        let bets = self.bets.ready()?;
        let winning_index = match self.phase {
            WheelPhase::Landed { winning_index, .. } | WheelPhase::Stopped { winning_index, .. } => {
                winning_index
            }
            _ => return None,
        };

        let scope = match self.round.game.bonus_population() {
            BonusPopulation::WholeRound => BonusScope::WholeRound,
            BonusPopulation::WinningSide => {
                let winner = bets.get(winning_index as usize)?;
                match winner.selection {
                    Selection::Side(side) => BonusScope::WinningSide(side),
                    _ => BonusScope::WholeRound,
                }
            }
        };

        Some(distribute_bonus(bets, scope))
    }

    /// Live coefficient preview for a hypothetical stake on one side
    pub fn coefficient_for(&self, side: Side, stake: TokenAmount) -> Option<f64> {
        let bets = self.bets.ready()?;
        let own = side_volume(bets, side);
        let opposing = side_volume(bets, side.opposite());
        Some(coefficient(stake, own, opposing))
    }

    /// The winning bet, once landed
    pub fn winning_bet(&self) -> Option<&Bet> {
        let bets = self.bets.ready()?;
        match self.phase {
            WheelPhase::Landed { winning_index, .. } | WheelPhase::Stopped { winning_index, .. } => {
                bets.get(winning_index as usize)
            }
            _ => None,
        }
    }
}

/// Shared, read-side handle to a game's round cache
pub type RoundCache = Arc<RwLock<HashMap<RoundId, RoundView>>>;

pub struct RoundWatcher {
    game: GameKind,
    contract: String,
    reader: Arc<dyn ContractReader>,
    config: EngineConfig,
    cache: RoundCache,
    lifecycle: RoundLifecycle,
    events: mpsc::Receiver<ContractEvent>,
    shutdown: CancellationToken,
    settle_token: CancellationToken,
    timer_tx: mpsc::Sender<RoundId>,
    timer_rx: mpsc::Receiver<RoundId>,
}

enum Wake {
    Shutdown,
    Event(ContractEvent),
    EventsClosed,
    SettleTimer(RoundId),
    Tick,
}

impl RoundWatcher {
    pub fn new(
        game: GameKind,
        contract: String,
        reader: Arc<dyn ContractReader>,
        config: EngineConfig,
        cache: RoundCache,
        events: mpsc::Receiver<ContractEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::channel(8);
        let now_unix = Utc::now().timestamp().max(0) as u64;
        Self {
            lifecycle: RoundLifecycle::new(game, game.round_at(now_unix)),
            game,
            contract,
            reader,
            config,
            cache,
            events,
            shutdown,
            settle_token: CancellationToken::new(),
            timer_tx,
            timer_rx,
        }
    }

    /// Main watcher loop
    pub async fn run(mut self) {
        info!(game = %self.game, contract = %self.contract, "Round watcher starting");

        let mut refresh = tokio::time::interval(Duration::from_millis(
            self.config.refresh_interval_ms,
        ));
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let wake = tokio::select! {
                _ = self.shutdown.cancelled() => Wake::Shutdown,
                maybe = self.events.recv() => match maybe {
                    Some(event) => Wake::Event(event),
                    None => Wake::EventsClosed,
                },
                Some(round_id) = self.timer_rx.recv() => Wake::SettleTimer(round_id),
                _ = refresh.tick() => Wake::Tick,
            };

            let now_unix = Utc::now().timestamp().max(0) as u64;
            match wake {
                Wake::Shutdown => {
                    info!(game = %self.game, "Round watcher shutting down");
                    self.settle_token.cancel();
                    return;
                }
                Wake::EventsClosed => {
                    warn!(game = %self.game, "Event channel closed, watcher stopping");
                    self.settle_token.cancel();
                    return;
                }
                Wake::Event(event) => self.handle_event(event, now_unix).await,
                Wake::SettleTimer(round_id) => self.handle_settle_timer(round_id).await,
                Wake::Tick => self.tick(now_unix).await,
            }
        }
    }

    /// One refresh cycle: window close, round switch, snapshot fetch,
    /// stuck-spin probe
    pub async fn tick(&mut self, now_unix: u64) {
        // Clock closed the tracked round's window; the wheel leaves standby
        // even if no calculation event has arrived yet.
        let tracked = self.lifecycle.round_id();
        if Round::status_from_clock(self.game, tracked, now_unix) != RoundStatus::Accepting
            && self.lifecycle.begin_waiting().is_some()
        {
            self.store_phase().await;
        }

        // A new round becomes current the moment the old one closes, but the
        // old wheel keeps its round until it stops (or is abandoned), so the
        // settlement animation plays out against the right ledger.
        let current = self.game.round_at(now_unix);
        if current != tracked && self.should_release(now_unix) {
            self.switch_round(current, now_unix).await;
        }

        self.refresh_snapshot(now_unix).await;

        if let Some(waited) = self
            .lifecycle
            .spin_overdue(now_unix, self.config.spin_timeout_secs)
        {
            self.probe_stuck_round(waited).await;
        }
    }

    /// Whether the tracked round may be released to the clock-current one
    fn should_release(&self, now_unix: u64) -> bool {
        match self.lifecycle.phase() {
            WheelPhase::Standby | WheelPhase::Stopped { .. } => true,
            _ => {
                let deadline = self
                    .lifecycle
                    .round_id()
                    .end_timestamp(self.game.round_interval_secs())
                    + 2 * self.config.spin_timeout_secs;
                if now_unix > deadline {
                    warn!(
                        game = %self.game,
                        round_id = %self.lifecycle.round_id(),
                        phase = ?self.lifecycle.phase(),
                        "Abandoning unsettled round past its deadline"
                    );
                    metrics::counter!("rounds_abandoned_total", "game" => self.game.as_str())
                        .increment(1);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Discard the old round's timers and point the machine at the new one
    async fn switch_round(&mut self, round_id: RoundId, now_unix: u64) {
        debug!(game = %self.game, old = %self.lifecycle.round_id(), new = %round_id, "Round switch");

        // Pending settle timers belong to the old round; kill them so a
        // stale landing never fires against the new wheel.
        self.settle_token.cancel();
        self.settle_token = CancellationToken::new();

        self.lifecycle.reset(round_id);
        metrics::counter!("rounds_observed_total", "game" => self.game.as_str()).increment(1);

        let mut cache = self.cache.write().await;
        if cache.len() >= MAX_CACHED_ROUNDS {
            let mut ids: Vec<RoundId> = cache.keys().copied().collect();
            ids.sort();
            for stale in ids.into_iter().take(cache.len() + 1 - MAX_CACHED_ROUNDS) {
                cache.remove(&stale);
            }
        }
        // Consumers see the new round as Pending until the first refresh.
        cache.insert(round_id, RoundView::pending(self.game, round_id, now_unix));
    }

    /// Fetch the round's inputs concurrently, tolerating partial failure
    ///
    /// Each read lands in its own `Fetched` slot; completion order between
    /// them is irrelevant and a failure leaves the slot `Failed`, not zero.
    async fn refresh_snapshot(&mut self, now_unix: u64) {
        let round_id = self.lifecycle.round_id();
        let contract = self.contract.as_str();

        let (bank, count, bets, bonus_share) = tokio::join!(
            self.reader.round_bank(contract, round_id),
            self.reader.bets_count(contract, round_id),
            self.reader.round_bets(contract, self.game, round_id),
            self.reader.bonus_share(contract, round_id),
        );

        for err in [bank.as_ref().err(), count.as_ref().err(), bets.as_ref().err()]
            .into_iter()
            .flatten()
        {
            debug!(game = %self.game, %round_id, error = %err, "Snapshot read failed");
            metrics::counter!("snapshot_read_failures_total", "game" => self.game.as_str())
                .increment(1);
        }

        let ledger_volume = bets.as_ref().ok().map(|b| total_volume(b));
        let ledger_count = bets.as_ref().ok().map(|b| b.len() as u32);

        let round = Round {
            game: self.game,
            id: round_id,
            status: self.effective_status(now_unix),
            // Ledger sum is authoritative when present; the bank read is the
            // fallback while the ledger is unavailable.
            total_volume: ledger_volume
                .or_else(|| bank.as_ref().ok().copied())
                .unwrap_or_else(TokenAmount::zero),
            bet_count: ledger_count.or(count.as_ref().ok().copied()).unwrap_or(0),
            observed_at: Utc::now(),
        };

        let view = RoundView {
            round,
            bank: bank.into(),
            bonus_share: bonus_share.into(),
            bets: bets.into(),
            phase: self.lifecycle.phase(),
        };

        // Last write wins per round id.
        self.cache.write().await.insert(round_id, view);
    }

    /// Round status implied by clock plus what the wheel already knows
    fn effective_status(&self, now_unix: u64) -> RoundStatus {
        match self.lifecycle.phase() {
            WheelPhase::Landed { .. } => RoundStatus::Calculated,
            WheelPhase::Stopped { .. } => RoundStatus::Ended,
            _ => Round::status_from_clock(self.game, self.lifecycle.round_id(), now_unix),
        }
    }

    /// Fold one contract event into the ledger and the lifecycle
    pub async fn handle_event(&mut self, event: ContractEvent, now_unix: u64) {
        if let ContractEvent::BetPlaced { round_id, bet, .. } = &event {
            if *round_id == self.lifecycle.round_id() {
                self.append_bet(bet.clone()).await;
            } else {
                debug!(game = %self.game, event_round = %round_id, "Stale bet event ignored");
            }
        }

        let was = self.lifecycle.phase();
        if let Some(phase) = self.lifecycle.observe(&event, now_unix) {
            info!(game = %self.game, round_id = %event.round_id(), ?was, now = ?phase, "Wheel phase transition");
            if matches!(phase, WheelPhase::Landed { .. }) {
                self.start_settle_timer(event.round_id());
            }
            self.store_phase().await;
        }
    }

    /// Append a bet observed via event, idempotently
    async fn append_bet(&mut self, bet: Bet) {
        let mut cache = self.cache.write().await;
        let Some(view) = cache.get_mut(&bet.round_id) else {
            return;
        };

        if let Fetched::Ready(bets) = &mut view.bets {
            // Duplicate delivery carries the same order index; keep the first.
            if bets.iter().any(|b| b.order_index == bet.order_index) {
                return;
            }
            metrics::counter!("bets_observed_total", "game" => self.game.as_str()).increment(1);
            view.round.total_volume = view
                .round
                .total_volume
                .checked_add(bet.amount)
                .unwrap_or(view.round.total_volume);
            view.round.bet_count += 1;
            bets.push(bet);
            bets.sort_by_key(|b| b.order_index);
        }
    }

    /// Settle timer fired; stale round ids are dropped
    pub async fn handle_settle_timer(&mut self, round_id: RoundId) {
        if round_id != self.lifecycle.round_id() {
            debug!(game = %self.game, %round_id, "Stale settle timer ignored");
            return;
        }
        if self.lifecycle.settle().is_some() {
            info!(game = %self.game, %round_id, "Wheel stopped, results final");
            metrics::counter!("rounds_settled_total", "game" => self.game.as_str()).increment(1);
            self.store_phase().await;
        }
    }

    /// The fixed post-landing display window, as a cancellable timer
    ///
    /// Keyed by round id: the receiver drops firings for rounds that are no
    /// longer active, and a round switch cancels the token outright.
    fn start_settle_timer(&self, round_id: RoundId) {
        let token = self.settle_token.child_token();
        let delay = Duration::from_millis(self.config.settle_delay_ms);
        let timer_tx = self.timer_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = timer_tx.send(round_id).await;
                }
            }
        });
    }

    /// Winner event never arrived; ask the contract directly
    async fn probe_stuck_round(&mut self, waited_secs: u64) {
        let round_id = self.lifecycle.round_id();
        match self.reader.round_status(&self.contract, round_id).await {
            Ok(report) if matches!(report.status, RoundStatus::Calculated | RoundStatus::Ended) => {
                if let (Some(offset), Some(winning_index)) =
                    (report.winner_offset, report.winning_index)
                {
                    warn!(
                        game = %self.game,
                        %round_id,
                        waited_secs,
                        "Winner event missed; landing from status poll"
                    );
                    if self.lifecycle.land_from_poll(offset, winning_index).is_some() {
                        self.start_settle_timer(round_id);
                        self.store_phase().await;
                    }
                }
            }
            Ok(_) => {
                let err = ServiceError::stuck_round(round_id, waited_secs);
                error!(game = %self.game, %round_id, waited_secs, error = %err, "Round stuck in spinning");
                metrics::counter!("stuck_rounds_total", "game" => self.game.as_str()).increment(1);
            }
            Err(err) => {
                error!(game = %self.game, %round_id, error = %err, "Stuck-round status probe failed");
            }
        }
    }

    /// Mirror the lifecycle phase into the cached view
    async fn store_phase(&self) {
        let round_id = self.lifecycle.round_id();
        let mut cache = self.cache.write().await;
        if let Some(view) = cache.get_mut(&round_id) {
            view.phase = self.lifecycle.phase();
            view.round.status = match view.phase {
                WheelPhase::Landed { .. } => RoundStatus::Calculated,
                WheelPhase::Stopped { .. } => RoundStatus::Ended,
                _ => view.round.status,
            };
        }
    }

    /// Current wheel phase for the active round
    pub fn phase(&self) -> WheelPhase {
        self.lifecycle.phase()
    }

    /// Round id the watcher is currently tracking
    pub fn active_round(&self) -> RoundId {
        self.lifecycle.round_id()
    }
}
