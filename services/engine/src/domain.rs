use chrono::{DateTime, Utc};
use games_shared::{
    constants::*,
    types::{PlayerAddress, RoundId, TokenAmount},
};
use serde::{Deserialize, Serialize};

/// The three games this engine watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    /// Lottery-style round game; one pool, winner drawn by offset
    Luro,
    /// Binary price prediction; long/short pools
    Predict,
    /// Roulette wheel; numbered pockets
    Roulette,
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [GameKind::Luro, GameKind::Predict, GameKind::Roulette];

    /// Wall-clock length of one round
    pub fn round_interval_secs(&self) -> u64 {
        match self {
            GameKind::Luro => LURO_ROUND_SECS,
            GameKind::Predict => PREDICT_ROUND_SECS,
            GameKind::Roulette => ROULETTE_ROUND_SECS,
        }
    }

    /// Which bets share the bonus pool
    pub fn bonus_population(&self) -> BonusPopulation {
        match self {
            // Predict rewards only the winning side; the others split across
            // every bet in the round.
            GameKind::Predict => BonusPopulation::WinningSide,
            GameKind::Luro | GameKind::Roulette => BonusPopulation::WholeRound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Luro => "luro",
            GameKind::Predict => "predict",
            GameKind::Roulette => "roulette",
        }
    }

    /// Round id active at the given unix timestamp
    pub fn round_at(&self, unix_secs: u64) -> RoundId {
        // Interval constants are non-zero; the error arm is unreachable.
        RoundId::from_timestamp(unix_secs, self.round_interval_secs())
            .unwrap_or_else(|_| RoundId::new(0))
    }
}

impl std::fmt::Display for GameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scope of the bonus distribution denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusPopulation {
    WholeRound,
    WinningSide,
}

/// Binary market side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// What a bet is placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Predict: long or short
    Side(Side),
    /// Roulette: pocket number
    Pocket(u8),
    /// Luro: the bet itself is the entry; there is nothing to pick
    Entry,
}

/// A single bet within a round's ledger
///
/// Append-only: bets are created from contract reads or `BetPlaced` events
/// and never mutated. `order_index` is the bet's position in the round's
/// on-chain sequence and drives the bonus weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub round_id: RoundId,
    pub player: PlayerAddress,
    pub amount: TokenAmount,
    pub selection: Selection,
    pub order_index: u32,
}

/// On-chain round status as the contract reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Betting window open
    Accepting,
    /// Window closed, awaiting randomness request
    Waiting,
    /// Winner determined on chain
    Calculated,
    /// Payouts distributed
    Ended,
}

/// A round as the engine sees it
///
/// Status is recomputed from the wall clock and contract reads; the client
/// never stores it authoritatively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub game: GameKind,
    pub id: RoundId,
    pub status: RoundStatus,
    pub total_volume: TokenAmount,
    pub bet_count: u32,
    pub observed_at: DateTime<Utc>,
}

impl Round {
    /// Status implied by the clock alone, before any contract read
    pub fn status_from_clock(game: GameKind, id: RoundId, unix_secs: u64) -> RoundStatus {
        if unix_secs < id.end_timestamp(game.round_interval_secs()) {
            RoundStatus::Accepting
        } else {
            RoundStatus::Waiting
        }
    }
}

/// Events pushed by the contract subscription layer
///
/// Delivery may duplicate or reorder across rounds; consumers filter by the
/// active round id and treat repeats as no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContractEvent {
    BetPlaced {
        game: GameKind,
        round_id: RoundId,
        bet: Bet,
    },
    CalculationRequested {
        game: GameKind,
        round_id: RoundId,
    },
    WinnerCalculated {
        game: GameKind,
        round_id: RoundId,
        /// Verifiable-random offset selecting the winner from the ordered ledger
        offset: u64,
        /// Index of the winning bet in the round's ledger
        winning_index: u32,
    },
}

impl ContractEvent {
    pub fn round_id(&self) -> RoundId {
        match self {
            ContractEvent::BetPlaced { round_id, .. }
            | ContractEvent::CalculationRequested { round_id, .. }
            | ContractEvent::WinnerCalculated { round_id, .. } => *round_id,
        }
    }

    pub fn game(&self) -> GameKind {
        match self {
            ContractEvent::BetPlaced { game, .. }
            | ContractEvent::CalculationRequested { game, .. }
            | ContractEvent::WinnerCalculated { game, .. } => *game,
        }
    }
}
