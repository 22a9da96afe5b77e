//! Pool aggregation
//!
//! Pure reductions from a round's bet ledger to per-selection or per-player
//! volume totals. Recomputed from the ledger on every refresh; nothing here
//! is cached or written back.

use std::collections::HashMap;

use games_shared::types::{PlayerAddress, TokenAmount};

use crate::domain::{Bet, Selection, Side};

/// Aggregate volume and participant count for one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolTotals {
    pub volume: TokenAmount,
    pub count: u32,
}

impl PoolTotals {
    fn add(&mut self, amount: TokenAmount) {
        // Ledger amounts are bounded well below U256; overflow here would
        // mean a corrupt ledger, so saturate rather than poison the view.
        self.volume = self.volume.checked_add(amount).unwrap_or(self.volume);
        self.count += 1;
    }
}

/// Reduce a round's ledger into per-selection totals
///
/// Output is order-insensitive; an empty ledger yields an empty map.
pub fn aggregate_by_selection(bets: &[Bet]) -> HashMap<Selection, PoolTotals> {
    let mut pools: HashMap<Selection, PoolTotals> = HashMap::new();
    for bet in bets {
        pools.entry(bet.selection).or_default().add(bet.amount);
    }
    pools
}

/// Reduce a round's ledger into per-player totals
pub fn aggregate_by_player(bets: &[Bet]) -> HashMap<PlayerAddress, PoolTotals> {
    let mut pools: HashMap<PlayerAddress, PoolTotals> = HashMap::new();
    for bet in bets {
        pools
            .entry(bet.player.clone())
            .or_default()
            .add(bet.amount);
    }
    pools
}

/// Total staked volume across the ledger
pub fn total_volume(bets: &[Bet]) -> TokenAmount {
    bets.iter().fold(TokenAmount::zero(), |acc, bet| {
        acc.checked_add(bet.amount).unwrap_or(acc)
    })
}

/// Volume staked on one binary side
pub fn side_volume(bets: &[Bet], side: Side) -> TokenAmount {
    bets.iter()
        .filter(|bet| bet.selection == Selection::Side(side))
        .fold(TokenAmount::zero(), |acc, bet| {
            acc.checked_add(bet.amount).unwrap_or(acc)
        })
}
