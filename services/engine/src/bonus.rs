//! Weighted bonus distribution
//!
//! A fixed slice of round volume (`BONUS_RATE_BPS`) is split across bets,
//! weighted by stake size and arrival order: earlier bets weigh more. All
//! arithmetic runs in the 256-bit integer domain; callers convert to display
//! values at the edge.

use primitive_types::U256;

use games_shared::{constants::BONUS_RATE_BPS, types::TokenAmount};

use crate::domain::{Bet, Selection, Side};
use crate::pools::total_volume;

/// Which bets share the bonus pool for a settled round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusScope {
    /// Every bet in the round participates
    WholeRound,
    /// Only bets on the winning side participate
    WinningSide(Side),
}

impl BonusScope {
    fn includes(&self, bet: &Bet) -> bool {
        match self {
            BonusScope::WholeRound => true,
            BonusScope::WinningSide(side) => bet.selection == Selection::Side(*side),
        }
    }
}

/// The round's bonus pool: a fixed fraction of total volume
///
/// Every call site goes through this function; the rate constant lives in
/// one place.
pub fn bonus_pool(total: TokenAmount) -> TokenAmount {
    total.mul_bps(BONUS_RATE_BPS).unwrap_or_else(|_| TokenAmount::zero())
}

/// Order-and-size weight of a single bet
///
/// `amount * (bet_count - order_index)`: weight decays linearly with
/// position, so the first bet of a 10-bet round weighs 10x its stake and the
/// last weighs 1x. An index at or past `bet_count` contributes nothing.
pub fn bet_weight(bet: &Bet, bet_count: u32) -> U256 {
    let position_factor = u64::from(bet_count.saturating_sub(bet.order_index));
    bet.amount
        .as_u256()
        .checked_mul(U256::from(position_factor))
        .unwrap_or_else(U256::zero)
}

/// Allocate the round's bonus pool across its bets
///
/// Returns one amount per bet, aligned with the input slice; bets outside
/// `scope` receive zero. A zero weight sum (no bets, or no bets in scope)
/// yields all zeros with no division. Floor division guarantees
/// `sum(result) <= bonus_pool(total_volume)`.
pub fn distribute_bonus(bets: &[Bet], scope: BonusScope) -> Vec<TokenAmount> {
    if bets.is_empty() {
        return Vec::new();
    }

    let pool = bonus_pool(total_volume(bets)).as_u256();
    let bet_count = bets.len() as u32;

    let weights: Vec<U256> = bets
        .iter()
        .map(|bet| {
            if scope.includes(bet) {
                bet_weight(bet, bet_count)
            } else {
                U256::zero()
            }
        })
        .collect();

    let weight_sum: U256 = weights
        .iter()
        .fold(U256::zero(), |acc, w| acc.saturating_add(*w));

    if weight_sum.is_zero() {
        return vec![TokenAmount::zero(); bets.len()];
    }

    weights
        .into_iter()
        .map(|weight| {
            let allocated = pool
                .checked_mul(weight)
                .map(|product| product / weight_sum)
                .unwrap_or_else(U256::zero);
            TokenAmount::from_u256(allocated)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_shared::types::{PlayerAddress, RoundId};

    fn bet(units: u64, selection: Selection, order: u32) -> Bet {
        Bet {
            round_id: RoundId::new(1),
            player: PlayerAddress::try_from(format!("0x{:0>40}", order)).unwrap(),
            amount: TokenAmount::from_tokens(units),
            selection,
            order_index: order,
        }
    }

    #[test]
    fn test_equal_weights_split_pool_exactly() {
        // 1000 at position 0 of 2 weighs 2000; 2000 at position 1 weighs
        // 2000. Pool = 3000 * 4% = 120, split 60/60 with nothing lost.
        let bets = vec![
            bet(1_000, Selection::Entry, 0),
            bet(2_000, Selection::Entry, 1),
        ];

        let bonuses = distribute_bonus(&bets, BonusScope::WholeRound);
        assert_eq!(bonuses[0], TokenAmount::from_tokens(60));
        assert_eq!(bonuses[1], TokenAmount::from_tokens(60));
    }

    #[test]
    fn test_earlier_bets_weigh_more() {
        let bets = vec![
            bet(100, Selection::Entry, 0),
            bet(100, Selection::Entry, 1),
            bet(100, Selection::Entry, 2),
        ];

        let bonuses = distribute_bonus(&bets, BonusScope::WholeRound);
        assert!(bonuses[0] > bonuses[1]);
        assert!(bonuses[1] > bonuses[2]);
    }

    #[test]
    fn test_sum_never_exceeds_pool() {
        // Prime-ish amounts force rounding on every division.
        let bets = vec![
            bet(101, Selection::Entry, 0),
            bet(307, Selection::Entry, 1),
            bet(513, Selection::Entry, 2),
            bet(7, Selection::Entry, 3),
        ];

        let pool = bonus_pool(total_volume(&bets));
        let allocated = distribute_bonus(&bets, BonusScope::WholeRound)
            .into_iter()
            .fold(TokenAmount::zero(), |acc, b| acc.checked_add(b).unwrap());

        assert!(allocated <= pool);
    }

    #[test]
    fn test_empty_ledger_and_zero_share() {
        assert!(distribute_bonus(&[], BonusScope::WholeRound).is_empty());

        // Everyone bet short; winning-side scope for long has zero weight
        // sum and must not divide.
        let bets = vec![
            bet(100, Selection::Side(Side::Short), 0),
            bet(200, Selection::Side(Side::Short), 1),
        ];
        let bonuses = distribute_bonus(&bets, BonusScope::WinningSide(Side::Long));
        assert!(bonuses.iter().all(TokenAmount::is_zero));
        assert_eq!(bonuses.len(), 2);
    }

    #[test]
    fn test_winning_side_scope_excludes_losers() {
        let bets = vec![
            bet(1_000, Selection::Side(Side::Long), 0),
            bet(1_000, Selection::Side(Side::Short), 1),
        ];

        let bonuses = distribute_bonus(&bets, BonusScope::WinningSide(Side::Long));
        // Pool still derives from whole-round volume (2000 * 4% = 80) but
        // the short bet is excluded, so the long bet takes the entire pool.
        assert_eq!(bonuses[0], TokenAmount::from_tokens(80));
        assert!(bonuses[1].is_zero());
    }

    #[test]
    fn test_distribution_is_idempotent() {
        let bets = vec![
            bet(11, Selection::Entry, 0),
            bet(23, Selection::Entry, 1),
        ];
        assert_eq!(
            distribute_bonus(&bets, BonusScope::WholeRound),
            distribute_bonus(&bets, BonusScope::WholeRound)
        );
    }
}
