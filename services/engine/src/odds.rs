//! Odds and coefficient derivation
//!
//! A bettor's payout is their stake plus a pro-rata share of the opposing
//! pool; the coefficient is that payout per unit staked. Used both for live
//! pre-bet previews (called once per refresh per stake preset) and for
//! post-settlement display, so everything here is pure and idempotent.

use primitive_types::U256;

use games_shared::types::{u256_to_f64, TokenAmount};

/// Fixed-point scale for the coefficient ratio (micro precision)
const COEFF_PRECISION: u64 = 1_000_000;

/// Payout for `stake` joining `own_pool` against `opposing_pool`
///
/// `stake + opposing * stake / (own + stake)`, floor division, in the
/// integer domain. A zero stake pays zero; an empty own pool claims the
/// entire opposing pool.
pub fn potential_payout(
    stake: TokenAmount,
    own_pool: TokenAmount,
    opposing_pool: TokenAmount,
) -> TokenAmount {
    if stake.is_zero() {
        return TokenAmount::zero();
    }

    let stake_u = stake.as_u256();
    let denominator = own_pool.as_u256().saturating_add(stake_u);

    let share = opposing_pool
        .as_u256()
        .checked_mul(stake_u)
        .map(|product| product / denominator)
        .unwrap_or_else(U256::zero);

    TokenAmount::from_u256(stake_u.saturating_add(share))
}

/// Display multiplier: payout per unit staked
///
/// Defined as 1.0 for a zero stake (no leverage) rather than 0/0. The ratio
/// is computed at micro precision in U256 and converted to a float exactly
/// once, so repeated calls with identical inputs agree bit for bit.
pub fn coefficient(stake: TokenAmount, own_pool: TokenAmount, opposing_pool: TokenAmount) -> f64 {
    if stake.is_zero() {
        return 1.0;
    }

    let payout = potential_payout(stake, own_pool, opposing_pool).as_u256();
    let scaled = payout
        .checked_mul(U256::from(COEFF_PRECISION))
        .map(|product| product / stake.as_u256())
        .unwrap_or_else(U256::zero);

    u256_to_f64(scaled) / COEFF_PRECISION as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: u64) -> TokenAmount {
        TokenAmount::from_tokens(n)
    }

    #[test]
    fn test_zero_stake_has_unit_coefficient() {
        assert_eq!(coefficient(TokenAmount::zero(), tokens(500), tokens(800)), 1.0);
        assert!(potential_payout(TokenAmount::zero(), tokens(500), tokens(800)).is_zero());
    }

    #[test]
    fn test_empty_own_pool_claims_whole_opposing_pool() {
        // (100 + 1000*100/100) / 100 = 11
        let coeff = coefficient(tokens(100), TokenAmount::zero(), tokens(1_000));
        assert_eq!(coeff, 11.0);
    }

    #[test]
    fn test_balanced_pools_double() {
        // payout = 100 + 200*100/200 = 200
        let payout = potential_payout(tokens(100), tokens(100), tokens(200));
        assert_eq!(payout, tokens(200));
        assert_eq!(coefficient(tokens(100), tokens(100), tokens(200)), 2.0);
    }

    #[test]
    fn test_empty_opposing_pool_returns_stake() {
        let payout = potential_payout(tokens(100), tokens(400), TokenAmount::zero());
        assert_eq!(payout, tokens(100));
        assert_eq!(coefficient(tokens(100), tokens(400), TokenAmount::zero()), 1.0);
    }

    #[test]
    fn test_coefficient_at_least_one() {
        let samples = [
            (1, 0, 0),
            (1, 1_000_000, 3),
            (250, 250, 250),
            (7, 0, 1_000_000),
            (1_000_000, 1, 1),
        ];
        for (stake, own, opp) in samples {
            let coeff = coefficient(tokens(stake), tokens(own), tokens(opp));
            assert!(coeff >= 1.0, "coefficient {} below 1 for {:?}", coeff, (stake, own, opp));
        }
    }

    #[test]
    fn test_coefficient_is_idempotent() {
        let a = coefficient(tokens(123), tokens(456), tokens(789));
        let b = coefficient(tokens(123), tokens(456), tokens(789));
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
