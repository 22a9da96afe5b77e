/// Type-safe wrappers for domain primitives
///
/// These types prevent common errors by enforcing validation at construction
/// time and providing checked arithmetic operations. All token math stays in
/// the 256-bit integer domain; `TokenAmount::to_display` is the single
/// integer-to-float conversion boundary.
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid player address: {0}")]
    InvalidAddress(String),

    #[error("Bet amount out of range: {units} (min: {min}, max: {max})")]
    BetAmountOutOfRange { units: u128, min: u128, max: u128 },

    #[error("Bet amount must be non-zero")]
    ZeroBetAmount,

    #[error("Amount overflow in arithmetic operation")]
    AmountOverflow,

    #[error("Round interval must be non-zero")]
    ZeroRoundInterval,
}

/// Type-safe player address with validation
///
/// Enforces the canonical `0x` + 40 hex character form; stored lowercased so
/// addresses compare and hash consistently across event, read, and indexer
/// sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerAddress(String);

impl PlayerAddress {
    /// Get the inner string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the inner string, consuming self
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for PlayerAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let normalized = value.to_lowercase();

        let hex = normalized
            .strip_prefix("0x")
            .ok_or_else(|| ValidationError::InvalidAddress(value.clone()))?;

        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidAddress(value));
        }

        Ok(Self(normalized))
    }
}

impl TryFrom<&str> for PlayerAddress {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl std::fmt::Display for PlayerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe 18-decimal token amount with overflow protection
///
/// Backed by `U256` so that order-weighted bonus products
/// (amount * position * pool) never overflow the working type. Provides
/// checked arithmetic to surface logic errors instead of wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TokenAmount(U256);

impl TokenAmount {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    /// Create from raw base units (no range validation, for pool totals)
    pub fn from_units(units: u128) -> Self {
        Self(U256::from(units))
    }

    /// Create from whole tokens
    pub fn from_tokens(tokens: u64) -> Self {
        Self(U256::from(tokens) * U256::from(TOKEN_UNIT))
    }

    /// Create a stake amount with bet-range validation
    pub fn bet_stake(units: u128) -> Result<Self, ValidationError> {
        if units == 0 {
            return Err(ValidationError::ZeroBetAmount);
        }
        if units < MIN_BET_UNITS || units > MAX_BET_UNITS {
            return Err(ValidationError::BetAmountOutOfRange {
                units,
                min: MIN_BET_UNITS,
                max: MAX_BET_UNITS,
            });
        }
        Ok(Self(U256::from(units)))
    }

    /// Get the raw 256-bit value
    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// Wrap a raw 256-bit value
    pub fn from_u256(value: U256) -> Self {
        Self(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition
    pub fn checked_add(&self, other: TokenAmount) -> Result<Self, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: TokenAmount) -> Result<Self, ValidationError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Take a basis-point slice of this amount (floor division)
    pub fn mul_bps(&self, bps: u64) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(U256::from(bps))
            .map(|v| Self(v / U256::from(BPS_DENOMINATOR)))
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Convert to a display value in whole tokens
    ///
    /// The only place integer amounts become floats. Derived math must stay
    /// in the integer domain and call this last.
    pub fn to_display(&self) -> f64 {
        u256_to_f64(self.0) / TOKEN_UNIT as f64
    }
}

/// Lossy conversion of a U256 to f64 via its 64-bit limbs
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0_f64, |acc, &limb| acc * 2f64.powi(64) + limb as f64)
}

impl TryFrom<u128> for TokenAmount {
    type Error = ValidationError;

    fn try_from(units: u128) -> Result<Self, Self::Error> {
        Self::bet_stake(units)
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} units ({:.6} tokens)", self.0, self.to_display())
    }
}

/// Round identifier derived from wall-clock time
///
/// A round id is the unix timestamp divided by the game's round interval.
/// Ids are never stored authoritatively; any holder of a clock and the
/// interval can recompute the current id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RoundId(u64);

impl RoundId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Derive the round id active at `unix_secs` for a game with the given
    /// round interval
    pub fn from_timestamp(unix_secs: u64, interval_secs: u64) -> Result<Self, ValidationError> {
        if interval_secs == 0 {
            return Err(ValidationError::ZeroRoundInterval);
        }
        Ok(Self(unix_secs / interval_secs))
    }

    /// Unix timestamp at which this round starts accepting bets
    pub fn start_timestamp(&self, interval_secs: u64) -> u64 {
        self.0 * interval_secs
    }

    /// Unix timestamp at which this round closes
    pub fn end_timestamp(&self, interval_secs: u64) -> u64 {
        (self.0 + 1) * interval_secs
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
