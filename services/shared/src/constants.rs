/// Shared constants for the betfinio games engine
///
/// This module centralizes all magic numbers and protocol constants
/// to prevent inconsistencies across the engine, derived views, and tests.

/// Bonus pool rate in basis points (4% of round volume)
///
/// Rationale: every bonus computation must reference this single constant.
/// The protocol allocates one fixed slice of round volume as the
/// order-weighted bonus pool; per-screen copies of this number have
/// historically drifted (4% vs 5%) and produced inconsistent displays.
pub const BONUS_RATE_BPS: u64 = 400;

/// Basis point denominator
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Token amounts are 18-decimal fixed point integers
pub const TOKEN_DECIMALS: u32 = 18;

/// One whole token in base units (10^18)
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Minimum bet amount in base units (1 token)
///
/// Rationale: prevents dust bets whose bonus weight rounds to nothing and
/// whose display amounts render as 0.00.
pub const MIN_BET_UNITS: u128 = TOKEN_UNIT;

/// Maximum bet amount in base units (10,000,000 tokens)
///
/// Rationale: anti-whale limit; a single bet above this would dominate every
/// pool ratio and make displayed coefficients meaningless.
pub const MAX_BET_UNITS: u128 = 10_000_000 * TOKEN_UNIT;

/// Luro round length in seconds (5 minutes)
pub const LURO_ROUND_SECS: u64 = 300;

/// Predict round length in seconds (4.5 minutes)
pub const PREDICT_ROUND_SECS: u64 = 270;

/// Roulette round length in seconds (1 minute)
pub const ROULETTE_ROUND_SECS: u64 = 60;

/// How long a round may stay in `spinning` before the watcher re-polls the
/// contract for its status (seconds)
///
/// Rationale: the winner-calculated event can be dropped by the RPC layer;
/// without this bound the wheel spins forever.
pub const SPIN_TIMEOUT_SECS: u64 = 60;

/// Delay between landing and the final stopped phase (milliseconds)
///
/// Fixed choreography window for the result display; runs on a cancellable
/// timer keyed by round id, not on the render loop.
pub const SETTLE_DELAY_MS: u64 = 5_000;

/// Maximum retry attempts for a contract read
pub const MAX_READ_RETRIES: u32 = 3;

/// Base backoff delay in milliseconds for retry logic
pub const RETRY_BACKOFF_BASE_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds for retry logic
pub const RETRY_BACKOFF_MAX_MS: u64 = 30_000;

/// Consecutive failures before an RPC endpoint's circuit opens
pub const RPC_FAILURE_THRESHOLD: u64 = 5;

/// Seconds an open RPC circuit waits before probing again
pub const RPC_RESET_TIMEOUT_SECS: u64 = 30;
