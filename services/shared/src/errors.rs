/// Shared error types for the games engine
///
/// Design Philosophy:
/// - Standardized error codes for consistent handling across the engine
/// - Categorized by error domain (Validation, Network, Contract, Internal)
/// - Implements both Display and std::error::Error for compatibility
/// - Includes context fields for debugging (error_code, message, context)
///
/// Usage:
/// - Engine components wrap their specific errors in ServiceError
/// - Error codes follow pattern: <CATEGORY>_<SPECIFIC>_<DETAIL>
/// - Context field used for additional debugging information
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error categories that map to retry behavior and logging severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Validation errors
    /// Caller provided invalid input; never retried
    Validation,

    /// Network/RPC errors
    /// External endpoint unavailable or timing out; transient
    Network,

    /// Smart contract errors
    /// A contract call reverted or a transaction failed on chain
    Contract,

    /// Internal engine errors
    /// Unexpected failures, decoding issues, programming errors
    Internal,

    /// Resource not found
    NotFound,
}

impl ErrorCategory {
    /// Whether errors in this category are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network)
    }

    /// Map error category to log level
    pub fn log_level(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "warn",
            ErrorCategory::Network => "error",
            ErrorCategory::Contract => "warn",
            ErrorCategory::Internal => "error",
            ErrorCategory::NotFound => "info",
        }
    }
}

/// Standard error codes used across the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    // Validation errors
    pub const VALIDATION_INVALID_ADDRESS: ErrorCode = ErrorCode("VALIDATION_INVALID_ADDRESS");
    pub const VALIDATION_INVALID_AMOUNT: ErrorCode = ErrorCode("VALIDATION_INVALID_AMOUNT");
    pub const VALIDATION_BELOW_MIN_BET: ErrorCode = ErrorCode("VALIDATION_BELOW_MIN_BET");
    pub const VALIDATION_INSUFFICIENT_BALANCE: ErrorCode =
        ErrorCode("VALIDATION_INSUFFICIENT_BALANCE");
    pub const VALIDATION_INSUFFICIENT_ALLOWANCE: ErrorCode =
        ErrorCode("VALIDATION_INSUFFICIENT_ALLOWANCE");
    pub const VALIDATION_ROUND_CLOSED: ErrorCode = ErrorCode("VALIDATION_ROUND_CLOSED");

    // Network errors
    pub const NETWORK_RPC_UNAVAILABLE: ErrorCode = ErrorCode("NETWORK_RPC_UNAVAILABLE");
    pub const NETWORK_RPC_TIMEOUT: ErrorCode = ErrorCode("NETWORK_RPC_TIMEOUT");
    pub const NETWORK_INDEXER_UNAVAILABLE: ErrorCode = ErrorCode("NETWORK_INDEXER_UNAVAILABLE");

    // Smart contract errors
    pub const CONTRACT_CALL_REVERTED: ErrorCode = ErrorCode("CONTRACT_CALL_REVERTED");
    pub const CONTRACT_TX_FAILED: ErrorCode = ErrorCode("CONTRACT_TX_FAILED");
    pub const CONTRACT_TX_TIMEOUT: ErrorCode = ErrorCode("CONTRACT_TX_TIMEOUT");
    pub const CONTRACT_ROUND_STUCK: ErrorCode = ErrorCode("CONTRACT_ROUND_STUCK");

    // Internal errors
    pub const INTERNAL_UNEXPECTED: ErrorCode = ErrorCode("INTERNAL_UNEXPECTED");
    pub const INTERNAL_EVENT_DECODE: ErrorCode = ErrorCode("INTERNAL_EVENT_DECODE");
    pub const INTERNAL_RESPONSE_DECODE: ErrorCode = ErrorCode("INTERNAL_RESPONSE_DECODE");
    pub const INTERNAL_CONFIGURATION: ErrorCode = ErrorCode("INTERNAL_CONFIGURATION");

    // Resource errors
    pub const NOT_FOUND_ROUND: ErrorCode = ErrorCode("NOT_FOUND_ROUND");
    pub const NOT_FOUND_BET: ErrorCode = ErrorCode("NOT_FOUND_BET");
    pub const NOT_FOUND_TX: ErrorCode = ErrorCode("NOT_FOUND_TX");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Standardized error structure used across the engine
///
/// This provides consistent error reporting with:
/// - Structured error codes for programmatic handling
/// - Human-readable messages
/// - Optional context for debugging
/// - Category-based classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    /// Error category (determines retry behavior and log level)
    pub category: ErrorCategory,

    /// Structured error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context (e.g., field names, ids, endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ServiceError {
    /// Create a new ServiceError
    pub fn new(category: ErrorCategory, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.as_str().to_string(),
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    // Validation error constructors
    pub fn invalid_address(address: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_INVALID_ADDRESS,
            format!("Invalid player address: {}", address),
        )
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_INVALID_AMOUNT,
            "Invalid bet amount",
        )
        .with_context(reason)
    }

    pub fn below_minimum_bet(units: u128, min: u128) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_BELOW_MIN_BET,
            "Bet amount below minimum",
        )
        .with_context(format!("units: {}, min: {}", units, min))
    }

    pub fn insufficient_balance(required: impl fmt::Display, available: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_INSUFFICIENT_BALANCE,
            "Insufficient balance",
        )
        .with_context(format!("required: {}, available: {}", required, available))
    }

    pub fn insufficient_allowance(
        required: impl fmt::Display,
        approved: impl fmt::Display,
    ) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_INSUFFICIENT_ALLOWANCE,
            "Insufficient allowance",
        )
        .with_context(format!("required: {}, approved: {}", required, approved))
    }

    pub fn round_closed(round_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Validation,
            ErrorCode::VALIDATION_ROUND_CLOSED,
            format!("Round {} is no longer accepting bets", round_id),
        )
    }

    // Network error constructors
    pub fn rpc_unavailable(endpoint: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::Network,
            ErrorCode::NETWORK_RPC_UNAVAILABLE,
            "RPC endpoint unavailable",
        )
        .with_context(endpoint)
    }

    pub fn rpc_timeout(endpoint: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::Network,
            ErrorCode::NETWORK_RPC_TIMEOUT,
            "RPC request timed out",
        )
        .with_context(endpoint)
    }

    pub fn indexer_unavailable(error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Network,
            ErrorCode::NETWORK_INDEXER_UNAVAILABLE,
            "Indexer query failed",
        )
        .with_context(error.to_string())
    }

    // Contract error constructors
    pub fn contract_reverted(method: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Contract,
            ErrorCode::CONTRACT_CALL_REVERTED,
            "Contract call reverted",
        )
        .with_context(format!("method: {}, error: {}", method.into(), error))
    }

    pub fn tx_failed(tx_hash: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Contract,
            ErrorCode::CONTRACT_TX_FAILED,
            "Transaction failed",
        )
        .with_context(format!("tx: {}, error: {}", tx_hash.into(), error))
    }

    pub fn stuck_round(round_id: impl fmt::Display, waited_secs: u64) -> Self {
        Self::new(
            ErrorCategory::Contract,
            ErrorCode::CONTRACT_ROUND_STUCK,
            format!("Round {} stuck awaiting winner calculation", round_id),
        )
        .with_context(format!("waited_secs: {}", waited_secs))
    }

    // Resource not found constructors
    pub fn round_not_found(round_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::NotFound,
            ErrorCode::NOT_FOUND_ROUND,
            format!("Round not found: {}", round_id),
        )
    }

    pub fn bet_not_found(round_id: impl fmt::Display, index: u32) -> Self {
        Self::new(
            ErrorCategory::NotFound,
            ErrorCode::NOT_FOUND_BET,
            format!("Bet {} not found in round {}", index, round_id),
        )
    }

    // Internal error constructors
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCategory::Internal,
            ErrorCode::INTERNAL_UNEXPECTED,
            message,
        )
    }

    pub fn decode_error(error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Internal,
            ErrorCode::INTERNAL_RESPONSE_DECODE,
            "Response decode error",
        )
        .with_context(error.to_string())
    }

    pub fn event_decode_error(error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Internal,
            ErrorCode::INTERNAL_EVENT_DECODE,
            "Event decode error",
        )
        .with_context(error.to_string())
    }

    /// Whether a retry loop should try this operation again
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "[{}] {}: {}", self.code, self.message, context)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<crate::types::ValidationError> for ServiceError {
    fn from(err: crate::types::ValidationError) -> Self {
        use crate::types::ValidationError::*;
        match &err {
            InvalidAddress(addr) => ServiceError::invalid_address(addr),
            BetAmountOutOfRange { units, min, .. } if units < min => {
                ServiceError::below_minimum_bet(*units, *min)
            }
            _ => ServiceError::invalid_amount(err.to_string()),
        }
    }
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, ServiceError>;
