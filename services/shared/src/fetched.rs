/// Explicit fetch state for values read from chain
///
/// A pool total of zero and a failed fetch are different facts; collapsing
/// both into zero produces misleading odds and bonus displays. Consumers
/// branch on this state instead of defaulting.
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum Fetched<T> {
    /// Not requested yet, or request still in flight
    Pending,
    /// Fetch completed; the value is authoritative (including empty/zero)
    Ready(T),
    /// Fetch failed; the value is unknown, not zero
    Failed(ServiceError),
}

impl<T> Fetched<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Fetched::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Fetched::Failed(_))
    }

    /// The value, if authoritative
    pub fn ready(&self) -> Option<&T> {
        match self {
            Fetched::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Fetched::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&ServiceError> {
        match self {
            Fetched::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Pending => Fetched::Pending,
            Fetched::Ready(value) => Fetched::Ready(f(value)),
            Fetched::Failed(err) => Fetched::Failed(err),
        }
    }
}

impl<T> From<crate::errors::Result<T>> for Fetched<T> {
    fn from(result: crate::errors::Result<T>) -> Self {
        match result {
            Ok(value) => Fetched::Ready(value),
            Err(err) => Fetched::Failed(err),
        }
    }
}
