#![forbid(unsafe_code)]

use serde_json::Value;

use crate::source::QueryError;

/// Lifecycle of a table's data fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    /// Nothing requested yet.
    #[default]
    Idle,
    Pending,
    Success(Value),
    Failure(QueryError),
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Idle | FetchState::Pending)
    }

    pub fn response(&self) -> Option<&Value> {
        match self {
            FetchState::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&QueryError> {
        match self {
            FetchState::Failure(e) => Some(e),
            _ => None,
        }
    }
}
