use thiserror::Error;

use super::order::OrderStatus;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Signature mismatch for {0}")]
    Signature(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Cannot {action} while order is {current}")]
    Conflict {
        action: &'static str,
        current: OrderStatus,
    },

    #[error("Conflict: {0}")]
    StaleRecord(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: uuid::Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Side effect failed: {0}")]
    SideEffect(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound(format!("{what} {id}"))
    }

    /// True for both order-state conflicts and stale non-order records.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Conflict { .. } | DomainError::StaleRecord(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_names_action_and_status() {
        let err = DomainError::Conflict {
            action: "ship",
            current: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "Cannot ship while order is PENDING");
        assert!(err.is_conflict());
    }

    #[test]
    fn not_found_display() {
        let err = DomainError::not_found("Order", "abc");
        assert_eq!(err.to_string(), "Order abc not found");
        assert!(!err.is_conflict());
    }
}
