//! Service error types.

use thiserror::Error;

use partshop_core::CartId;

use crate::db::RepositoryError;

/// Errors raised by cart, merge and checkout operations.
#[derive(Debug, Error)]
pub enum ShopError {
    /// The request is well-formed but not allowed, e.g. merging a cart into itself.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Checkout was requested for a cart without lines.
    #[error("cart {0} is empty")]
    EmptyCart(CartId),

    /// A referenced user, cart, product or line does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A query or commit failed. State is unchanged.
    #[error("storage failure: {0}")]
    StorageFailure(#[source] RepositoryError),
}

impl From<RepositoryError> for ShopError {
    /// A value the store refuses to hold is the caller's fault, not a storage fault.
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidValue(message) => Self::InvalidOperation(message),
            other => Self::StorageFailure(other),
        }
    }
}

impl ShopError {
    /// Whether the failure came from a lock or constraint conflict.
    ///
    /// A conflicting commit rolled back completely and may be retried.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::StorageFailure(err) if err.is_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_detection() {
        let conflict = ShopError::StorageFailure(RepositoryError::Conflict("deadlock".into()));
        assert!(conflict.is_conflict());
        assert!(!ShopError::NotFound("cart".into()).is_conflict());
        assert!(!ShopError::StorageFailure(RepositoryError::DataCorruption("x".into())).is_conflict());
    }

    #[test]
    fn test_rejected_value_is_invalid_operation() {
        let err = ShopError::from(RepositoryError::InvalidValue("quantity".into()));
        assert!(matches!(err, ShopError::InvalidOperation(_)));
        assert!(!err.is_conflict());

        let err = ShopError::from(RepositoryError::Unavailable("down".into()));
        assert!(matches!(err, ShopError::StorageFailure(_)));
    }
}
