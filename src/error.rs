//! Error types for the chore engine.

use crate::store::StoreError;

/// Top-level error type for operations that cross the core boundary.
///
/// Delivery and ingest failures never show up here: they are logged and
/// absorbed by the dispatcher and the ingest loop.
#[derive(Debug, thiserror::Error)]
pub enum ChoreError {
    /// Caller input that needs correcting (blank title, zero interval, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// The acting account does not belong to any group.
    #[error("account is not in a group")]
    NotInGroup,

    /// The acting account belongs to a different group than the target.
    #[error("account is not a member of the group")]
    NotMemberOfGroup,

    /// Operation reserved for the group owner.
    #[error("account is not the owner of the group")]
    NotGroupOwner,

    /// A task, group, account or code does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (`task`, `group`, `account`, ...).
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Connect code is unknown, already redeemed, or older than 24 hours.
    #[error("connect code is expired or invalid")]
    ExpiredOrInvalidToken,

    /// Persistence backend failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChoreError>;
