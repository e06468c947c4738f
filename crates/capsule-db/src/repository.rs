use capsule_types::models::Capsule;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

/// Result of the conditional sealed -> opened update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// This call performed the transition.
    Transitioned { opened_at: DateTime<Utc> },
    /// Someone else already did.
    AlreadyOpened,
}

impl OpenOutcome {
    pub fn transitioned(&self) -> bool {
        matches!(self, Self::Transitioned { .. })
    }

    /// For callers that expected a sealed capsule: `AlreadyOpened` becomes a
    /// conflict.
    pub fn require_transition(self) -> Result<DateTime<Utc>, StoreError> {
        match self {
            Self::Transitioned { opened_at } => Ok(opened_at),
            Self::AlreadyOpened => Err(StoreError::Conflict("capsule was already opened".into())),
        }
    }
}

/// The query shapes the capsule store needs from durable storage.
pub trait CapsuleRepository: Send + Sync {
    fn insert(&self, capsule: &Capsule) -> Result<(), StoreError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<Capsule>, StoreError>;

    /// Newest first; capsules created at the same instant keep insertion order.
    fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Capsule>, StoreError>;

    /// Set `status = opened, opened_at = at` only if the capsule is still
    /// sealed. Returns `NotFound` for an unknown id.
    fn mark_opened(&self, id: Uuid, at: DateTime<Utc>) -> Result<OpenOutcome, StoreError>;

    /// Remove the capsule, returning the removed record.
    fn delete_by_id(&self, id: Uuid) -> Result<Option<Capsule>, StoreError>;
}
