use std::sync::Arc;

use capsule_types::clock::Clock;
use capsule_types::models::{Capsule, CapsuleStatus, NewCapsule, RequestContext};
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::repository::{CapsuleRepository, OpenOutcome};
use crate::validation::validate_new_capsule;

/// Capsule operations: validation, ownership checks and the one-way open
/// transition, on top of any [`CapsuleRepository`].
#[derive(Clone)]
pub struct CapsuleStore {
    repo: Arc<dyn CapsuleRepository>,
    clock: Arc<dyn Clock>,
}

impl CapsuleStore {
    pub fn new(repo: Arc<dyn CapsuleRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Current instant at the precision timestamps are stored with.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }

    pub fn create(
        &self,
        ctx: &RequestContext,
        creator_name: Option<String>,
        fields: NewCapsule,
    ) -> Result<Uuid, StoreError> {
        let now = self.now();
        let valid = validate_new_capsule(fields, now).inspect_err(|e| {
            debug!("Rejected capsule from {}: {}", ctx.user_id, e);
        })?;

        let capsule = Capsule {
            id: Uuid::new_v4(),
            user_id: ctx.user_id,
            creator_name,
            title: valid.title,
            content: valid.content,
            location: valid.location,
            unlock: valid.unlock,
            media_urls: valid.media_urls,
            status: CapsuleStatus::Sealed,
            created_at: now,
        };

        self.repo.insert(&capsule)?;
        info!(
            "Capsule {} created by {} ({})",
            capsule.id,
            ctx.user_id,
            capsule.unlock.kind().as_str()
        );
        Ok(capsule.id)
    }

    pub fn get(&self, id: Uuid) -> Result<Capsule, StoreError> {
        self.repo.find_by_id(id)?.ok_or(StoreError::NotFound)
    }

    /// Like [`get`](Self::get), but only for the capsule's owner.
    pub fn get_owned(&self, ctx: &RequestContext, id: Uuid) -> Result<Capsule, StoreError> {
        let capsule = self.get(id)?;
        if capsule.user_id != ctx.user_id {
            warn!("User {} tried to access capsule {}", ctx.user_id, id);
            return Err(StoreError::Permission);
        }
        Ok(capsule)
    }

    pub fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Capsule>, StoreError> {
        self.repo.list_by_user(user_id)
    }

    /// Transition a sealed capsule to opened. Safe to race: exactly one
    /// caller gets `Transitioned`, the rest get `AlreadyOpened`.
    pub fn open(&self, id: Uuid) -> Result<OpenOutcome, StoreError> {
        let outcome = self.repo.mark_opened(id, self.now())?;
        if let OpenOutcome::Transitioned { opened_at } = outcome {
            info!("Capsule {} opened at {}", id, opened_at);
        }
        Ok(outcome)
    }

    /// Remove a capsule and hand back the removed record; releasing its
    /// media is up to the caller.
    pub fn delete(&self, id: Uuid) -> Result<Capsule, StoreError> {
        let removed = self.repo.delete_by_id(id)?.ok_or(StoreError::NotFound)?;
        info!("Capsule {} deleted", id);
        Ok(removed)
    }

    pub fn delete_owned(&self, ctx: &RequestContext, id: Uuid) -> Result<Capsule, StoreError> {
        self.get_owned(ctx, id)?;
        self.delete(id)
    }
}
