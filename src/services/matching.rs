use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::transitions::ensure_distinct;
use crate::core::{counterpart, plan_dislike, plan_like, plan_undo, plan_unmatch, LikeOutcome, UndoOutcome};
use crate::error::AppError;
use crate::models::{MatchView, User};
use crate::services::cache::CacheManager;
use crate::services::profiles::summaries_for;
use crate::services::store::{apply_all, Store};

/// Like, dislike, undo and unmatch, each applied as one unit of work
#[derive(Clone)]
pub struct MatchFormationService {
    store: Arc<dyn Store>,
    cache: Arc<CacheManager>,
}

/// Pick the actor and target out of a locked pair. The actor must exist.
fn split(users: &[User], actor_id: Uuid, target_id: Uuid) -> Result<(&User, Option<&User>), AppError> {
    let actor = users
        .iter()
        .find(|u| u.id == actor_id)
        .ok_or_else(|| AppError::user_not_found(actor_id))?;
    Ok((actor, users.iter().find(|u| u.id == target_id)))
}

impl MatchFormationService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<CacheManager>) -> Self {
        Self { store, cache }
    }

    /// Record that `actor_id` likes `target_id`, creating a match if the like is mutual
    pub async fn like(&self, actor_id: Uuid, target_id: Uuid) -> Result<LikeOutcome, AppError> {
        let pair = ensure_distinct(actor_id, target_id, "like")?;

        let mut uow = self.store.begin().await?;
        let users = uow.lock_users(&[pair.low(), pair.high()]).await?;
        let (actor, target) = split(&users, actor_id, target_id)?;
        let target = target.ok_or_else(|| AppError::user_not_found(target_id))?;
        let existing = uow.active_match_between(pair).await?;

        let transition = plan_like(actor, target, existing.as_ref(), Utc::now())?;
        apply_all(uow, &transition.changes).await?;

        match &transition.outcome.matched {
            Some(record) if existing.is_none() => {
                tracing::info!("New match {} between {} and {}", record.id, actor_id, target_id);
            }
            _ => tracing::debug!("User {} liked {}", actor_id, target_id),
        }

        Ok(transition.outcome)
    }

    /// Record that `actor_id` passes on `target_id`, replacing any like
    pub async fn dislike(&self, actor_id: Uuid, target_id: Uuid) -> Result<(), AppError> {
        let pair = ensure_distinct(actor_id, target_id, "dislike")?;

        let mut uow = self.store.begin().await?;
        let users = uow.lock_users(&[pair.low(), pair.high()]).await?;
        let (actor, target) = split(&users, actor_id, target_id)?;
        let target = target.ok_or_else(|| AppError::user_not_found(target_id))?;

        let transition = plan_dislike(actor, target, Utc::now())?;
        apply_all(uow, &transition.changes).await?;

        tracing::debug!("User {} disliked {}", actor_id, target_id);
        Ok(())
    }

    /// Take back a like or dislike, retiring the pair's match if one is active
    ///
    /// The target does not have to exist any more.
    pub async fn undo(&self, actor_id: Uuid, target_id: Uuid) -> Result<UndoOutcome, AppError> {
        let pair = ensure_distinct(actor_id, target_id, "undo an action on")?;

        let mut uow = self.store.begin().await?;
        let users = uow.lock_users(&[pair.low(), pair.high()]).await?;
        let (actor, target) = split(&users, actor_id, target_id)?;
        let active = uow.active_match_between(pair).await?;

        let transition = plan_undo(actor, target_id, target, active.as_ref(), Utc::now())?;
        if transition.is_noop() {
            return Ok(transition.outcome);
        }
        apply_all(uow, &transition.changes).await?;

        if let Some(match_id) = transition.outcome.retired_match {
            tracing::info!("Match {} retired by undo from {}", match_id, actor_id);
        }
        Ok(transition.outcome)
    }

    /// Retire a match on behalf of one of its participants
    pub async fn unmatch(&self, match_id: Uuid, requester_id: Uuid) -> Result<(), AppError> {
        // Read the pair first so users are locked before the match, like every other writer
        let record = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| AppError::match_not_found(match_id))?;
        counterpart(&record, requester_id)?;

        let mut uow = self.store.begin().await?;
        let users = uow.lock_users(&[record.users.low(), record.users.high()]).await?;
        let record = uow
            .lock_match(match_id)
            .await?
            .ok_or_else(|| AppError::match_not_found(match_id))?;

        let transition = plan_unmatch(&record, requester_id, &users, Utc::now())?;
        if transition.is_noop() {
            return Ok(());
        }
        apply_all(uow, &transition.changes).await?;

        tracing::info!("Match {} retired by {}", match_id, requester_id);
        Ok(())
    }

    /// Active matches of a user, most recent conversation first
    pub async fn list_matches(&self, user_id: Uuid) -> Result<Vec<MatchView>, AppError> {
        let records = self.store.active_matches_for(user_id).await?;
        let others: Vec<Uuid> = records.iter().filter_map(|m| m.users.other(user_id)).collect();
        let mut summaries = summaries_for(self.store.as_ref(), &self.cache, &others).await?;

        Ok(records
            .iter()
            .map(|record| {
                let other = record.users.other(user_id).and_then(|id| summaries.remove(&id));
                MatchView::new(record, other)
            })
            .collect())
    }

    pub async fn get_match(&self, match_id: Uuid, requester_id: Uuid) -> Result<MatchView, AppError> {
        let record = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| AppError::match_not_found(match_id))?;
        let other = counterpart(&record, requester_id)?;

        let mut summaries = summaries_for(self.store.as_ref(), &self.cache, &[other]).await?;
        Ok(MatchView::new(&record, summaries.remove(&other)))
    }
}
