use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::core::Change;
use crate::models::{DiscoveryQuery, Match, Message, PublicProfile, User, UserPair, UserSummary};

/// Errors raised by a user directory backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// A transaction spanning user documents, match records and messages
///
/// Reads made through a unit of work lock what they return until commit.
/// Dropping it without calling [`UnitOfWork::commit`] discards every applied
/// change.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Load and lock the given users in ascending id order. Missing ids are skipped.
    async fn lock_users(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;

    async fn lock_match(&mut self, id: Uuid) -> Result<Option<Match>, StoreError>;

    async fn active_match_between(&mut self, pair: UserPair) -> Result<Option<Match>, StoreError>;

    async fn apply(&mut self, change: &Change) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Persistent user directory
#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert a new user document. Returns false if the id is taken.
    async fn insert_user(&self, user: &User) -> Result<bool, StoreError>;

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError>;

    /// One page of candidates passing the static discovery predicate, ordered by id
    async fn discovery_page(&self, query: &DiscoveryQuery) -> Result<Vec<PublicProfile>, StoreError>;

    async fn get_match(&self, id: Uuid) -> Result<Option<Match>, StoreError>;

    /// Active matches of a user, most recent message first
    async fn active_matches_for(&self, user_id: Uuid) -> Result<Vec<Match>, StoreError>;

    /// Messages of a match, newest first
    async fn messages_page(&self, match_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Mark every unread message addressed to `reader` in a match as read
    async fn mark_read(&self, match_id: Uuid, reader: Uuid, at: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Delete a message, clearing any match pointer to it
    async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}

/// Apply planned changes through `uow` and commit them as one unit
pub async fn apply_all(mut uow: Box<dyn UnitOfWork + '_>, changes: &[Change]) -> Result<(), StoreError> {
    for change in changes {
        uow.apply(change).await?;
    }
    uow.commit().await
}
