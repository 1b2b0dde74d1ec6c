use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::core::{select_page, Change};
use crate::models::{DiscoveryQuery, Match, Message, PublicProfile, User, UserPair, UserSummary};
use crate::services::store::{Store, StoreError, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    matches: HashMap<Uuid, Match>,
    messages: HashMap<Uuid, Message>,
}

impl MemoryState {
    fn active_match_between(&self, pair: UserPair) -> Option<&Match> {
        self.matches.values().find(|m| m.is_active && m.users == pair)
    }

    fn apply(&mut self, change: &Change) -> Result<(), StoreError> {
        if let Some(user_id) = change.user_id() {
            let user = self
                .users
                .get_mut(&user_id)
                .ok_or_else(|| StoreError::Conflict(format!("user {} no longer exists", user_id)))?;
            change.apply_to_user(user);
            return Ok(());
        }

        match change {
            Change::CreateMatch(record) => {
                if self.active_match_between(record.users).is_some() {
                    return Err(StoreError::Conflict(format!(
                        "an active match already exists for {:?}",
                        record.users
                    )));
                }
                self.matches.insert(record.id, record.clone());
            }
            Change::DeactivateMatch { match_id, .. } | Change::TouchMatch { match_id, .. } => {
                let record = self
                    .matches
                    .get_mut(match_id)
                    .ok_or_else(|| StoreError::Conflict(format!("match {} no longer exists", match_id)))?;
                change.apply_to_match(record);
            }
            Change::AppendMessage(message) => {
                self.messages.insert(message.id, message.clone());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Process-local store
///
/// A unit of work holds the store lock for its whole lifetime, so writers are
/// serialized, and stages its changes until commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every match record ever created, retired ones included
    pub async fn all_matches(&self) -> Vec<Match> {
        self.state.lock().await.matches.values().cloned().collect()
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: Vec<Change>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_users(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = ids
            .iter()
            .filter_map(|id| self.guard.users.get(id).cloned())
            .collect();
        users.sort_by_key(|u| u.id);
        users.dedup_by_key(|u| u.id);
        Ok(users)
    }

    async fn lock_match(&mut self, id: Uuid) -> Result<Option<Match>, StoreError> {
        Ok(self.guard.matches.get(&id).cloned())
    }

    async fn active_match_between(&mut self, pair: UserPair) -> Result<Option<Match>, StoreError> {
        Ok(self.guard.active_match_between(pair).cloned())
    }

    async fn apply(&mut self, change: &Change) -> Result<(), StoreError> {
        self.staged.push(change.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let mut next = (*self.guard).clone();
        for change in &self.staged {
            next.apply(change)?;
        }
        *self.guard = next;
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork { guard, staged: Vec::new() }))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            return Ok(false);
        }
        state.users.insert(user.id, user.clone());
        Ok(true)
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).map(User::summary))
            .collect())
    }

    async fn discovery_page(&self, query: &DiscoveryQuery) -> Result<Vec<PublicProfile>, StoreError> {
        let state = self.state.lock().await;
        Ok(select_page(state.users.values(), query))
    }

    async fn get_match(&self, id: Uuid) -> Result<Option<Match>, StoreError> {
        Ok(self.state.lock().await.matches.get(&id).cloned())
    }

    async fn active_matches_for(&self, user_id: Uuid) -> Result<Vec<Match>, StoreError> {
        let state = self.state.lock().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.is_active && m.users.contains(user_id))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at).then(a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn messages_page(&self, match_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Message>, StoreError> {
        let state = self.state.lock().await;
        let mut messages: Vec<&Message> = state
            .messages
            .values()
            .filter(|m| m.match_id == match_id)
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(messages.into_iter().skip(offset).take(limit).cloned().collect())
    }

    async fn mark_read(&self, match_id: Uuid, reader: Uuid, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let modified = state
            .messages
            .values_mut()
            .filter(|m| m.match_id == match_id)
            .map(|m| m.mark_read_by(reader, at))
            .filter(|changed| *changed)
            .count();
        Ok(modified as u64)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        let count = state
            .messages
            .values()
            .filter(|m| m.receiver == user_id && !m.is_read)
            .count();
        Ok(count as u64)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        Ok(self.state.lock().await.messages.get(&id).cloned())
    }

    async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.messages.remove(&id).is_none() {
            return Ok(false);
        }
        for record in state.matches.values_mut() {
            if record.last_message == Some(id) {
                record.last_message = None;
            }
        }
        Ok(true)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
