use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{counterpart, page_offset, plan_send};
use crate::error::AppError;
use crate::models::{Match, Message, MessageType};
use crate::services::store::{apply_all, Store};

/// Messages exchanged inside a match
#[derive(Clone)]
pub struct MessageThreadService {
    store: Arc<dyn Store>,
    default_page_size: usize,
    max_page_size: usize,
}

impl MessageThreadService {
    pub fn new(store: Arc<dyn Store>, default_page_size: usize, max_page_size: usize) -> Self {
        Self {
            store,
            default_page_size: default_page_size.max(1),
            max_page_size: max_page_size.max(1),
        }
    }

    pub fn page_bounds(&self, page: Option<usize>, limit: Option<usize>) -> (usize, usize) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(self.default_page_size).clamp(1, self.max_page_size);
        (page, limit)
    }

    /// Send a message and point the match at it, in one unit of work
    pub async fn send(
        &self,
        match_id: Uuid,
        sender_id: Uuid,
        content: &str,
        message_type: MessageType,
        image_url: Option<String>,
    ) -> Result<Message, AppError> {
        let mut uow = self.store.begin().await?;
        let record = uow
            .lock_match(match_id)
            .await?
            .ok_or_else(|| AppError::match_not_found(match_id))?;

        let transition = plan_send(&record, sender_id, content, message_type, image_url, Utc::now())?;
        apply_all(uow, &transition.changes).await?;

        tracing::debug!("Message {} sent in match {}", transition.outcome.id, match_id);
        Ok(transition.outcome)
    }

    /// One page of a thread, oldest first within the page
    ///
    /// Pages count back from the newest message. Opening a thread marks the
    /// reader's inbound messages as read.
    pub async fn list(
        &self,
        match_id: Uuid,
        reader_id: Uuid,
        page: usize,
        limit: usize,
    ) -> Result<Vec<Message>, AppError> {
        self.participant_match(match_id, reader_id).await?;

        let offset = page_offset(page, limit);
        let mut messages = self.store.messages_page(match_id, offset, limit).await?;
        messages.reverse();

        let now = Utc::now();
        let modified = self.store.mark_read(match_id, reader_id, now).await?;
        if modified > 0 {
            for message in &mut messages {
                message.mark_read_by(reader_id, now);
            }
        }

        Ok(messages)
    }

    /// Mark every unread message addressed to `reader_id` in the match as read
    pub async fn mark_read(&self, match_id: Uuid, reader_id: Uuid) -> Result<u64, AppError> {
        self.participant_match(match_id, reader_id).await?;

        let modified = self.store.mark_read(match_id, reader_id, Utc::now()).await?;
        tracing::debug!("Marked {} messages read in match {} for {}", modified, match_id, reader_id);
        Ok(modified)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, AppError> {
        Ok(self.store.unread_count(user_id).await?)
    }

    /// Delete a message. Only its sender may, whether or not it was read.
    pub async fn delete(&self, message_id: Uuid, requester_id: Uuid) -> Result<(), AppError> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))?;

        if message.sender != requester_id {
            return Err(AppError::AccessDenied("You can only delete your own messages".to_string()));
        }

        if !self.store.delete_message(message_id).await? {
            return Err(AppError::NotFound(format!("Message {} not found", message_id)));
        }

        tracing::debug!("Message {} deleted by {}", message_id, requester_id);
        Ok(())
    }

    async fn participant_match(&self, match_id: Uuid, user_id: Uuid) -> Result<Match, AppError> {
        let record = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| AppError::match_not_found(match_id))?;
        counterpart(&record, user_id)?;
        Ok(record)
    }
}
