use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::transitions::{Change, Transition};
use crate::error::AppError;
use crate::models::{Match, Message, MessageType};

/// Longest message body accepted, in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Return the other participant, or deny access to outsiders
pub fn counterpart(record: &Match, user_id: Uuid) -> Result<Uuid, AppError> {
    record.users.other(user_id).ok_or_else(AppError::match_access_denied)
}

/// Plan sending a message into a match thread
///
/// The message is delivered on creation; it becomes read when the receiver
/// opens the thread.
pub fn plan_send(
    record: &Match,
    sender: Uuid,
    content: &str,
    message_type: MessageType,
    image_url: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transition<Message>, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message content is required".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let receiver = counterpart(record, sender)?;

    if !record.is_active {
        return Err(AppError::InactiveMatch(
            "Cannot send message to inactive match".to_string(),
        ));
    }

    let message = Message {
        id: Uuid::new_v4(),
        match_id: record.id,
        sender,
        receiver,
        content: content.to_string(),
        message_type,
        image_url,
        is_read: false,
        read_at: None,
        is_delivered: true,
        delivered_at: Some(now),
        created_at: now,
    };

    Ok(Transition {
        changes: vec![
            Change::AppendMessage(message.clone()),
            Change::TouchMatch { match_id: record.id, message_id: message.id, at: now },
        ],
        outcome: message,
    })
}
