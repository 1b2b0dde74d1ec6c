use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::{DiscoveryCandidate, Match, Message, Photo, UserSummary};
use crate::services::CacheStats;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub cache: CacheStats,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Acknowledgement for writes with nothing else to report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

/// GET /api/v1/users/discover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub candidates: Vec<DiscoveryCandidate>,
    pub count: usize,
    pub page: usize,
    pub limit: usize,
}

/// A match as one of its participants sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchView {
    pub id: Uuid,
    /// The other participant; `None` if their profile is gone
    pub user: Option<UserSummary>,
    #[serde(rename = "matchedAt")]
    pub matched_at: DateTime<Utc>,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<Uuid>,
    #[serde(rename = "lastMessageAt")]
    pub last_message_at: DateTime<Utc>,
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

impl MatchView {
    pub fn new(record: &Match, user: Option<UserSummary>) -> Self {
        Self {
            id: record.id,
            user,
            matched_at: record.matched_at,
            last_message: record.last_message,
            last_message_at: record.last_message_at,
            is_active: record.is_active,
        }
    }
}

/// GET /api/v1/matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchView>,
    pub count: usize,
}

/// GET /api/v1/messages/{matchId}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
    pub count: usize,
    pub page: usize,
    pub limit: usize,
}

/// PUT /api/v1/messages/{matchId}/read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    #[serde(rename = "modifiedCount")]
    pub modified_count: u64,
}

/// GET /api/v1/messages/unread/count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    #[serde(rename = "unreadCount")]
    pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotosResponse {
    pub photos: Vec<Photo>,
}
