use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reactions keyed by the other user's id, valued by when they happened
pub type Reactions = HashMap<Uuid, DateTime<Utc>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// Which genders a user wants to see in discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestedIn {
    Male,
    Female,
    Both,
}

impl InterestedIn {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestedIn::Male => "male",
            InterestedIn::Female => "female",
            InterestedIn::Both => "both",
        }
    }

    /// The single gender a candidate must have, or `None` when any gender is accepted
    pub fn required_gender(&self) -> Option<Gender> {
        match self {
            InterestedIn::Male => Some(Gender::Male),
            InterestedIn::Female => Some(Gender::Female),
            InterestedIn::Both => None,
        }
    }

    #[inline]
    pub fn accepts(&self, gender: Gender) -> bool {
        self.required_gender().map_or(true, |required| required == gender)
    }
}

impl FromStr for InterestedIn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(InterestedIn::Male),
            "female" => Ok(InterestedIn::Female),
            "both" => Ok(InterestedIn::Both),
            other => Err(format!("unknown interest '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: String,
}

impl Location {
    /// Coordinates of exactly (0,0) mean the user never set a location
    #[inline]
    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            city: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    #[serde(rename = "isMain", default)]
    pub is_main: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    #[serde(rename = "interestedIn")]
    pub interested_in: InterestedIn,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub occupation: String,
}

impl Profile {
    /// URL of the main photo, falling back to the first one
    pub fn main_photo(&self) -> Option<&str> {
        self.photos
            .iter()
            .find(|photo| photo.is_main)
            .or_else(|| self.photos.first())
            .map(|photo| photo.url.as_str())
    }

    /// Append a photo; the first photo of a profile becomes the main one
    pub fn add_photo(&mut self, url: String) -> &Photo {
        let is_main = self.photos.is_empty();
        self.photos.push(Photo { url, is_main });
        &self.photos[self.photos.len() - 1]
    }

    /// Flag `url` as the main photo. Returns false if the profile has no such photo.
    pub fn set_main_photo(&mut self, url: &str) -> bool {
        if !self.photos.iter().any(|photo| photo.url == url) {
            return false;
        }
        for photo in &mut self.photos {
            photo.is_main = photo.url == url;
        }
        true
    }

    /// Remove `url`, promoting the first remaining photo if the main one was removed
    pub fn remove_photo(&mut self, url: &str) -> bool {
        let before = self.photos.len();
        self.photos.retain(|photo| photo.url != url);
        let removed = self.photos.len() != before;

        if removed && !self.photos.iter().any(|photo| photo.is_main) {
            if let Some(first) = self.photos.first_mut() {
                first.is_main = true;
            }
        }
        removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    #[inline]
    pub fn contains(&self, age: u8) -> bool {
        age >= self.min && age <= self.max
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self { min: 18, max: 50 }
    }
}

/// Discovery preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "ageRange", default)]
    pub age_range: AgeRange,
    #[serde(rename = "maxDistance", default = "default_max_distance")]
    pub max_distance_km: u16,
}

fn default_max_distance() -> u16 { 50 }

impl Default for Preferences {
    fn default() -> Self {
        Self {
            age_range: AgeRange::default(),
            max_distance_km: default_max_distance(),
        }
    }
}

/// A user document: profile, preferences and the relation maps the match
/// workflow maintains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub profile: Profile,
    pub preferences: Preferences,
    #[serde(default)]
    pub likes: Reactions,
    #[serde(default)]
    pub dislikes: Reactions,
    #[serde(default)]
    pub matches: Reactions,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "lastActive")]
    pub last_active: DateTime<Utc>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: Uuid, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            id,
            profile,
            preferences: Preferences::default(),
            likes: Reactions::new(),
            dislikes: Reactions::new(),
            matches: Reactions::new(),
            is_active: true,
            is_online: false,
            last_active: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn likes_user(&self, other: Uuid) -> bool {
        self.likes.contains_key(&other)
    }

    #[inline]
    pub fn dislikes_user(&self, other: Uuid) -> bool {
        self.dislikes.contains_key(&other)
    }

    #[inline]
    pub fn is_matched_with(&self, other: Uuid) -> bool {
        self.matches.contains_key(&other)
    }

    /// Ids this user has already reacted to, hidden from discovery
    pub fn seen_user_ids(&self) -> HashSet<Uuid> {
        self.likes.keys().chain(self.dislikes.keys()).copied().collect()
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.profile.name.clone(),
            age: self.profile.age,
            main_photo: self.profile.main_photo().map(str::to_string),
            is_online: self.is_online,
            last_active: self.last_active,
        }
    }

    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            profile: self.profile.clone(),
            preferences: self.preferences.clone(),
            is_online: self.is_online,
            last_active: self.last_active,
        }
    }
}

/// Card shown next to a match or message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub age: u8,
    #[serde(rename = "mainPhoto")]
    pub main_photo: Option<String>,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "lastActive")]
    pub last_active: DateTime<Utc>,
}

/// Profile as other users (and the owner) see it, without relation maps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub profile: Profile,
    pub preferences: Preferences,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
    #[serde(rename = "lastActive")]
    pub last_active: DateTime<Utc>,
}

/// Unordered pair of two distinct users, stored low id first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[Uuid; 2]", try_from = "[Uuid; 2]")]
pub struct UserPair {
    low: Uuid,
    high: Uuid,
}

impl UserPair {
    /// Returns `None` when both ids are the same user
    pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    #[inline]
    pub fn contains(&self, id: Uuid) -> bool {
        self.low == id || self.high == id
    }

    /// The member of the pair that is not `id`
    pub fn other(&self, id: Uuid) -> Option<Uuid> {
        if id == self.low {
            Some(self.high)
        } else if id == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

impl From<UserPair> for [Uuid; 2] {
    fn from(pair: UserPair) -> Self {
        [pair.low, pair.high]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SameUserPair(pub Uuid);

impl fmt::Display for SameUserPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a match needs two distinct users, got {} twice", self.0)
    }
}

impl TryFrom<[Uuid; 2]> for UserPair {
    type Error = SameUserPair;

    fn try_from(ids: [Uuid; 2]) -> Result<Self, Self::Error> {
        UserPair::new(ids[0], ids[1]).ok_or(SameUserPair(ids[0]))
    }
}

/// Persisted record of mutual interest between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub users: UserPair,
    #[serde(rename = "matchedAt")]
    pub matched_at: DateTime<Utc>,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<Uuid>,
    #[serde(rename = "lastMessageAt")]
    pub last_message_at: DateTime<Utc>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn new(users: UserPair, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            users,
            matched_at: now,
            is_active: true,
            last_message: None,
            last_message_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Gif,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Gif => "gif",
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "gif" => Ok(MessageType::Gif),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

/// Delivery state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(rename = "match")]
    pub match_id: Uuid,
    pub sender: Uuid,
    pub receiver: Uuid,
    pub content: String,
    #[serde(rename = "messageType")]
    pub message_type: MessageType,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(rename = "isRead")]
    pub is_read: bool,
    #[serde(rename = "readAt")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(rename = "isDelivered")]
    pub is_delivered: bool,
    #[serde(rename = "deliveredAt")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn status(&self) -> MessageStatus {
        if self.is_read {
            MessageStatus::Read
        } else if self.is_delivered {
            MessageStatus::Delivered
        } else {
            MessageStatus::Sent
        }
    }

    /// Flip an unread inbound message to read. Returns whether anything changed.
    pub fn mark_read_by(&mut self, reader: Uuid, at: DateTime<Utc>) -> bool {
        if self.receiver != reader || self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(at);
        true
    }
}

/// Candidate query parameters handed to the store for a discovery page
#[derive(Debug, Clone)]
pub struct DiscoveryQuery {
    pub requester_id: Uuid,
    pub age_range: AgeRange,
    pub interested_in: InterestedIn,
    pub exclude_user_ids: HashSet<Uuid>,
    pub offset: usize,
    pub limit: usize,
}

/// A discovery result with its distance from the requester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryCandidate {
    #[serde(flatten)]
    pub user: PublicProfile,
    /// `None` for candidates without a location
    #[serde(rename = "distanceKm")]
    pub distance_km: Option<f64>,
}
