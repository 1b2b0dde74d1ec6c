use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseSettings;
use crate::core::Change;
use crate::models::{
    AgeRange, DiscoveryQuery, Location, Match, Message, Photo, Preferences, Profile, PublicProfile,
    Reactions, User, UserPair, UserSummary,
};
use crate::services::store::{Store, StoreError, UnitOfWork};

const SELECT_USERS: &str = r#"
    SELECT id, name, age, gender, interested_in, bio, latitude, longitude, city,
           photos, interests, education, occupation, min_age, max_age, max_distance_km,
           is_active, is_online, last_active, created_at, updated_at
    FROM users
"#;

const SELECT_MATCHES: &str = r#"
    SELECT id, user_low, user_high, matched_at, is_active, last_message_id,
           last_message_at, created_at, updated_at
    FROM matches
"#;

const SELECT_MESSAGES: &str = r#"
    SELECT id, match_id, sender_id, receiver_id, content, message_type, image_url,
           is_read, read_at, is_delivered, delivered_at, created_at
    FROM messages
"#;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    age: i16,
    gender: String,
    interested_in: String,
    bio: String,
    latitude: f64,
    longitude: f64,
    city: String,
    photos: Json<Vec<Photo>>,
    interests: Vec<String>,
    education: String,
    occupation: String,
    min_age: i16,
    max_age: i16,
    max_distance_km: i16,
    is_active: bool,
    is_online: bool,
    last_active: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn narrow<T: TryFrom<i16>>(value: i16, field: &str) -> Result<T, StoreError> {
    T::try_from(value).map_err(|_| StoreError::Corrupt(format!("{} out of range: {}", field, value)))
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            profile: Profile {
                name: row.name,
                age: narrow(row.age, "age")?,
                gender: row.gender.parse().map_err(StoreError::Corrupt)?,
                interested_in: row.interested_in.parse().map_err(StoreError::Corrupt)?,
                bio: row.bio,
                location: Location {
                    latitude: row.latitude,
                    longitude: row.longitude,
                    city: row.city,
                },
                photos: row.photos.0,
                interests: row.interests,
                education: row.education,
                occupation: row.occupation,
            },
            preferences: Preferences {
                age_range: AgeRange {
                    min: narrow(row.min_age, "min_age")?,
                    max: narrow(row.max_age, "max_age")?,
                },
                max_distance_km: narrow(row.max_distance_km, "max_distance_km")?,
            },
            likes: Reactions::new(),
            dislikes: Reactions::new(),
            matches: Reactions::new(),
            is_active: row.is_active,
            is_online: row.is_online,
            last_active: row.last_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: Uuid,
    user_low: Uuid,
    user_high: Uuid,
    matched_at: DateTime<Utc>,
    is_active: bool,
    last_message_id: Option<Uuid>,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for Match {
    type Error = StoreError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let users = UserPair::new(row.user_low, row.user_high)
            .ok_or_else(|| StoreError::Corrupt(format!("match {} pairs a user with themselves", row.id)))?;
        Ok(Match {
            id: row.id,
            users,
            matched_at: row.matched_at,
            is_active: row.is_active,
            last_message: row.last_message_id,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    match_id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
    message_type: String,
    image_url: Option<String>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            match_id: row.match_id,
            sender: row.sender_id,
            receiver: row.receiver_id,
            content: row.content,
            message_type: row.message_type.parse().map_err(StoreError::Corrupt)?,
            image_url: row.image_url,
            is_read: row.is_read,
            read_at: row.read_at,
            is_delivered: row.is_delivered,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
        })
    }
}

/// LIMIT/OFFSET value for a row count, saturating at the largest BIGINT
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn into_domain<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Fill the like, dislike and match maps of already loaded users
async fn load_relations(conn: &mut PgConnection, users: &mut [User]) -> Result<(), StoreError> {
    if users.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let mut likes: HashMap<Uuid, Reactions> = HashMap::new();
    let mut dislikes: HashMap<Uuid, Reactions> = HashMap::new();
    let mut matches: HashMap<Uuid, Reactions> = HashMap::new();

    let tables = [
        ("SELECT user_id, target_id AS other_id, liked_at AS at FROM user_likes WHERE user_id = ANY($1)", &mut likes),
        ("SELECT user_id, target_id AS other_id, disliked_at AS at FROM user_dislikes WHERE user_id = ANY($1)", &mut dislikes),
        ("SELECT user_id, other_id, matched_at AS at FROM user_matches WHERE user_id = ANY($1)", &mut matches),
    ];

    for (query, into) in tables {
        let rows = sqlx::query(query).bind(&ids).fetch_all(&mut *conn).await?;
        for row in rows {
            into.entry(row.get("user_id"))
                .or_default()
                .insert(row.get("other_id"), row.get("at"));
        }
    }

    for user in users.iter_mut() {
        user.likes = likes.remove(&user.id).unwrap_or_default();
        user.dislikes = dislikes.remove(&user.id).unwrap_or_default();
        user.matches = matches.remove(&user.id).unwrap_or_default();
    }

    Ok(())
}

/// PostgreSQL-backed user directory
///
/// Multi-document writes run inside one transaction; user rows are locked in
/// id order so concurrent likes on the same pair serialize.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store from a connection string and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new store from settings
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        tracing::info!(
            "Connecting to PostgreSQL (max: {} connections)",
            settings.max_connections.unwrap_or(10)
        );

        Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(1),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_users(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let query = format!("{} WHERE id = ANY($1) ORDER BY id FOR UPDATE", SELECT_USERS);
        let rows: Vec<UserRow> = sqlx::query_as(&query).bind(ids).fetch_all(&mut *self.tx).await?;

        let mut users: Vec<User> = into_domain(rows)?;
        load_relations(&mut self.tx, &mut users).await?;
        Ok(users)
    }

    async fn lock_match(&mut self, id: Uuid) -> Result<Option<Match>, StoreError> {
        let query = format!("{} WHERE id = $1 FOR UPDATE", SELECT_MATCHES);
        let row: Option<MatchRow> = sqlx::query_as(&query).bind(id).fetch_optional(&mut *self.tx).await?;
        row.map(Match::try_from).transpose()
    }

    async fn active_match_between(&mut self, pair: UserPair) -> Result<Option<Match>, StoreError> {
        let query = format!(
            "{} WHERE user_low = $1 AND user_high = $2 AND is_active FOR UPDATE",
            SELECT_MATCHES
        );
        let row: Option<MatchRow> = sqlx::query_as(&query)
            .bind(pair.low())
            .bind(pair.high())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Match::try_from).transpose()
    }

    async fn apply(&mut self, change: &Change) -> Result<(), StoreError> {
        let conn = &mut *self.tx;

        match change {
            Change::RecordLike { actor, target, at } => {
                sqlx::query(
                    r#"
                    INSERT INTO user_likes (user_id, target_id, liked_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id, target_id) DO UPDATE SET liked_at = EXCLUDED.liked_at
                    "#,
                )
                .bind(actor)
                .bind(target)
                .bind(at)
                .execute(conn)
                .await?;
            }
            Change::RemoveLike { actor, target } => {
                sqlx::query("DELETE FROM user_likes WHERE user_id = $1 AND target_id = $2")
                    .bind(actor)
                    .bind(target)
                    .execute(conn)
                    .await?;
            }
            Change::RecordDislike { actor, target, at } => {
                sqlx::query(
                    r#"
                    INSERT INTO user_dislikes (user_id, target_id, disliked_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id, target_id) DO UPDATE SET disliked_at = EXCLUDED.disliked_at
                    "#,
                )
                .bind(actor)
                .bind(target)
                .bind(at)
                .execute(conn)
                .await?;
            }
            Change::RemoveDislike { actor, target } => {
                sqlx::query("DELETE FROM user_dislikes WHERE user_id = $1 AND target_id = $2")
                    .bind(actor)
                    .bind(target)
                    .execute(conn)
                    .await?;
            }
            Change::CreateMatch(record) => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO matches (id, user_low, user_high, matched_at, is_active,
                                         last_message_id, last_message_at, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    ON CONFLICT (user_low, user_high) WHERE is_active DO NOTHING
                    "#,
                )
                .bind(record.id)
                .bind(record.users.low())
                .bind(record.users.high())
                .bind(record.matched_at)
                .bind(record.is_active)
                .bind(record.last_message)
                .bind(record.last_message_at)
                .bind(record.created_at)
                .bind(record.updated_at)
                .execute(conn)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict(format!(
                        "an active match already exists for {:?}",
                        record.users
                    )));
                }
            }
            Change::AddMatchEntry { owner, other, at } => {
                sqlx::query(
                    r#"
                    INSERT INTO user_matches (user_id, other_id, matched_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id, other_id) DO UPDATE SET matched_at = EXCLUDED.matched_at
                    "#,
                )
                .bind(owner)
                .bind(other)
                .bind(at)
                .execute(conn)
                .await?;
            }
            Change::RemoveMatchEntry { owner, other } => {
                sqlx::query("DELETE FROM user_matches WHERE user_id = $1 AND other_id = $2")
                    .bind(owner)
                    .bind(other)
                    .execute(conn)
                    .await?;
            }
            Change::DeactivateMatch { match_id, at } => {
                sqlx::query("UPDATE matches SET is_active = FALSE, updated_at = $2 WHERE id = $1")
                    .bind(match_id)
                    .bind(at)
                    .execute(conn)
                    .await?;
            }
            Change::AppendMessage(message) => {
                sqlx::query(
                    r#"
                    INSERT INTO messages (id, match_id, sender_id, receiver_id, content, message_type,
                                          image_url, is_read, read_at, is_delivered, delivered_at, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    "#,
                )
                .bind(message.id)
                .bind(message.match_id)
                .bind(message.sender)
                .bind(message.receiver)
                .bind(&message.content)
                .bind(message.message_type.as_str())
                .bind(&message.image_url)
                .bind(message.is_read)
                .bind(message.read_at)
                .bind(message.is_delivered)
                .bind(message.delivered_at)
                .bind(message.created_at)
                .execute(conn)
                .await?;
            }
            Change::TouchMatch { match_id, message_id, at } => {
                sqlx::query(
                    r#"
                    UPDATE matches
                    SET last_message_id = $2, last_message_at = $3, updated_at = $3
                    WHERE id = $1
                    "#,
                )
                .bind(match_id)
                .bind(message_id)
                .bind(at)
                .execute(conn)
                .await?;
            }
            Change::SaveProfile(user) => {
                let result = sqlx::query(
                    r#"
                    UPDATE users
                    SET name = $2, age = $3, gender = $4, interested_in = $5, bio = $6,
                        latitude = $7, longitude = $8, city = $9, photos = $10, interests = $11,
                        education = $12, occupation = $13, min_age = $14, max_age = $15,
                        max_distance_km = $16, is_active = $17, is_online = $18,
                        last_active = $19, updated_at = $20
                    WHERE id = $1
                    "#,
                )
                .bind(user.id)
                .bind(&user.profile.name)
                .bind(user.profile.age as i16)
                .bind(user.profile.gender.as_str())
                .bind(user.profile.interested_in.as_str())
                .bind(&user.profile.bio)
                .bind(user.profile.location.latitude)
                .bind(user.profile.location.longitude)
                .bind(&user.profile.location.city)
                .bind(Json(&user.profile.photos))
                .bind(&user.profile.interests)
                .bind(&user.profile.education)
                .bind(&user.profile.occupation)
                .bind(user.preferences.age_range.min as i16)
                .bind(user.preferences.age_range.max as i16)
                .bind(user.preferences.max_distance_km as i16)
                .bind(user.is_active)
                .bind(user.is_online)
                .bind(user.last_active)
                .bind(user.updated_at)
                .execute(conn)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict(format!("user {} no longer exists", user.id)));
                }
            }
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgUnitOfWork { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let query = format!("{} WHERE id = $1", SELECT_USERS);
        let row: Option<UserRow> = sqlx::query_as(&query).bind(id).fetch_optional(&mut *conn).await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut users = vec![User::try_from(row)?];
        load_relations(&mut conn, &mut users).await?;
        Ok(users.pop())
    }

    async fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, age, gender, interested_in, bio, latitude, longitude, city,
                               photos, interests, education, occupation, min_age, max_age,
                               max_distance_km, is_active, is_online, last_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.profile.name)
        .bind(user.profile.age as i16)
        .bind(user.profile.gender.as_str())
        .bind(user.profile.interested_in.as_str())
        .bind(&user.profile.bio)
        .bind(user.profile.location.latitude)
        .bind(user.profile.location.longitude)
        .bind(&user.profile.location.city)
        .bind(Json(&user.profile.photos))
        .bind(&user.profile.interests)
        .bind(&user.profile.education)
        .bind(&user.profile.occupation)
        .bind(user.preferences.age_range.min as i16)
        .bind(user.preferences.age_range.max as i16)
        .bind(user.preferences.max_distance_km as i16)
        .bind(user.is_active)
        .bind(user.is_online)
        .bind(user.last_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        let query = format!("{} WHERE id = ANY($1)", SELECT_USERS);
        let rows: Vec<UserRow> = sqlx::query_as(&query).bind(ids).fetch_all(&self.pool).await?;
        let users: Vec<User> = into_domain(rows)?;
        Ok(users.iter().map(User::summary).collect())
    }

    async fn discovery_page(&self, query: &DiscoveryQuery) -> Result<Vec<PublicProfile>, StoreError> {
        let sql = format!(
            r#"{}
            WHERE id <> $1
              AND is_active
              AND age BETWEEN $2 AND $3
              AND ($4::TEXT IS NULL OR gender = $4)
              AND NOT (id = ANY($5))
            ORDER BY id
            LIMIT $6 OFFSET $7"#,
            SELECT_USERS
        );
        let exclude: Vec<Uuid> = query.exclude_user_ids.iter().copied().collect();

        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(query.requester_id)
            .bind(query.age_range.min as i16)
            .bind(query.age_range.max as i16)
            .bind(query.interested_in.required_gender().map(|g| g.as_str()))
            .bind(&exclude)
            .bind(sql_count(query.limit))
            .bind(sql_count(query.offset))
            .fetch_all(&self.pool)
            .await?;

        let users: Vec<User> = into_domain(rows)?;
        tracing::debug!("Discovery page for {} holds {} candidates", query.requester_id, users.len());
        Ok(users.iter().map(User::public_profile).collect())
    }

    async fn get_match(&self, id: Uuid) -> Result<Option<Match>, StoreError> {
        let query = format!("{} WHERE id = $1", SELECT_MATCHES);
        let row: Option<MatchRow> = sqlx::query_as(&query).bind(id).fetch_optional(&self.pool).await?;
        row.map(Match::try_from).transpose()
    }

    async fn active_matches_for(&self, user_id: Uuid) -> Result<Vec<Match>, StoreError> {
        let query = format!(
            "{} WHERE is_active AND (user_low = $1 OR user_high = $1) ORDER BY last_message_at DESC, id",
            SELECT_MATCHES
        );
        let rows: Vec<MatchRow> = sqlx::query_as(&query).bind(user_id).fetch_all(&self.pool).await?;
        into_domain(rows)
    }

    async fn messages_page(&self, match_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Message>, StoreError> {
        let query = format!(
            "{} WHERE match_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            SELECT_MESSAGES
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&query)
            .bind(match_id)
            .bind(sql_count(limit))
            .bind(sql_count(offset))
            .fetch_all(&self.pool)
            .await?;
        into_domain(rows)
    }

    async fn mark_read(&self, match_id: Uuid, reader: Uuid, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE, read_at = $3
            WHERE match_id = $1 AND receiver_id = $2 AND NOT is_read
            "#,
        )
        .bind(match_id)
        .bind(reader)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS unread FROM messages WHERE receiver_id = $1 AND NOT is_read")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let unread: i64 = row.get("unread");
        Ok(unread.max(0) as u64)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let query = format!("{} WHERE id = $1", SELECT_MESSAGES);
        let row: Option<MessageRow> = sqlx::query_as(&query).bind(id).fetch_optional(&self.pool).await?;
        row.map(Message::try_from).transpose()
    }

    async fn delete_message(&self, id: Uuid) -> Result<bool, StoreError> {
        // matches.last_message_id is cleared by ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
