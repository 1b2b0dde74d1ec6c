use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::Change;
use crate::error::AppError;
use crate::models::{
    Photo, PreferencesPatch, ProfilePatch, PublicProfile, RegisterUserRequest, User, UserSummary,
};
use crate::services::cache::{CacheKey, CacheManager};
use crate::services::store::{apply_all, Store};

/// Profile, preference and photo management for the authenticated user
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn Store>,
    cache: Arc<CacheManager>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<CacheManager>) -> Self {
        Self { store, cache }
    }

    /// Create the user document for an authenticated identity
    pub async fn register(&self, actor_id: Uuid, request: RegisterUserRequest) -> Result<PublicProfile, AppError> {
        let now = Utc::now();
        let (profile, preferences) = request.into_parts()?;

        let mut user = User::new(actor_id, profile, now);
        if let Some(patch) = preferences {
            patch.apply(&mut user)?;
        }

        if !self.store.insert_user(&user).await? {
            return Err(AppError::DuplicateAction("A profile already exists for this user".to_string()));
        }

        tracing::info!("Registered user {}", actor_id);
        Ok(user.public_profile())
    }

    pub async fn get(&self, user_id: Uuid) -> Result<PublicProfile, AppError> {
        let key = CacheKey::profile(user_id);
        match self.cache.get::<PublicProfile>(&key).await {
            Ok(Some(profile)) => return Ok(profile),
            Ok(None) => {}
            Err(e) => tracing::warn!("Profile cache read failed for {}: {}", user_id, e),
        }

        let profile = self.load(user_id).await?.public_profile();
        if let Err(e) = self.cache.set(&key, &profile).await {
            tracing::warn!("Profile cache write failed for {}: {}", user_id, e);
        }
        Ok(profile)
    }

    pub async fn update_profile(&self, user_id: Uuid, patch: ProfilePatch) -> Result<PublicProfile, AppError> {
        patch.validate()?;
        let user = self
            .modify(user_id, |user| {
                patch.apply(&mut user.profile);
                Ok(())
            })
            .await?;
        Ok(user.public_profile())
    }

    pub async fn update_preferences(&self, user_id: Uuid, patch: PreferencesPatch) -> Result<PublicProfile, AppError> {
        let user = self.modify(user_id, |user| patch.apply(user)).await?;
        Ok(user.public_profile())
    }

    /// Append a photo; the first photo of a profile becomes its main photo
    pub async fn add_photo(&self, user_id: Uuid, url: String) -> Result<Vec<Photo>, AppError> {
        let user = self
            .modify(user_id, |user| {
                user.profile.add_photo(url);
                Ok(())
            })
            .await?;
        Ok(user.profile.photos)
    }

    pub async fn set_main_photo(&self, user_id: Uuid, url: &str) -> Result<Vec<Photo>, AppError> {
        let user = self
            .modify(user_id, |user| {
                if user.profile.set_main_photo(url) {
                    Ok(())
                } else {
                    Err(AppError::NotFound("Photo not found".to_string()))
                }
            })
            .await?;
        Ok(user.profile.photos)
    }

    /// Remove a photo. Removing the main photo promotes the first remaining one.
    pub async fn remove_photo(&self, user_id: Uuid, url: &str) -> Result<Vec<Photo>, AppError> {
        let user = self
            .modify(user_id, |user| {
                if user.profile.remove_photo(url) {
                    Ok(())
                } else {
                    Err(AppError::NotFound("Photo not found".to_string()))
                }
            })
            .await?;
        Ok(user.profile.photos)
    }

    async fn load(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::user_not_found(user_id))
    }

    /// Edit a user document under its row lock and save it in the same unit of work
    async fn modify<F>(&self, user_id: Uuid, edit: F) -> Result<User, AppError>
    where
        F: FnOnce(&mut User) -> Result<(), AppError> + Send,
    {
        let mut uow = self.store.begin().await?;
        let mut user = uow
            .lock_users(&[user_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::user_not_found(user_id))?;

        edit(&mut user)?;
        user.updated_at = Utc::now();
        apply_all(uow, &[Change::SaveProfile(Box::new(user.clone()))]).await?;

        self.cache.invalidate_user(user_id).await;
        Ok(user)
    }
}

/// Look up public summaries, serving what the cache holds and filling the rest from the store
pub async fn summaries_for(
    store: &dyn Store,
    cache: &CacheManager,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, UserSummary>, AppError> {
    let mut found = HashMap::with_capacity(ids.len());
    let mut missing = Vec::new();

    for &id in ids {
        match cache.get::<UserSummary>(&CacheKey::summary(id)).await {
            Ok(Some(summary)) => {
                found.insert(id, summary);
            }
            Ok(None) => missing.push(id),
            Err(e) => {
                tracing::warn!("Summary cache read failed for {}: {}", id, e);
                missing.push(id);
            }
        }
    }

    if !missing.is_empty() {
        for summary in store.user_summaries(&missing).await? {
            if let Err(e) = cache.set(&CacheKey::summary(summary.id), &summary).await {
                tracing::warn!("Summary cache write failed for {}: {}", summary.id, e);
            }
            found.insert(summary.id, summary);
        }
    }

    tracing::debug!("Resolved {} of {} user summaries", found.len(), ids.len());
    Ok(found)
}
