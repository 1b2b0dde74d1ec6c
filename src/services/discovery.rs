use std::sync::Arc;
use uuid::Uuid;

use crate::core::{apply_distance_filter, build_discovery_query};
use crate::error::AppError;
use crate::models::DiscoverResponse;
use crate::services::store::Store;

/// Paginated feed of compatible, unseen candidates
#[derive(Clone)]
pub struct DiscoveryService {
    store: Arc<dyn Store>,
    default_limit: usize,
    max_limit: usize,
}

impl DiscoveryService {
    pub fn new(store: Arc<dyn Store>, default_limit: usize, max_limit: usize) -> Self {
        Self {
            store,
            default_limit: default_limit.max(1),
            max_limit: max_limit.max(1),
        }
    }

    /// Resolve the requested page and page size against the configured bounds
    pub fn page_bounds(&self, page: Option<usize>, limit: Option<usize>) -> (usize, usize) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(self.default_limit).clamp(1, self.max_limit);
        (page, limit)
    }

    /// One discovery page for `user_id`
    ///
    /// The store paginates the static predicate; the distance filter then runs
    /// over that page, so `count` may be below `limit` even when more pages exist.
    pub async fn discover(
        &self,
        user_id: Uuid,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<DiscoverResponse, AppError> {
        let (page, limit) = self.page_bounds(page, limit);

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::user_not_found(user_id))?;

        let query = build_discovery_query(&user, page, limit);
        let profiles = self.store.discovery_page(&query).await?;
        let fetched = profiles.len();
        let candidates = apply_distance_filter(&user, profiles);

        tracing::debug!(
            "Discovery for {} page {}: {} fetched, {} within {} km",
            user_id,
            page,
            fetched,
            candidates.len(),
            user.preferences.max_distance_km
        );

        Ok(DiscoverResponse {
            count: candidates.len(),
            candidates,
            page,
            limit,
        })
    }
}
