// Route exports
pub mod auth;
pub mod matches;
pub mod messages;
pub mod users;

use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::config::MatchingSettings;
use crate::models::HealthResponse;
use crate::services::{
    CacheManager, DiscoveryService, MatchFormationService, MessageThreadService, ProfileService, Store,
};

pub use auth::{AuthenticatedUser, Claims, JwtVerifier};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<CacheManager>,
    pub matches: MatchFormationService,
    pub discovery: DiscoveryService,
    pub messages: MessageThreadService,
    pub profiles: ProfileService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, cache: Arc<CacheManager>, matching: &MatchingSettings) -> Self {
        Self {
            matches: MatchFormationService::new(store.clone(), cache.clone()),
            discovery: DiscoveryService::new(store.clone(), matching.default_limit, matching.max_limit),
            messages: MessageThreadService::new(
                store.clone(),
                matching.message_page_size,
                matching.max_message_page_size,
            ),
            profiles: ProfileService::new(store.clone(), cache.clone()),
            store,
            cache,
        }
    }
}

/// Configure every route under the API scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .configure(users::configure)
        .configure(matches::configure)
        .configure(messages::configure);
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store.backend_tag().to_string(),
        cache: state.cache.stats(),
        timestamp: chrono::Utc::now(),
    })
}
