use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use heartline::config::{Settings, StoreBackend};
use heartline::error::{handle_json_payload_error, handle_path_error, handle_query_payload_error};
use heartline::routes::{self, AppState, JwtVerifier};
use heartline::services::{CacheManager, InMemoryStore, PgStore, Store};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(settings: &Settings) {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

async fn open_store(settings: &Settings) -> std::io::Result<Arc<dyn Store>> {
    match settings.database.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store = PgStore::from_settings(&settings.database).await.map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                std::io::Error::other(e.to_string())
            })?;
            info!("PostgreSQL store initialized");
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    init_logging(&settings);
    info!("Starting Heartline service...");

    let store = open_store(&settings).await?;

    // The cache degrades to its in-process tier if Redis is unreachable
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(10_000);

    let cache = match CacheManager::new(settings.cache.redis_url.as_deref(), l1_cache_size, cache_ttl).await {
        Ok(c) => {
            info!(
                "Cache manager initialized (L1: {} entries, TTL: {}s, Redis: {})",
                l1_cache_size,
                cache_ttl,
                c.has_l2()
            );
            Arc::new(c)
        }
        Err(e) => {
            warn!("Failed to connect to Redis ({}), running with in-process cache only", e);
            Arc::new(CacheManager::in_memory(l1_cache_size, cache_ttl))
        }
    };

    let app_state = AppState::new(store, cache, &settings.matching);
    let verifier = web::Data::new(JwtVerifier::new(&settings.auth.jwt_secret));

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(verifier.clone())
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .service(web::scope("/api/v1").configure(routes::configure))
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
