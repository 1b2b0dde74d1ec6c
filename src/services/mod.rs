// Service exports
pub mod cache;
pub mod discovery;
pub mod matching;
pub mod memory;
pub mod messaging;
pub mod postgres;
pub mod profiles;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use discovery::DiscoveryService;
pub use matching::MatchFormationService;
pub use memory::InMemoryStore;
pub use messaging::MessageThreadService;
pub use postgres::PgStore;
pub use profiles::ProfileService;
pub use store::{apply_all, Store, StoreError, UnitOfWork};
