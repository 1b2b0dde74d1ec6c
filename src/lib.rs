//! Heartline - match formation, discovery and messaging for the Heartline dating app
//!
//! Write operations are planned as pure lists of changes in [`core`] and
//! applied atomically by a [`services::Store`] unit of work.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{discover_in, haversine_distance, LikeOutcome, UndoOutcome};
pub use error::AppError;
pub use models::{Match, Message, PublicProfile, User, UserPair};
pub use services::{InMemoryStore, Store, StoreError};
