// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod threads;
pub mod transitions;

pub use distance::{distance_km, haversine_distance, round_km};
pub use filters::{
    apply_distance_filter, build_discovery_query, discover_in, matches_discovery_query, page_offset,
    select_page,
};
pub use threads::{counterpart, plan_send, MAX_MESSAGE_CHARS};
pub use transitions::{
    plan_dislike, plan_like, plan_undo, plan_unmatch, Change, LikeOutcome, Transition, UndoOutcome,
};
