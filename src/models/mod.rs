// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AgeRange, DiscoveryCandidate, DiscoveryQuery, Gender, InterestedIn, Location, Match, Message,
    MessageStatus, MessageType, Photo, Preferences, Profile, PublicProfile, Reactions, SameUserPair,
    User, UserPair, UserSummary,
};
pub use requests::{
    AgeRangeInput, LocationInput, PageQuery, PhotoRequest, PreferencesPatch, ProfilePatch,
    RegisterUserRequest, SendMessageRequest,
};
pub use responses::{
    ActionResponse, DiscoverResponse, ErrorResponse, HealthResponse, MarkReadResponse, MatchView,
    MatchesResponse, MessagesResponse, PhotosResponse, UnreadCountResponse,
};
