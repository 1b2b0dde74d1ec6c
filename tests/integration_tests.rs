// Integration tests for Heartline services over the in-memory store

use heartline::config::MatchingSettings;
use heartline::error::AppError;
use heartline::models::{Gender, InterestedIn, LocationInput, MessageType, PreferencesPatch, ProfilePatch, RegisterUserRequest};
use heartline::routes::AppState;
use heartline::services::{CacheManager, InMemoryStore, Store};
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    store: InMemoryStore,
    state: AppState,
}

fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let cache = Arc::new(CacheManager::in_memory(1000, 60));
    let state = AppState::new(shared, cache, &MatchingSettings::default());
    Fixture { store, state }
}

fn registration(name: &str, age: u8, gender: Gender) -> RegisterUserRequest {
    RegisterUserRequest {
        name: name.to_string(),
        age,
        gender,
        interested_in: InterestedIn::Both,
        bio: String::new(),
        location: None,
        interests: vec![],
        education: String::new(),
        occupation: String::new(),
        preferences: None,
    }
}

async fn register(fx: &Fixture, name: &str, age: u8, gender: Gender) -> Uuid {
    let id = Uuid::new_v4();
    fx.state.profiles.register(id, registration(name, age, gender)).await.unwrap();
    id
}

async fn matched_pair(fx: &Fixture) -> (Uuid, Uuid, Uuid) {
    let a = register(fx, "Alice", 28, Gender::Female).await;
    let b = register(fx, "Bob", 30, Gender::Male).await;
    fx.state.matches.like(a, b).await.unwrap();
    let outcome = fx.state.matches.like(b, a).await.unwrap();
    (a, b, outcome.matched.unwrap().id)
}

#[tokio::test]
async fn test_mutual_like_creates_one_match_in_either_order() {
    for reversed in [false, true] {
        let fx = fixture();
        let a = register(&fx, "Alice", 28, Gender::Female).await;
        let b = register(&fx, "Bob", 30, Gender::Male).await;
        let (first, second) = if reversed { (b, a) } else { (a, b) };

        let outcome = fx.state.matches.like(first, second).await.unwrap();
        assert!(!outcome.is_match);
        let outcome = fx.state.matches.like(second, first).await.unwrap();
        assert!(outcome.is_match);

        let active: Vec<_> = fx.store.all_matches().await.into_iter().filter(|m| m.is_active).collect();
        assert_eq!(active.len(), 1);
        assert!(active[0].users.contains(a) && active[0].users.contains(b));

        let a_doc = fx.store.get_user(a).await.unwrap().unwrap();
        let b_doc = fx.store.get_user(b).await.unwrap().unwrap();
        assert!(a_doc.matches.contains_key(&b));
        assert!(b_doc.matches.contains_key(&a));
    }
}

#[tokio::test]
async fn test_racing_mutual_likes_create_exactly_one_match() {
    for _ in 0..20 {
        let fx = fixture();
        let a = register(&fx, "Alice", 28, Gender::Female).await;
        let b = register(&fx, "Bob", 30, Gender::Male).await;

        let left = fx.state.matches.clone();
        let right = fx.state.matches.clone();
        let first = tokio::spawn(async move { left.like(a, b).await });
        let second = tokio::spawn(async move { right.like(b, a).await });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert!(first.is_match || second.is_match);
        assert_eq!(fx.store.all_matches().await.len(), 1);
    }
}

#[tokio::test]
async fn test_like_errors() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;
    let b = register(&fx, "Bob", 30, Gender::Male).await;

    assert!(matches!(fx.state.matches.like(a, a).await, Err(AppError::SelfAction(_))));
    assert!(matches!(fx.state.matches.like(a, Uuid::new_v4()).await, Err(AppError::NotFound(_))));

    fx.state.matches.like(a, b).await.unwrap();
    assert!(matches!(fx.state.matches.like(a, b).await, Err(AppError::DuplicateAction(_))));

    let a_doc = fx.store.get_user(a).await.unwrap().unwrap();
    assert_eq!(a_doc.likes.len(), 1);
}

#[tokio::test]
async fn test_like_then_dislike() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;
    let b = register(&fx, "Bob", 30, Gender::Male).await;

    fx.state.matches.like(a, b).await.unwrap();
    fx.state.matches.dislike(a, b).await.unwrap();

    let a_doc = fx.store.get_user(a).await.unwrap().unwrap();
    assert!(!a_doc.likes.contains_key(&b));
    assert!(a_doc.dislikes.contains_key(&b));
    assert!(matches!(fx.state.matches.dislike(a, b).await, Err(AppError::DuplicateAction(_))));
}

#[tokio::test]
async fn test_undo_retires_match_and_is_repeatable() {
    let fx = fixture();
    let (a, b, match_id) = matched_pair(&fx).await;

    let outcome = fx.state.matches.undo(a, b).await.unwrap();
    assert!(outcome.removed_like);
    assert_eq!(outcome.retired_match, Some(match_id));

    let a_doc = fx.store.get_user(a).await.unwrap().unwrap();
    let b_doc = fx.store.get_user(b).await.unwrap().unwrap();
    assert!(a_doc.matches.is_empty());
    assert!(b_doc.matches.is_empty());
    assert!(!fx.store.get_match(match_id).await.unwrap().unwrap().is_active);

    let again = fx.state.matches.undo(a, b).await.unwrap();
    assert!(!again.removed_like && !again.removed_dislike);
    assert_eq!(again.retired_match, None);

    assert!(matches!(fx.state.matches.undo(a, a).await, Err(AppError::SelfAction(_))));
}

#[tokio::test]
async fn test_rematch_after_undo_creates_fresh_record() {
    let fx = fixture();
    let (a, b, first) = matched_pair(&fx).await;

    fx.state.matches.undo(a, b).await.unwrap();
    let outcome = fx.state.matches.like(a, b).await.unwrap();
    let second = outcome.matched.unwrap().id;

    assert_ne!(first, second);
    assert_eq!(fx.store.all_matches().await.len(), 2);
}

#[tokio::test]
async fn test_unmatch_access_and_idempotence() {
    let fx = fixture();
    let (a, b, match_id) = matched_pair(&fx).await;
    let outsider = register(&fx, "Eve", 35, Gender::Female).await;

    assert!(matches!(
        fx.state.matches.unmatch(match_id, outsider).await,
        Err(AppError::AccessDenied(_))
    ));
    assert!(matches!(
        fx.state.matches.unmatch(Uuid::new_v4(), a).await,
        Err(AppError::NotFound(_))
    ));

    fx.state.matches.unmatch(match_id, b).await.unwrap();
    fx.state.matches.unmatch(match_id, a).await.unwrap();

    assert!(fx.state.matches.list_matches(a).await.unwrap().is_empty());
    let view = fx.state.matches.get_match(match_id, a).await.unwrap();
    assert!(!view.is_active);
}

#[tokio::test]
async fn test_list_matches_carries_other_user() {
    let fx = fixture();
    let (a, b, match_id) = matched_pair(&fx).await;

    let matches = fx.state.matches.list_matches(a).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, match_id);
    let other = matches[0].user.as_ref().unwrap();
    assert_eq!(other.id, b);
    assert_eq!(other.name, "Bob");
}

#[tokio::test]
async fn test_discovery_hides_seen_users_and_self() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;
    let b = register(&fx, "Bob", 30, Gender::Male).await;
    let c = register(&fx, "Carol", 31, Gender::Female).await;
    let old = register(&fx, "Dan", 70, Gender::Male).await;

    fx.state.matches.dislike(a, b).await.unwrap();

    let page = fx.state.discovery.discover(a, None, None).await.unwrap();
    let ids: Vec<Uuid> = page.candidates.iter().map(|c| c.user.id).collect();
    assert_eq!(ids, vec![c]);
    assert!(!ids.contains(&old));
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 10);
}

#[tokio::test]
async fn test_discovery_limit_is_capped() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;

    let page = fx.state.discovery.discover(a, Some(0), Some(1000)).await.unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 100);
}

#[tokio::test]
async fn test_discovery_applies_distance_after_pagination() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;
    fx.state
        .profiles
        .update_preferences(a, PreferencesPatch { max_distance: Some(10), ..Default::default() })
        .await
        .unwrap();

    let mut far = registration("Far", 30, Gender::Male);
    far.location = Some(LocationInput { latitude: 50.0, longitude: 50.0, city: String::new() });
    fx.state.profiles.register(Uuid::new_v4(), far).await.unwrap();
    let near = register(&fx, "Near", 30, Gender::Male).await;

    let page = fx.state.discovery.discover(a, Some(1), Some(10)).await.unwrap();
    let ids: Vec<Uuid> = page.candidates.iter().map(|c| c.user.id).collect();
    assert_eq!(ids, vec![near]);
}

#[tokio::test]
async fn test_message_flow() {
    let fx = fixture();
    let (a, b, match_id) = matched_pair(&fx).await;

    let sent = fx
        .state
        .messages
        .send(match_id, a, "  hello  ", MessageType::Text, None)
        .await
        .unwrap();
    assert_eq!(sent.content, "hello");
    assert_eq!(sent.receiver, b);
    assert!(sent.is_delivered);

    let record = fx.store.get_match(match_id).await.unwrap().unwrap();
    assert_eq!(record.last_message, Some(sent.id));

    fx.state.messages.send(match_id, b, "hi back", MessageType::Text, None).await.unwrap();
    assert_eq!(fx.state.messages.unread_count(b).await.unwrap(), 1);
    assert_eq!(fx.state.messages.unread_count(a).await.unwrap(), 1);

    // Only inbound messages of the reader are touched
    assert_eq!(fx.state.messages.mark_read(match_id, b).await.unwrap(), 1);
    assert_eq!(fx.state.messages.unread_count(b).await.unwrap(), 0);
    assert_eq!(fx.state.messages.unread_count(a).await.unwrap(), 1);

    let thread = fx.state.messages.list(match_id, a, 1, 50).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].id, sent.id);
    assert!(thread.iter().all(|m| m.is_read));
}

#[tokio::test]
async fn test_send_errors() {
    let fx = fixture();
    let (a, b, match_id) = matched_pair(&fx).await;
    let outsider = register(&fx, "Eve", 35, Gender::Female).await;

    let blank = fx.state.messages.send(match_id, a, "   ", MessageType::Text, None).await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let long = "x".repeat(1001);
    let too_long = fx.state.messages.send(match_id, a, &long, MessageType::Text, None).await;
    assert!(matches!(too_long, Err(AppError::Validation(_))));

    let denied = fx.state.messages.send(match_id, outsider, "hi", MessageType::Text, None).await;
    assert!(matches!(denied, Err(AppError::AccessDenied(_))));

    fx.state.matches.unmatch(match_id, b).await.unwrap();
    let inactive = fx.state.messages.send(match_id, a, "hi", MessageType::Text, None).await;
    assert!(matches!(inactive, Err(AppError::InactiveMatch(_))));

    let missing = fx.state.messages.send(Uuid::new_v4(), a, "hi", MessageType::Text, None).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_message_is_sender_only_and_clears_pointer() {
    let fx = fixture();
    let (a, b, match_id) = matched_pair(&fx).await;
    let sent = fx.state.messages.send(match_id, a, "oops", MessageType::Text, None).await.unwrap();

    assert!(matches!(
        fx.state.messages.delete(sent.id, b).await,
        Err(AppError::AccessDenied(_))
    ));

    fx.state.messages.delete(sent.id, a).await.unwrap();
    let record = fx.store.get_match(match_id).await.unwrap().unwrap();
    assert_eq!(record.last_message, None);
    assert!(matches!(fx.state.messages.delete(sent.id, a).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_profile_lifecycle() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;

    assert!(matches!(
        fx.state.profiles.register(a, registration("Again", 28, Gender::Female)).await,
        Err(AppError::DuplicateAction(_))
    ));

    // Prime the cache, then make sure a write is visible on the next read
    fx.state.profiles.get(a).await.unwrap();
    fx.state
        .profiles
        .update_profile(a, ProfilePatch { bio: Some("Climber".to_string()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(fx.state.profiles.get(a).await.unwrap().profile.bio, "Climber");

    let bad = ProfilePatch { age: Some(12), ..Default::default() };
    assert!(matches!(fx.state.profiles.update_profile(a, bad).await, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_photo_management() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;

    let photos = fx.state.profiles.add_photo(a, "https://cdn.test/1.jpg".to_string()).await.unwrap();
    assert!(photos[0].is_main);
    let photos = fx.state.profiles.add_photo(a, "https://cdn.test/2.jpg".to_string()).await.unwrap();
    assert!(!photos[1].is_main);

    let photos = fx.state.profiles.set_main_photo(a, "https://cdn.test/2.jpg").await.unwrap();
    assert!(photos[1].is_main && !photos[0].is_main);

    let photos = fx.state.profiles.remove_photo(a, "https://cdn.test/2.jpg").await.unwrap();
    assert_eq!(photos.len(), 1);
    assert!(photos[0].is_main);

    assert!(matches!(
        fx.state.profiles.set_main_photo(a, "https://cdn.test/missing.jpg").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_out_of_range_pages_are_empty() {
    let fx = fixture();
    let (a, _, match_id) = matched_pair(&fx).await;
    register(&fx, "Carol", 31, Gender::Female).await;
    fx.state.messages.send(match_id, a, "hello", MessageType::Text, None).await.unwrap();

    let page = fx.state.discovery.discover(a, Some(usize::MAX), Some(10)).await.unwrap();
    assert!(page.candidates.is_empty());
    assert_eq!(page.page, usize::MAX);

    let thread = fx.state.messages.list(match_id, a, usize::MAX, 50).await.unwrap();
    assert!(thread.is_empty());
}

#[tokio::test]
async fn test_blank_names_are_rejected() {
    let fx = fixture();

    let blank = fx.state.profiles.register(Uuid::new_v4(), registration("   ", 28, Gender::Female)).await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let a = register(&fx, "Alice", 28, Gender::Female).await;
    let patch = ProfilePatch { name: Some(" \t ".to_string()), ..Default::default() };
    assert!(matches!(fx.state.profiles.update_profile(a, patch).await, Err(AppError::Validation(_))));
    assert_eq!(fx.state.profiles.get(a).await.unwrap().profile.name, "Alice");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_photo_uploads_keep_every_photo() {
    let fx = fixture();
    let a = register(&fx, "Alice", 28, Gender::Female).await;

    let uploads: Vec<_> = (0..10)
        .map(|i| {
            let profiles = fx.state.profiles.clone();
            tokio::spawn(async move { profiles.add_photo(a, format!("https://cdn.test/{}.jpg", i)).await })
        })
        .collect();
    for upload in uploads {
        upload.await.unwrap().unwrap();
    }

    let stored = fx.store.get_user(a).await.unwrap().unwrap();
    assert_eq!(stored.profile.photos.len(), 10);
    assert_eq!(stored.profile.photos.iter().filter(|p| p.is_main).count(), 1);
}

#[tokio::test]
async fn test_profile_edits_keep_relation_maps() {
    let fx = fixture();
    let (a, b, _) = matched_pair(&fx).await;

    fx.state
        .profiles
        .update_profile(a, ProfilePatch { bio: Some("Still here".to_string()), ..Default::default() })
        .await
        .unwrap();

    let a_doc = fx.store.get_user(a).await.unwrap().unwrap();
    assert_eq!(a_doc.profile.bio, "Still here");
    assert!(a_doc.likes.contains_key(&b));
    assert!(a_doc.matches.contains_key(&b));
}
