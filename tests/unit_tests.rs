// Unit tests for Heartline's pure core

use chrono::Utc;
use heartline::core::{
    discover_in, distance_km, haversine_distance, plan_dislike, plan_like, plan_send, plan_undo, Change,
};
use heartline::error::AppError;
use heartline::models::{
    AgeRange, Gender, InterestedIn, Location, Match, MessageType, Profile, User, UserPair,
};
use uuid::Uuid;

fn create_user(age: u8, gender: Gender, lat: f64, lon: f64) -> User {
    let profile = Profile {
        name: format!("User {}", age),
        age,
        gender,
        interested_in: InterestedIn::Both,
        bio: String::new(),
        location: Location {
            latitude: lat,
            longitude: lon,
            city: String::new(),
        },
        photos: vec![],
        interests: vec![],
        education: String::new(),
        occupation: String::new(),
    };
    User::new(Uuid::new_v4(), profile, Utc::now())
}

fn apply(changes: &[Change], users: &mut [&mut User]) {
    for change in changes {
        for user in users.iter_mut() {
            change.apply_to_user(user);
        }
    }
}

#[test]
fn test_haversine_distance_zero() {
    assert_eq!(haversine_distance(0.0, 0.0, 0.0, 0.0), 0.0);
}

#[test]
fn test_haversine_delhi_to_mumbai() {
    let distance = haversine_distance(28.6139, 77.2090, 19.0760, 72.8777);
    assert!(distance >= 1150.0 && distance <= 1160.0, "got {}", distance);
}

#[test]
fn test_distance_is_rounded_to_tenths() {
    let from = Location { latitude: 40.7580, longitude: -73.9855, city: String::new() };
    let to = Location { latitude: 40.6782, longitude: -73.9442, city: String::new() };
    let d = distance_km(&from, &to);
    assert_eq!((d * 10.0).round() / 10.0, d);
}

#[test]
fn test_discovery_excludes_self_seen_and_out_of_range_ages() {
    let mut requester = create_user(30, Gender::Male, 0.0, 0.0);
    requester.preferences.age_range = AgeRange { min: 25, max: 35 };

    let liked = create_user(28, Gender::Female, 0.0, 0.0);
    let disliked = create_user(28, Gender::Female, 0.0, 0.0);
    let too_old = create_user(40, Gender::Female, 0.0, 0.0);
    let fresh = create_user(28, Gender::Female, 0.0, 0.0);
    requester.likes.insert(liked.id, Utc::now());
    requester.dislikes.insert(disliked.id, Utc::now());

    let candidates = vec![requester.clone(), liked, disliked, too_old, fresh.clone()];
    let page = discover_in(&requester, &candidates, 1, 10);

    let ids: Vec<Uuid> = page.iter().map(|c| c.user.id).collect();
    assert_eq!(ids, vec![fresh.id]);
}

#[test]
fn test_discovery_gender_preference() {
    let mut requester = create_user(30, Gender::Female, 0.0, 0.0);
    requester.profile.interested_in = InterestedIn::Male;

    let man = create_user(30, Gender::Male, 0.0, 0.0);
    let woman = create_user(30, Gender::Female, 0.0, 0.0);
    let other = create_user(30, Gender::Other, 0.0, 0.0);

    let page = discover_in(&requester, &[man.clone(), woman, other], 1, 10);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].user.id, man.id);
}

#[test]
fn test_discovery_distance_from_origin() {
    let mut requester = create_user(30, Gender::Male, 0.0, 0.0);
    requester.preferences.max_distance_km = 10;

    let unlocated = create_user(30, Gender::Female, 0.0, 0.0);
    let far = create_user(30, Gender::Female, 50.0, 50.0);

    let page = discover_in(&requester, &[unlocated.clone(), far], 1, 10);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].user.id, unlocated.id);
    assert_eq!(page[0].distance_km, None);
}

#[test]
fn test_discovery_reports_distance_for_located_candidates() {
    let mut requester = create_user(30, Gender::Male, 52.5200, 13.4050);
    requester.preferences.max_distance_km = 100;
    let nearby = create_user(30, Gender::Female, 52.3906, 13.0645);

    let page = discover_in(&requester, &[nearby], 1, 10);
    let distance = page[0].distance_km.unwrap();
    assert!(distance > 20.0 && distance < 30.0, "got {}", distance);
}

#[test]
fn test_like_then_dislike_leaves_only_dislike() {
    let mut a = create_user(30, Gender::Male, 0.0, 0.0);
    let mut b = create_user(30, Gender::Female, 0.0, 0.0);

    let like = plan_like(&a, &b, None, Utc::now()).unwrap();
    apply(&like.changes, &mut [&mut a, &mut b]);
    let dislike = plan_dislike(&a, &b, Utc::now()).unwrap();
    apply(&dislike.changes, &mut [&mut a, &mut b]);

    assert!(!a.likes.contains_key(&b.id));
    assert!(a.dislikes.contains_key(&b.id));
}

#[test]
fn test_duplicate_like_plans_nothing() {
    let mut a = create_user(30, Gender::Male, 0.0, 0.0);
    let b = create_user(30, Gender::Female, 0.0, 0.0);
    a.likes.insert(b.id, Utc::now());

    let result = plan_like(&a, &b, None, Utc::now());
    assert!(matches!(result, Err(AppError::DuplicateAction(_))));
}

#[test]
fn test_mutual_like_plans_one_match_and_both_entries() {
    let mut a = create_user(30, Gender::Male, 0.0, 0.0);
    let mut b = create_user(30, Gender::Female, 0.0, 0.0);
    b.likes.insert(a.id, Utc::now());

    let like = plan_like(&a, &b, None, Utc::now()).unwrap();
    let created = like.changes.iter().filter(|c| matches!(c, Change::CreateMatch(_))).count();
    assert_eq!(created, 1);
    assert!(like.outcome.is_match);

    apply(&like.changes, &mut [&mut a, &mut b]);
    assert!(a.matches.contains_key(&b.id));
    assert!(b.matches.contains_key(&a.id));
}

#[test]
fn test_undo_on_undone_state_is_noop() {
    let a = create_user(30, Gender::Male, 0.0, 0.0);
    let b = create_user(30, Gender::Female, 0.0, 0.0);

    let undo = plan_undo(&a, b.id, Some(&b), None, Utc::now()).unwrap();
    assert!(undo.is_noop());
}

#[test]
fn test_send_to_retired_match_rejected() {
    let a = Uuid::new_v4();
    let mut record = Match::new(UserPair::new(a, Uuid::new_v4()).unwrap(), Utc::now());
    record.is_active = false;

    let result = plan_send(&record, a, "hello", MessageType::Text, None, Utc::now());
    assert!(matches!(result, Err(AppError::InactiveMatch(_))));
}
