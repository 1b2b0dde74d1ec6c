use crate::core::distance::distance_km;
use crate::models::{DiscoveryCandidate, DiscoveryQuery, Location, PublicProfile, User};

/// Build the store query for one discovery page
///
/// `page` is 1-based; page 0 is treated as the first page.
pub fn build_discovery_query(user: &User, page: usize, limit: usize) -> DiscoveryQuery {
    DiscoveryQuery {
        requester_id: user.id,
        age_range: user.preferences.age_range,
        interested_in: user.profile.interested_in,
        exclude_user_ids: user.seen_user_ids(),
        offset: page_offset(page, limit),
        limit,
    }
}

/// Number of rows to skip for a 1-based page, saturating on huge pages
#[inline]
pub fn page_offset(page: usize, limit: usize) -> usize {
    page.saturating_sub(1).saturating_mul(limit)
}

/// Check if a candidate passes the static discovery predicate
///
/// Not self, active, inside the age range, acceptable gender, and never
/// liked or disliked by the requester. Distance is checked separately,
/// after pagination.
#[inline]
pub fn matches_discovery_query(candidate: &User, query: &DiscoveryQuery) -> bool {
    if candidate.id == query.requester_id || !candidate.is_active {
        return false;
    }

    query.age_range.contains(candidate.profile.age)
        && query.interested_in.accepts(candidate.profile.gender)
        && !query.exclude_user_ids.contains(&candidate.id)
}

/// Distance from the requester, or `None` when the candidate has no location
///
/// The outer `Option` is `None` when the candidate is out of range.
#[inline]
pub fn distance_if_in_range(requester: &User, candidate: &Location) -> Option<Option<f64>> {
    if candidate.is_unset() {
        return Some(None);
    }

    let distance = distance_km(&requester.profile.location, candidate);
    if distance <= requester.preferences.max_distance_km as f64 {
        Some(Some(distance))
    } else {
        None
    }
}

/// Drop out-of-range candidates from an already paginated page
pub fn apply_distance_filter(requester: &User, page: Vec<PublicProfile>) -> Vec<DiscoveryCandidate> {
    page.into_iter()
        .filter_map(|candidate| {
            distance_if_in_range(requester, &candidate.profile.location)
                .map(|distance_km| DiscoveryCandidate { user: candidate, distance_km })
        })
        .collect()
}

/// Paginate the candidates passing the static predicate, ordered by id
pub fn select_page<'a>(
    candidates: impl IntoIterator<Item = &'a User>,
    query: &DiscoveryQuery,
) -> Vec<PublicProfile> {
    let mut eligible: Vec<&User> = candidates
        .into_iter()
        .filter(|candidate| matches_discovery_query(candidate, query))
        .collect();
    eligible.sort_by_key(|candidate| candidate.id);

    eligible
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .map(User::public_profile)
        .collect()
}

/// Run the whole discovery pipeline over an in-memory candidate list
///
/// Candidates are filtered, paginated, then distance-filtered, so a page can
/// come back shorter than `limit`.
pub fn discover_in(requester: &User, candidates: &[User], page: usize, limit: usize) -> Vec<DiscoveryCandidate> {
    let query = build_discovery_query(requester, page, limit);
    apply_distance_filter(requester, select_page(candidates, &query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeRange, Gender, InterestedIn, Profile};
    use chrono::Utc;
    use uuid::Uuid;

    fn create_test_user(age: u8, gender: Gender, lat: f64, lon: f64) -> User {
        let profile = Profile {
            name: "Test User".to_string(),
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

    fn create_requester() -> User {
        let mut user = create_test_user(25, Gender::Male, 0.0, 0.0);
        user.profile.interested_in = InterestedIn::Female;
        user.preferences.age_range = AgeRange { min: 21, max: 30 };
        user.preferences.max_distance_km = 10;
        user
    }

    #[test]
    fn test_query_excludes_seen_users() {
        let mut requester = create_requester();
        let liked = Uuid::new_v4();
        let disliked = Uuid::new_v4();
        requester.likes.insert(liked, Utc::now());
        requester.dislikes.insert(disliked, Utc::now());

        let query = build_discovery_query(&requester, 2, 10);
        assert_eq!(query.offset, 10);
        assert_eq!(query.interested_in.required_gender(), Some(Gender::Female));
        assert!(query.exclude_user_ids.contains(&liked));
        assert!(query.exclude_user_ids.contains(&disliked));
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let query = build_discovery_query(&create_requester(), 0, 10);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_huge_page_saturates_instead_of_overflowing() {
        let query = build_discovery_query(&create_requester(), usize::MAX, 10);
        assert_eq!(query.offset, usize::MAX);
        assert_eq!(page_offset(usize::MAX, usize::MAX), usize::MAX);
        assert_eq!(page_offset(3, 20), 40);
    }

    #[test]
    fn test_huge_page_is_empty() {
        let requester = create_requester();
        let candidates = vec![create_test_user(24, Gender::Female, 0.0, 0.0)];
        assert!(discover_in(&requester, &candidates, usize::MAX, 10).is_empty());
    }

    #[test]
    fn test_predicate_rejects_self_and_inactive() {
        let requester = create_requester();
        let query = build_discovery_query(&requester, 1, 10);

        let mut me = requester.clone();
        me.profile.gender = Gender::Female;
        assert!(!matches_discovery_query(&me, &query));

        let mut inactive = create_test_user(24, Gender::Female, 0.0, 0.0);
        inactive.is_active = false;
        assert!(!matches_discovery_query(&inactive, &query));
    }

    #[test]
    fn test_predicate_age_and_gender() {
        let requester = create_requester();
        let query = build_discovery_query(&requester, 1, 10);

        assert!(matches_discovery_query(&create_test_user(24, Gender::Female, 0.0, 0.0), &query));
        assert!(matches_discovery_query(&create_test_user(21, Gender::Female, 0.0, 0.0), &query));
        assert!(!matches_discovery_query(&create_test_user(31, Gender::Female, 0.0, 0.0), &query));
        assert!(!matches_discovery_query(&create_test_user(24, Gender::Male, 0.0, 0.0), &query));
        assert!(!matches_discovery_query(&create_test_user(24, Gender::Other, 0.0, 0.0), &query));
    }

    #[test]
    fn test_both_accepts_every_gender() {
        let mut requester = create_requester();
        requester.profile.interested_in = InterestedIn::Both;
        let query = build_discovery_query(&requester, 1, 10);

        assert!(matches_discovery_query(&create_test_user(24, Gender::Other, 0.0, 0.0), &query));
        assert!(matches_discovery_query(&create_test_user(24, Gender::Male, 0.0, 0.0), &query));
    }

    #[test]
    fn test_unlocated_candidate_always_in_range() {
        let requester = create_requester();
        let unlocated = create_test_user(24, Gender::Female, 0.0, 0.0);
        assert_eq!(distance_if_in_range(&requester, &unlocated.profile.location), Some(None));
    }

    #[test]
    fn test_far_candidate_out_of_range() {
        let requester = create_requester();
        let far = create_test_user(24, Gender::Female, 50.0, 50.0);
        assert_eq!(distance_if_in_range(&requester, &far.profile.location), None);
    }

    #[test]
    fn test_pagination_happens_before_distance() {
        let requester = create_requester();
        let mut candidates = vec![
            create_test_user(24, Gender::Female, 0.0, 0.0),
            create_test_user(24, Gender::Female, 50.0, 50.0),
            create_test_user(24, Gender::Female, 0.01, 0.01),
        ];
        candidates.sort_by_key(|c| c.id);

        let first = discover_in(&requester, &candidates, 1, 2);
        let second = discover_in(&requester, &candidates, 2, 2);

        // every eligible candidate lands on exactly one page; the far one is dropped
        let far_id = candidates.iter().find(|c| c.profile.location.latitude == 50.0).map(|c| c.id);
        let returned: Vec<Uuid> = first.iter().chain(second.iter()).map(|c| c.user.id).collect();
        assert_eq!(returned.len(), 2);
        assert!(!returned.contains(&far_id.unwrap()));
        assert!(first.len() <= 2);
    }
}
