//! Match-formation planning.
//!
//! Every write operation of the match workflow is planned here as a list of
//! [`Change`]s computed from already loaded (and, in the database, locked)
//! aggregates. A store unit of work then applies the whole list or nothing,
//! which keeps `User.matches` and the `Match` record consistent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Match, Message, User, UserPair};

/// One atomic mutation of a user document, a match or a message thread
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    RecordLike { actor: Uuid, target: Uuid, at: DateTime<Utc> },
    RemoveLike { actor: Uuid, target: Uuid },
    RecordDislike { actor: Uuid, target: Uuid, at: DateTime<Utc> },
    RemoveDislike { actor: Uuid, target: Uuid },
    CreateMatch(Match),
    AddMatchEntry { owner: Uuid, other: Uuid, at: DateTime<Utc> },
    RemoveMatchEntry { owner: Uuid, other: Uuid },
    DeactivateMatch { match_id: Uuid, at: DateTime<Utc> },
    AppendMessage(Message),
    TouchMatch { match_id: Uuid, message_id: Uuid, at: DateTime<Utc> },
    /// Overwrite profile, preferences and activity flags; relation maps are kept
    SaveProfile(Box<User>),
}

impl Change {
    /// The user document this change writes to, if any
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Change::RecordLike { actor, .. }
            | Change::RemoveLike { actor, .. }
            | Change::RecordDislike { actor, .. }
            | Change::RemoveDislike { actor, .. } => Some(*actor),
            Change::AddMatchEntry { owner, .. } | Change::RemoveMatchEntry { owner, .. } => Some(*owner),
            Change::SaveProfile(saved) => Some(saved.id),
            _ => None,
        }
    }

    /// Apply this change to a user document. Changes aimed at another user or
    /// at a match/message leave it untouched.
    pub fn apply_to_user(&self, user: &mut User) {
        match self {
            Change::RecordLike { actor, target, at } if *actor == user.id => {
                user.likes.insert(*target, *at);
            }
            Change::RemoveLike { actor, target } if *actor == user.id => {
                user.likes.remove(target);
            }
            Change::RecordDislike { actor, target, at } if *actor == user.id => {
                user.dislikes.insert(*target, *at);
            }
            Change::RemoveDislike { actor, target } if *actor == user.id => {
                user.dislikes.remove(target);
            }
            Change::AddMatchEntry { owner, other, at } if *owner == user.id => {
                user.matches.insert(*other, *at);
            }
            Change::RemoveMatchEntry { owner, other } if *owner == user.id => {
                user.matches.remove(other);
            }
            Change::SaveProfile(saved) if saved.id == user.id => {
                user.profile = saved.profile.clone();
                user.preferences = saved.preferences.clone();
                user.is_active = saved.is_active;
                user.is_online = saved.is_online;
                user.last_active = saved.last_active;
                user.updated_at = saved.updated_at;
            }
            _ => {}
        }
    }

    /// Apply this change to a match record
    pub fn apply_to_match(&self, record: &mut Match) {
        match self {
            Change::DeactivateMatch { match_id, at } if *match_id == record.id => {
                record.is_active = false;
                record.updated_at = *at;
            }
            Change::TouchMatch { match_id, message_id, at } if *match_id == record.id => {
                record.last_message = Some(*message_id);
                record.last_message_at = *at;
                record.updated_at = *at;
            }
            _ => {}
        }
    }
}

/// Planned changes plus the result reported to the caller once they commit
#[derive(Debug)]
pub struct Transition<T> {
    pub changes: Vec<Change>,
    pub outcome: T,
}

impl<T> Transition<T> {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeOutcome {
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    #[serde(rename = "match")]
    pub matched: Option<Match>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UndoOutcome {
    #[serde(rename = "removedLike")]
    pub removed_like: bool,
    #[serde(rename = "removedDislike")]
    pub removed_dislike: bool,
    #[serde(rename = "retiredMatch")]
    pub retired_match: Option<Uuid>,
}

/// Reject actions a user aims at themselves
pub fn ensure_distinct(actor: Uuid, target: Uuid, action: &str) -> Result<UserPair, AppError> {
    UserPair::new(actor, target)
        .ok_or_else(|| AppError::SelfAction(format!("You cannot {} yourself", action)))
}

/// Plan `actor` liking `target`
///
/// `existing` is the active match between the two, if the store has one.
pub fn plan_like(
    actor: &User,
    target: &User,
    existing: Option<&Match>,
    now: DateTime<Utc>,
) -> Result<Transition<LikeOutcome>, AppError> {
    let pair = ensure_distinct(actor.id, target.id, "like")?;

    if actor.likes_user(target.id) {
        return Err(AppError::DuplicateAction("You already liked this user".to_string()));
    }

    let mut changes = Vec::new();
    if actor.dislikes_user(target.id) {
        changes.push(Change::RemoveDislike { actor: actor.id, target: target.id });
    }
    changes.push(Change::RecordLike { actor: actor.id, target: target.id, at: now });

    if !target.likes_user(actor.id) {
        return Ok(Transition {
            changes,
            outcome: LikeOutcome { is_match: false, matched: None },
        });
    }

    let record = match existing.filter(|m| m.is_active && m.users == pair) {
        Some(record) => record.clone(),
        None => {
            let record = Match::new(pair, now);
            changes.push(Change::CreateMatch(record.clone()));
            record
        }
    };

    // An existing match may be missing an entry if an older writer died halfway
    for (owner, other) in [(actor, target), (target, actor)] {
        if !owner.is_matched_with(other.id) {
            changes.push(Change::AddMatchEntry {
                owner: owner.id,
                other: other.id,
                at: record.matched_at,
            });
        }
    }

    Ok(Transition {
        changes,
        outcome: LikeOutcome { is_match: true, matched: Some(record) },
    })
}

/// Plan `actor` disliking `target`. A prior like is replaced.
pub fn plan_dislike(actor: &User, target: &User, now: DateTime<Utc>) -> Result<Transition<()>, AppError> {
    ensure_distinct(actor.id, target.id, "dislike")?;

    if actor.dislikes_user(target.id) {
        return Err(AppError::DuplicateAction("You already disliked this user".to_string()));
    }

    let mut changes = Vec::new();
    if actor.likes_user(target.id) {
        changes.push(Change::RemoveLike { actor: actor.id, target: target.id });
    }
    changes.push(Change::RecordDislike { actor: actor.id, target: target.id, at: now });

    Ok(Transition { changes, outcome: () })
}

/// Plan undoing whatever `actor` did to `target_id`
///
/// Retires the pair's match if there is one. Planning against already-undone
/// state yields no changes.
pub fn plan_undo(
    actor: &User,
    target_id: Uuid,
    target: Option<&User>,
    active: Option<&Match>,
    now: DateTime<Utc>,
) -> Result<Transition<UndoOutcome>, AppError> {
    ensure_distinct(actor.id, target_id, "undo an action on")?;

    let mut changes = Vec::new();
    let mut outcome = UndoOutcome::default();

    if actor.likes_user(target_id) {
        changes.push(Change::RemoveLike { actor: actor.id, target: target_id });
        outcome.removed_like = true;
    }
    if actor.dislikes_user(target_id) {
        changes.push(Change::RemoveDislike { actor: actor.id, target: target_id });
        outcome.removed_dislike = true;
    }

    changes.extend(retire_pair(actor.id, Some(actor), target_id, target, active, now));
    outcome.retired_match = active.filter(|m| m.is_active).map(|m| m.id);

    Ok(Transition { changes, outcome })
}

/// Plan `requester` unmatching `record`
///
/// `participants` holds whichever of the two users still exist.
pub fn plan_unmatch(
    record: &Match,
    requester: Uuid,
    participants: &[User],
    now: DateTime<Utc>,
) -> Result<Transition<()>, AppError> {
    if !record.users.contains(requester) {
        return Err(AppError::match_access_denied());
    }

    let low = record.users.low();
    let high = record.users.high();
    let find = |id: Uuid| participants.iter().find(|u| u.id == id);

    let changes = retire_pair(low, find(low), high, find(high), Some(record), now);
    Ok(Transition { changes, outcome: () })
}

/// Remove both match entries between `a` and `b` and deactivate `record`
fn retire_pair(
    a_id: Uuid,
    a: Option<&User>,
    b_id: Uuid,
    b: Option<&User>,
    record: Option<&Match>,
    now: DateTime<Utc>,
) -> Vec<Change> {
    let mut changes = Vec::new();

    if a.is_some_and(|u| u.is_matched_with(b_id)) {
        changes.push(Change::RemoveMatchEntry { owner: a_id, other: b_id });
    }
    if b.is_some_and(|u| u.is_matched_with(a_id)) {
        changes.push(Change::RemoveMatchEntry { owner: b_id, other: a_id });
    }
    if let Some(record) = record.filter(|m| m.is_active) {
        changes.push(Change::DeactivateMatch { match_id: record.id, at: now });
    }

    changes
}
