use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;

use crate::database::connection::DbConn;
use crate::database::{audit, challenges, directory, outbox, participations};
use crate::domain::status::{ChallengeStatus, ParticipationStatus};
use crate::domain::{Challenge, Participation};
use crate::errors::{EngineError, Result};

use super::{
    AGGREGATE_CHALLENGE, EVENT_CHALLENGE_REGISTERED, EVENT_CHALLENGE_STATUS_CHANGED,
    EVENT_CHALLENGE_WITHDRAWN,
};

/// Parameters for creating a challenge
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub name: String,
    pub slug: String,
    pub registration_starts_at: Option<DateTime<Utc>>,
    pub registration_ends_at: Option<DateTime<Utc>>,
    pub voting_starts_at: Option<DateTime<Utc>>,
    pub voting_ends_at: Option<DateTime<Utc>>,
    pub min_participants: i64,
    pub max_participants: i64,
}

pub fn create_challenge(
    conn: &mut DbConn,
    new: &NewChallenge,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    validate_new_challenge(new)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::insert_challenge(
        &tx,
        &new.name,
        &new.slug,
        new.registration_starts_at,
        new.registration_ends_at,
        new.voting_starts_at,
        new.voting_ends_at,
        new.min_participants,
        new.max_participants,
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "create",
        AGGREGATE_CHALLENGE,
        challenge.id,
        None,
        Some(challenge.status.as_str()),
        now,
    )?;
    tx.commit()?;

    log::info!("Created challenge {} ({})", challenge.id, challenge.slug);
    Ok(challenge)
}

fn validate_new_challenge(new: &NewChallenge) -> Result<()> {
    if new.min_participants < 2 {
        return Err(EngineError::validation("minimum participants must be at least 2"));
    }
    if new.max_participants < new.min_participants {
        return Err(EngineError::validation(
            "maximum participants must not be below the minimum",
        ));
    }
    if let (Some(start), Some(end)) = (new.registration_starts_at, new.registration_ends_at) {
        if end <= start {
            return Err(EngineError::validation(
                "registration window must end after it starts",
            ));
        }
    }
    if let (Some(start), Some(end)) = (new.voting_starts_at, new.voting_ends_at) {
        if end <= start {
            return Err(EngineError::validation("voting window must end after it starts"));
        }
    }
    Ok(())
}

/// Edit a challenge's details while it is still a DRAFT
pub fn update_challenge(
    conn: &mut DbConn,
    id: i64,
    new: &NewChallenge,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    validate_new_challenge(new)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::get_challenge(&tx, id)?;
    require_status(&challenge, ChallengeStatus::Draft)?;

    challenges::update_details(
        &tx,
        id,
        &new.name,
        &new.slug,
        new.registration_starts_at,
        new.registration_ends_at,
        new.voting_starts_at,
        new.voting_ends_at,
        new.min_participants,
        new.max_participants,
        now,
    )?;
    audit::append(&tx, actor, "update", AGGREGATE_CHALLENGE, id, None, None, now)?;

    let updated = challenges::get_challenge(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

pub fn publish(conn: &mut DbConn, id: i64, actor: &str, now: DateTime<Utc>) -> Result<Challenge> {
    transition(conn, id, ChallengeStatus::Draft, ChallengeStatus::Upcoming, "publish", actor, now)
}

pub fn open_registration(
    conn: &mut DbConn,
    id: i64,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    transition(
        conn,
        id,
        ChallengeStatus::Upcoming,
        ChallengeStatus::Registration,
        "open_registration",
        actor,
        now,
    )
}

/// Move a challenge from REGISTRATION to ACTIVE, requiring the minimum
/// participant count to be met
pub fn start(conn: &mut DbConn, id: i64, actor: &str, now: DateTime<Utc>) -> Result<Challenge> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::get_challenge(&tx, id)?;

    require_status(&challenge, ChallengeStatus::Registration)?;
    if challenge.participants_count < challenge.min_participants {
        return Err(EngineError::validation(format!(
            "challenge needs at least {} participants, has {}",
            challenge.min_participants, challenge.participants_count
        )));
    }

    let updated = apply_transition(&tx, &challenge, ChallengeStatus::Active, "start", actor, now)?;
    tx.commit()?;
    Ok(updated)
}

pub fn open_voting(conn: &mut DbConn, id: i64, actor: &str, now: DateTime<Utc>) -> Result<Challenge> {
    transition(
        conn,
        id,
        ChallengeStatus::Active,
        ChallengeStatus::Voting,
        "open_voting",
        actor,
        now,
    )
}

pub fn complete(conn: &mut DbConn, id: i64, actor: &str, now: DateTime<Utc>) -> Result<Challenge> {
    transition(
        conn,
        id,
        ChallengeStatus::Voting,
        ChallengeStatus::Completed,
        "complete",
        actor,
        now,
    )
}

/// Cancel from any state except COMPLETED
pub fn cancel(conn: &mut DbConn, id: i64, actor: &str, now: DateTime<Utc>) -> Result<Challenge> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::get_challenge(&tx, id)?;

    if !challenge.status.can_cancel() {
        return Err(EngineError::invalid_state(
            "any non-COMPLETED state",
            challenge.status.as_str(),
        ));
    }

    let updated = apply_transition(&tx, &challenge, ChallengeStatus::Cancelled, "cancel", actor, now)?;
    tx.commit()?;
    Ok(updated)
}

fn transition(
    conn: &mut DbConn,
    id: i64,
    from: ChallengeStatus,
    to: ChallengeStatus,
    action: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::get_challenge(&tx, id)?;

    if challenge.status != from {
        return Err(EngineError::invalid_state(from.as_str(), challenge.status.as_str()));
    }

    let updated = apply_transition(&tx, &challenge, to, action, actor, now)?;
    tx.commit()?;
    Ok(updated)
}

fn apply_transition(
    tx: &Connection,
    challenge: &Challenge,
    to: ChallengeStatus,
    action: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    challenges::update_status(tx, challenge.id, to, now)?;
    outbox::append(
        tx,
        EVENT_CHALLENGE_STATUS_CHANGED,
        AGGREGATE_CHALLENGE,
        challenge.id,
        &json!({ "status": to.as_str() }),
        now,
    )?;
    audit::append(
        tx,
        actor,
        action,
        AGGREGATE_CHALLENGE,
        challenge.id,
        Some(challenge.status.as_str()),
        Some(to.as_str()),
        now,
    )?;

    log::info!(
        "Challenge {} transitioned {} -> {}",
        challenge.id,
        challenge.status.as_str(),
        to.as_str()
    );
    challenges::get_challenge(tx, challenge.id)
}

/// Register a restaurant into an open challenge
pub fn register_restaurant(
    conn: &mut DbConn,
    challenge_id: i64,
    restaurant_id: i64,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Participation> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::get_challenge(&tx, challenge_id)?;

    require_status(&challenge, ChallengeStatus::Registration)?;
    require_open_registration_window(&challenge, now)?;
    if challenge.participants_count >= challenge.max_participants {
        return Err(EngineError::validation("challenge is at capacity"));
    }
    directory::get_restaurant(&tx, restaurant_id)?;

    let participation = participations::insert_for_challenge(&tx, restaurant_id, challenge_id, now)?;
    challenges::set_participants_count(&tx, challenge_id, challenge.participants_count + 1, now)?;
    outbox::append(
        &tx,
        EVENT_CHALLENGE_REGISTERED,
        AGGREGATE_CHALLENGE,
        challenge_id,
        &json!({ "restaurant_id": restaurant_id }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "register",
        AGGREGATE_CHALLENGE,
        challenge_id,
        None,
        Some(&restaurant_id.to_string()),
        now,
    )?;
    tx.commit()?;

    Ok(participation)
}

/// Withdraw a registered restaurant.
///
/// The participation row is kept with a WITHDRAWN status and an elimination
/// reason; only the live counter is decremented.
pub fn withdraw_restaurant(
    conn: &mut DbConn,
    challenge_id: i64,
    restaurant_id: i64,
    reason: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Participation> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::get_challenge(&tx, challenge_id)?;

    let participation = participations::find_for_challenge(&tx, challenge_id, restaurant_id)?
        .ok_or_else(|| EngineError::not_found("participation", restaurant_id))?;
    if participation.status == ParticipationStatus::Withdrawn {
        return Err(EngineError::conflict("restaurant already withdrawn"));
    }

    participations::mark_eliminated(&tx, participation.id, ParticipationStatus::Withdrawn, reason, now)?;
    challenges::set_participants_count(
        &tx,
        challenge_id,
        (challenge.participants_count - 1).max(0),
        now,
    )?;
    outbox::append(
        &tx,
        EVENT_CHALLENGE_WITHDRAWN,
        AGGREGATE_CHALLENGE,
        challenge_id,
        &json!({ "restaurant_id": restaurant_id, "reason": reason }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "withdraw",
        AGGREGATE_CHALLENGE,
        challenge_id,
        Some(participation.status.as_str()),
        Some(ParticipationStatus::Withdrawn.as_str()),
        now,
    )?;

    let updated = participations::get_participation(&tx, participation.id)?;
    tx.commit()?;
    Ok(updated)
}

/// Bump the view counter; exposed for display instrumentation
pub fn record_view(conn: &mut DbConn, challenge_id: i64, now: DateTime<Utc>) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    challenges::get_challenge(&tx, challenge_id)?;
    challenges::increment_views(&tx, challenge_id, now)?;
    tx.commit()?;
    Ok(())
}

fn require_status(challenge: &Challenge, expected: ChallengeStatus) -> Result<()> {
    if challenge.status != expected {
        return Err(EngineError::invalid_state(expected.as_str(), challenge.status.as_str()));
    }
    Ok(())
}

fn require_open_registration_window(challenge: &Challenge, now: DateTime<Utc>) -> Result<()> {
    if let Some(start) = challenge.registration_starts_at {
        if now < start {
            return Err(EngineError::validation("registration has not opened yet"));
        }
    }
    if let Some(end) = challenge.registration_ends_at {
        if now > end {
            return Err(EngineError::validation("registration window has closed"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::database::{directory, memory_pool, setup};

    fn test_conn() -> DbConn {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        setup::initialize_schema(&conn).unwrap();
        conn
    }

    fn new_challenge(now: DateTime<Utc>) -> NewChallenge {
        NewChallenge {
            name: "Best Pizza".into(),
            slug: "best-pizza".into(),
            registration_starts_at: Some(now - Duration::hours(1)),
            registration_ends_at: Some(now + Duration::hours(24)),
            voting_starts_at: Some(now + Duration::hours(24)),
            voting_ends_at: Some(now + Duration::hours(48)),
            min_participants: 2,
            max_participants: 4,
        }
    }

    fn seed_restaurant(conn: &DbConn, name: &str) -> i64 {
        directory::insert_restaurant(conn, name, "Lisbon", "pizza")
            .unwrap()
            .id
    }

    #[test]
    fn test_full_forward_lifecycle() {
        let mut conn = test_conn();
        let now = Utc::now();
        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Draft);

        let challenge = publish(&mut conn, challenge.id, "tester", now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Upcoming);

        let challenge = open_registration(&mut conn, challenge.id, "tester", now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Registration);

        for name in ["A", "B"] {
            let rid = seed_restaurant(&conn, name);
            register_restaurant(&mut conn, challenge.id, rid, "tester", now).unwrap();
        }

        let challenge = start(&mut conn, challenge.id, "tester", now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Active);

        let challenge = open_voting(&mut conn, challenge.id, "tester", now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Voting);

        let challenge = complete(&mut conn, challenge.id, "tester", now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Completed);
    }

    #[test]
    fn test_update_edits_draft_fields_only() {
        let mut conn = test_conn();
        let now = Utc::now();
        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();

        let mut edited = new_challenge(now);
        edited.name = "Best Bifana".into();
        edited.slug = "best-bifana".into();
        edited.max_participants = 8;
        let updated = update_challenge(&mut conn, challenge.id, &edited, "tester", now).unwrap();
        assert_eq!(updated.name, "Best Bifana");
        assert_eq!(updated.slug, "best-bifana");
        assert_eq!(updated.max_participants, 8);
        assert_eq!(updated.status, ChallengeStatus::Draft);

        publish(&mut conn, challenge.id, "tester", now).unwrap();
        let err = update_challenge(&mut conn, challenge.id, &edited, "tester", now).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));

        // Invalid edits are rejected before any write
        let mut bad = new_challenge(now);
        bad.min_participants = 1;
        let err = update_challenge(&mut conn, challenge.id, &bad, "tester", now).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_transition_from_wrong_state_fails() {
        let mut conn = test_conn();
        let now = Utc::now();
        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();

        // open_voting requires ACTIVE, challenge is DRAFT
        let err = open_voting(&mut conn, challenge.id, "tester", now).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));

        // Repeating a transition from the now-invalid prior state fails too
        publish(&mut conn, challenge.id, "tester", now).unwrap();
        let err = publish(&mut conn, challenge.id, "tester", now).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[test]
    fn test_cancel_from_any_state_except_completed() {
        let mut conn = test_conn();
        let now = Utc::now();

        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();
        cancel(&mut conn, challenge.id, "tester", now).unwrap();

        let mut second = new_challenge(now);
        second.slug = "best-pizza-2".into();
        second.min_participants = 2;
        let challenge = create_challenge(&mut conn, &second, "tester", now).unwrap();
        publish(&mut conn, challenge.id, "tester", now).unwrap();
        open_registration(&mut conn, challenge.id, "tester", now).unwrap();
        for name in ["C", "D"] {
            let rid = seed_restaurant(&conn, name);
            register_restaurant(&mut conn, challenge.id, rid, "tester", now).unwrap();
        }
        start(&mut conn, challenge.id, "tester", now).unwrap();
        open_voting(&mut conn, challenge.id, "tester", now).unwrap();
        complete(&mut conn, challenge.id, "tester", now).unwrap();

        let err = cancel(&mut conn, challenge.id, "tester", now).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[test]
    fn test_duplicate_registration_is_a_conflict() {
        let mut conn = test_conn();
        let now = Utc::now();
        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();
        publish(&mut conn, challenge.id, "tester", now).unwrap();
        open_registration(&mut conn, challenge.id, "tester", now).unwrap();

        let rid = seed_restaurant(&conn, "A");
        register_restaurant(&mut conn, challenge.id, rid, "tester", now).unwrap();
        let err = register_restaurant(&mut conn, challenge.id, rid, "tester", now).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_registering_unknown_restaurant_is_not_found() {
        let mut conn = test_conn();
        let now = Utc::now();
        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();
        publish(&mut conn, challenge.id, "tester", now).unwrap();
        open_registration(&mut conn, challenge.id, "tester", now).unwrap();

        let err = register_restaurant(&mut conn, challenge.id, 999, "tester", now).unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotFound {
                entity: "restaurant",
                id: 999
            }
        ));
    }

    #[test]
    fn test_registration_respects_capacity() {
        let mut conn = test_conn();
        let now = Utc::now();
        let mut draft = new_challenge(now);
        draft.max_participants = 2;
        let challenge = create_challenge(&mut conn, &draft, "tester", now).unwrap();
        publish(&mut conn, challenge.id, "tester", now).unwrap();
        open_registration(&mut conn, challenge.id, "tester", now).unwrap();

        for name in ["A", "B"] {
            let rid = seed_restaurant(&conn, name);
            register_restaurant(&mut conn, challenge.id, rid, "tester", now).unwrap();
        }

        let rid = seed_restaurant(&conn, "C");
        let err = register_restaurant(&mut conn, challenge.id, rid, "tester", now).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_withdraw_decrements_counter_and_keeps_record() {
        let mut conn = test_conn();
        let now = Utc::now();
        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();
        publish(&mut conn, challenge.id, "tester", now).unwrap();
        open_registration(&mut conn, challenge.id, "tester", now).unwrap();

        let ids: Vec<i64> = ["A", "B", "C"]
            .iter()
            .map(|name| {
                let rid = seed_restaurant(&conn, name);
                register_restaurant(&mut conn, challenge.id, rid, "tester", now).unwrap();
                rid
            })
            .collect();

        let before = challenges::get_challenge(&conn, challenge.id).unwrap();
        assert_eq!(before.participants_count, 3);

        let withdrawn =
            withdraw_restaurant(&mut conn, challenge.id, ids[0], "kitchen fire", "tester", now)
                .unwrap();
        assert_eq!(withdrawn.status, ParticipationStatus::Withdrawn);
        assert_eq!(withdrawn.elimination_reason.as_deref(), Some("kitchen fire"));
        assert!(withdrawn.eliminated_at.is_some());

        let after = challenges::get_challenge(&conn, challenge.id).unwrap();
        assert_eq!(after.participants_count, 2);
    }

    #[test]
    fn test_start_requires_minimum_participants() {
        let mut conn = test_conn();
        let now = Utc::now();
        let challenge = create_challenge(&mut conn, &new_challenge(now), "tester", now).unwrap();
        publish(&mut conn, challenge.id, "tester", now).unwrap();
        open_registration(&mut conn, challenge.id, "tester", now).unwrap();

        let err = start(&mut conn, challenge.id, "tester", now).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
