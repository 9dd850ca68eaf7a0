use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use serde_json::json;

use crate::config::weights::FraudThresholds;
use crate::database::connection::DbConn;
use crate::database::ranking_votes::SubRatings;
use crate::database::votes::VoteAudit;
use crate::database::{
    audit, challenges, directory, matches, outbox, ranking_votes, rankings, tournaments, votes,
};
use crate::domain::status::{ChallengeStatus, MatchStatus, TournamentStatus};
use crate::domain::{Challenge, MatchVote, RankingVote, Reservation};
use crate::engine::{evaluate_fraud, vote_weight, FraudCheck, FraudCounts};
use crate::errors::{EngineError, Result};

use super::{AGGREGATE_CHALLENGE, AGGREGATE_MATCH, EVENT_VOTE_CAST};

/// A match vote attempt
#[derive(Debug, Clone)]
pub struct CastMatchVote {
    pub match_id: i64,
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub reservation_id: Option<i64>,
    pub ip_address: String,
    pub device_id: String,
    pub user_agent: String,
}

/// The stored vote plus the advisory fraud report for the attempt
#[derive(Debug, Clone)]
pub struct MatchVoteOutcome {
    pub vote: MatchVote,
    pub fraud: FraudCheck,
}

/// Cast one vote in a match.
///
/// The vote is admitted when the match is VOTING inside its window, its
/// tournament is still ongoing, the chosen restaurant is one of the match's
/// two, and the voter has not voted in this match before. Both sides'
/// cached totals are recomputed from the
/// ledger rows inside the same transaction, so concurrent voters never
/// observe a torn count.
pub fn cast_match_vote(
    conn: &mut DbConn,
    cast: &CastMatchVote,
    now: DateTime<Utc>,
) -> Result<MatchVoteOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let m = matches::get_match(&tx, cast.match_id)?;
    if m.status != MatchStatus::Voting {
        return Err(EngineError::invalid_state(
            MatchStatus::Voting.as_str(),
            m.status.as_str(),
        ));
    }
    let tournament = tournaments::get_tournament(&tx, m.tournament_id)?;
    if tournament.status != TournamentStatus::Ongoing {
        return Err(EngineError::invalid_state(
            TournamentStatus::Ongoing.as_str(),
            tournament.status.as_str(),
        ));
    }
    require_within_window(m.voting_starts_at, m.voting_ends_at, now)?;
    if !m.involves(cast.restaurant_id) {
        return Err(EngineError::validation(
            "chosen restaurant is not part of this match",
        ));
    }

    let customer = directory::get_customer(&tx, cast.customer_id)?;
    let verified = match cast.reservation_id {
        Some(reservation_id) => {
            let reservation = directory::get_reservation(&tx, reservation_id)?;
            require_backing_reservation(&reservation, cast.customer_id, cast.restaurant_id)?;
            true
        }
        None => false,
    };
    let weight = vote_weight(customer.classification, verified);

    // Advisory only: flagged attempts are recorded, never rejected
    let fraud = evaluate_fraud(
        FraudCounts {
            same_ip_on_match: votes::count_by_ip(&tx, cast.match_id, &cast.ip_address)?,
            same_device_on_match: votes::count_by_device(&tx, cast.match_id, &cast.device_id)?,
            voter_votes_last_hour: votes::count_recent_by_customer(&tx, cast.customer_id, now)?,
        },
        &FraudThresholds::default(),
    );
    if fraud.is_suspicious() {
        log::warn!(
            "Suspicious vote attempt on match {} by customer {}",
            cast.match_id,
            cast.customer_id
        );
    }

    let audit_meta = VoteAudit {
        ip_address: cast.ip_address.clone(),
        device_id: cast.device_id.clone(),
        user_agent: cast.user_agent.clone(),
    };
    let vote = votes::insert_vote(
        &tx,
        cast.match_id,
        cast.customer_id,
        cast.restaurant_id,
        customer.classification,
        weight,
        verified,
        cast.reservation_id,
        &audit_meta,
        now,
    )?;

    let (votes1, weighted1) = votes::totals_for_restaurant(&tx, cast.match_id, m.restaurant1_id)?;
    let (votes2, weighted2) = votes::totals_for_restaurant(&tx, cast.match_id, m.restaurant2_id)?;
    matches::set_vote_totals(&tx, cast.match_id, votes1, votes2, weighted1, weighted2)?;

    outbox::append(
        &tx,
        EVENT_VOTE_CAST,
        AGGREGATE_MATCH,
        cast.match_id,
        &json!({ "customer_id": cast.customer_id, "restaurant_id": cast.restaurant_id }),
        now,
    )?;
    audit::append(
        &tx,
        &format!("customer:{}", cast.customer_id),
        "cast_match_vote",
        AGGREGATE_MATCH,
        cast.match_id,
        None,
        Some(&json!({ "suspicious": fraud.is_suspicious() }).to_string()),
        now,
    )?;
    tx.commit()?;

    Ok(MatchVoteOutcome { vote, fraud })
}

/// A ranking vote attempt
#[derive(Debug, Clone)]
pub struct CastRankingVote {
    pub ranking_id: i64,
    pub restaurant_id: i64,
    pub customer_id: i64,
    pub reservation_id: i64,
    pub rating: i64,
    pub sub_ratings: SubRatings,
}

/// Cast one ranking vote, backed by a seated reservation.
///
/// The entry's vote count and average rating are recomputed from the ledger
/// rows in the same transaction.
pub fn cast_ranking_vote(
    conn: &mut DbConn,
    cast: &CastRankingVote,
    now: DateTime<Utc>,
) -> Result<RankingVote> {
    if !(1..=5).contains(&cast.rating) {
        return Err(EngineError::validation("rating must be between 1 and 5"));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    rankings::get_ranking(&tx, cast.ranking_id)?;

    let entry = rankings::get_entry(&tx, cast.ranking_id, cast.restaurant_id)?
        .ok_or_else(|| EngineError::validation("restaurant is not part of this ranking"))?;

    let customer = directory::get_customer(&tx, cast.customer_id)?;
    let reservation = directory::get_reservation(&tx, cast.reservation_id)?;
    require_backing_reservation(&reservation, cast.customer_id, cast.restaurant_id)?;

    // Ranking votes carry no ip or device, so only the rate heuristic
    // applies; still advisory
    let recent = ranking_votes::count_recent_by_customer(&tx, cast.customer_id, now)?;
    let suspicious = recent >= FraudThresholds::default().voter_votes_per_hour;
    if suspicious {
        log::warn!(
            "Suspicious ranking vote rate from customer {}",
            cast.customer_id
        );
    }

    let weight = vote_weight(customer.classification, true);
    let vote = ranking_votes::insert_ranking_vote(
        &tx,
        cast.ranking_id,
        cast.restaurant_id,
        cast.customer_id,
        cast.reservation_id,
        customer.classification,
        cast.rating,
        cast.sub_ratings,
        suspicious,
        true,
        weight,
        now,
    )?;

    refresh_entry_stats(&tx, entry.id, cast.ranking_id, cast.restaurant_id)?;
    tx.commit()?;

    Ok(vote)
}

/// Recompute an entry's vote breakdown from the ledger rows
pub(crate) fn refresh_entry_stats(
    tx: &rusqlite::Connection,
    entry_id: i64,
    ranking_id: i64,
    restaurant_id: i64,
) -> Result<()> {
    let ledger = ranking_votes::list_for_entry(tx, ranking_id, restaurant_id)?;
    let (votes_count, avg_rating) =
        ranking_votes::aggregate_for_entry(tx, ranking_id, restaurant_id)?;

    let local = count_classified(&ledger, crate::domain::status::VoterClassification::Local);
    let tourist = count_classified(&ledger, crate::domain::status::VoterClassification::Tourist);
    let verified = ledger.iter().filter(|v| v.verified).count() as i64;
    let seated = directory::count_seated_reservations(tx, restaurant_id)?;

    rankings::update_entry_stats(
        tx,
        entry_id,
        votes_count,
        local,
        tourist,
        verified,
        seated,
        avg_rating,
    )
}

fn count_classified(
    ledger: &[RankingVote],
    classification: crate::domain::status::VoterClassification,
) -> i64 {
    ledger
        .iter()
        .filter(|v| v.classification == classification)
        .count() as i64
}

/// Record a challenge-level vote: bumps the challenge's vote counter while
/// its voting window is open
pub fn record_challenge_vote(
    conn: &mut DbConn,
    challenge_id: i64,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let challenge = challenges::get_challenge(&tx, challenge_id)?;

    if challenge.status != ChallengeStatus::Voting {
        return Err(EngineError::invalid_state(
            ChallengeStatus::Voting.as_str(),
            challenge.status.as_str(),
        ));
    }
    require_within_window(challenge.voting_starts_at, challenge.voting_ends_at, now)?;

    challenges::set_votes_count(&tx, challenge_id, challenge.votes_count + 1, now)?;
    outbox::append(
        &tx,
        EVENT_VOTE_CAST,
        AGGREGATE_CHALLENGE,
        challenge_id,
        &json!({ "votes_count": challenge.votes_count + 1 }),
        now,
    )?;

    let updated = challenges::get_challenge(&tx, challenge_id)?;
    tx.commit()?;
    Ok(updated)
}

fn require_within_window(
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(start) = starts_at {
        if now < start {
            return Err(EngineError::validation("voting has not opened yet"));
        }
    }
    if let Some(end) = ends_at {
        if now > end {
            return Err(EngineError::validation("voting window has closed"));
        }
    }
    Ok(())
}

fn require_backing_reservation(
    reservation: &Reservation,
    customer_id: i64,
    restaurant_id: i64,
) -> Result<()> {
    if reservation.customer_id != customer_id {
        return Err(EngineError::validation(
            "reservation does not belong to this customer",
        ));
    }
    if reservation.restaurant_id != restaurant_id {
        return Err(EngineError::validation(
            "reservation is for a different restaurant",
        ));
    }
    if !reservation.seated {
        return Err(EngineError::validation(
            "reservation is not a completed visit",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::database::{memory_pool, setup};
    use crate::domain::status::{TournamentPhase, VoterClassification};
    use crate::lifecycle::tournament::{
        self, open_match_voting, start_tournament, NewTournament,
    };

    fn test_conn() -> DbConn {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        setup::initialize_schema(&conn).unwrap();
        conn
    }

    /// One started tournament with an open group-stage match
    fn seed_open_match(conn: &mut DbConn, now: DateTime<Utc>) -> crate::domain::Match {
        let new = NewTournament {
            name: "Cup".into(),
            city: "Porto".into(),
            cuisine: None,
            max_participants: 8,
            group_count: 1,
            group_size: 4,
            qualifiers_per_group: 4,
            match_voting_hours: 24,
        };
        let t = tournament::create_tournament(conn, &new, "tester", now).unwrap();
        tournament::open_registration(conn, t.id, "tester", now).unwrap();
        for i in 0..4 {
            let r = directory::insert_restaurant(conn, &format!("R{}", i), "Porto", "fish")
                .unwrap();
            tournament::register_restaurant(conn, t.id, r.id, "tester", now).unwrap();
        }
        start_tournament(conn, t.id, &mut StdRng::seed_from_u64(5), "tester", now).unwrap();

        let m = matches::list_by_phase(conn, t.id, TournamentPhase::GroupStage).unwrap()[0].clone();
        open_match_voting(conn, m.id, now).unwrap()
    }

    fn seed_customer(conn: &DbConn, name: &str, classification: VoterClassification) -> i64 {
        directory::insert_customer(conn, name, classification).unwrap().id
    }

    fn vote_for(m: &crate::domain::Match, customer_id: i64, suffix: &str) -> CastMatchVote {
        CastMatchVote {
            match_id: m.id,
            customer_id,
            restaurant_id: m.restaurant1_id,
            reservation_id: None,
            ip_address: format!("10.0.0.{}", suffix),
            device_id: format!("device-{}", suffix),
            user_agent: "test-agent".into(),
        }
    }

    #[test]
    fn test_vote_totals_match_ledger_rows() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);

        for i in 0..5 {
            let customer = seed_customer(&conn, &format!("c{}", i), VoterClassification::Tourist);
            let mut cast = vote_for(&m, customer, &i.to_string());
            if i >= 3 {
                cast.restaurant_id = m.restaurant2_id;
            }
            cast_match_vote(&mut conn, &cast, now).unwrap();
        }

        let updated = matches::get_match(&conn, m.id).unwrap();
        assert_eq!(updated.votes1, 3);
        assert_eq!(updated.votes2, 2);

        let ledger = votes::list_by_match(&conn, m.id).unwrap();
        let side1 = ledger
            .iter()
            .filter(|v| v.restaurant_id == m.restaurant1_id)
            .count() as i64;
        assert_eq!(updated.votes1, side1);
    }

    #[test]
    fn test_group_win_awards_three_points_to_the_winner_only() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);

        // 3 votes for restaurant1, 1 for restaurant2
        for i in 0..4 {
            let customer = seed_customer(&conn, &format!("g{}", i), VoterClassification::Tourist);
            let mut cast = vote_for(&m, customer, &i.to_string());
            if i == 3 {
                cast.restaurant_id = m.restaurant2_id;
            }
            cast_match_vote(&mut conn, &cast, now).unwrap();
        }

        let closed = tournament::close_match_voting(&mut conn, m.id, "tester", now).unwrap();
        assert_eq!(closed.winner_id, Some(m.restaurant1_id));

        let winner = crate::database::participations::find_for_tournament(
            &conn,
            m.tournament_id,
            m.restaurant1_id,
        )
        .unwrap()
        .unwrap();
        assert_eq!(winner.matches_won, 1);
        assert_eq!(winner.group_points, 3);

        let loser = crate::database::participations::find_for_tournament(
            &conn,
            m.tournament_id,
            m.restaurant2_id,
        )
        .unwrap()
        .unwrap();
        assert_eq!(loser.matches_lost, 1);
        assert_eq!(loser.group_points, 0);
    }

    #[test]
    fn test_duplicate_vote_is_conflict_and_totals_unchanged() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);
        let customer = seed_customer(&conn, "dup", VoterClassification::Local);

        cast_match_vote(&mut conn, &vote_for(&m, customer, "1"), now).unwrap();
        let before = matches::get_match(&conn, m.id).unwrap();

        let err = cast_match_vote(&mut conn, &vote_for(&m, customer, "2"), now).unwrap_err();
        assert!(err.is_conflict());

        let after = matches::get_match(&conn, m.id).unwrap();
        assert_eq!(after.votes1, before.votes1);
        assert_eq!(after.weighted_votes1, before.weighted_votes1);
    }

    #[test]
    fn test_vote_for_unrelated_restaurant_is_rejected() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);
        let customer = seed_customer(&conn, "x", VoterClassification::Local);
        let outsider = directory::insert_restaurant(&conn, "Elsewhere", "Porto", "sushi").unwrap();

        let mut cast = vote_for(&m, customer, "1");
        cast.restaurant_id = outsider.id;
        let err = cast_match_vote(&mut conn, &cast, now).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_verified_vote_gets_weight_bonus() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);
        let customer = seed_customer(&conn, "v", VoterClassification::Local);
        let reservation = directory::insert_reservation(
            &conn,
            customer,
            m.restaurant1_id,
            true,
            now - Duration::days(1),
        )
        .unwrap();

        let mut cast = vote_for(&m, customer, "1");
        cast.reservation_id = Some(reservation.id);
        let outcome = cast_match_vote(&mut conn, &cast, now).unwrap();

        assert!(outcome.vote.verified);
        // local base 1.2 boosted by 1.5
        assert!((outcome.vote.weight - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_same_device_burst_is_flagged_but_admitted() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);

        let mut last = None;
        for i in 0..3 {
            let customer = seed_customer(&conn, &format!("d{}", i), VoterClassification::Tourist);
            let mut cast = vote_for(&m, customer, &i.to_string());
            cast.device_id = "shared-device".into();
            last = Some(cast_match_vote(&mut conn, &cast, now).unwrap());
        }

        let outcome = last.unwrap();
        assert!(outcome.fraud.same_device_burst);

        // Still admitted: three ledger rows exist
        assert_eq!(votes::list_by_match(&conn, m.id).unwrap().len(), 3);
    }

    #[test]
    fn test_vote_on_cancelled_tournament_is_rejected() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);
        tournament::cancel_tournament(&mut conn, m.tournament_id, "tester", now).unwrap();

        let customer = seed_customer(&conn, "c", VoterClassification::Local);
        let err = cast_match_vote(&mut conn, &vote_for(&m, customer, "1"), now).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
        assert!(votes::list_by_match(&conn, m.id).unwrap().is_empty());
    }

    #[test]
    fn test_vote_outside_window_is_rejected() {
        let mut conn = test_conn();
        let now = Utc::now();
        let m = seed_open_match(&mut conn, now);
        let customer = seed_customer(&conn, "late", VoterClassification::Local);

        let late = now + Duration::hours(25);
        let err = cast_match_vote(&mut conn, &vote_for(&m, customer, "1"), late).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_ranking_vote_requires_membership_and_valid_rating() {
        let mut conn = test_conn();
        let now = Utc::now();

        let ranking = rankings::insert_ranking(
            &conn,
            "Top Porto",
            "city",
            "Porto",
            None,
            crate::domain::status::RankingPeriod::AllTime,
            None,
            None,
            now,
        )
        .unwrap();
        let restaurant = directory::insert_restaurant(&conn, "In", "Porto", "fish").unwrap();
        let stranger = directory::insert_restaurant(&conn, "Out", "Porto", "fish").unwrap();
        rankings::insert_entry(&conn, ranking.id, restaurant.id, 1, now).unwrap();

        let customer = seed_customer(&conn, "c", VoterClassification::Local);
        let reservation =
            directory::insert_reservation(&conn, customer, restaurant.id, true, now).unwrap();

        let mut cast = CastRankingVote {
            ranking_id: ranking.id,
            restaurant_id: stranger.id,
            customer_id: customer,
            reservation_id: reservation.id,
            rating: 5,
            sub_ratings: SubRatings::default(),
        };
        let err = cast_ranking_vote(&mut conn, &cast, now).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        cast.restaurant_id = restaurant.id;
        cast.rating = 6;
        let err = cast_ranking_vote(&mut conn, &cast, now).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        cast.rating = 4;
        let vote = cast_ranking_vote(&mut conn, &cast, now).unwrap();
        assert!(vote.verified);

        // Unique per (ranking, restaurant, voter)
        let err = cast_ranking_vote(&mut conn, &cast, now).unwrap_err();
        assert!(err.is_conflict());

        let entry = rankings::get_entry(&conn, ranking.id, restaurant.id)
            .unwrap()
            .unwrap();
        assert_eq!(entry.votes_count, 1);
        assert!((entry.avg_rating - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_vote_rate_burst_is_flagged_but_admitted() {
        let mut conn = test_conn();
        let now = Utc::now();

        let ranking = rankings::insert_ranking(
            &conn,
            "Top Porto",
            "city",
            "Porto",
            None,
            crate::domain::status::RankingPeriod::AllTime,
            None,
            None,
            now,
        )
        .unwrap();
        let customer = seed_customer(&conn, "busy", VoterClassification::Foodie);

        // Eleven votes inside one hour; the rate heuristic trips at ten
        let mut cast_votes = Vec::new();
        for i in 0..11 {
            let restaurant =
                directory::insert_restaurant(&conn, &format!("R{}", i), "Porto", "fish").unwrap();
            rankings::insert_entry(&conn, ranking.id, restaurant.id, (i + 1) as i64, now).unwrap();
            let reservation =
                directory::insert_reservation(&conn, customer, restaurant.id, true, now).unwrap();

            let vote = cast_ranking_vote(
                &mut conn,
                &CastRankingVote {
                    ranking_id: ranking.id,
                    restaurant_id: restaurant.id,
                    customer_id: customer,
                    reservation_id: reservation.id,
                    rating: 5,
                    sub_ratings: SubRatings::default(),
                },
                now,
            )
            .unwrap();
            cast_votes.push(vote);
        }

        assert!(!cast_votes[0].suspicious);
        assert!(!cast_votes[9].suspicious);
        assert!(cast_votes[10].suspicious);
    }
}
