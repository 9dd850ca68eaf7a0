use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;

use crate::database::connection::DbConn;
use crate::database::participations::GroupOutcome;
use crate::database::{audit, directory, matches, outbox, participations, tournaments, votes};
use crate::domain::status::{
    next_phase, MatchStatus, ParticipationStatus, TournamentPhase, TournamentStatus,
};
use crate::domain::{Match, Tournament};
use crate::engine::standings::MatchDecision;
use crate::engine::{decide_winner, knockout_pairings, order_by_points, round_robin_fixtures};
use crate::errors::{EngineError, Result};

use super::{
    AGGREGATE_MATCH, AGGREGATE_TOURNAMENT, EVENT_MATCH_COMPLETED, EVENT_TOURNAMENT_COMPLETED,
    EVENT_TOURNAMENT_PHASE_ADVANCED, EVENT_TOURNAMENT_REGISTERED, EVENT_TOURNAMENT_STARTED,
    EVENT_TOURNAMENT_WITHDRAWN,
};

const MIN_PARTICIPANTS_TO_START: i64 = 4;

/// Parameters for creating a tournament
#[derive(Debug, Clone)]
pub struct NewTournament {
    pub name: String,
    pub city: String,
    pub cuisine: Option<String>,
    pub max_participants: i64,
    pub group_count: i64,
    pub group_size: i64,
    pub qualifiers_per_group: i64,
    pub match_voting_hours: i64,
}

pub fn create_tournament(
    conn: &mut DbConn,
    new: &NewTournament,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    validate_new_tournament(new)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::insert_tournament(
        &tx,
        &new.name,
        &new.city,
        new.cuisine.as_deref(),
        new.max_participants,
        new.group_count,
        new.group_size,
        new.qualifiers_per_group,
        new.match_voting_hours,
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "create",
        AGGREGATE_TOURNAMENT,
        tournament.id,
        None,
        Some(tournament.status.as_str()),
        now,
    )?;
    tx.commit()?;

    log::info!("Created tournament {} ({})", tournament.id, tournament.name);
    Ok(tournament)
}

fn validate_new_tournament(new: &NewTournament) -> Result<()> {
    if new.group_count < 1 || new.group_size < 2 {
        return Err(EngineError::validation(
            "tournament needs at least one group of two",
        ));
    }
    if new.qualifiers_per_group < 1 || new.qualifiers_per_group > new.group_size {
        return Err(EngineError::validation(
            "qualifiers per group must be between 1 and the group size",
        ));
    }
    if new.match_voting_hours < 1 {
        return Err(EngineError::validation("match voting duration must be positive"));
    }
    Ok(())
}

/// Edit a tournament's details while it is still a DRAFT
pub fn update_tournament(
    conn: &mut DbConn,
    id: i64,
    new: &NewTournament,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    validate_new_tournament(new)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::get_tournament(&tx, id)?;
    require_status(&tournament, TournamentStatus::Draft)?;

    tournaments::update_details(
        &tx,
        id,
        &new.name,
        &new.city,
        new.cuisine.as_deref(),
        new.max_participants,
        new.group_count,
        new.group_size,
        new.qualifiers_per_group,
        new.match_voting_hours,
        now,
    )?;
    audit::append(&tx, actor, "update", AGGREGATE_TOURNAMENT, id, None, None, now)?;

    let updated = tournaments::get_tournament(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

pub fn open_registration(
    conn: &mut DbConn,
    id: i64,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::get_tournament(&tx, id)?;
    require_status(&tournament, TournamentStatus::Draft)?;

    tournaments::update_status_and_phase(&tx, id, TournamentStatus::Registration, None, now)?;
    audit::append(
        &tx,
        actor,
        "open_registration",
        AGGREGATE_TOURNAMENT,
        id,
        Some(tournament.status.as_str()),
        Some(TournamentStatus::Registration.as_str()),
        now,
    )?;
    let updated = tournaments::get_tournament(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

pub fn register_restaurant(
    conn: &mut DbConn,
    tournament_id: i64,
    restaurant_id: i64,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::get_tournament(&tx, tournament_id)?;
    require_status(&tournament, TournamentStatus::Registration)?;

    let registered = participations::count_by_tournament(&tx, tournament_id)?;
    if registered >= tournament.max_participants {
        return Err(EngineError::validation("tournament is at capacity"));
    }
    directory::get_restaurant(&tx, restaurant_id)?;

    participations::insert_for_tournament(&tx, restaurant_id, tournament_id, now)?;
    outbox::append(
        &tx,
        EVENT_TOURNAMENT_REGISTERED,
        AGGREGATE_TOURNAMENT,
        tournament_id,
        &json!({ "restaurant_id": restaurant_id }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "register",
        AGGREGATE_TOURNAMENT,
        tournament_id,
        None,
        Some(&restaurant_id.to_string()),
        now,
    )?;
    tx.commit()?;
    Ok(())
}

/// Withdraw a registered restaurant before the draw.
///
/// Withdrawal is only allowed while registration is open; the row is kept
/// with a WITHDRAWN status so it frees a capacity slot without losing the
/// record. Once groups are drawn, leaving the tournament is an elimination.
pub fn withdraw_restaurant(
    conn: &mut DbConn,
    tournament_id: i64,
    restaurant_id: i64,
    reason: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::get_tournament(&tx, tournament_id)?;
    require_status(&tournament, TournamentStatus::Registration)?;

    let participation = participations::find_for_tournament(&tx, tournament_id, restaurant_id)?
        .ok_or_else(|| EngineError::not_found("participation", restaurant_id))?;
    if participation.status == ParticipationStatus::Withdrawn {
        return Err(EngineError::conflict("restaurant already withdrawn"));
    }

    participations::mark_eliminated(
        &tx,
        participation.id,
        ParticipationStatus::Withdrawn,
        reason,
        now,
    )?;
    outbox::append(
        &tx,
        EVENT_TOURNAMENT_WITHDRAWN,
        AGGREGATE_TOURNAMENT,
        tournament_id,
        &json!({ "restaurant_id": restaurant_id, "reason": reason }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "withdraw",
        AGGREGATE_TOURNAMENT,
        tournament_id,
        Some(participation.status.as_str()),
        Some(ParticipationStatus::Withdrawn.as_str()),
        now,
    )?;
    tx.commit()?;
    Ok(())
}

/// Start the tournament: assign groups and schedule the round-robin group
/// fixtures.
///
/// The shuffle source is injected so callers (and tests) can control the
/// draw.
pub fn start_tournament<R: Rng>(
    conn: &mut DbConn,
    tournament_id: i64,
    rng: &mut R,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::get_tournament(&tx, tournament_id)?;
    require_status(&tournament, TournamentStatus::Registration)?;

    let registered: Vec<_> = participations::list_by_tournament(&tx, tournament_id)?
        .into_iter()
        .filter(|p| p.status == ParticipationStatus::Registered)
        .collect();
    if (registered.len() as i64) < MIN_PARTICIPANTS_TO_START {
        return Err(EngineError::validation(format!(
            "tournament needs at least {} participants, has {}",
            MIN_PARTICIPANTS_TO_START,
            registered.len()
        )));
    }

    let restaurant_ids: Vec<i64> = registered.iter().map(|p| p.restaurant_id).collect();
    let groups = crate::engine::assign_groups(
        &restaurant_ids,
        tournament.group_count as usize,
        tournament.group_size as usize,
        rng,
    );

    for (index, group) in groups.iter().enumerate() {
        let group_number = (index + 1) as i64;

        for &restaurant_id in group {
            let participation = registered
                .iter()
                .find(|p| p.restaurant_id == restaurant_id)
                .ok_or_else(|| EngineError::not_found("participation", restaurant_id))?;
            participations::assign_group(&tx, participation.id, group_number)?;
            participations::set_furthest_phase(&tx, participation.id, TournamentPhase::GroupStage)?;
        }

        for fixture in round_robin_fixtures(group) {
            matches::insert_match(
                &tx,
                tournament_id,
                TournamentPhase::GroupStage,
                Some(group_number),
                Some(fixture.round_number),
                fixture.match_number,
                fixture.restaurant1_id,
                fixture.restaurant2_id,
                now,
            )?;
        }
    }

    tournaments::update_status_and_phase(
        &tx,
        tournament_id,
        TournamentStatus::Ongoing,
        Some(TournamentPhase::GroupStage),
        now,
    )?;
    outbox::append(
        &tx,
        EVENT_TOURNAMENT_STARTED,
        AGGREGATE_TOURNAMENT,
        tournament_id,
        &json!({ "participants": registered.len(), "groups": groups.len() }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "start",
        AGGREGATE_TOURNAMENT,
        tournament_id,
        Some(TournamentStatus::Registration.as_str()),
        Some(TournamentStatus::Ongoing.as_str()),
        now,
    )?;

    let updated = tournaments::get_tournament(&tx, tournament_id)?;
    tx.commit()?;

    log::info!(
        "Tournament {} started with {} participants in {} groups",
        tournament_id,
        registered.len(),
        groups.len()
    );
    Ok(updated)
}

/// Open the voting window of a scheduled match; its tournament must still
/// be ongoing
pub fn open_match_voting(conn: &mut DbConn, match_id: i64, now: DateTime<Utc>) -> Result<Match> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let m = matches::get_match(&tx, match_id)?;
    if m.status != MatchStatus::Scheduled {
        return Err(EngineError::invalid_state(
            MatchStatus::Scheduled.as_str(),
            m.status.as_str(),
        ));
    }

    let tournament = tournaments::get_tournament(&tx, m.tournament_id)?;
    require_status(&tournament, TournamentStatus::Ongoing)?;
    let ends_at = now + Duration::hours(tournament.match_voting_hours);
    matches::open_voting(&tx, match_id, now, ends_at)?;

    let updated = matches::get_match(&tx, match_id)?;
    tx.commit()?;
    Ok(updated)
}

/// Close a match's voting: recompute totals from the ledger, decide the
/// winner, and fold the result into both participations.
///
/// Closing is an explicit trigger; expired windows stay open until a caller
/// observes them and closes the match.
pub fn close_match_voting(
    conn: &mut DbConn,
    match_id: i64,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Match> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let m = matches::get_match(&tx, match_id)?;
    if m.status != MatchStatus::Voting {
        return Err(EngineError::invalid_state(
            MatchStatus::Voting.as_str(),
            m.status.as_str(),
        ));
    }
    let tournament = tournaments::get_tournament(&tx, m.tournament_id)?;
    require_status(&tournament, TournamentStatus::Ongoing)?;

    let (votes1, weighted1) = votes::totals_for_restaurant(&tx, match_id, m.restaurant1_id)?;
    let (votes2, weighted2) = votes::totals_for_restaurant(&tx, match_id, m.restaurant2_id)?;
    matches::set_vote_totals(&tx, match_id, votes1, votes2, weighted1, weighted2)?;

    let decision = decide_winner(
        m.restaurant1_id,
        m.restaurant2_id,
        weighted1,
        weighted2,
        votes1,
        votes2,
        m.phase.is_knockout(),
    );
    let winner_id = match decision {
        MatchDecision::Winner(id) => Some(id),
        MatchDecision::Draw => None,
    };
    matches::complete_match(&tx, match_id, winner_id, now)?;

    apply_result_to_participants(&tx, &m, winner_id, votes1, votes2, now)?;

    outbox::append(
        &tx,
        EVENT_MATCH_COMPLETED,
        AGGREGATE_MATCH,
        match_id,
        &json!({ "winner_id": winner_id, "votes1": votes1, "votes2": votes2 }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "close_match",
        AGGREGATE_MATCH,
        match_id,
        Some(MatchStatus::Voting.as_str()),
        Some(MatchStatus::Completed.as_str()),
        now,
    )?;

    let updated = matches::get_match(&tx, match_id)?;
    tx.commit()?;
    Ok(updated)
}

fn apply_result_to_participants(
    tx: &Connection,
    m: &Match,
    winner_id: Option<i64>,
    votes1: i64,
    votes2: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let p1 = participations::find_for_tournament(tx, m.tournament_id, m.restaurant1_id)?
        .ok_or_else(|| EngineError::not_found("participation", m.restaurant1_id))?;
    let p2 = participations::find_for_tournament(tx, m.tournament_id, m.restaurant2_id)?
        .ok_or_else(|| EngineError::not_found("participation", m.restaurant2_id))?;

    participations::add_votes(tx, p1.id, votes1)?;
    participations::add_votes(tx, p2.id, votes2)?;

    if m.phase == TournamentPhase::GroupStage {
        let (outcome1, outcome2) = match winner_id {
            Some(id) if id == m.restaurant1_id => (GroupOutcome::Win, GroupOutcome::Loss),
            Some(_) => (GroupOutcome::Loss, GroupOutcome::Win),
            None => (GroupOutcome::Draw, GroupOutcome::Draw),
        };
        participations::apply_group_outcome(tx, p1.id, outcome1)?;
        participations::apply_group_outcome(tx, p2.id, outcome2)?;
        return Ok(());
    }

    // Knockout: the loser leaves the tournament here
    if let Some(winner) = winner_id {
        let loser = if winner == m.restaurant1_id { &p2 } else { &p1 };
        participations::mark_eliminated(
            tx,
            loser.id,
            ParticipationStatus::Eliminated,
            &format!("lost in {}", m.phase.as_str()),
            now,
        )?;
    }
    Ok(())
}

/// Advance an ongoing tournament to its next phase.
///
/// Legal only once every match of the current phase is completed. Leaving
/// the group stage qualifies the configured top finishers per group and
/// brackets them; leaving a knockout phase rebrackets that phase's winners.
/// Advancing out of FINALS completes the tournament instead.
pub fn advance_phase<R: Rng>(
    conn: &mut DbConn,
    tournament_id: i64,
    rng: &mut R,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::get_tournament(&tx, tournament_id)?;
    require_status(&tournament, TournamentStatus::Ongoing)?;
    let current = tournament
        .current_phase
        .ok_or_else(|| EngineError::invalid_state("a current phase", "none"))?;

    let pending = matches::count_pending(&tx, tournament_id)?;
    if pending > 0 {
        return Err(EngineError::invalid_state(
            "all matches completed",
            format!("{} matches still pending", pending),
        ));
    }

    let advancing = match current {
        TournamentPhase::GroupStage => qualify_from_groups(&tx, &tournament, now)?,
        TournamentPhase::Finals => return complete_tournament(tx, &tournament, actor, now),
        knockout => collect_phase_winners(&tx, tournament_id, knockout)?,
    };

    let next = next_phase(current, advancing.len())
        .ok_or_else(|| EngineError::unsupported("no phase follows the current one"))?;

    let pairings = knockout_pairings(&advancing, rng);
    if pairings.is_empty() {
        return Err(EngineError::unsupported(
            "not enough advancing restaurants to schedule the next phase",
        ));
    }

    for (number, &(restaurant1_id, restaurant2_id)) in pairings.iter().enumerate() {
        matches::insert_match(
            &tx,
            tournament_id,
            next,
            None,
            None,
            (number + 1) as i64,
            restaurant1_id,
            restaurant2_id,
            now,
        )?;

        for restaurant_id in [restaurant1_id, restaurant2_id] {
            let participation =
                participations::find_for_tournament(&tx, tournament_id, restaurant_id)?
                    .ok_or_else(|| EngineError::not_found("participation", restaurant_id))?;
            participations::set_furthest_phase(&tx, participation.id, next)?;
        }
    }

    tournaments::update_status_and_phase(
        &tx,
        tournament_id,
        TournamentStatus::Ongoing,
        Some(next),
        now,
    )?;
    outbox::append(
        &tx,
        EVENT_TOURNAMENT_PHASE_ADVANCED,
        AGGREGATE_TOURNAMENT,
        tournament_id,
        &json!({ "from": current.as_str(), "to": next.as_str(), "matches": pairings.len() }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "advance_phase",
        AGGREGATE_TOURNAMENT,
        tournament_id,
        Some(current.as_str()),
        Some(next.as_str()),
        now,
    )?;

    let updated = tournaments::get_tournament(&tx, tournament_id)?;
    tx.commit()?;

    log::info!(
        "Tournament {} advanced {} -> {} ({} matches)",
        tournament_id,
        current.as_str(),
        next.as_str(),
        pairings.len()
    );
    Ok(updated)
}

/// Rank each group, qualify the top finishers, eliminate the rest, and
/// return the qualified restaurant ids
fn qualify_from_groups(
    tx: &Connection,
    tournament: &Tournament,
    now: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let all = participations::list_by_tournament(tx, tournament.id)?;
    let mut group_numbers: Vec<i64> = all.iter().filter_map(|p| p.group_number).collect();
    group_numbers.sort_unstable();
    group_numbers.dedup();

    let mut qualified = Vec::new();

    for group_number in group_numbers {
        let members: Vec<_> = participations::list_by_group(tx, tournament.id, group_number)?
            .into_iter()
            .filter(|p| p.status == ParticipationStatus::Active)
            .collect();
        let ordered = order_by_points(members);

        for (index, participation) in ordered.iter().enumerate() {
            let position = (index + 1) as i64;
            participations::set_group_position(tx, participation.id, position)?;

            if position <= tournament.qualifiers_per_group {
                participations::mark_qualified(
                    tx,
                    participation.id,
                    position,
                    participation.group_points as f64,
                )?;
                qualified.push(participation.restaurant_id);
            } else {
                participations::mark_eliminated(
                    tx,
                    participation.id,
                    ParticipationStatus::Eliminated,
                    "eliminated in group stage",
                    now,
                )?;
            }
        }
    }

    Ok(qualified)
}

/// Winners of every completed match in the given knockout phase.
///
/// A knockout phase with zero recorded winners cannot be rebracketed: that
/// is a hard error, never silently skipped.
fn collect_phase_winners(
    tx: &Connection,
    tournament_id: i64,
    phase: TournamentPhase,
) -> Result<Vec<i64>> {
    let winners: Vec<i64> = matches::list_by_phase(tx, tournament_id, phase)?
        .into_iter()
        .filter_map(|m| m.winner_id)
        .collect();

    if winners.is_empty() {
        return Err(EngineError::unsupported(format!(
            "phase {} has no winners to re-bracket",
            phase.as_str()
        )));
    }
    Ok(winners)
}

fn complete_tournament(
    tx: rusqlite::Transaction<'_>,
    tournament: &Tournament,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    let champions = collect_phase_winners(&tx, tournament.id, TournamentPhase::Finals)?;
    let champion_id = champions[0];

    let participation = participations::find_for_tournament(&tx, tournament.id, champion_id)?
        .ok_or_else(|| EngineError::not_found("participation", champion_id))?;
    participations::update_status(&tx, participation.id, ParticipationStatus::Winner)?;

    tournaments::update_status_and_phase(
        &tx,
        tournament.id,
        TournamentStatus::Completed,
        None,
        now,
    )?;
    outbox::append(
        &tx,
        EVENT_TOURNAMENT_COMPLETED,
        AGGREGATE_TOURNAMENT,
        tournament.id,
        &json!({ "winner_restaurant_id": champion_id }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "complete",
        AGGREGATE_TOURNAMENT,
        tournament.id,
        Some(TournamentStatus::Ongoing.as_str()),
        Some(TournamentStatus::Completed.as_str()),
        now,
    )?;

    let updated = tournaments::get_tournament(&tx, tournament.id)?;
    tx.commit()?;

    log::info!(
        "Tournament {} completed, winner restaurant {}",
        tournament.id,
        champion_id
    );
    Ok(updated)
}

pub fn cancel_tournament(
    conn: &mut DbConn,
    id: i64,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tournament = tournaments::get_tournament(&tx, id)?;
    if tournament.status.is_terminal() {
        return Err(EngineError::invalid_state(
            "any non-terminal state",
            tournament.status.as_str(),
        ));
    }

    tournaments::update_status_and_phase(&tx, id, TournamentStatus::Cancelled, None, now)?;
    audit::append(
        &tx,
        actor,
        "cancel",
        AGGREGATE_TOURNAMENT,
        id,
        Some(tournament.status.as_str()),
        Some(TournamentStatus::Cancelled.as_str()),
        now,
    )?;
    let updated = tournaments::get_tournament(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

fn require_status(tournament: &Tournament, expected: TournamentStatus) -> Result<()> {
    if tournament.status != expected {
        return Err(EngineError::invalid_state(
            expected.as_str(),
            tournament.status.as_str(),
        ));
    }
    Ok(())
}
