pub mod cli;
pub mod config;
pub mod database;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod lifecycle;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::{Cli, Command};
use crate::database::ranking_votes::SubRatings;
use crate::domain::status::{MatchStatus, VoterClassification};
use crate::lifecycle::voting::CastMatchVote;
use crate::lifecycle::{queries, ranking, tournament, voting, NewRanking, NewTournament};

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

pub fn handle_init_db(path: &str) -> Result<()> {
    let pool = database::open_pool(path)?;
    let conn = pool.get().context("Failed to get a database connection")?;
    database::initialize_schema(&conn)?;

    println!("{} {}", "Initialized schema in".green(), path);
    Ok(())
}

pub fn handle_completions(shell: clap_complete::Shell) -> Result<()> {
    clap_complete::generate(
        shell,
        &mut Cli::command(),
        "restaurant_clash",
        &mut std::io::stdout(),
    );
    Ok(())
}

pub fn handle_recalc_ranking(path: &str, ranking_id: i64) -> Result<()> {
    let pool = database::open_pool(path)?;
    let mut conn = pool.get().context("Failed to get a database connection")?;

    let entries = ranking::recalculate(&mut conn, ranking_id, "cli", Utc::now())?;
    for entry in &entries {
        println!(
            "{:>3}. restaurant {:<6} score {}",
            entry.position, entry.restaurant_id, entry.score
        );
    }
    Ok(())
}

/// Run a four-restaurant tournament end to end against an in-memory
/// database and print the outcome
pub fn handle_demo(seed: Option<u64>) -> Result<()> {
    let pool = database::memory_pool()?;
    let mut conn = pool.get().context("Failed to get a database connection")?;
    database::initialize_schema(&conn)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let now = Utc::now();

    let t = tournament::create_tournament(
        &mut conn,
        &NewTournament {
            name: "Demo City Cup".into(),
            city: "Lisbon".into(),
            cuisine: None,
            max_participants: 8,
            group_count: 1,
            group_size: 4,
            qualifiers_per_group: 4,
            match_voting_hours: 24,
        },
        "demo",
        now,
    )?;
    tournament::open_registration(&mut conn, t.id, "demo", now)?;

    let names = ["Taberna Norte", "Casa do Sul", "O Forno", "Mar Alto"];
    for name in names {
        let restaurant = database::directory::insert_restaurant(&conn, name, "Lisbon", "tasca")?;
        tournament::register_restaurant(&mut conn, t.id, restaurant.id, "demo", now)?;
    }
    tournament::start_tournament(&mut conn, t.id, &mut rng, "demo", now)?;
    println!("{}", "Group stage scheduled".bold());

    run_current_phase(&mut conn, t.id, &mut rng, now)?;
    let mut current = tournament::advance_phase(&mut conn, t.id, &mut rng, "demo", now)?;

    while current.current_phase.is_some() {
        run_current_phase(&mut conn, t.id, &mut rng, now)?;
        current = tournament::advance_phase(&mut conn, t.id, &mut rng, "demo", now)?;
    }

    println!("{} {}", "Tournament completed:".green().bold(), current.name);
    let stats = queries::tournament_statistics(&conn, t.id)?;
    println!(
        "{} participants, {} matches, {} votes",
        stats.participants, stats.matches_total, stats.total_votes
    );

    demo_ranking(&mut conn, now)?;
    Ok(())
}

/// Open every scheduled match of the current phase, cast a few random
/// votes, and close them
fn run_current_phase(
    conn: &mut database::DbConn,
    tournament_id: i64,
    rng: &mut StdRng,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    use rand::Rng;

    let current = database::tournaments::get_tournament(conn, tournament_id)?;
    let phase = match current.current_phase {
        Some(phase) => phase,
        None => return Ok(()),
    };

    for m in database::matches::list_by_phase(conn, tournament_id, phase)? {
        if m.status != MatchStatus::Scheduled {
            continue;
        }
        let open = tournament::open_match_voting(conn, m.id, now)?;

        for i in 0..rng.gen_range(3..8) {
            let classification = if rng.gen_bool(0.5) {
                VoterClassification::Local
            } else {
                VoterClassification::Tourist
            };
            let customer = database::directory::insert_customer(
                conn,
                &format!("voter-{}-{}", m.id, i),
                classification,
            )?;
            let side = if rng.gen_bool(0.5) {
                open.restaurant1_id
            } else {
                open.restaurant2_id
            };
            voting::cast_match_vote(
                conn,
                &CastMatchVote {
                    match_id: m.id,
                    customer_id: customer.id,
                    restaurant_id: side,
                    reservation_id: None,
                    ip_address: format!("192.0.2.{}", i),
                    device_id: format!("demo-device-{}-{}", m.id, i),
                    user_agent: "demo".into(),
                },
                now,
            )?;
        }

        let closed = tournament::close_match_voting(conn, m.id, "demo", now)?;
        let card = queries::match_card(conn, closed.id)?;
        println!(
            "  {} {} {} - {} {}",
            phase.as_str().dimmed(),
            card.restaurant1_name,
            closed.votes1,
            closed.votes2,
            card.restaurant2_name
        );
    }
    Ok(())
}

/// Build and recalculate a small ranking from the demo data
fn demo_ranking(conn: &mut database::DbConn, now: chrono::DateTime<Utc>) -> Result<()> {
    let r = ranking::create_ranking(
        conn,
        &NewRanking {
            name: "Top Lisbon Tascas".into(),
            scope: "city".into(),
            city: "Lisbon".into(),
            cuisine: Some("tasca".into()),
            period: domain::status::RankingPeriod::Monthly,
        },
        "demo",
        now,
    )?;

    for restaurant_id in [1i64, 2, 3, 4] {
        ranking::add_restaurant(conn, r.id, restaurant_id, now)?;

        let customer = database::directory::insert_customer(
            conn,
            &format!("critic-{}", restaurant_id),
            VoterClassification::Critic,
        )?;
        let reservation = database::directory::insert_reservation(
            conn,
            customer.id,
            restaurant_id,
            true,
            now,
        )?;
        voting::cast_ranking_vote(
            conn,
            &voting::CastRankingVote {
                ranking_id: r.id,
                restaurant_id,
                customer_id: customer.id,
                reservation_id: reservation.id,
                rating: 3 + (restaurant_id % 3),
                sub_ratings: SubRatings::default(),
            },
            now,
        )?;
    }

    println!("{}", "Ranking after recalculation".bold());
    for entry in ranking::recalculate(conn, r.id, "demo", now)? {
        let trend = match entry.previous_position {
            Some(prev) if prev > entry.position => "▲",
            Some(prev) if prev < entry.position => "▼",
            _ => "=",
        };
        println!(
            "  {:>2}. restaurant {:<3} {} score {}",
            entry.position, entry.restaurant_id, trend, entry.score
        );
    }
    Ok(())
}
