use anyhow::Result;

use restaurant_clash::cli::Command;
use restaurant_clash::{
    handle_completions, handle_demo, handle_init_db, handle_recalc_ranking, interpret,
};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::InitDb { database } => handle_init_db(database),
        Command::Demo { seed } => handle_demo(*seed),
        Command::RecalcRanking {
            database,
            ranking_id,
        } => handle_recalc_ranking(database, *ranking_id),
        Command::Completions { shell } => handle_completions(*shell),
    }
}
