use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(
    name = "restaurant_clash",
    about = "Restaurant competition engine: challenges, tournaments, and rankings"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database schema
    InitDb {
        /// Path to the SQLite database file
        #[arg(long, default_value = "competitions.db")]
        database: String,
    },
    /// Run a self-contained demo tournament in memory
    Demo {
        /// Seed for the bracket shuffle, random when omitted
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Recalculate a ranking's scores and positions
    RecalcRanking {
        /// Path to the SQLite database file
        #[arg(long, default_value = "competitions.db")]
        database: String,
        /// Ranking to recalculate
        ranking_id: i64,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}
