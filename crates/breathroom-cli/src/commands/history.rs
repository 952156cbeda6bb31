use breathroom_core::storage::Database;
use clap::Subcommand;

use super::CliResult;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Most recent sessions
    List {
        /// Maximum number of sessions to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Totals across all sessions
    Stats,
}

pub fn run(action: HistoryAction) -> CliResult {
    let db = Database::open()?;

    match action {
        HistoryAction::List { limit } => {
            let records = db.history(limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        HistoryAction::Stats => {
            let stats = db.stats_all()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
