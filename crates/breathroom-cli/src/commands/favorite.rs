use breathroom_core::Config;
use clap::Subcommand;

use super::{open_catalog, resolve_owner, CliResult};

#[derive(Subcommand)]
pub enum FavoriteAction {
    /// List favorite patterns
    List,
    /// Mark or unmark a pattern as favorite
    Toggle {
        /// Pattern ID
        id: String,
    },
}

pub fn run(action: FavoriteAction, owner: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let owner = resolve_owner(&config, owner);
    let catalog = open_catalog(&config)?;

    match action {
        FavoriteAction::List => {
            let favorites = catalog.favorites(&owner)?;
            println!("{}", serde_json::to_string_pretty(&favorites)?);
        }
        FavoriteAction::Toggle { id } => {
            let favorite = catalog.toggle_favorite(&id, &owner)?;
            let result = serde_json::json!({ "id": id, "favorite": favorite });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
