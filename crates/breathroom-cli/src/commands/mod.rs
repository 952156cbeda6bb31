pub mod config;
pub mod favorite;
pub mod history;
pub mod pattern;
pub mod session;

use breathroom_core::{Config, Database, PatternCatalog};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the catalog over the on-disk database, honoring config limits.
pub fn open_catalog(
    config: &Config,
) -> Result<PatternCatalog<Database>, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    Ok(PatternCatalog::new(db).with_max_custom_patterns(config.catalog.max_custom_patterns))
}

/// `--owner` if given, else the configured default owner.
pub fn resolve_owner(config: &Config, owner: Option<String>) -> String {
    owner.unwrap_or_else(|| config.catalog.default_owner.clone())
}
