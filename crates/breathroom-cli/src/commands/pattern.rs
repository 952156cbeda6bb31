//! Breathing pattern commands for CLI.

use breathroom_core::pattern::{validate, NumericInput, PatternDraft};
use breathroom_core::{Config, CoreError};
use clap::{Args, Subcommand};

use super::{open_catalog, resolve_owner, CliResult};

/// Pattern fields as typed on the command line. Values are passed to
/// validation as text so every problem is reported at once.
#[derive(Args, Debug, Default)]
pub struct PatternFields {
    /// Pattern name
    #[arg(long)]
    name: Option<String>,
    /// Description
    #[arg(long)]
    description: Option<String>,
    /// Inhale seconds (> 0)
    #[arg(long)]
    inhale: Option<String>,
    /// Hold seconds after inhaling (>= 0)
    #[arg(long)]
    hold: Option<String>,
    /// Exhale seconds (> 0)
    #[arg(long)]
    exhale: Option<String>,
    /// Hold seconds after exhaling (>= 0)
    #[arg(long)]
    hold_after_exhale: Option<String>,
    /// Default number of cycles per session
    #[arg(long)]
    cycles: Option<String>,
    /// Display color (#RRGGBB)
    #[arg(long)]
    color: Option<String>,
}

impl PatternFields {
    /// Overlay the given fields onto `base`.
    fn apply_to(self, mut base: PatternDraft) -> PatternDraft {
        let num = |v: String| NumericInput::Text(v);
        if let Some(v) = self.name {
            base.name = Some(v);
        }
        if let Some(v) = self.description {
            base.description = Some(v);
        }
        if let Some(v) = self.inhale {
            base.inhale = Some(num(v));
        }
        if let Some(v) = self.hold {
            base.hold = Some(num(v));
        }
        if let Some(v) = self.exhale {
            base.exhale = Some(num(v));
        }
        if let Some(v) = self.hold_after_exhale {
            base.hold_after_exhale = Some(num(v));
        }
        if let Some(v) = self.cycles {
            base.cycles = Some(num(v));
        }
        if let Some(v) = self.color {
            base.color = Some(v);
        }
        base
    }
}

#[derive(Subcommand)]
pub enum PatternAction {
    /// List built-in and custom patterns
    List,
    /// Show one pattern
    Show {
        /// Pattern ID
        id: String,
    },
    /// Create a custom pattern
    Create {
        #[command(flatten)]
        fields: PatternFields,
    },
    /// Update a custom pattern (unspecified fields keep their value)
    Update {
        /// Pattern ID
        id: String,
        #[command(flatten)]
        fields: PatternFields,
    },
    /// Delete a custom pattern
    Delete {
        /// Pattern ID
        id: String,
    },
    /// Check a candidate pattern without saving it
    Validate {
        #[command(flatten)]
        fields: PatternFields,
    },
}

fn print_violations(err: &CoreError) {
    if let CoreError::Validation(v) = err {
        if let Ok(json) = serde_json::to_string_pretty(&v.violations) {
            eprintln!("{json}");
        }
    }
}

pub fn run(action: PatternAction, owner: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let owner = resolve_owner(&config, owner);

    match action {
        PatternAction::List => {
            let catalog = open_catalog(&config)?;
            let patterns = catalog.list(&owner)?;
            println!("{}", serde_json::to_string_pretty(&patterns)?);
        }
        PatternAction::Show { id } => {
            let catalog = open_catalog(&config)?;
            let pattern = catalog.get(&id, &owner)?;
            println!("{}", serde_json::to_string_pretty(&pattern)?);
        }
        PatternAction::Create { fields } => {
            let catalog = open_catalog(&config)?;
            let draft = fields.apply_to(PatternDraft::default());
            let pattern = catalog.save(&draft, &owner).inspect_err(print_violations)?;
            println!("Pattern created: {}", pattern.id());
            println!("{}", serde_json::to_string_pretty(&pattern)?);
        }
        PatternAction::Update { id, fields } => {
            let catalog = open_catalog(&config)?;
            let current = catalog.get(&id, &owner)?;
            let draft = fields.apply_to(PatternDraft::from(&current));
            let pattern = catalog
                .update(&id, &draft, &owner)
                .inspect_err(print_violations)?;
            println!("Pattern updated: {}", pattern.id());
            println!("{}", serde_json::to_string_pretty(&pattern)?);
        }
        PatternAction::Delete { id } => {
            let catalog = open_catalog(&config)?;
            catalog.delete(&id, &owner)?;
            println!("Pattern deleted: {id}");
        }
        PatternAction::Validate { fields } => {
            let draft = fields.apply_to(PatternDraft::default());
            match validate(&draft) {
                Ok(pattern) => println!("{}", serde_json::to_string_pretty(&pattern)?),
                Err(e) => {
                    println!("{}", serde_json::to_string_pretty(&e.violations)?);
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
