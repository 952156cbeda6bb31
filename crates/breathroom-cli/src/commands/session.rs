//! Live and simulated breathing sessions.

use std::io::Write;
use std::time::{Duration, Instant};

use breathroom_core::storage::UiConfig;
use breathroom_core::{
    BreathingEngine, Config, Event, SessionController, SessionOptions, SessionSnapshot,
};
use clap::Subcommand;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::{open_catalog, resolve_owner, CliResult};

/// Longest simulated span accepted by `session preview` (one day).
const MAX_PREVIEW_SECS: f64 = 86_400.0;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a live session until its cycle limit or Ctrl-C
    Run {
        /// Pattern ID
        id: String,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u32>,
    },
    /// Simulate a session without waiting and print its events
    Preview {
        /// Pattern ID
        id: String,
        /// Simulated wall-clock seconds
        #[arg(long, default_value = "60")]
        seconds: f64,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u32>,
    },
}

pub fn run(action: SessionAction, owner: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let owner = resolve_owner(&config, owner);

    match action {
        SessionAction::Run { id, cycles } => run_live(&config, &owner, &id, cycles),
        SessionAction::Preview { id, seconds, cycles } => {
            preview(&config, &owner, &id, seconds, cycles)
        }
    }
}

fn run_live(config: &Config, owner: &str, id: &str, cycles: Option<u32>) -> CliResult {
    let catalog = open_catalog(config)?;
    let pattern = catalog.get(id, owner)?;
    println!("{} ({})", pattern.name(), pattern.rhythm());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let controller = SessionController::spawn(SessionOptions::from(&config.session));
        let mut snapshots = controller.subscribe();
        let mut events = controller.events();
        controller.start_with(pattern, cycles).await?;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    render(&snapshot, &config.ui);
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Event::PhaseChanged { .. } = event {
                            println!();
                        }
                        if let Some(summary) = event.summary() {
                            let row = catalog.store().record_session(summary)?;
                            debug!(row, "session recorded");
                            println!();
                            println!("{}", serde_json::to_string_pretty(summary)?);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                    Err(RecvError::Closed) => break,
                },
                _ = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    if !controller.stop().await {
                        break;
                    }
                }
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Redraw the status line in place.
fn render(snapshot: &SessionSnapshot, ui: &UiConfig) {
    let cycles = match snapshot.max_cycles {
        Some(max) => format!("{}/{}", snapshot.completed_cycles, max),
        None => snapshot.completed_cycles.to_string(),
    };
    let remaining = snapshot.remaining_ms as f64 / 1000.0;
    let mut line = format!("\r{:<18}", snapshot.phase_label);
    if ui.show_progress_bar {
        line.push_str(&progress_bar(snapshot.progress, ui.bar_width));
        line.push(' ');
    }
    line.push_str(&format!("{remaining:>5.1}s  cycles {cycles}"));
    if snapshot.paused {
        line.push_str("  (paused)");
    }

    let mut out = std::io::stdout();
    let _ = out.write_all(line.as_bytes());
    let _ = out.flush();
}

fn progress_bar(progress: f64, width: u32) -> String {
    let width = width as usize;
    let filled = ((progress.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn preview(
    config: &Config,
    owner: &str,
    id: &str,
    seconds: f64,
    cycles: Option<u32>,
) -> CliResult {
    if !(0.0..=MAX_PREVIEW_SECS).contains(&seconds) {
        return Err(
            format!("--seconds must be between 0 and {MAX_PREVIEW_SECS}, got {seconds}").into(),
        );
    }
    let total = Duration::try_from_secs_f64(seconds)?;
    let catalog = open_catalog(config)?;
    let pattern = catalog.get(id, owner)?;

    let step = config.session.tick_interval();
    let t0 = Instant::now();

    let mut engine = BreathingEngine::new(config.session.engine_options());
    let mut events = engine.start_with_at(pattern, t0, cycles);

    let mut offset = Duration::ZERO;
    while offset < total && engine.is_running() {
        offset = (offset + step).min(total);
        events.extend(engine.tick_at(t0 + offset));
    }

    let output = serde_json::json!({
        "simulatedSeconds": offset.as_secs_f64(),
        "events": events,
        "snapshot": engine.snapshot_event(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
