//! Session controller: drives a [`BreathingEngine`] from a periodic sampler.
//!
//! Each controller spawns one task that owns its engine outright. Control
//! calls are messages answered over a oneshot channel, so a call returns
//! only after its command has been applied. Ticks and commands are handled
//! by the same task, one at a time, so no lock is involved and a tick's
//! transition logic always finishes before anything else runs.
//!
//! The read model is published on a `watch` channel once per tick and after
//! every command; events go out on a `broadcast` channel.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::error::{CoreError, UsageError};
use crate::events::{Event, SessionSnapshot};
use crate::pattern::BreathingPattern;
use crate::storage::SessionConfig;
use crate::timer::{BreathingEngine, EngineOptions, TimerState};

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 256;

/// Controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub tick_interval: Duration,
    pub engine: EngineOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            tick_interval: cfg.tick_interval(),
            engine: cfg.engine_options(),
        }
    }
}

enum Command {
    Select {
        pattern: BreathingPattern,
        reply: oneshot::Sender<()>,
    },
    Start {
        max_cycles: Option<u32>,
        reply: oneshot::Sender<Result<(), UsageError>>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
}

/// Handle to one interactive breathing session.
///
/// Dropping the handle cancels the sampler immediately.
pub struct SessionController {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<Event>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Spawn the controller task on the current tokio runtime.
    pub fn spawn(options: SessionOptions) -> Self {
        let engine = BreathingEngine::new(options.engine);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

        let actor = SessionActor {
            engine,
            tick_interval: options.tick_interval,
            ticker: None,
            snapshots: snapshot_tx,
            events: event_tx.clone(),
        };
        let task = tokio::spawn(actor.run(command_rx));

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx,
            task,
        }
    }

    /// Latest published read model.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver for every future read-model update.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Bind the pattern for the next `start()`, stopping any active session.
    pub async fn select(&self, pattern: BreathingPattern) -> Result<(), CoreError> {
        self.request(|reply| Command::Select { pattern, reply })
            .await
            .ok_or(UsageError::ControllerClosed)?;
        Ok(())
    }

    /// Start a session with the selected pattern.
    ///
    /// `max_cycles` overrides the pattern's and the configured limit.
    pub async fn start(&self, max_cycles: Option<u32>) -> Result<(), CoreError> {
        self.request(|reply| Command::Start { max_cycles, reply })
            .await
            .ok_or(UsageError::ControllerClosed)??;
        Ok(())
    }

    /// Select `pattern` and start in one step.
    pub async fn start_with(
        &self,
        pattern: BreathingPattern,
        max_cycles: Option<u32>,
    ) -> Result<(), CoreError> {
        self.select(pattern).await?;
        self.start(max_cycles).await
    }

    /// Returns whether a running session was paused. Never fails.
    pub async fn pause(&self) -> bool {
        self.request(|reply| Command::Pause { reply })
            .await
            .unwrap_or(false)
    }

    /// Returns whether a paused session was resumed. Never fails.
    pub async fn resume(&self) -> bool {
        self.request(|reply| Command::Resume { reply })
            .await
            .unwrap_or(false)
    }

    /// Stop the session. On return the sampler is disarmed and no further
    /// running update will be published. Returns whether a session ended.
    pub async fn stop(&self) -> bool {
        self.request(|reply| Command::Stop { reply })
            .await
            .unwrap_or(false)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await.ok()?;
        rx.await.ok()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SessionActor {
    engine: BreathingEngine,
    tick_interval: Duration,
    /// Armed only while the engine is running.
    ticker: Option<Interval>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<Event>,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                biased;

                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = next_tick(&mut self.ticker) => self.on_tick(),
            }
        }
        debug!("session controller shut down");
    }

    fn handle(&mut self, cmd: Command) {
        let now = Instant::now().into_std();
        match cmd {
            Command::Select { pattern, reply } => {
                let events: Vec<Event> = self.engine.select_at(pattern, now).into_iter().collect();
                self.settle(events);
                let _ = reply.send(());
            }
            Command::Start { max_cycles, reply } => match self.engine.start_at(now, max_cycles) {
                Ok(events) => {
                    self.settle(events);
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Pause { reply } => {
                let events = self.engine.pause_at(now);
                let paused = !events.is_empty() && self.engine.state() == TimerState::Paused;
                self.settle(events);
                let _ = reply.send(paused);
            }
            Command::Resume { reply } => {
                let events: Vec<Event> = self.engine.resume_at(now).into_iter().collect();
                let resumed = !events.is_empty();
                self.settle(events);
                let _ = reply.send(resumed);
            }
            Command::Stop { reply } => {
                let events: Vec<Event> = self.engine.stop_at(now).into_iter().collect();
                let stopped = !events.is_empty();
                self.settle(events);
                let _ = reply.send(stopped);
            }
        }
    }

    fn on_tick(&mut self) {
        let now = Instant::now().into_std();
        let events = self.engine.tick_at(now);
        trace!(progress = self.engine.progress(), "tick");
        self.settle(events);
    }

    /// Arm or disarm the sampler to match the engine, then publish.
    fn settle(&mut self, events: Vec<Event>) {
        if self.engine.is_running() {
            if self.ticker.is_none() {
                let mut ticker =
                    time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.ticker = Some(ticker);
            }
        } else {
            self.ticker = None;
        }

        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        self.snapshots.send_replace(self.engine.snapshot());
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{builtin_by_id, validate, Phase, PatternDraft};

    fn controller() -> SessionController {
        SessionController::spawn(SessionOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_pattern_is_a_usage_error() {
        let ctl = controller();
        let err = ctl.start(None).await.unwrap_err();
        assert!(matches!(err, CoreError::Usage(UsageError::NoPatternSelected)));
        assert_eq!(ctl.snapshot(), SessionSnapshot::idle(None, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn box_pattern_completes_one_cycle_in_sixteen_seconds() {
        let ctl = controller();
        ctl.start_with(builtin_by_id("box").unwrap(), None).await.unwrap();
        time::sleep(Duration::from_millis(16_010)).await;
        let snap = ctl.snapshot();
        assert_eq!(snap.completed_cycles, 1);
        assert_eq!(snap.phase, Phase::Inhale);
        assert!(snap.progress < 0.01);
        assert!(snap.running);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_and_resume_continues() {
        let ctl = controller();
        ctl.start_with(builtin_by_id("4-7-8").unwrap(), None).await.unwrap();
        time::sleep(Duration::from_millis(3_000)).await;

        assert!(ctl.pause().await);
        assert!(!ctl.pause().await);
        let frozen = ctl.snapshot();
        assert!(frozen.paused && !frozen.running);
        assert!((frozen.progress - 0.75).abs() < 0.02);

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ctl.snapshot(), frozen);

        assert!(ctl.resume().await);
        assert!(!ctl.resume().await);
        time::sleep(Duration::from_millis(2_000)).await;
        let snap = ctl.snapshot();
        assert_eq!(snap.phase, Phase::Hold);
        assert!((snap.progress - 1.0 / 7.0).abs() < 0.02);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_publishes_ready_and_goes_quiet() {
        let ctl = controller();
        let mut updates = ctl.subscribe();
        ctl.start_with(builtin_by_id("relaxing").unwrap(), None).await.unwrap();
        time::sleep(Duration::from_secs(12)).await;

        assert!(ctl.stop().await);
        let snap = ctl.snapshot();
        assert_eq!(snap.phase, Phase::Ready);
        assert_eq!(snap.progress, 0.0);
        assert!(!snap.running);
        assert_eq!(snap.completed_cycles, 1);

        updates.borrow_and_update();
        time::sleep(Duration::from_secs(5)).await;
        assert!(!updates.has_changed().unwrap());
        assert!(!ctl.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn events_report_phase_changes_and_completion() {
        let ctl = controller();
        let mut events = ctl.events();
        let pattern = validate(&PatternDraft::new("short", 1, 0, 1, 0).with_cycles(2)).unwrap();
        ctl.start_with(pattern, None).await.unwrap();
        time::sleep(Duration::from_secs(5)).await;

        let mut seen = Vec::new();
        while let Ok(ev) = events.try_recv() {
            seen.push(ev);
        }
        let cycles = seen
            .iter()
            .filter(|e| matches!(e, Event::CycleCompleted { .. }))
            .count();
        assert_eq!(cycles, 2);
        let summary = seen.iter().find_map(Event::summary).unwrap();
        assert_eq!(summary.completed_cycles, 2);
        assert!(!ctl.snapshot().running);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_controllers_do_not_interfere() {
        let a = controller();
        let b = controller();
        a.start_with(builtin_by_id("box").unwrap(), None).await.unwrap();
        time::sleep(Duration::from_secs(2)).await;
        b.start_with(builtin_by_id("relaxing").unwrap(), None).await.unwrap();
        time::sleep(Duration::from_secs(3)).await;
        assert!(a.stop().await);

        assert!(!a.snapshot().running);
        let snap_b = b.snapshot();
        assert!(snap_b.running);
        assert!((snap_b.progress - 0.75).abs() < 0.02);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_controller_cancels_the_sampler() {
        let ctl = controller();
        let mut updates = ctl.subscribe();
        ctl.start_with(builtin_by_id("box").unwrap(), None).await.unwrap();
        drop(ctl);
        time::sleep(Duration::from_secs(1)).await;
        updates.borrow_and_update();
        // Sender side is gone with the aborted task.
        assert!(updates.changed().await.is_err());
    }
}
