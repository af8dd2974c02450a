//! Reveal scheduler
//!
//! Presents an already-complete reply as if it were typed out, one `char`
//! per tick. The scheduler owns the only timer; ticks arrive on a channel
//! tagged with the job they belong to so that ticks from a superseded job
//! can be told apart and dropped.

use crate::state_machine::RevealJobId;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default tick period
pub const DEFAULT_REVEAL_SPEED: Duration = Duration::from_millis(30);

/// Cursor over the text being revealed
#[derive(Debug, Clone)]
pub struct RevealJob {
    id: RevealJobId,
    target: Vec<char>,
    cursor: usize,
    visible: String,
}

impl RevealJob {
    pub fn new(id: RevealJobId, text: &str) -> Self {
        Self {
            id,
            target: text.chars().collect(),
            cursor: 0,
            visible: String::new(),
        }
    }

    pub fn id(&self) -> RevealJobId {
        self.id
    }

    /// Reveal one more character; returns it, or `None` at the end
    pub fn advance(&mut self) -> Option<char> {
        let next = *self.target.get(self.cursor)?;
        self.visible.push(next);
        self.cursor += 1;
        Some(next)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.target.len()
    }

    pub fn visible(&self) -> &str {
        &self.visible
    }
}

/// What a tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealTick {
    /// Tick from a cancelled or finished job
    Stale,
    /// One more character is visible
    Progress { job: RevealJobId, visible: String },
    /// The whole text is visible and the timer is stopped
    Finished { job: RevealJobId, visible: String },
}

struct ActiveReveal {
    job: RevealJob,
    cancel: CancellationToken,
    timer: JoinHandle<()>,
}

impl ActiveReveal {
    fn stop(&self) {
        self.cancel.cancel();
        self.timer.abort();
    }
}

/// Drives at most one reveal at a time
pub struct RevealScheduler {
    speed: Duration,
    tick_tx: mpsc::UnboundedSender<RevealJobId>,
    active: Option<ActiveReveal>,
}

impl RevealScheduler {
    /// Create a scheduler and the receiver its ticks arrive on.
    /// Every received id must be handed back to [`RevealScheduler::on_tick`].
    pub fn new(speed: Duration) -> (Self, mpsc::UnboundedReceiver<RevealJobId>) {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        (
            Self {
                speed,
                tick_tx,
                active: None,
            },
            tick_rx,
        )
    }

    /// Start revealing `text`, superseding any active job. The superseded
    /// job keeps whatever it had already revealed.
    pub fn start(&mut self, id: RevealJobId, text: &str) {
        self.cancel();

        let cancel = CancellationToken::new();
        let timer = spawn_timer(id, self.speed, cancel.clone(), self.tick_tx.clone());

        tracing::debug!(turn_index = id.turn_index(), chars = text.chars().count(), "Reveal started");
        self.active = Some(ActiveReveal {
            job: RevealJob::new(id, text),
            cancel,
            timer,
        });
    }

    /// Stop the active job's timer. No-op when nothing is running.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop();
            tracing::debug!(turn_index = active.job.id().turn_index(), "Reveal cancelled");
        }
    }

    pub fn active_job(&self) -> Option<RevealJobId> {
        self.active.as_ref().map(|a| a.job.id())
    }

    /// Visible text of the active job
    pub fn visible(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.job.visible())
    }

    /// Apply one tick of the timer
    pub fn on_tick(&mut self, id: RevealJobId) -> RevealTick {
        let Some(active) = self.active.as_mut().filter(|a| a.job.id() == id) else {
            return RevealTick::Stale;
        };

        active.job.advance();
        if !active.job.is_complete() {
            return RevealTick::Progress {
                job: id,
                visible: active.job.visible().to_string(),
            };
        }

        let visible = active.job.visible().to_string();
        self.cancel();
        RevealTick::Finished { job: id, visible }
    }
}

impl Drop for RevealScheduler {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop();
        }
    }
}

fn spawn_timer(
    id: RevealJobId,
    speed: Duration,
    cancel: CancellationToken,
    tick_tx: mpsc::UnboundedSender<RevealJobId>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + speed, speed);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if tick_tx.send(id).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
