//! Roll display sequencer
//!
//! Turns bursts of roll batches into a steady, one-at-a-time presentation.
//! Every promoted roll arms two timers from the same instant:
//!
//! ```text
//!  t=0        t=hide_after        t=advance_after
//!  |--- shown ---|----- blank -----|--- next roll ...
//! ```
//!
//! The hide timer only clears the screen. The advance timer promotes the
//! next pending roll, or drops back to `Idle` when nothing is waiting.
//!
//! [`Sequencer`] is the synchronous state machine and takes explicit
//! instants, so it can be stepped in tests. [`SequencerHandle`] owns a tokio
//! task that drives it and publishes [`DisplaySnapshot`]s on a watch channel.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{OverlayError, Result};
use crate::roll::RollResult;

/// How long a roll stays on screen
pub const DEFAULT_HIDE_AFTER: Duration = Duration::from_secs(5);
/// Time from one roll appearing to the next one appearing
pub const DEFAULT_ADVANCE_AFTER: Duration = Duration::from_secs(8);
/// Longest cadence a sequencer accepts
pub const MAX_ADVANCE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing and queue policy for a sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    pub hide_after: Duration,
    pub advance_after: Duration,
    /// Pending rolls kept before the oldest is dropped (None = unbounded)
    pub max_pending: Option<usize>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            hide_after: DEFAULT_HIDE_AFTER,
            advance_after: DEFAULT_ADVANCE_AFTER,
            max_pending: None,
        }
    }
}

impl SequencerConfig {
    /// Reject timings that would show two rolls at once or spin without delay
    pub fn validate(&self) -> Result<()> {
        if self.advance_after.is_zero() {
            return Err(OverlayError::InvalidTiming(
                "advance_after must be greater than zero".to_string(),
            ));
        }
        if self.advance_after > MAX_ADVANCE_AFTER {
            return Err(OverlayError::InvalidTiming(format!(
                "advance_after ({:?}) must not exceed {:?}",
                self.advance_after, MAX_ADVANCE_AFTER
            )));
        }
        if self.hide_after > self.advance_after {
            return Err(OverlayError::InvalidTiming(format!(
                "hide_after ({:?}) must not exceed advance_after ({:?})",
                self.hide_after, self.advance_after
            )));
        }
        if self.max_pending == Some(0) {
            return Err(OverlayError::InvalidTiming(
                "max_pending must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sequencer state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    /// Nothing on screen, no timers armed
    #[default]
    Idle,
    /// A roll was promoted and its timers are armed
    Displaying,
}

impl SequencerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequencerState::Idle => "idle",
            SequencerState::Displaying => "displaying",
        }
    }
}

/// What the presentation surface sees
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplaySnapshot {
    pub state: SequencerState,
    /// Roll on screen; `None` during the blank gap and while idle
    pub current: Option<RollResult>,
    /// Rolls waiting behind the current one
    pub pending: usize,
    /// Rolls promoted so far
    pub shown: u64,
    /// Rolls discarded by the drop-oldest policy
    pub dropped: u64,
}

/// Deadlines for the roll that was last promoted
#[derive(Debug, Clone, Copy)]
struct Timers {
    /// Cleared once the hide timer has fired
    hide_at: Option<Instant>,
    advance_at: Instant,
}

/// Display queue plus the current-display slot
#[derive(Debug)]
pub struct Sequencer {
    config: SequencerConfig,
    queue: VecDeque<RollResult>,
    current: Option<RollResult>,
    timers: Option<Timers>,
    shown: u64,
    dropped: u64,
}

impl Sequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            current: None,
            timers: None,
            shown: 0,
            dropped: 0,
        }
    }

    pub fn state(&self) -> SequencerState {
        if self.timers.is_some() {
            SequencerState::Displaying
        } else {
            SequencerState::Idle
        }
    }

    pub fn current(&self) -> Option<&RollResult> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            state: self.state(),
            current: self.current.clone(),
            pending: self.queue.len(),
            shown: self.shown,
            dropped: self.dropped,
        }
    }

    /// Append a batch in order. An idle sequencer promotes the first roll at `now`.
    ///
    /// Never interrupts the roll on screen or moves its timers.
    pub fn enqueue(&mut self, batch: Vec<RollResult>, now: Instant) {
        for roll in batch {
            if let Some(limit) = self.config.max_pending {
                if self.queue.len() >= limit {
                    if let Some(old) = self.queue.pop_front() {
                        self.dropped += 1;
                        warn!(
                            rolled_number = old.rolled_number,
                            max_pending = limit,
                            "display queue full, dropping oldest roll"
                        );
                    }
                }
            }
            self.queue.push_back(roll);

            if self.timers.is_none() {
                self.advance(now);
            }
        }
    }

    /// Earliest armed deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.map(|t| match t.hide_at {
            Some(hide_at) => hide_at.min(t.advance_at),
            None => t.advance_at,
        })
    }

    /// Fire every timer that is due at `now`, hide before advance.
    ///
    /// Returns true if the display changed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        let mut changed = false;

        while let Some(timers) = self.timers.as_mut() {
            if let Some(hide_at) = timers.hide_at.filter(|at| *at <= now) {
                timers.hide_at = None;
                if let Some(roll) = self.current.take() {
                    debug!(rolled_number = roll.rolled_number, ?hide_at, "hiding roll");
                }
                changed = true;
                continue;
            }

            if timers.advance_at <= now {
                let deadline = timers.advance_at;
                // Anchor to the deadline to keep the cadence fixed; a wakeup so
                // late that the next roll would already be hidden re-anchors to now.
                let anchor = match deadline.checked_add(self.config.hide_after) {
                    Some(hide_end) if now >= hide_end => now,
                    _ => deadline,
                };
                self.advance(anchor);
                changed = true;
                continue;
            }

            break;
        }

        changed
    }

    /// Promote the head of the queue, or go idle when it is empty
    fn advance(&mut self, at: Instant) {
        match self.queue.pop_front() {
            Some(roll) => {
                debug!(
                    rolled_number = roll.rolled_number,
                    pending = self.queue.len(),
                    "showing roll"
                );
                self.current = Some(roll);
                self.shown += 1;
                self.timers = Some(Timers {
                    hide_at: Some(offset(at, self.config.hide_after)),
                    advance_at: offset(at, self.config.advance_after),
                });
            }
            None => {
                debug!(shown = self.shown, "display queue drained");
                self.current = None;
                self.timers = None;
            }
        }
    }
}

/// `at + delay`, clamped to [`MAX_ADVANCE_AFTER`] when the sum would overflow
fn offset(at: Instant, delay: Duration) -> Instant {
    at.checked_add(delay)
        .or_else(|| at.checked_add(delay.min(MAX_ADVANCE_AFTER)))
        .unwrap_or(at)
}

/// Cloneable enqueue side of a running sequencer
#[derive(Clone)]
pub struct RollSink {
    inbox: mpsc::UnboundedSender<Vec<RollResult>>,
}

impl RollSink {
    /// Queue a batch for display. Empty batches are ignored.
    pub fn enqueue(&self, batch: Vec<RollResult>) {
        if batch.is_empty() {
            return;
        }
        if self.inbox.send(batch).is_err() {
            debug!("sequencer stopped, discarding batch");
        }
    }
}

/// Handle to a sequencer running on its own task.
///
/// Dropping the handle cancels the task; [`SequencerHandle::shutdown`] also
/// waits for it to exit. Once cancelled, no further snapshots are published.
pub struct SequencerHandle {
    sink: RollSink,
    display: watch::Receiver<DisplaySnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SequencerHandle {
    /// Spawn a sequencer task. Must be called inside a tokio runtime.
    pub fn spawn(config: SequencerConfig) -> Self {
        Self::spawn_with_token(config, CancellationToken::new())
    }

    /// Spawn a sequencer task that also stops when `cancel` fires
    pub fn spawn_with_token(config: SequencerConfig, cancel: CancellationToken) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (display_tx, display_rx) = watch::channel(DisplaySnapshot::default());

        let task = tokio::spawn(run(
            Sequencer::new(config),
            inbox_rx,
            display_tx,
            cancel.clone(),
        ));

        Self {
            sink: RollSink { inbox: inbox_tx },
            display: display_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Queue a batch for display. Empty batches are ignored.
    pub fn enqueue(&self, batch: Vec<RollResult>) {
        self.sink.enqueue(batch);
    }

    /// Enqueue side that can be handed to another task
    pub fn sink(&self) -> RollSink {
        self.sink.clone()
    }

    /// Subscribe to display snapshots
    pub fn display(&self) -> watch::Receiver<DisplaySnapshot> {
        self.display.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the task and wait for it to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("sequencer task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SequencerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    mut seq: Sequencer,
    mut inbox: mpsc::UnboundedReceiver<Vec<RollResult>>,
    display: watch::Sender<DisplaySnapshot>,
    cancel: CancellationToken,
) {
    loop {
        let deadline = seq.next_deadline();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(pending = seq.pending(), "sequencer cancelled");
                break;
            }
            _ = sleep_until(deadline) => {
                seq.fire_due(Instant::now());
            }
            batch = inbox.recv() => match batch {
                Some(batch) => seq.enqueue(batch, Instant::now()),
                None => {
                    debug!("sequencer inbox closed");
                    break;
                }
            },
        }

        if !publish(&seq, &display, &cancel) {
            debug!("sequencer cancelled mid-step, snapshot withheld");
            break;
        }
    }
}

/// Push the current snapshot to observers unless teardown has begun.
///
/// Returns false when cancelled; nothing is sent in that case.
fn publish(
    seq: &Sequencer,
    display: &watch::Sender<DisplaySnapshot>,
    cancel: &CancellationToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }

    let next = seq.snapshot();
    display.send_if_modified(|snapshot| {
        if *snapshot == next {
            false
        } else {
            *snapshot = next;
            true
        }
    });
    true
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
