//! Throttled, single-flight background detection passes.
//!
//! The producer loop calls [`DetectionScheduler::tick`] for every frame it
//! acquires. `tick` never blocks on a pass: it either admits the frame (a
//! private copy goes to a fresh worker thread), or reports why it did not.
//!
//! All mutable scheduler state lives in one `Mutex`-guarded slot. The worker
//! publishes its `ResultSet` and clears the running flag in the same critical
//! section, so a reader never sees "idle" without the matching result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::frame::Frame;
use crate::result::{PassOutcome, PassOutput, ResultSet};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// One detection pass over one frame. Called on the worker thread only.
pub trait PassRunner: Send + Sync + 'static {
    fn run_pass(&self, frame: &Frame) -> anyhow::Result<PassOutput>;
}

/// What `tick` did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Started { pass_id: u64 },
    /// The minimum interval since the last pass start has not elapsed.
    Throttled,
    /// A pass is still running.
    Busy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub admitted: u64,
    /// Passes that published a `Completed` outcome.
    pub completed: u64,
    /// Passes that errored, panicked, or never started.
    pub failed: u64,
    pub throttled: u64,
    pub busy: u64,
}

#[derive(Default)]
struct Slot {
    running: bool,
    force: bool,
    last_pass_start: Option<Instant>,
    next_pass_id: u64,
    latest: Option<Arc<ResultSet>>,
    workers: Vec<JoinHandle<()>>,
    stats: SchedulerStats,
}

struct Shared {
    slot: Mutex<Slot>,
    done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Slot updates are single assignments; a poisoned slot is still consistent.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct DetectionScheduler {
    runner: Arc<dyn PassRunner>,
    interval: Duration,
    shared: Arc<Shared>,
}

impl DetectionScheduler {
    pub fn new(runner: Arc<dyn PassRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    next_pass_id: 1,
                    ..Slot::default()
                }),
                done: Condvar::new(),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Offer a frame. Admits it when idle and the interval has elapsed (or a
    /// trigger is pending); never waits for a running pass.
    pub fn tick(&self, frame: &Frame) -> Admission {
        let mut slot = self.shared.lock();
        if slot.running {
            slot.stats.busy += 1;
            return Admission::Busy;
        }
        let now = Instant::now();
        let due = slot.force
            || slot
                .last_pass_start
                .map_or(true, |last| now.duration_since(last) >= self.interval);
        if !due {
            slot.stats.throttled += 1;
            return Admission::Throttled;
        }

        let pass_id = slot.next_pass_id;
        slot.next_pass_id += 1;
        slot.force = false;
        slot.running = true;
        slot.last_pass_start = Some(now);
        slot.stats.admitted += 1;
        let finished = reap_finished(&mut slot.workers);
        // The guard locks the slot when it drops, including when spawn fails.
        drop(slot);
        for handle in finished {
            let _ = handle.join();
        }

        log::debug!("pass {} admitted (frame {})", pass_id, frame.sequence);
        let guard = CompletionGuard {
            shared: Arc::clone(&self.shared),
            pass_id,
            frame_sequence: frame.sequence,
            started_at: SystemTime::now(),
            started: now,
            outcome: None,
        };
        let runner = Arc::clone(&self.runner);
        let frame = frame.clone();
        match thread::Builder::new()
            .name(format!("detect-pass-{}", pass_id))
            .spawn(move || run_worker(runner, frame, guard))
        {
            Ok(handle) => self.shared.lock().workers.push(handle),
            Err(e) => log::error!("failed to spawn detection worker: {}", e),
        }
        Admission::Started { pass_id }
    }

    /// Make the next idle `tick` start a pass regardless of the interval.
    /// A running pass is not interrupted; the trigger waits for it.
    pub fn trigger_now(&self) {
        self.shared.lock().force = true;
    }

    /// Most recent completed pass, or `None` before the first one finishes.
    pub fn latest(&self) -> Option<Arc<ResultSet>> {
        self.shared.lock().latest.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.lock().stats
    }

    /// Block until pass `pass_id` (or a later one) has published, or `timeout` elapses.
    pub fn wait_for_pass(&self, pass_id: u64, timeout: Duration) -> Option<Arc<ResultSet>> {
        let slot = self.shared.lock();
        let (slot, _) = self
            .shared
            .done
            .wait_timeout_while(slot, timeout, |s| {
                s.latest.as_ref().map_or(true, |r| r.pass_id < pass_id)
            })
            .unwrap_or_else(PoisonError::into_inner);
        slot.latest
            .as_ref()
            .filter(|r| r.pass_id >= pass_id)
            .cloned()
    }

    /// Block until no pass is running. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let slot = self.shared.lock();
        let (slot, _) = self
            .shared
            .done
            .wait_timeout_while(slot, timeout, |s| s.running)
            .unwrap_or_else(PoisonError::into_inner);
        !slot.running
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        let workers = std::mem::take(&mut self.shared.lock().workers);
        for handle in workers {
            let _ = handle.join();
        }
    }
}

fn reap_finished(workers: &mut Vec<JoinHandle<()>>) -> Vec<JoinHandle<()>> {
    let (finished, running) = workers.drain(..).partition(|h| h.is_finished());
    *workers = running;
    finished
}

fn run_worker(runner: Arc<dyn PassRunner>, frame: Frame, mut guard: CompletionGuard) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run_pass(&frame)));
    guard.outcome = Some(match result {
        Ok(Ok(output)) => PassOutcome::Completed(output),
        Ok(Err(e)) => PassOutcome::Failed {
            error: format!("{:#}", e),
        },
        Err(payload) => PassOutcome::Failed {
            error: format!("pass panicked: {}", panic_message(payload.as_ref())),
        },
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Publishes the pass result and clears `running` when the worker ends,
/// however it ends.
struct CompletionGuard {
    shared: Arc<Shared>,
    pass_id: u64,
    frame_sequence: u64,
    started_at: SystemTime,
    started: Instant,
    outcome: Option<PassOutcome>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| PassOutcome::Failed {
            error: "pass aborted before completion".to_string(),
        });
        let failed = matches!(outcome, PassOutcome::Failed { .. });
        let result = Arc::new(ResultSet {
            pass_id: self.pass_id,
            frame_sequence: self.frame_sequence,
            started_at: self.started_at,
            finished_at: SystemTime::now(),
            elapsed: self.started.elapsed(),
            outcome,
        });
        match &result.outcome {
            PassOutcome::Completed(out) => log::info!(
                "pass {} completed: {} verdicts in {:?}",
                result.pass_id,
                out.verdicts.len(),
                result.elapsed
            ),
            PassOutcome::Failed { error } => {
                log::warn!("pass {} failed: {}", result.pass_id, error)
            }
        }

        let mut slot = self.shared.lock();
        slot.latest = Some(result);
        slot.running = false;
        if failed {
            slot.stats.failed += 1;
        } else {
            slot.stats.completed += 1;
        }
        drop(slot);
        self.shared.done.notify_all();
    }
}
