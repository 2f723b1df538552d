//! The FIFO request queue bridging parallel search jobs and the
//! single-threaded tick loop.
use std::collections::VecDeque;

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::warn;

use crate::astar::SearchOutcome;
use crate::path::Path;

/// Ticks a request may stay queued before the scheduler blocks on it. Caps the
/// lifetime of per-search scratch allocations.
const FORCE_COMPLETE_TICKS: u64 = 3;

pub(crate) type PathCallback = Box<dyn FnOnce(Path, bool) + Send>;

struct PathfindRequest {
    receiver: Receiver<SearchOutcome>,
    callback: PathCallback,
    submitted_tick: u64,
}

/// Strict FIFO: requests are finalized head-first, in submission order, and
/// every request is resolved exactly once — a dead worker resolves as failure,
/// never as a dropped callback.
pub(crate) struct RequestScheduler {
    queue: VecDeque<PathfindRequest>,
    tick: u64,
}

impl RequestScheduler {
    pub(crate) fn new() -> Self {
        RequestScheduler {
            queue: VecDeque::new(),
            tick: 0,
        }
    }

    pub(crate) fn enqueue(&mut self, receiver: Receiver<SearchOutcome>, callback: PathCallback) {
        self.queue.push_back(PathfindRequest {
            receiver,
            callback,
            submitted_tick: self.tick,
        });
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Advances the frame counter and finalizes every completed request at the
    /// head of the queue. A head still running after [`FORCE_COMPLETE_TICKS`]
    /// is waited on synchronously so its scratch memory cannot outlive the
    /// bound.
    pub(crate) fn tick(&mut self) {
        self.tick += 1;

        loop {
            let outcome = {
                let Some(head) = self.queue.front() else {
                    return;
                };
                match head.receiver.try_recv() {
                    Ok(outcome) => outcome,
                    Err(TryRecvError::Disconnected) => {
                        warn!("search worker dropped its result channel");
                        SearchOutcome::failure()
                    }
                    Err(TryRecvError::Empty) => {
                        if head.submitted_tick + FORCE_COMPLETE_TICKS <= self.tick {
                            warn!("finishing pathfind request early, blocking the tick thread");
                            head.receiver
                                .recv()
                                .unwrap_or_else(|_| SearchOutcome::failure())
                        } else {
                            return;
                        }
                    }
                }
            };
            self.finalize(outcome);
        }
    }

    /// Synchronously completes every queued request, in order. Called before
    /// grid mutation and on teardown.
    pub(crate) fn drain(&mut self) {
        loop {
            let outcome = {
                let Some(head) = self.queue.front() else {
                    return;
                };
                head.receiver
                    .recv()
                    .unwrap_or_else(|_| SearchOutcome::failure())
            };
            self.finalize(outcome);
        }
    }

    fn finalize(&mut self, outcome: SearchOutcome) {
        if let Some(request) = self.queue.pop_front() {
            (request.callback)(outcome.path, outcome.success);
        }
    }
}
