use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;
use url::Url;

use super::scheduler::{normalize_url, Scheduler};

/// Queue of addresses waiting to be fetched, shared by all workers.
///
/// Every admitted address is recorded in the seen set in the same critical section that
/// queues it, so an address is handed to a worker at most once per crawl.
/// Workers that find the queue empty park on a `Notify` and are counted as idle until woken;
/// the supervisor treats "every worker idle and the queue empty" as the end of the crawl.
#[derive(Debug)]
pub struct Frontier {
    scheduler: Scheduler,
    workers: usize,
    state: Mutex<FrontierState>,
    wakeup: Notify,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<Url>,
    seen: HashSet<String>,
    idle: usize,
    stopped: bool,
}

impl Frontier {
    /// Frontier for a pool of `workers` workers
    pub fn new(scheduler: Scheduler, workers: usize) -> Self {
        Self {
            scheduler,
            workers,
            state: Mutex::new(FrontierState::default()),
            wakeup: Notify::new(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Queue `url` unless it is out of scope or was queued before. Returns whether it was admitted.
    pub fn enqueue(&self, url: &Url) -> bool {
        if !self.scheduler.in_scope(url) {
            debug!("Refusing to put URL {} into queue - this URL is from other domain", url);
            return false;
        }

        let url = normalize_url(url);
        {
            let mut state = self.lock();
            if !state.seen.insert(url.as_str().to_string()) {
                return false;
            }
            debug!("Putting URL {} into queue", url);
            state.queue.push_back(url);
        }

        self.wakeup.notify_waiters();
        true
    }

    /// Next address to process, parking while the queue is empty. `None` once stopped.
    pub async fn next(&self) -> Option<Url> {
        loop {
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            // Register before looking at the queue so a concurrent enqueue can't be missed
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.stopped {
                    return None;
                }
                if let Some(url) = state.queue.pop_front() {
                    return Some(url);
                }
                state.idle += 1;
            }

            notified.await;
            self.lock().idle -= 1;
        }
    }

    /// True when every worker is parked and there is nothing left to hand out
    pub fn is_quiescent(&self) -> bool {
        let state = self.lock();
        state.idle == self.workers && state.queue.is_empty()
    }

    /// Tell every worker to finish and wake the parked ones
    pub fn stop(&self) {
        self.lock().stopped = true;
        self.wakeup.notify_waiters();
    }

    /// Number of distinct addresses admitted so far
    #[cfg(test)]
    fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    #[cfg(test)]
    fn queued_count(&self) -> usize {
        self.lock().queue.len()
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.lock().idle
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
