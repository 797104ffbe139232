//! Request coalescing for origin fetches.
//!
//! When several renders need the same uncached template at once, only one
//! origin fetch runs; everyone else subscribes to its outcome. The registry
//! maps cache keys to broadcast senders. The first caller to register a key
//! becomes the leader and holds a [`LeaderToken`]; completing the token
//! broadcasts the outcome and removes the key. Dropping an uncompleted token
//! (the fetch was cancelled) removes the key too, so followers observe a
//! closed channel and fall back to their own fetch instead of hanging.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metrics::counter;
use tokio::sync::broadcast;
use tracing::debug;

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "loader::coalesce";

// Typical contention is a handful of concurrent renders per key.
const CHANNEL_CAPACITY: usize = 16;

pub(crate) const METRIC_COALESCED: &str = "vetrina_loader_coalesced_total";
pub(crate) const METRIC_LEADER: &str = "vetrina_loader_fetch_leader_total";

/// Coalescing effectiveness counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoalescerStats {
    pub total_requests: u64,
    pub coalesced_requests: u64,
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Share of requests that waited on existing work (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

struct Inner<T: Clone> {
    in_flight: Mutex<HashMap<String, broadcast::Sender<T>>>,
    stats: Mutex<CoalescerStats>,
}

/// Deduplicates concurrent work per cache key.
pub struct RequestCoalescer<T: Clone> {
    inner: Arc<Inner<T>>,
}

/// Outcome of registering interest in a key.
pub enum Registration<T: Clone> {
    /// First caller for this key: do the work, then `complete` the token.
    Leader(LeaderToken<T>),
    /// Work already in flight: wait on the receiver for the shared outcome.
    Follower(broadcast::Receiver<T>),
}

/// Held by the leader until the fetch settles.
pub struct LeaderToken<T: Clone> {
    inner: Arc<Inner<T>>,
    key: String,
    completed: bool,
}

impl<T: Clone> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                in_flight: Mutex::new(HashMap::new()),
                stats: Mutex::new(CoalescerStats::default()),
            }),
        }
    }

    pub fn register(&self, key: &str) -> Registration<T> {
        let mut in_flight = mutex_lock(&self.inner.in_flight, SOURCE, "register");
        let mut stats = mutex_lock(&self.inner.stats, SOURCE, "register.stats");
        stats.total_requests += 1;

        if let Some(sender) = in_flight.get(key) {
            stats.coalesced_requests += 1;
            counter!(METRIC_COALESCED).increment(1);
            debug!(key, "Coalescing request onto in-flight fetch");
            return Registration::Follower(sender.subscribe());
        }

        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        in_flight.insert(key.to_string(), sender);
        stats.new_requests += 1;
        counter!(METRIC_LEADER).increment(1);
        debug!(key, in_flight = in_flight.len(), "New in-flight fetch");
        Registration::Leader(LeaderToken {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            completed: false,
        })
    }

    pub fn in_flight_count(&self) -> usize {
        mutex_lock(&self.inner.in_flight, SOURCE, "in_flight_count").len()
    }

    pub fn stats(&self) -> CoalescerStats {
        *mutex_lock(&self.inner.stats, SOURCE, "stats")
    }
}

impl<T: Clone> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LeaderToken<T> {
    /// Broadcast the outcome to every follower and retire the key.
    pub fn complete(mut self, outcome: T) {
        self.completed = true;
        let sender = mutex_lock(&self.inner.in_flight, SOURCE, "complete").remove(&self.key);
        if let Some(sender) = sender {
            let waiters = sender.receiver_count();
            // Send errors just mean every follower already gave up.
            let _ = sender.send(outcome);
            if waiters > 0 {
                debug!(key = %self.key, waiters, "Broadcast fetch outcome to waiters");
            }
        }
    }
}

impl<T: Clone> Drop for LeaderToken<T> {
    fn drop(&mut self) {
        if !self.completed {
            // Leader never settled (cancelled mid-fetch). Retire the key so
            // followers see a closed channel rather than waiting forever.
            mutex_lock(&self.inner.in_flight, SOURCE, "abandon").remove(&self.key);
            debug!(key = %self.key, "In-flight fetch abandoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader<T: Clone>(registration: Registration<T>) -> LeaderToken<T> {
        match registration {
            Registration::Leader(token) => token,
            Registration::Follower(_) => panic!("expected leader"),
        }
    }

    fn follower<T: Clone>(registration: Registration<T>) -> broadcast::Receiver<T> {
        match registration {
            Registration::Follower(receiver) => receiver,
            Registration::Leader(_) => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn first_request_leads_second_follows() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();

        let first = coalescer.register("template_s1_k");
        assert!(matches!(first, Registration::Leader(_)));
        let second = coalescer.register("template_s1_k");
        assert!(matches!(second, Registration::Follower(_)));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();
        // Tokens stay bound; a dropped leader token retires its key.
        let first = coalescer.register("a");
        let second = coalescer.register("b");
        assert!(matches!(first, Registration::Leader(_)));
        assert!(matches!(second, Registration::Leader(_)));
        assert_eq!(coalescer.in_flight_count(), 2);
    }

    #[tokio::test]
    async fn followers_receive_the_leaders_outcome() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();

        let token = leader(coalescer.register("k"));
        let mut rx_one = follower(coalescer.register("k"));
        let mut rx_two = follower(coalescer.register("k"));

        token.complete(7);

        assert_eq!(rx_one.recv().await.expect("outcome"), 7);
        assert_eq!(rx_two.recv().await.expect("outcome"), 7);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn completion_retires_the_key() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();

        leader(coalescer.register("k")).complete(1);

        // A later request for the same key leads again.
        assert!(matches!(coalescer.register("k"), Registration::Leader(_)));
    }

    #[tokio::test]
    async fn abandoned_leader_closes_the_channel() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();

        let token = leader(coalescer.register("k"));
        let mut rx = follower(coalescer.register("k"));
        drop(token);

        assert!(rx.recv().await.is_err());
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_registration_elects_one_leader() {
        let coalescer: Arc<RequestCoalescer<u32>> = Arc::new(RequestCoalescer::new());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                tokio::spawn(async move { coalescer.register("k") })
            })
            .collect();

        // Registrations stay alive while counting so no abandoned leader
        // token retires the key mid-election.
        let mut registrations = Vec::new();
        for handle in handles {
            registrations.push(handle.await.expect("task completes"));
        }
        let leaders = registrations
            .iter()
            .filter(|registration| matches!(registration, Registration::Leader(_)))
            .count();
        assert_eq!(leaders, 1);

        let stats = coalescer.stats();
        assert_eq!(stats.total_requests, 10);
        assert_eq!(stats.new_requests, 1);
        assert_eq!(stats.coalesced_requests, 9);
        assert!((stats.coalescing_ratio() - 0.9).abs() < 0.001);
    }
}
