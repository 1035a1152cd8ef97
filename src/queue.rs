// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Deduplicating, single-flight-per-key sync queue.
//!
//! The queue decouples event delivery from reconciliation:
//!
//! - `enqueue` is non-blocking and safe to call concurrently from event
//!   handlers; multiple enqueues of the same key collapse into one pending
//!   item carrying the latest payload.
//! - For a given key no second reconciliation starts until the first returns.
//!   A key re-enqueued while in flight is reconciled again after the current
//!   pass completes. Distinct keys run in parallel up to the worker count.
//! - Handler errors retry with the [`RetryPolicy`]'s exponential backoff; once
//!   the attempt budget is exhausted the item is dropped and the error is
//!   surfaced to logs and metrics.
//!
//! The payload is the deep-copied owning object rather than just its key, so
//! the deletion path still knows the last-seen UID of a vanished owner.

use crate::backoff::RetryPolicy;
use crate::metrics;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
type Handler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Work queue guaranteeing at-most-one in-flight reconciliation per key.
pub struct SyncQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T> {
    key_of: KeyFn<T>,
    handler: Handler<T>,
    policy: RetryPolicy,
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

struct QueueState<T> {
    /// FIFO of keys waiting for a worker
    order: VecDeque<String>,
    /// Latest payload per queued key
    pending: HashMap<String, T>,
    /// Keys currently being processed; the slot holds a payload when the key
    /// was re-enqueued mid-flight
    in_flight: HashMap<String, Option<T>>,
    /// Consecutive failure count per key, cleared on success or drop
    attempts: HashMap<String, u32>,
    shutting_down: bool,
    workers: Vec<JoinHandle<()>>,
}

impl<T> Default for QueueState<T> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            attempts: HashMap::new(),
            shutting_down: false,
            workers: Vec::new(),
        }
    }
}

impl<T: Clone + Send + 'static> SyncQueue<T> {
    /// Create a queue with the default retry policy.
    ///
    /// `key_of` derives the dedup/serialization key (namespace/name) from a
    /// payload; `handler` performs one reconciliation pass.
    pub fn new<K, H, Fut>(key_of: K, handler: H) -> Self
    where
        K: Fn(&T) -> String + Send + Sync + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::with_policy(key_of, handler, RetryPolicy::default())
    }

    /// Create a queue with an explicit retry policy.
    pub fn with_policy<K, H, Fut>(key_of: K, handler: H, policy: RetryPolicy) -> Self
    where
        K: Fn(&T) -> String + Send + Sync + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                key_of: Box::new(key_of),
                handler: Arc::new(move |item| Box::pin(handler(item))),
                policy,
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue a payload. Non-blocking; safe from any task or thread.
    ///
    /// If the key is already pending, the payload is replaced (latest wins).
    /// If the key is in flight, the pass is re-run with the new payload once
    /// the current one returns. After `shut_down` this is a no-op.
    pub fn enqueue(&self, item: T) {
        let key = (self.shared.key_of)(&item);
        enqueue_inner(&self.shared, key, item);
    }

    /// Start `workers` processing tasks.
    pub fn run(&self, workers: usize) {
        let mut state = self.shared.state.lock().expect("queue state poisoned");
        for _ in 0..workers.max(1) {
            let shared = Arc::clone(&self.shared);
            state.workers.push(tokio::spawn(worker_loop(shared)));
        }
        info!(workers = workers.max(1), "sync queue started");
    }

    /// Stop accepting new work, let queued and in-flight items finish, and
    /// wait for the workers to exit.
    pub async fn shut_down(&self) {
        let handles = {
            let mut state = self.shared.state.lock().expect("queue state poisoned");
            state.shutting_down = true;
            std::mem::take(&mut state.workers)
        };
        self.shared.notify.notify_waiters();
        for handle in handles {
            let _ = handle.await;
        }
        info!("sync queue shut down");
    }
}

fn enqueue_inner<T>(shared: &Arc<Shared<T>>, key: String, item: T) {
    let mut state = shared.state.lock().expect("queue state poisoned");
    if state.shutting_down {
        debug!(key, "queue shutting down, discarding enqueue");
        return;
    }
    if let Some(slot) = state.in_flight.get_mut(&key) {
        // Re-run after the current pass with the freshest payload.
        *slot = Some(item);
        return;
    }
    if state.pending.insert(key.clone(), item).is_none() {
        state.order.push_back(key);
        drop(state);
        shared.notify.notify_one();
    }
}

/// Re-enter a payload captured before the current moment (dirty slot, retry).
/// Unlike `enqueue_inner` it never displaces work that arrived in the
/// meantime: anything already pending or in flight is newer than the payload
/// being re-entered.
fn requeue_inner<T>(shared: &Arc<Shared<T>>, key: String, item: T) {
    let mut state = shared.state.lock().expect("queue state poisoned");
    if state.shutting_down {
        debug!(key, "queue shutting down, discarding requeue");
        return;
    }
    if state.in_flight.contains_key(&key) || state.pending.contains_key(&key) {
        return;
    }
    state.pending.insert(key.clone(), item);
    state.order.push_back(key);
    drop(state);
    shared.notify.notify_one();
}

async fn worker_loop<T: Clone + Send + 'static>(shared: Arc<Shared<T>>) {
    loop {
        // Register for wakeups before checking state so an enqueue racing the
        // check cannot be missed.
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let next = {
            let mut state = shared.state.lock().expect("queue state poisoned");
            if let Some(key) = state.order.pop_front() {
                let item = state.pending.remove(&key).expect("pending payload for key");
                state.in_flight.insert(key.clone(), None);
                Some((key, item))
            } else if state.shutting_down {
                return;
            } else {
                None
            }
        };

        let Some((key, item)) = next else {
            notified.await;
            continue;
        };

        let result = (shared.handler)(item.clone()).await;
        finish(&shared, &key, item, result);
    }
}

/// Post-pass bookkeeping: clear or bump the attempt counter, schedule the
/// retry, and re-queue the key if it went dirty mid-flight.
fn finish<T: Clone + Send + 'static>(
    shared: &Arc<Shared<T>>,
    key: &str,
    item: T,
    result: anyhow::Result<()>,
) {
    let mut state = shared.state.lock().expect("queue state poisoned");
    let dirty = state.in_flight.remove(key).flatten();

    match result {
        Ok(()) => {
            state.attempts.remove(key);
            if let Some(fresh) = dirty {
                drop(state);
                requeue_inner(shared, key.to_string(), fresh);
            }
        }
        Err(err) => {
            let attempt = {
                let counter = state.attempts.entry(key.to_string()).or_insert(0);
                *counter += 1;
                *counter
            };

            if shared.policy.allows(attempt) {
                let delay = shared.policy.delay_for(attempt);
                warn!(key, attempt, delay_ms = delay.as_millis() as u64, error = %err,
                    "reconciliation failed, will retry");
                metrics::record_sync_retry();
                // Retry with the freshest payload available.
                let payload = dirty.unwrap_or(item);
                let shared = Arc::clone(shared);
                let key = key.to_string();
                drop(state);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    requeue_inner(&shared, key, payload);
                });
            } else {
                error!(key, attempt, error = %err,
                    "retry budget exhausted, dropping item until the next external trigger");
                metrics::record_sync_drop();
                state.attempts.remove(key);
                if let Some(fresh) = dirty {
                    // A fresh event arrived during the final failing pass;
                    // treat it as a new trigger with a clean budget.
                    drop(state);
                    requeue_inner(shared, key.to_string(), fresh);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
