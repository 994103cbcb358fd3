// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Collapses concurrent calls for the same key into a single execution.
//!
//! [`Flight`] tracks one in-flight call per key. The first caller for a key runs
//! its closure; callers that arrive while the call is still running wait for it
//! and receive a clone of its output instead of running their own closure. When
//! the call finishes its record is dropped, so a later caller starts a new
//! execution.
//!
//! Coalescing is deliberate: every waiter sees the output of the one execution,
//! errors included, even if its own closure would have produced something else.
//!
//! # Example
//!
//! ```
//! use peercache_flight::Flight;
//!
//! # async fn example() {
//! let flight: Flight<String, u64> = Flight::new();
//!
//! let value = flight
//!     .work("user:123".to_string(), || async {
//!         // Runs once no matter how many callers ask for user:123 concurrently.
//!         42
//!     })
//!     .await;
//! assert_eq!(value, 42);
//! # }
//! ```
//!
//! # Cancellation and Panics
//!
//! - The record is registered when [`Flight::work`] is called, not when the returned
//!   future is first polled, so a future created during a call joins that call.
//! - If the executing caller is dropped or panics before finishing, a waiting caller
//!   runs its own closure instead.
//! - The lock guarding the records is held only to register or remove a record and is
//!   never held while a closure runs, so a slow key never blocks unrelated keys.

use std::{
    collections::HashMap,
    fmt::{self, Debug},
    hash::Hash,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

type Calls<K, T> = Arc<Mutex<HashMap<K, Record<T>>>>;

/// An in-flight call shared by every caller of one key.
struct Call<T> {
    slot: OnceCell<T>,
}

/// The map entry for a key: the running call and how many tickets still refer to it.
///
/// `tickets` only changes under the map lock, so the last ticket to leave always
/// sees zero and removes the entry.
struct Record<T> {
    call: Weak<Call<T>>,
    tickets: usize,
}

/// Deregisters the caller's interest in a call when its future completes or is dropped.
struct Ticket<K: Hash + Eq, T> {
    calls: Calls<K, T>,
    key: K,
    call: Arc<Call<T>>,
}

impl<K: Hash + Eq, T> Drop for Ticket<K, T> {
    fn drop(&mut self) {
        let mut calls = self.calls.lock();
        let Some(record) = calls.get_mut(&self.key) else {
            return;
        };

        // A newer call may already occupy the key; only touch our own record.
        if record.call.as_ptr() != Arc::as_ptr(&self.call) {
            return;
        }

        record.tickets -= 1;
        if record.tickets == 0 || self.call.slot.initialized() {
            calls.remove(&self.key);
        }
    }
}

/// Executes work with duplicate suppression per key.
///
/// `Flight` is `Send` and `Sync` whenever its key and output are, and is usually
/// shared by reference or through an [`Arc`].
pub struct Flight<K, T> {
    calls: Calls<K, T>,
}

impl<K, T> Default for Flight<K, T> {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
        }
    }
}

impl<K, T> Flight<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Creates an empty `Flight`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `func` unless a call for `key` is already in flight, in which case the
    /// returned future resolves to that call's output.
    ///
    /// The call is registered before this method returns. The closure of a caller that
    /// joins an existing call is only used if every caller ahead of it gives up.
    pub fn work<F, Fut>(&self, key: K, func: F) -> impl Future<Output = T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        T: Clone,
    {
        let call = {
            let mut calls = self.calls.lock();
            let joined = calls
                .get_mut(&key)
                .and_then(|record| record.call.upgrade().map(|call| (record, call)));
            match joined {
                Some((record, call)) => {
                    record.tickets += 1;
                    call
                }
                None => {
                    let call = Arc::new(Call { slot: OnceCell::new() });
                    let record = Record {
                        call: Arc::downgrade(&call),
                        tickets: 1,
                    };
                    calls.insert(key.clone(), record);
                    call
                }
            }
        };

        let ticket = Ticket {
            calls: Arc::clone(&self.calls),
            key,
            call,
        };

        async move {
            let value = ticket.call.slot.get_or_init(func).await.clone();
            drop(ticket);
            value
        }
    }
}

impl<K, T> Flight<K, T>
where
    K: Hash + Eq,
{
    /// Returns the number of keys with a call currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<K, T> Debug for Flight<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flight")
            .field("keys", &self.calls.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_is_removed_after_completion() {
        let flight: Flight<&str, u32> = Flight::new();
        assert_eq!(flight.work("key", || async { 7 }).await, 7);
        assert_eq!(flight.in_flight(), 0);
        assert!(flight.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn record_is_removed_when_only_caller_is_dropped() {
        let flight: Flight<&str, u32> = Flight::new();
        let fut = flight.work("key", std::future::pending);
        assert_eq!(flight.in_flight(), 1);

        drop(fut);
        assert!(flight.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn pending_caller_keeps_record_alive() {
        let flight: Flight<&str, u32> = Flight::new();
        let first = flight.work("key", std::future::pending);
        let second = flight.work("key", || async { 3 });

        drop(first);
        assert_eq!(flight.in_flight(), 1);
        assert_eq!(second.await, 3);
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn simultaneous_drops_leave_no_record() {
        const CALLERS: usize = 8;

        let flight: Flight<&str, u32> = Flight::new();
        for _ in 0..100 {
            let futures: Vec<_> = (0..CALLERS).map(|_| flight.work("key", std::future::pending)).collect();
            assert_eq!(flight.in_flight(), 1);

            let barrier = std::sync::Barrier::new(CALLERS);
            std::thread::scope(|scope| {
                for fut in futures {
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        drop(fut);
                    });
                }
            });

            assert!(flight.calls.lock().is_empty());
        }
    }
}
