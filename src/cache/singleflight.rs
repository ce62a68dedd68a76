//! Per-key request coalescing.
//!
//! Concurrent [`FlightGroup::run`] calls for the same key share one
//! execution of the supplied future: the first caller becomes the leader,
//! everyone else waits on the flight's latch and reads the stored result.
//! The flight is removed once the work completes, so a later call for the
//! same key runs fresh.

use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tokio::sync::Semaphore;

/// Errors fan out to every waiter of a flight, hence the `Arc`.
pub type FlightError = Arc<anyhow::Error>;

struct Flight<T> {
    /// Zero-permit semaphore used as a one-shot latch: closing it releases
    /// current and future waiters alike.
    latch: Semaphore,
    slot: OnceLock<Result<T, FlightError>>,
}

pub struct FlightGroup<T: Clone> {
    flights: Mutex<HashMap<String, Arc<Flight<T>>>>,
}

impl<T: Clone> FlightGroup<T> {
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `work` for `key`, unless a flight for that key is already in
    /// progress, in which case the caller waits for it and receives the
    /// same result.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T, FlightError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        let existing = {
            let mut flights = lock_flights(&self.flights);
            match flights.get(key) {
                Some(flight) => Some(flight.clone()),
                None => {
                    let flight = Arc::new(Flight {
                        latch: Semaphore::new(0),
                        slot: OnceLock::new(),
                    });
                    flights.insert(key.to_string(), flight);
                    None
                }
            }
        };

        if let Some(flight) = existing {
            // Acquire fails once the latch is closed, which is exactly the
            // completion signal.
            let _ = flight.latch.acquire().await;
            return flight
                .slot
                .get()
                .expect("flight latch closed before the slot was written")
                .clone();
        }

        // Leader path. The guard seals the flight on every exit, including
        // panic or cancellation, so waiters are never stranded.
        let guard = FlightGuard {
            flights: &self.flights,
            key,
        };
        let result = work().await.map_err(Arc::new);
        let flight = guard.take();
        let _ = flight.slot.set(result);
        flight.latch.close();
        flight
            .slot
            .get()
            .expect("slot was just written")
            .clone()
    }
}

impl<T: Clone> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct FlightGuard<'a, T> {
    flights: &'a Mutex<HashMap<String, Arc<Flight<T>>>>,
    key: &'a str,
}

impl<'a, T> FlightGuard<'a, T> {
    /// Removes the flight from the map and disarms the guard. The caller
    /// still owns signalling the latch.
    fn take(self) -> Arc<Flight<T>> {
        let flight = lock_flights(self.flights)
            .remove(self.key)
            .expect("leader's flight is registered");
        std::mem::forget(self);
        flight
    }
}

impl<'a, T> Drop for FlightGuard<'a, T> {
    fn drop(&mut self) {
        // Leader unwound or was cancelled before storing a result.
        if let Some(flight) = lock_flights(self.flights).remove(self.key) {
            let _ = flight
                .slot
                .set(Err(Arc::new(anyhow!("in-flight load aborted"))));
            flight.latch.close();
        }
    }
}

fn lock_flights<'m, T>(
    flights: &'m Mutex<HashMap<String, Arc<Flight<T>>>>,
) -> MutexGuard<'m, HashMap<String, Arc<Flight<T>>>> {
    match flights.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
