//! Compression admission control.
//!
//! CPU-heavy optimizations are bounded two ways: a slot count limits
//! concurrency, and a queue-depth limit bounds memory held by waiting
//! payloads. A full queue rejects immediately with a retry hint instead
//! of blocking. The gate is an explicit handle owned by the service, not
//! process-global state.

use crate::errors::{Result, SlimError};
use std::sync::{Condvar, Mutex};
use tracing::debug;

const RETRY_AFTER_SECONDS: u32 = 5;

#[derive(Debug, Default)]
struct GateState {
    /// Jobs admitted and not yet released (waiting + active).
    depth: usize,
    /// Jobs currently holding a slot.
    active: usize,
}

#[derive(Debug)]
pub struct CompressionGate {
    slots: usize,
    max_queue: usize,
    state: Mutex<GateState>,
    available: Condvar,
}

impl CompressionGate {
    pub fn new(slots: usize, max_queue: usize) -> Self {
        Self {
            slots: slots.max(1),
            max_queue: max_queue.max(1),
            state: Mutex::new(GateState::default()),
            available: Condvar::new(),
        }
    }

    /// Acquire a compression slot, waiting if all slots are busy.
    ///
    /// Fails immediately with `Backpressure` when the total admitted
    /// depth has reached the queue limit; never blocks in that case.
    pub fn acquire(&self) -> Result<GateGuard<'_>> {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        if state.depth >= self.max_queue {
            debug!(depth = state.depth, max_queue = self.max_queue, "Compression queue full");
            return Err(SlimError::Backpressure {
                retry_after: RETRY_AFTER_SECONDS,
            });
        }
        state.depth += 1;

        while state.active >= self.slots {
            state = self.available.wait(state).expect("gate mutex poisoned");
        }
        state.active += 1;

        Ok(GateGuard { gate: self })
    }

    pub fn active_jobs(&self) -> usize {
        self.state.lock().expect("gate mutex poisoned").active
    }

    pub fn queued_jobs(&self) -> usize {
        let state = self.state.lock().expect("gate mutex poisoned");
        state.depth - state.active
    }

    fn release(&self) {
        let mut state = self.state.lock().expect("gate mutex poisoned");
        state.depth -= 1;
        state.active -= 1;
        self.available.notify_one();
    }
}

/// RAII slot handle: dropping it releases the slot, so cancellation
/// paths (panics, early returns) can never leak capacity.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a CompressionGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
