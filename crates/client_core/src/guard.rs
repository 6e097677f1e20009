//! Single-flight locks for the guarded asynchronous operations.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::debug;

/// One guard domain (`tts`, `refine`, `render`). At most one permit exists
/// at a time; a second caller gets `None` instead of waiting.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    name: &'static str,
    busy: Arc<AtomicBool>,
}

/// Held for the lifetime of one dispatched request. Dropping it, on any
/// exit path, frees the domain.
#[derive(Debug)]
pub struct FlightPermit {
    name: &'static str,
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn try_acquire(&self) -> Option<FlightPermit> {
        match self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!(domain = self.name, "single-flight acquired");
                Some(FlightPermit {
                    name: self.name,
                    busy: Arc::clone(&self.busy),
                })
            }
            Err(_) => {
                debug!(domain = self.name, "single-flight busy; call suppressed");
                None
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!(domain = self.name, "single-flight released");
    }
}
