use std::sync::{Mutex, PoisonError};

use lineage_common::LineageEvent;
use log::{info, warn};

/// Destination of assembled lineage events.
pub trait LineageEmitter: Send + Sync {
    /// Send `event` on. Called from the thread reporting the transition.
    fn emit(&self, event: &LineageEvent);
}

/// Writes every event as one JSON line to the `log` facade.
#[derive(Debug, Default)]
pub struct LogEmitter;

impl LineageEmitter for LogEmitter {
    fn emit(&self, event: &LineageEvent) {
        match event.to_json() {
            Ok(json) => info!(target: "lineage", "{json}"),
            Err(err) => warn!("failed to serialize lineage event: {err}"),
        }
    }
}

/// Keeps every event in memory, for hosts that forward them in batches.
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    events: Mutex<Vec<LineageEvent>>,
}

impl MemoryEmitter {
    /// An emitter holding no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the events emitted so far.
    pub fn drain(&self) -> Vec<LineageEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl LineageEmitter for MemoryEmitter {
    fn emit(&self, event: &LineageEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
