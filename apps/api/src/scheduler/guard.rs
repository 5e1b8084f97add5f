//! At most one in-flight run per automation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlight {
    /// Claims `id`. Returns `None` if a run for it is already in flight.
    pub fn try_acquire(&self, id: Uuid) -> Option<RunToken> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(id) {
            return None;
        }
        Some(RunToken {
            id,
            running: self.running.clone(),
        })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }
}

/// Releases the claim when dropped, including when the run panics.
#[derive(Debug)]
pub struct RunToken {
    id: Uuid,
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}
