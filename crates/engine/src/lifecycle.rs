//! Install/activate state machine.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use sigcache_core::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Waiting,
    Activating,
    Active,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
        }
    }

    /// Lifecycle moves strictly forward.
    fn can_become(self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (WorkerState::Installing, WorkerState::Waiting)
                | (WorkerState::Waiting, WorkerState::Activating)
                | (WorkerState::Activating, WorkerState::Active)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: RwLock<WorkerState>,
    controlling: AtomicBool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self { state: RwLock::new(WorkerState::Installing), controlling: AtomicBool::new(false) }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Move from `from` to `to`, failing if the current state is not `from`.
    pub async fn advance(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        if self.try_advance(from, to).await? {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!("cannot move to {to} while {}", self.state().await)))
        }
    }

    /// Move from `from` to `to` if the current state is still `from`.
    ///
    /// Returns `false` when another caller already moved on.
    pub async fn try_advance(&self, from: WorkerState, to: WorkerState) -> Result<bool, Error> {
        if !from.can_become(to) {
            return Err(Error::InvalidInput(format!("{from} cannot become {to}")));
        }
        let mut state = self.state.write().await;
        if *state != from {
            return Ok(false);
        }
        *state = to;
        tracing::info!(from = %from, to = %to, "lifecycle transition");
        Ok(true)
    }

    /// Return to `waiting` after a failed activation so it can be retried.
    pub async fn abort_activation(&self) {
        let mut state = self.state.write().await;
        if *state == WorkerState::Activating {
            *state = WorkerState::Waiting;
            tracing::warn!("activation aborted, back to waiting");
        }
    }

    /// Take control of open pages without waiting for a reload.
    pub fn claim_clients(&self) {
        self.controlling.store(true, Ordering::SeqCst);
    }

    pub fn controls_clients(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }
}
