//! Backend lifecycle: `Uninitialized -> Connecting -> Ready`, terminal `Closed`.
//!
//! Operations only run in `Ready`. Anything arriving earlier or after close
//! fails fast with `PersistenceError::NotInitialized` instead of waiting.

use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::interfaces::{PersistenceError, Result};

/// Observable backend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Uninitialized,
    Connecting,
    Ready,
    Closed,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendState::Uninitialized => "uninitialized",
            BackendState::Connecting => "connecting",
            BackendState::Ready => "ready",
            BackendState::Closed => "closed",
        };
        f.write_str(name)
    }
}

enum Phase<T> {
    Uninitialized,
    Connecting,
    Ready(Arc<T>),
    Closed,
}

impl<T> Phase<T> {
    fn state(&self) -> BackendState {
        match self {
            Phase::Uninitialized => BackendState::Uninitialized,
            Phase::Connecting => BackendState::Connecting,
            Phase::Ready(_) => BackendState::Ready,
            Phase::Closed => BackendState::Closed,
        }
    }
}

/// Holds the connected resources `T` once the backend is ready.
pub struct Lifecycle<T> {
    phase: RwLock<Phase<T>>,
}

impl<T> Default for Lifecycle<T> {
    fn default() -> Self {
        Self {
            phase: RwLock::new(Phase::Uninitialized),
        }
    }
}

impl<T> Lifecycle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> BackendState {
        self.phase.read().await.state()
    }

    /// `Uninitialized -> Connecting`. Any other starting state is rejected.
    pub async fn begin_connect(&self) -> Result<()> {
        let mut phase = self.phase.write().await;
        let state = phase.state();
        if state != BackendState::Uninitialized {
            return Err(PersistenceError::AlreadyStarted { state });
        }
        *phase = Phase::Connecting;
        Ok(())
    }

    /// `Connecting -> Ready`. A backend closed mid-connect stays closed.
    pub async fn ready(&self, resources: T) -> BackendState {
        let mut phase = self.phase.write().await;
        if matches!(*phase, Phase::Connecting) {
            *phase = Phase::Ready(Arc::new(resources));
        }
        phase.state()
    }

    /// Connection failed: the backend never becomes ready.
    pub async fn fail(&self) {
        *self.phase.write().await = Phase::Closed;
    }

    pub async fn close(&self) {
        *self.phase.write().await = Phase::Closed;
    }

    /// Connected resources, or `NotInitialized` outside `Ready`.
    pub async fn get(&self) -> Result<Arc<T>> {
        match &*self.phase.read().await {
            Phase::Ready(resources) => Ok(Arc::clone(resources)),
            other => Err(PersistenceError::NotInitialized {
                state: other.state(),
            }),
        }
    }
}
