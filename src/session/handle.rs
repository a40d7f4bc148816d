//! Caller-facing handle to a player's session task.

use super::player::Command;
use super::sync::PersistenceSynchronizer;
use crate::breakthrough::{BreakthroughPhase, BreakthroughPlan, BreakthroughResolution};
use crate::core::error::EngineError;
use crate::core::state::ProgressionState;
use crate::methods::{MethodChange, OwnedMethod};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Notify};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Result of an accepted breakthrough attempt.
#[derive(Debug, Clone)]
pub struct BreakthroughReport {
    pub resolution: BreakthroughResolution,
    pub state: ProgressionState,
    /// Idle, or MaxTier if the success landed on the peak of the last tier
    pub phase: BreakthroughPhase,
}

/// Result of a purchase, upgrade or activation.
#[derive(Debug, Clone)]
pub struct MethodReport {
    pub change: MethodChange,
    pub state: ProgressionState,
    pub methods: Vec<OwnedMethod>,
}

/// Everything a status screen needs, computed inside the session.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub state: ProgressionState,
    pub methods: Vec<OwnedMethod>,
    pub phase: BreakthroughPhase,
    /// Spirit power per tick with the current active method
    pub accrual_rate: u64,
    /// None at MaxTier
    pub breakthrough: Option<BreakthroughPlan>,
    /// Newest first
    pub log: Vec<String>,
    /// Ticks applied since the last successful write
    pub unflushed_ticks: u32,
}

/// Cheap to clone. All mutating calls go through the session's queue and
/// complete in the order they were admitted.
#[derive(Clone)]
pub struct SessionHandle {
    user_id: String,
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ProgressionState>,
    sync: PersistenceSynchronizer,
    halt: Arc<Notify>,
}

impl SessionHandle {
    pub(crate) fn new(
        user_id: String,
        commands: mpsc::Sender<Command>,
        state_rx: watch::Receiver<ProgressionState>,
        sync: PersistenceSynchronizer,
        halt: Arc<Notify>,
    ) -> Self {
        Self {
            user_id,
            commands,
            state_rx,
            sync,
            halt,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Latest state the session published. Does not queue.
    pub fn current_state(&self) -> ProgressionState {
        self.state_rx.borrow().clone()
    }

    pub async fn start_meditation(&self) -> Result<ProgressionState, EngineError> {
        self.request(Command::StartMeditation).await
    }

    /// Returns once the stop has been flushed.
    pub async fn stop_meditation(&self) -> Result<ProgressionState, EngineError> {
        self.request(Command::StopMeditation).await
    }

    pub async fn attempt_breakthrough(&self) -> Result<BreakthroughReport, EngineError> {
        self.request(Command::AttemptBreakthrough).await
    }

    pub async fn purchase_method(&self, method_id: &str) -> Result<MethodReport, EngineError> {
        let method_id = method_id.to_string();
        self.request(|reply| Command::PurchaseMethod { method_id, reply })
            .await
    }

    pub async fn upgrade_method(&self, owned_id: &str) -> Result<MethodReport, EngineError> {
        let owned_id = owned_id.to_string();
        self.request(|reply| Command::UpgradeMethod { owned_id, reply })
            .await
    }

    pub async fn activate_method(&self, owned_id: &str) -> Result<MethodReport, EngineError> {
        let owned_id = owned_id.to_string();
        self.request(|reply| Command::ActivateMethod { owned_id, reply })
            .await
    }

    /// The host went to the background: flush now if meditating.
    pub async fn host_hidden(&self) -> Result<(), EngineError> {
        self.request(Command::HostHidden).await
    }

    pub async fn status(&self) -> Result<SessionStatus, EngineError> {
        self.request(Command::Status).await
    }

    /// Stop meditating, flush, and end the session task.
    pub async fn shutdown(&self) -> Result<ProgressionState, EngineError> {
        self.request(Command::Shutdown).await
    }

    /// Out-of-band write of the last published state with meditation
    /// forced off. Bypasses the queue and returns immediately.
    ///
    /// The session task is told to end as well: it stops ticking, drops
    /// whatever is still queued, and rewrites the record as not meditating.
    pub fn emergency_flush(&self) {
        self.sync.emergency_flush(&self.current_state());
        self.halt.notify_one();
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands.try_send(make(tx)).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::ConcurrencyViolation {
                user_id: self.user_id.clone(),
            },
            TrySendError::Closed(_) => EngineError::SessionClosed(self.user_id.clone()),
        })?;
        rx.await
            .map_err(|_| EngineError::SessionClosed(self.user_id.clone()))?
    }
}
