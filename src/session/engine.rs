use super::handle::{BreakthroughReport, MethodReport, SessionHandle, SessionStatus};
use super::player::spawn_session;
use crate::catalog::Catalog;
use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::state::ProgressionState;
use crate::persistence::{ProgressionStore, StorageError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Entry point for callers: routes each operation to the player's session,
/// opening it from storage on first use.
pub struct CultivationEngine {
    catalog: Arc<Catalog>,
    store: Arc<dyn ProgressionStore>,
    config: EngineConfig,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl CultivationEngine {
    pub fn new(catalog: Catalog, store: Arc<dyn ProgressionStore>, config: EngineConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The open session for `user_id`, loading the record if there is none.
    pub fn session(&self, user_id: &str) -> Result<SessionHandle, EngineError> {
        let mut sessions = self.sessions_lock();
        if let Some(handle) = sessions.get(user_id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let record = self
            .store
            .load(user_id)?
            .ok_or_else(|| EngineError::UnknownPlayer(user_id.to_string()))?;
        if self.catalog.tier(&record.progression.tier_id).is_none() {
            return Err(EngineError::UnknownTier(record.progression.tier_id.clone()));
        }
        if let Err(reason) = record.progression.check_invariants() {
            warn!(user_id, %reason, "refusing stored record");
            return Err(StorageError::Corrupt(reason).into());
        }

        info!(
            user_id,
            tier = %record.progression.tier_id,
            level = record.progression.current_level,
            "session opened"
        );
        let handle = spawn_session(
            record,
            Arc::clone(&self.catalog),
            Arc::clone(&self.store),
            self.config.clone(),
        );
        sessions.insert(user_id.to_string(), handle.clone());
        Ok(handle)
    }

    pub async fn start_meditation(&self, user_id: &str) -> Result<ProgressionState, EngineError> {
        self.session(user_id)?.start_meditation().await
    }

    pub async fn stop_meditation(&self, user_id: &str) -> Result<ProgressionState, EngineError> {
        self.session(user_id)?.stop_meditation().await
    }

    pub async fn attempt_breakthrough(
        &self,
        user_id: &str,
    ) -> Result<BreakthroughReport, EngineError> {
        self.session(user_id)?.attempt_breakthrough().await
    }

    pub async fn purchase_method(
        &self,
        user_id: &str,
        method_id: &str,
    ) -> Result<MethodReport, EngineError> {
        self.session(user_id)?.purchase_method(method_id).await
    }

    pub async fn upgrade_method(
        &self,
        user_id: &str,
        owned_id: &str,
    ) -> Result<MethodReport, EngineError> {
        self.session(user_id)?.upgrade_method(owned_id).await
    }

    pub async fn activate_method(
        &self,
        user_id: &str,
        owned_id: &str,
    ) -> Result<MethodReport, EngineError> {
        self.session(user_id)?.activate_method(owned_id).await
    }

    pub async fn host_hidden(&self, user_id: &str) -> Result<(), EngineError> {
        self.session(user_id)?.host_hidden().await
    }

    pub async fn status(&self, user_id: &str) -> Result<SessionStatus, EngineError> {
        self.session(user_id)?.status().await
    }

    /// Best-effort write of the last known state for an open session, which
    /// is then closed. Does nothing if the player has no session.
    pub fn emergency_flush(&self, user_id: &str) {
        let handle = self.sessions_lock().remove(user_id);
        if let Some(handle) = handle {
            handle.emergency_flush();
        }
    }

    /// Stop every open session, each with a final flush.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self.sessions_lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(e) = handle.shutdown().await {
                warn!(user_id = %handle.user_id(), error = %e, "session did not shut down cleanly");
            }
        }
    }

    fn sessions_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionHandle>> {
        // A poisoned registry still holds valid handles
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
