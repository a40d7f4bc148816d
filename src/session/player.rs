//! The per-player session task.
//!
//! One task owns one player's record. Commands, meditation ticks and
//! autosaves are all handled by the same `select!` loop, so they never
//! interleave: a breakthrough ritual holds the loop for its whole duration
//! and anything arriving meanwhile waits in the queue.

use super::handle::{BreakthroughReport, MethodReport, Reply, SessionHandle, SessionStatus};
use super::sync::PersistenceSynchronizer;
use crate::breakthrough::{
    check_eligible, draw_roll, phase_for, plan_breakthrough, resolve_breakthrough,
    BreakthroughOutcome, BreakthroughPhase, BreakthroughResolution,
};
use crate::catalog::Catalog;
use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::state::{PlayerRecord, ProgressionState};
use crate::core::tick::{meditation_tick, TickEvent};
use crate::methods::{accrual_rate, activate, active_method, try_purchase, try_upgrade, MethodChange};
use crate::persistence::ProgressionStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

pub(crate) enum Command {
    StartMeditation(Reply<ProgressionState>),
    StopMeditation(Reply<ProgressionState>),
    AttemptBreakthrough(Reply<BreakthroughReport>),
    PurchaseMethod {
        method_id: String,
        reply: Reply<MethodReport>,
    },
    UpgradeMethod {
        owned_id: String,
        reply: Reply<MethodReport>,
    },
    ActivateMethod {
        owned_id: String,
        reply: Reply<MethodReport>,
    },
    HostHidden(Reply<()>),
    Status(Reply<SessionStatus>),
    Shutdown(Reply<ProgressionState>),
}

/// Start a session task for `record` and return its handle.
///
/// Must be called from inside a tokio runtime.
pub fn spawn_session(
    record: PlayerRecord,
    catalog: Arc<Catalog>,
    store: Arc<dyn ProgressionStore>,
    config: EngineConfig,
) -> SessionHandle {
    let user_id = record.user_id().to_string();
    let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity.max(1));
    let (state_tx, state_rx) = watch::channel(record.progression.clone());
    let sync = PersistenceSynchronizer::new(store);
    let halt = Arc::new(Notify::new());

    let rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let phase = phase_for(&record.progression, &catalog);

    let session = PlayerSession {
        record,
        catalog,
        sync: sync.clone(),
        config,
        rng,
        phase,
        log: VecDeque::new(),
        unflushed_ticks: 0,
        dirty: false,
        state_tx,
    };
    tokio::spawn(session.run(command_rx, Arc::clone(&halt)));

    SessionHandle::new(user_id, command_tx, state_rx, sync, halt)
}

struct PlayerSession {
    record: PlayerRecord,
    catalog: Arc<Catalog>,
    sync: PersistenceSynchronizer,
    config: EngineConfig,
    rng: StdRng,
    phase: BreakthroughPhase,
    log: VecDeque<String>,
    unflushed_ticks: u32,
    /// A synchronous write failed; the next autosave writes the whole record
    dirty: bool,
    state_tx: watch::Sender<ProgressionState>,
}

impl PlayerSession {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, halt: Arc<Notify>) {
        let mut ticker = time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut autosave = time::interval(self.config.autosave_interval());
        autosave.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick one full period after meditation begins
        ticker.reset();
        autosave.reset();

        if self.record.progression.is_meditating {
            info!(user_id = %self.user_id(), "resuming meditation");
        }

        loop {
            let meditating = self.record.progression.is_meditating;
            tokio::select! {
                biased;

                // Emergency stop outranks anything still queued
                _ = halt.notified() => {
                    info!(user_id = %self.user_id(), "session halted after emergency flush");
                    break;
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    let shutdown = matches!(command, Command::Shutdown(_));
                    self.handle(command).await;
                    if shutdown {
                        return;
                    }
                    if !meditating && self.record.progression.is_meditating {
                        ticker.reset();
                        autosave.reset();
                    }
                }
                _ = ticker.tick(), if meditating => self.on_tick(),
                _ = autosave.tick(), if meditating => self.on_autosave().await,
            }
        }

        // Halted, or every handle dropped without a shutdown
        if self.record.progression.is_meditating || self.dirty {
            self.record.progression.is_meditating = false;
            self.persist().await;
            self.publish();
        }
        debug!(user_id = %self.user_id(), "session ended");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::StartMeditation(reply) => {
                let _ = reply.send(Ok(self.start_meditation()));
            }
            Command::StopMeditation(reply) => {
                let _ = reply.send(Ok(self.stop_meditation().await));
            }
            Command::AttemptBreakthrough(reply) => {
                let result = self.attempt_breakthrough().await;
                let _ = reply.send(result);
            }
            Command::PurchaseMethod { method_id, reply } => {
                let _ = reply.send(self.purchase_method(&method_id).await);
            }
            Command::UpgradeMethod { owned_id, reply } => {
                let _ = reply.send(self.upgrade_method(&owned_id).await);
            }
            Command::ActivateMethod { owned_id, reply } => {
                let _ = reply.send(self.activate_method(&owned_id).await);
            }
            Command::HostHidden(reply) => {
                if self.record.progression.is_meditating {
                    self.flush_background();
                }
                let _ = reply.send(Ok(()));
            }
            Command::Status(reply) => {
                let _ = reply.send(Ok(self.status()));
            }
            Command::Shutdown(reply) => {
                let state = self.stop_meditation().await;
                let _ = reply.send(Ok(state));
            }
        }
    }

    // ── Meditation ──────────────────────────────────────────────

    fn start_meditation(&mut self) -> ProgressionState {
        if !self.record.progression.is_meditating {
            self.record.progression.is_meditating = true;
            info!(user_id = %self.user_id(), "meditation started");
            self.push_log("Began meditating...".to_string());
            self.flush_background();
            self.publish();
        }
        self.record.progression.clone()
    }

    async fn stop_meditation(&mut self) -> ProgressionState {
        if self.record.progression.is_meditating {
            self.record.progression.is_meditating = false;
            info!(
                user_id = %self.user_id(),
                spirit_power = self.record.progression.spirit_power,
                "meditation stopped"
            );
            self.push_log("Ended meditation.".to_string());
            self.persist().await;
            self.publish();
        }
        self.record.progression.clone()
    }

    fn on_tick(&mut self) {
        let active = active_method(&self.record.methods, &self.catalog);
        let result = meditation_tick(&mut self.record.progression, active, &mut self.rng);
        self.unflushed_ticks += 1;

        for event in result.events {
            match event {
                TickEvent::SpiritGathered { amount } => {
                    debug!(
                        user_id = %self.record.progression.user_id,
                        amount,
                        spirit_power = self.record.progression.spirit_power,
                        "spirit gathered"
                    );
                }
                TickEvent::StonesFound { amount, message } => {
                    info!(
                        user_id = %self.record.progression.user_id,
                        amount,
                        "found spirit stones"
                    );
                    self.push_log(message);
                }
            }
        }
        self.publish();
    }

    async fn on_autosave(&mut self) {
        if self.dirty {
            self.persist().await;
        } else {
            self.flush_background();
        }
    }

    // ── Breakthrough ────────────────────────────────────────────

    async fn attempt_breakthrough(&mut self) -> Result<BreakthroughReport, EngineError> {
        let plan = check_eligible(&self.record.progression, &self.catalog)?;

        self.phase = BreakthroughPhase::Attempting;
        info!(
            user_id = %self.user_id(),
            kind = ?plan.kind,
            success_rate = plan.success_rate,
            "breakthrough ritual begun"
        );
        self.publish();

        // Point of no return: the outcome is drawn after the ritual
        time::sleep(self.config.ritual_duration()).await;

        let roll = draw_roll(&mut self.rng);
        let outcome = resolve_breakthrough(&mut self.record.progression, &plan, roll);
        self.phase = outcome.phase();
        let message = self.describe(&outcome);
        info!(user_id = %self.user_id(), roll, outcome = ?outcome, "{}", message);
        self.push_log(message);

        self.persist().await;
        self.phase = phase_for(&self.record.progression, &self.catalog);
        self.publish();

        Ok(BreakthroughReport {
            resolution: BreakthroughResolution {
                plan,
                roll,
                outcome,
            },
            state: self.record.progression.clone(),
            phase: self.phase,
        })
    }

    fn describe(&self, outcome: &BreakthroughOutcome) -> String {
        let tier_name = |id: &str| {
            self.catalog
                .tier(id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        match outcome {
            BreakthroughOutcome::MajorSuccess { new_tier_id } => {
                format!("Breakthrough! Ascended to {} level 1.", tier_name(new_tier_id))
            }
            BreakthroughOutcome::MinorSuccess { new_level, .. } => format!(
                "Breakthrough! Reached {} level {}.",
                tier_name(&self.record.progression.tier_id),
                new_level
            ),
            BreakthroughOutcome::Failure {
                new_level,
                new_bonus,
                ..
            } => format!(
                "Breakthrough failed. Fell to level {}; bonus now +{}%.",
                new_level, new_bonus
            ),
        }
    }

    // ── Methods ─────────────────────────────────────────────────

    async fn purchase_method(&mut self, method_id: &str) -> Result<MethodReport, EngineError> {
        let catalog = Arc::clone(&self.catalog);
        let def = catalog
            .method(method_id)
            .ok_or_else(|| EngineError::UnknownMethod(method_id.to_string()))?;
        let change = try_purchase(&mut self.record, def)?;
        info!(user_id = %self.user_id(), method = %def.id, cost = change.stones_spent, "method learned");
        self.push_log(format!("Learned {}.", def.name));
        Ok(self.commit_method_change(change).await)
    }

    async fn upgrade_method(&mut self, owned_id: &str) -> Result<MethodReport, EngineError> {
        let catalog = Arc::clone(&self.catalog);
        let change = try_upgrade(&mut self.record, &catalog, owned_id)?;
        info!(
            user_id = %self.user_id(),
            method = %change.method.method_id,
            level = change.method.current_level,
            cost = change.stones_spent,
            "method upgraded"
        );
        let name = catalog
            .method(&change.method.method_id)
            .map(|m| m.name.clone())
            .unwrap_or_default();
        self.push_log(format!("{} reached level {}.", name, change.method.current_level));
        Ok(self.commit_method_change(change).await)
    }

    async fn activate_method(&mut self, owned_id: &str) -> Result<MethodReport, EngineError> {
        let change = activate(&mut self.record, owned_id)?;
        info!(user_id = %self.user_id(), method = %change.method.method_id, "method activated");
        Ok(self.commit_method_change(change).await)
    }

    /// Debit and method mutation are already in `record`; write them as one.
    async fn commit_method_change(&mut self, change: MethodChange) -> MethodReport {
        debug_assert!(self.record.active_count() <= 1);
        self.persist().await;
        self.publish();
        MethodReport {
            change,
            state: self.record.progression.clone(),
            methods: self.record.methods.clone(),
        }
    }

    // ── Status ──────────────────────────────────────────────────

    fn status(&self) -> SessionStatus {
        let active = active_method(&self.record.methods, &self.catalog);
        SessionStatus {
            state: self.record.progression.clone(),
            methods: self.record.methods.clone(),
            phase: self.phase,
            accrual_rate: accrual_rate(active),
            breakthrough: plan_breakthrough(&self.record.progression, &self.catalog).ok(),
            log: self.log.iter().cloned().collect(),
            unflushed_ticks: self.unflushed_ticks,
        }
    }

    // ── Persistence ─────────────────────────────────────────────

    /// Synchronous full-record write. A failure leaves the in-memory state
    /// authoritative and marks it dirty for the next autosave.
    async fn persist(&mut self) {
        self.record.progression.touch();
        match self.sync.flush_record(&self.record).await {
            Ok(()) => {
                self.dirty = false;
                self.unflushed_ticks = 0;
            }
            Err(_) => self.dirty = true,
        }
    }

    fn flush_background(&mut self) {
        let snapshot = self.record.progression.snapshot();
        self.record.progression.last_update_time = snapshot.last_update_time;
        if self.unflushed_ticks > 0 {
            debug!(
                user_id = %self.user_id(),
                ticks = self.unflushed_ticks,
                "flushing meditation snapshot"
            );
        }
        self.unflushed_ticks = 0;
        self.sync.flush_snapshot(snapshot);
    }

    fn publish(&self) {
        if let Err(e) = self.record.progression.check_invariants() {
            warn!(user_id = %self.user_id(), error = %e, "progression invariant broken");
        }
        self.state_tx.send_replace(self.record.progression.clone());
    }

    fn push_log(&mut self, line: String) {
        let capacity = self.config.meditation_log_capacity;
        if capacity == 0 {
            return;
        }
        while self.log.len() >= capacity {
            self.log.pop_back();
        }
        self.log.push_front(line);
    }

    fn user_id(&self) -> &str {
        &self.record.progression.user_id
    }
}
