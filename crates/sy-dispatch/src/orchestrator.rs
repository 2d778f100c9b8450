//! The orchestrator facade. One instance owns the registry, ledger, and
//! counters behind a single async mutex; the host constructs it once and
//! hands clones of the handle to the request path, the completion callback,
//! and the rebalancer loop. Every read-modify-write of agent load happens
//! inside one lock scope, so check-then-act races cannot occur.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use sy_core::config::OrchestratorConfig;
use sy_core::types::{
    Agent, AgentAvailability, OrchestrationMetrics, TaskAssignment, TaskKind, TaskOutcome,
    TaskPriority, TaskRequest, TaskStatus,
};

use crate::ledger::{AssignmentLedger, CompletedAssignment, LedgerError};
use crate::matcher;
use crate::metrics::EventCounters;
use crate::rebalance::{self, RebalanceReport};
use crate::registry::{AgentRegistry, RegistryError};
use crate::scoring;
use crate::selector;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no capable agent available for task `{task_id}` ({kind:?})")]
    NoCapableAgent { task_id: Uuid, kind: TaskKind },
    #[error("every agent is offline")]
    NoAgentsAvailable,
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Shared mutable core: registry, ledger, and counters move together under
/// one lock.
#[derive(Debug, Default)]
struct DispatchState {
    registry: AgentRegistry,
    ledger: AssignmentLedger,
    counters: EventCounters,
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    state: Arc<Mutex<DispatchState>>,
    config: Arc<OrchestratorConfig>,
}

impl Orchestrator {
    /// Build around an already validated configuration.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(DispatchState::default())),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // -- Agent administration ------------------------------------------------

    pub async fn register_agent(&self, agent: Agent) -> Result<()> {
        let mut state = self.state.lock().await;
        state.registry.register(agent)?;
        Ok(())
    }

    /// Drive an agent through its availability machine. Recovery from
    /// offline re-derives busy or available from current load.
    pub async fn set_agent_availability(
        &self,
        agent_id: Uuid,
        target: AgentAvailability,
    ) -> Result<AgentAvailability> {
        let mut state = self.state.lock().await;
        Ok(state.registry.set_availability(agent_id, target)?)
    }

    // -- Assignment path -----------------------------------------------------

    /// Match, score, select, and commit in one lock scope. Fails with
    /// [`DispatchError::NoCapableAgent`] when no agent can take the task
    /// right now; the caller may retry later or escalate to
    /// [`Orchestrator::assign_critical`].
    pub async fn submit(&self, mut task: TaskRequest) -> Result<TaskAssignment> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        task.status = TaskStatus::Queued;

        let ranked = {
            let candidates = matcher::capable_agents(&state.registry, &task);
            scoring::rank(&candidates, &task, &self.config.scoring)
        };
        let Some(selection) = selector::select(&ranked, &self.config.selection) else {
            debug!(task_id = %task.id, kind = ?task.kind, "no capable agent");
            return Err(DispatchError::NoCapableAgent {
                task_id: task.id,
                kind: task.kind,
            });
        };

        let assignment = state.ledger.assign(
            &mut state.registry,
            &task,
            &ranked,
            selection,
            &self.config.assignment,
        )?;
        state.counters.record_assignment();
        Ok(assignment)
    }

    /// Force-assign urgent work to the top-scored non-offline agent, past
    /// capacity if need be. Fails only when every agent is offline.
    pub async fn assign_critical(&self, mut task: TaskRequest) -> Result<TaskAssignment> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        task.priority = TaskPriority::Critical;
        task.status = TaskStatus::Queued;

        let ranked = {
            let candidates = matcher::critical_candidates(&state.registry);
            scoring::rank(&candidates, &task, &self.config.scoring)
        };
        if ranked.is_empty() {
            warn!(task_id = %task.id, "critical assignment impossible, all agents offline");
            return Err(DispatchError::NoAgentsAvailable);
        }

        let assignment = state.ledger.assign_critical(
            &mut state.registry,
            &task,
            &ranked,
            &self.config.assignment,
        )?;
        state.counters.record_critical_override();
        Ok(assignment)
    }

    // -- Completion path -----------------------------------------------------

    /// Completion callback from whatever executor ran the task. Unknown or
    /// already retired task ids are a benign no-op.
    pub async fn report(
        &self,
        task_id: Uuid,
        outcome: TaskOutcome,
    ) -> Result<Option<CompletedAssignment>> {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let success = outcome.success;
        let completed = state.ledger.complete(&mut state.registry, task_id, outcome)?;
        if completed.is_some() {
            state.counters.record_completion(success);
        }
        Ok(completed)
    }

    // -- Rebalancing ---------------------------------------------------------

    /// One redistribution sweep under the shared lock. Best effort; never
    /// fails.
    pub async fn rebalance_once(&self) -> RebalanceReport {
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let report = rebalance::sweep(&mut state.registry, &mut state.ledger, &self.config);
        state
            .counters
            .record_reassignments(report.migrations.len() as u64);
        report
    }

    // -- Observability -------------------------------------------------------

    pub async fn agent_status(&self) -> Vec<Agent> {
        let state = self.state.lock().await;
        state.registry.list().into_iter().cloned().collect()
    }

    pub async fn active_assignments(&self) -> Vec<TaskAssignment> {
        let state = self.state.lock().await;
        state.ledger.active_assignments()
    }

    pub async fn system_metrics(&self) -> OrchestrationMetrics {
        let state = self.state.lock().await;
        state.counters.snapshot(&state.registry, &state.ledger)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}
