use std::collections::HashMap;

use sy_core::types::{Agent, AgentAvailability, TaskOutcome};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::feedback;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("agent not found: `{0}`")]
    AgentNotFound(Uuid),
    #[error("duplicate agent id: `{0}`")]
    DuplicateAgent(Uuid),
    #[error("agent `{agent_id}` is at capacity ({max_concurrent} concurrent tasks)")]
    CapacityExceeded {
        agent_id: Uuid,
        max_concurrent: usize,
    },
    #[error("agent `{agent_id}` does not hold task `{task_id}`")]
    TaskNotTracked { agent_id: Uuid, task_id: Uuid },
    #[error("invalid availability transition for agent `{agent_id}`: {from} -> {to}")]
    InvalidTransition {
        agent_id: Uuid,
        from: AgentAvailability,
        to: AgentAvailability,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

// ---------------------------------------------------------------------------
// LoadDelta / LoadSnapshot
// ---------------------------------------------------------------------------

/// A single load mutation against one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDelta {
    /// Attach a task id, incrementing load by one slot.
    Assign(Uuid),
    /// Detach a task id, decrementing load by one slot.
    Release(Uuid),
}

/// Agent load as observed right after a mutation.
#[derive(Debug, Clone, Copy)]
pub struct LoadSnapshot {
    pub agent_id: Uuid,
    pub active_tasks: usize,
    pub load_pct: f64,
    pub availability: AgentAvailability,
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

/// Central pool of workers and their live state.
///
/// All load mutation funnels through [`AgentRegistry::apply_load_delta`] (or
/// its capacity-bypassing sibling [`AgentRegistry::force_assign`], reserved
/// for the critical path), so `current_tasks`, `current_load_pct`, and the
/// load-driven availability bits always agree.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: HashMap<Uuid, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    // -- Pool management --

    /// Register an agent. Returns an error if the id already exists.
    pub fn register(&mut self, agent: Agent) -> Result<()> {
        if self.agents.contains_key(&agent.id) {
            return Err(RegistryError::DuplicateAgent(agent.id));
        }
        debug!(agent_id = %agent.id, name = %agent.name, "registered agent");
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    /// Look up one agent by id.
    pub fn get(&self, agent_id: Uuid) -> Result<&Agent> {
        self.agents
            .get(&agent_id)
            .ok_or(RegistryError::AgentNotFound(agent_id))
    }

    /// All registered agents, in unspecified order.
    pub fn list(&self) -> Vec<&Agent> {
        self.agents.values().collect()
    }

    /// Agents that are not offline and have at least one free slot.
    pub fn list_available(&self) -> Vec<&Agent> {
        self.agents
            .values()
            .filter(|a| !a.is_offline() && a.has_spare_capacity())
            .collect()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Agents currently reachable for work (anything but offline).
    pub fn online_count(&self) -> usize {
        self.agents.values().filter(|a| !a.is_offline()).count()
    }

    // -- Load mutation choke point --

    /// Apply a load delta to one agent, recomputing derived load and
    /// availability. An `Assign` against a full agent fails with
    /// `CapacityExceeded` even when the caller already gated capacity.
    pub fn apply_load_delta(&mut self, agent_id: Uuid, delta: LoadDelta) -> Result<LoadSnapshot> {
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(RegistryError::AgentNotFound(agent_id))?;

        match delta {
            LoadDelta::Assign(task_id) => {
                if !agent.has_spare_capacity() {
                    return Err(RegistryError::CapacityExceeded {
                        agent_id,
                        max_concurrent: agent.max_concurrent,
                    });
                }
                agent.current_tasks.push(task_id);
            }
            LoadDelta::Release(task_id) => {
                let slot = agent
                    .current_tasks
                    .iter()
                    .position(|t| *t == task_id)
                    .ok_or(RegistryError::TaskNotTracked { agent_id, task_id })?;
                agent.current_tasks.remove(slot);
            }
        }

        let snapshot = Self::refresh(agent);
        debug!(
            agent_id = %agent_id,
            active = snapshot.active_tasks,
            load_pct = snapshot.load_pct,
            availability = %snapshot.availability,
            "applied load delta"
        );
        Ok(snapshot)
    }

    /// Attach a task regardless of capacity. Reserved for the critical
    /// override path; going past `max_concurrent` is logged as a deliberate
    /// capacity violation.
    pub fn force_assign(&mut self, agent_id: Uuid, task_id: Uuid) -> Result<LoadSnapshot> {
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(RegistryError::AgentNotFound(agent_id))?;

        agent.current_tasks.push(task_id);
        let snapshot = Self::refresh(agent);
        if snapshot.active_tasks > agent.max_concurrent {
            warn!(
                agent_id = %agent_id,
                task_id = %task_id,
                active = snapshot.active_tasks,
                max_concurrent = agent.max_concurrent,
                "capacity violation: critical assignment past max_concurrent"
            );
        }
        Ok(snapshot)
    }

    // -- Reputation --

    /// Feed a completion outcome into the agent's performance record. This is
    /// the only path that writes reputation fields.
    pub fn record_outcome(&mut self, agent_id: Uuid, outcome: &TaskOutcome) -> Result<()> {
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(RegistryError::AgentNotFound(agent_id))?;
        feedback::apply_outcome(agent, outcome);
        Ok(())
    }

    // -- Availability --

    /// Administratively move an agent through the availability machine.
    /// `offline -> available` recovery re-derives busy/available from the
    /// agent's current load.
    pub fn set_availability(
        &mut self,
        agent_id: Uuid,
        target: AgentAvailability,
    ) -> Result<AgentAvailability> {
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(RegistryError::AgentNotFound(agent_id))?;

        let from = agent.availability;
        if !from.can_transition_to(&target) {
            return Err(RegistryError::InvalidTransition {
                agent_id,
                from,
                to: target,
            });
        }
        agent.availability = target;
        if target != AgentAvailability::Offline {
            agent.recompute_load();
        }
        info!(
            agent_id = %agent_id,
            from = %from,
            to = %agent.availability,
            "availability transition"
        );
        Ok(agent.availability)
    }

    fn refresh(agent: &mut Agent) -> LoadSnapshot {
        agent.recompute_load();
        LoadSnapshot {
            agent_id: agent.id,
            active_tasks: agent.current_tasks.len(),
            load_pct: agent.current_load_pct,
            availability: agent.availability,
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
