//! Active-assignment ledger. Every live task→agent binding is recorded
//! here, retired on completion, and remapped on migration. The ledger is
//! the only caller of the registry's load choke points on the assignment
//! and completion paths.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sy_core::config::AssignmentConfig;
use sy_core::types::{
    Agent, AgentKind, TaskAssignment, TaskOutcome, TaskRequest, TaskStatus,
};

use crate::matcher;
use crate::registry::{AgentRegistry, LoadDelta, RegistryError};
use crate::scoring::ScoredCandidate;
use crate::selector::Selection;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("task `{0}` already has an active assignment")]
    DuplicateAssignment(Uuid),
    #[error("task `{0}` has no active assignment")]
    AssignmentNotFound(Uuid),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// Ledger entries
// ---------------------------------------------------------------------------

/// A live assignment paired with the request it places. The request is kept
/// so migration decisions can read priority and capability requirements
/// without a side lookup.
#[derive(Debug, Clone)]
pub struct ActiveAssignment {
    pub assignment: TaskAssignment,
    pub request: TaskRequest,
}

/// Returned once when an assignment retires.
#[derive(Debug, Clone)]
pub struct CompletedAssignment {
    pub assignment: TaskAssignment,
    pub request: TaskRequest,
    pub outcome: TaskOutcome,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Confidence and fallbacks
// ---------------------------------------------------------------------------

/// Assignment confidence: the agent's success rate, boosted per matched
/// capability up to a cap, penalized when the agent already runs hot,
/// boosted for specialists on complex work, clamped to the configured cap.
pub fn confidence_for(agent: &Agent, task: &TaskRequest, cfg: &AssignmentConfig) -> f64 {
    let mut confidence = agent.performance.success_rate;

    let boost = (matcher::matched_capability_count(agent, task) as f64 * cfg.capability_boost)
        .min(cfg.capability_boost_cap);
    confidence += boost;

    if agent.current_load_pct > cfg.overload_penalty_threshold_pct {
        confidence -= cfg.overload_penalty;
    }
    if agent.kind == AgentKind::Specialist && task.complexity > 6 {
        confidence += cfg.specialist_bonus;
    }

    confidence.clamp(0.0, cfg.confidence_cap)
}

/// Next-best candidates after the winner that could still take the task
/// right now, best first, at most `limit`.
pub fn fallback_chain(ranked: &[ScoredCandidate], winner: usize, limit: usize) -> Vec<Uuid> {
    ranked
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != winner)
        .filter(|(_, candidate)| {
            !candidate.agent.is_offline() && candidate.agent.has_spare_capacity()
        })
        .map(|(_, candidate)| candidate.agent.id)
        .take(limit)
        .collect()
}

// ---------------------------------------------------------------------------
// AssignmentLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AssignmentLedger {
    active: HashMap<Uuid, ActiveAssignment>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self {
            active: HashMap::new(),
        }
    }

    /// Commit the selected candidate: increments the winner's load through
    /// the registry and records the binding.
    pub fn assign(
        &mut self,
        registry: &mut AgentRegistry,
        task: &TaskRequest,
        ranked: &[ScoredCandidate],
        selection: Selection,
        cfg: &AssignmentConfig,
    ) -> Result<TaskAssignment> {
        let winner = &ranked[selection.index];
        let reasoning = format!(
            "selected {} on {}; {}",
            winner.agent.name,
            selection.rule,
            winner.breakdown.describe()
        );
        let fallbacks = fallback_chain(ranked, selection.index, cfg.max_fallback_agents);
        self.commit(registry, task, winner, reasoning, fallbacks, cfg, false)
    }

    /// Commit the top-scored candidate even past its capacity. Reserved for
    /// the critical path; the registry logs the capacity violation.
    pub fn assign_critical(
        &mut self,
        registry: &mut AgentRegistry,
        task: &TaskRequest,
        ranked: &[ScoredCandidate],
        cfg: &AssignmentConfig,
    ) -> Result<TaskAssignment> {
        let winner = &ranked[0];
        let reasoning = format!(
            "critical override to {}; {}",
            winner.agent.name,
            winner.breakdown.describe()
        );
        let fallbacks = fallback_chain(ranked, 0, cfg.max_fallback_agents);
        self.commit(registry, task, winner, reasoning, fallbacks, cfg, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn commit(
        &mut self,
        registry: &mut AgentRegistry,
        task: &TaskRequest,
        winner: &ScoredCandidate,
        reasoning: String,
        fallbacks: Vec<Uuid>,
        cfg: &AssignmentConfig,
        critical: bool,
    ) -> Result<TaskAssignment> {
        if self.active.contains_key(&task.id) {
            return Err(LedgerError::DuplicateAssignment(task.id));
        }

        if critical {
            registry.force_assign(winner.agent.id, task.id)?;
        } else {
            registry.apply_load_delta(winner.agent.id, LoadDelta::Assign(task.id))?;
        }

        // confidence reads the pre-assignment snapshot, the decision state
        let confidence = confidence_for(&winner.agent, task, cfg);
        let assigned_at = Utc::now();
        let assignment = TaskAssignment {
            task_id: task.id,
            agent_id: winner.agent.id,
            assigned_at,
            estimated_completion: assigned_at
                + Duration::milliseconds(winner.agent.avg_response_time_ms as i64),
            confidence,
            reasoning,
            fallback_agents: fallbacks,
        };

        let mut request = task.clone();
        request.status = TaskStatus::Assigned;
        self.active.insert(
            task.id,
            ActiveAssignment {
                assignment: assignment.clone(),
                request,
            },
        );

        info!(
            task_id = %task.id,
            agent_id = %winner.agent.id,
            agent = %winner.agent.name,
            confidence,
            critical,
            "task assigned"
        );
        Ok(assignment)
    }

    /// Retire an assignment: feed the outcome back into the agent's record,
    /// release the load slot, then drop the binding. Unknown task ids are a
    /// logged no-op since completion reports may race a prior retirement.
    pub fn complete(
        &mut self,
        registry: &mut AgentRegistry,
        task_id: Uuid,
        outcome: TaskOutcome,
    ) -> Result<Option<CompletedAssignment>> {
        let Some(entry) = self.active.get(&task_id) else {
            debug!(task_id = %task_id, "completion for unknown task ignored");
            return Ok(None);
        };
        let agent_id = entry.assignment.agent_id;

        // release before recording: if the registry turns out not to track
        // the task, the agent's reputation must stay untouched and the
        // binding must stay live for inspection
        registry.apply_load_delta(agent_id, LoadDelta::Release(task_id))?;
        registry.record_outcome(agent_id, &outcome)?;

        let Some(mut entry) = self.active.remove(&task_id) else {
            return Ok(None);
        };
        entry.request.status = if outcome.success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        info!(
            task_id = %task_id,
            agent_id = %agent_id,
            success = outcome.success,
            duration_ms = outcome.duration_ms,
            "task completed"
        );
        Ok(Some(CompletedAssignment {
            assignment: entry.assignment,
            request: entry.request,
            outcome,
            completed_at: Utc::now(),
        }))
    }

    /// Move an active assignment to another agent, updating both load
    /// counters and the binding. Used by the rebalancer.
    pub fn reassign(
        &mut self,
        registry: &mut AgentRegistry,
        task_id: Uuid,
        to_agent: Uuid,
        cfg: &AssignmentConfig,
    ) -> Result<TaskAssignment> {
        let entry = self
            .active
            .get(&task_id)
            .ok_or(LedgerError::AssignmentNotFound(task_id))?;
        let from_agent = entry.assignment.agent_id;
        let destination = registry.get(to_agent)?.clone();

        registry.apply_load_delta(from_agent, LoadDelta::Release(task_id))?;
        if let Err(err) = registry.apply_load_delta(to_agent, LoadDelta::Assign(task_id)) {
            // the source slot was freed above, so the restore cannot exceed capacity
            if let Err(restore) =
                registry.apply_load_delta(from_agent, LoadDelta::Assign(task_id))
            {
                warn!(
                    task_id = %task_id,
                    agent_id = %from_agent,
                    error = %restore,
                    "failed to restore assignment after aborted migration"
                );
            }
            return Err(err.into());
        }

        let Some(entry) = self.active.get_mut(&task_id) else {
            return Err(LedgerError::AssignmentNotFound(task_id));
        };
        entry.request.status = TaskStatus::Reassigned;
        entry.assignment.agent_id = to_agent;
        entry.assignment.confidence = confidence_for(&destination, &entry.request, cfg);
        entry.assignment.estimated_completion =
            Utc::now() + Duration::milliseconds(destination.avg_response_time_ms as i64);
        entry
            .assignment
            .reasoning
            .push_str(&format!("; migrated to {}", destination.name));

        info!(
            task_id = %task_id,
            from = %from_agent,
            to = %to_agent,
            "task migrated"
        );
        Ok(entry.assignment.clone())
    }

    // -- views --------------------------------------------------------------

    pub fn get(&self, task_id: Uuid) -> Option<&TaskAssignment> {
        self.active.get(&task_id).map(|entry| &entry.assignment)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Snapshot of every live assignment, for dashboards.
    pub fn active_assignments(&self) -> Vec<TaskAssignment> {
        self.active
            .values()
            .map(|entry| entry.assignment.clone())
            .collect()
    }

    /// Live entries bound to one agent.
    pub fn entries_for_agent(&self, agent_id: Uuid) -> Vec<&ActiveAssignment> {
        self.active
            .values()
            .filter(|entry| entry.assignment.agent_id == agent_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring;
    use crate::selector;
    use sy_core::config::{ScoringConfig, SelectionConfig};
    use sy_core::types::{AgentAvailability, TaskKind, TaskPriority};

    fn make_agent(name: &str, success_rate: f64) -> Agent {
        let mut agent = Agent::new(name, AgentKind::Generalist, 4)
            .with_capabilities(["text-generation"])
            .with_quality_score(0.8);
        agent.performance.success_rate = success_rate;
        agent
    }

    fn make_task() -> TaskRequest {
        TaskRequest::new(TaskKind::Text, TaskPriority::Medium, 5)
    }

    fn rank_for(registry: &AgentRegistry, task: &TaskRequest) -> Vec<ScoredCandidate> {
        let candidates = matcher::capable_agents(registry, task);
        scoring::rank(&candidates, task, &ScoringConfig::default())
    }

    fn assign_one(
        ledger: &mut AssignmentLedger,
        registry: &mut AgentRegistry,
        task: &TaskRequest,
    ) -> TaskAssignment {
        let ranked = rank_for(registry, task);
        let selection = selector::select(&ranked, &SelectionConfig::default()).unwrap();
        ledger
            .assign(registry, task, &ranked, selection, &AssignmentConfig::default())
            .unwrap()
    }

    #[test]
    fn assign_records_binding_and_increments_load() {
        let mut registry = AgentRegistry::new();
        let agent = make_agent("solo", 0.9);
        let agent_id = agent.id;
        registry.register(agent).unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        let assignment = assign_one(&mut ledger, &mut registry, &task);

        assert_eq!(assignment.agent_id, agent_id);
        assert_eq!(assignment.task_id, task.id);
        assert!(assignment.reasoning.contains("solo"));
        assert!(assignment.estimated_completion >= assignment.assigned_at);
        assert_eq!(ledger.active_count(), 1);
        assert_eq!(registry.get(agent_id).unwrap().current_tasks, vec![task.id]);
    }

    #[test]
    fn duplicate_assignment_is_rejected() {
        let mut registry = AgentRegistry::new();
        registry.register(make_agent("solo", 0.9)).unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        assign_one(&mut ledger, &mut registry, &task);

        let ranked = rank_for(&registry, &task);
        let selection = selector::select(&ranked, &SelectionConfig::default()).unwrap();
        let err = ledger
            .assign(
                &mut registry,
                &task,
                &ranked,
                selection,
                &AssignmentConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAssignment(id) if id == task.id));
        // the duplicate must not have touched the agent's load
        let agent = registry.list()[0];
        assert_eq!(agent.current_tasks.len(), 1);
    }

    #[test]
    fn confidence_starts_from_success_rate_and_boosts_per_capability() {
        let cfg = AssignmentConfig::default();
        let agent = make_agent("boosted", 0.8);
        let task = make_task();
        // one matched capability: 0.8 + 0.1
        assert!((confidence_for(&agent, &task, &cfg) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn capability_boost_caps_out() {
        let cfg = AssignmentConfig::default();
        let mut agent = Agent::new("wide", AgentKind::Generalist, 4)
            .with_capabilities(["a", "b", "c", "d"]);
        agent.performance.success_rate = 0.5;
        let task = make_task().with_required_capabilities(["a", "b", "c", "d"]);
        // four matches would boost 0.4, cap holds it at 0.2
        assert!((confidence_for(&agent, &task, &cfg) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn overload_penalty_and_specialist_bonus_apply() {
        let cfg = AssignmentConfig::default();
        let mut hot = make_agent("hot", 0.8);
        hot.current_load_pct = 85.0;
        // 0.8 + 0.1 boost - 0.15 penalty
        assert!((confidence_for(&hot, &make_task(), &cfg) - 0.75).abs() < 1e-9);

        let mut specialist = Agent::new("deep", AgentKind::Specialist, 4)
            .with_capabilities(["complex-reasoning"]);
        specialist.performance.success_rate = 0.7;
        let hard = TaskRequest::new(TaskKind::Reasoning, TaskPriority::Medium, 7);
        // 0.7 + 0.1 boost + 0.1 specialist bonus
        assert!((confidence_for(&specialist, &hard, &cfg) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn confidence_clamps_at_the_cap() {
        let cfg = AssignmentConfig::default();
        let mut specialist = Agent::new("star", AgentKind::Specialist, 4)
            .with_capabilities(["complex-reasoning"]);
        specialist.performance.success_rate = 1.0;
        let hard = TaskRequest::new(TaskKind::Reasoning, TaskPriority::High, 9);
        assert_eq!(confidence_for(&specialist, &hard, &cfg), 0.99);
    }

    #[test]
    fn fallback_chain_skips_winner_and_unavailable() {
        let scoring_cfg = ScoringConfig::default();
        let mut registry = AgentRegistry::new();
        let first = make_agent("first", 0.9);
        let second = make_agent("second", 0.8);
        let mut full = make_agent("full", 0.7);
        full.max_concurrent = 1;
        full.current_tasks = vec![Uuid::new_v4()];
        full.recompute_load();
        let second_id = second.id;
        for agent in [first, second, full.clone()] {
            registry.register(agent).unwrap();
        }

        let task = make_task();
        let mut candidates = matcher::capable_agents(&registry, &task);
        // the full agent never passes the matcher; fold it back in to prove
        // the chain filters on capacity itself
        candidates.push(&full);
        let ranked = scoring::rank(&candidates, &task, &scoring_cfg);

        let winner = ranked
            .iter()
            .position(|c| c.agent.name == "first")
            .unwrap();
        let chain = fallback_chain(&ranked, winner, 2);
        assert_eq!(chain, vec![second_id]);
    }

    #[test]
    fn fallback_chain_respects_the_limit() {
        let mut registry = AgentRegistry::new();
        for name in ["a", "b", "c", "d"] {
            registry.register(make_agent(name, 0.8)).unwrap();
        }
        let task = make_task();
        let ranked = rank_for(&registry, &task);
        assert_eq!(fallback_chain(&ranked, 0, 2).len(), 2);
    }

    #[test]
    fn complete_retires_and_feeds_back() {
        let mut registry = AgentRegistry::new();
        let agent = make_agent("worker", 1.0);
        let agent_id = agent.id;
        registry.register(agent).unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        assign_one(&mut ledger, &mut registry, &task);

        let completed = ledger
            .complete(&mut registry, task.id, TaskOutcome::new(true, 0.9, 1_000))
            .unwrap()
            .unwrap();
        assert_eq!(completed.request.status, TaskStatus::Completed);
        assert_eq!(ledger.active_count(), 0);

        let agent = registry.get(agent_id).unwrap();
        assert!(agent.current_tasks.is_empty());
        assert_eq!(agent.performance.tasks_completed, 1);
        assert!((agent.performance.average_quality - 0.9).abs() < 1e-9);
    }

    #[test]
    fn complete_twice_is_a_no_op() {
        let mut registry = AgentRegistry::new();
        let agent = make_agent("worker", 1.0);
        let agent_id = agent.id;
        registry.register(agent).unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        assign_one(&mut ledger, &mut registry, &task);

        let outcome = TaskOutcome::new(true, 0.9, 1_000);
        assert!(ledger
            .complete(&mut registry, task.id, outcome.clone())
            .unwrap()
            .is_some());
        assert!(ledger
            .complete(&mut registry, task.id, outcome)
            .unwrap()
            .is_none());

        // second call left the agent record untouched
        let agent = registry.get(agent_id).unwrap();
        assert_eq!(agent.performance.tasks_completed, 1);
        assert!(agent.current_tasks.is_empty());
    }

    #[test]
    fn complete_with_untracked_task_leaves_no_partial_write() {
        let mut registry = AgentRegistry::new();
        let agent = make_agent("worker", 1.0);
        let agent_id = agent.id;
        registry.register(agent).unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        assign_one(&mut ledger, &mut registry, &task);

        // desync the registry behind the ledger's back
        registry
            .apply_load_delta(agent_id, LoadDelta::Release(task.id))
            .unwrap();

        let err = ledger
            .complete(&mut registry, task.id, TaskOutcome::new(true, 0.9, 1_000))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Registry(RegistryError::TaskNotTracked { .. })
        ));

        // the failed release recorded nothing and retired nothing
        let agent = registry.get(agent_id).unwrap();
        assert_eq!(agent.performance.tasks_completed, 0);
        assert!(ledger.get(task.id).is_some());
    }

    #[test]
    fn failed_outcome_marks_the_request_failed() {
        let mut registry = AgentRegistry::new();
        registry.register(make_agent("worker", 1.0)).unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        assign_one(&mut ledger, &mut registry, &task);

        let completed = ledger
            .complete(&mut registry, task.id, TaskOutcome::new(false, 0.0, 500))
            .unwrap()
            .unwrap();
        assert_eq!(completed.request.status, TaskStatus::Failed);
    }

    #[test]
    fn reassign_moves_load_and_updates_binding() {
        let mut registry = AgentRegistry::new();
        // the source outscores the destination, so the first assignment
        // lands there without help
        let source = make_agent("source", 0.9).with_quality_score(0.9);
        let destination = make_agent("destination", 0.9).with_quality_score(0.3);
        let source_id = source.id;
        let destination_id = destination.id;
        registry.register(source).unwrap();
        registry.register(destination).unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        let assignment = assign_one(&mut ledger, &mut registry, &task);
        assert_eq!(assignment.agent_id, source_id);

        let updated = ledger
            .reassign(
                &mut registry,
                task.id,
                destination_id,
                &AssignmentConfig::default(),
            )
            .unwrap();
        assert_eq!(updated.agent_id, destination_id);
        assert!(updated.reasoning.contains("migrated to destination"));
        assert!(registry.get(source_id).unwrap().current_tasks.is_empty());
        assert_eq!(
            registry.get(destination_id).unwrap().current_tasks,
            vec![task.id]
        );
    }

    #[test]
    fn reassign_unknown_task_fails() {
        let mut registry = AgentRegistry::new();
        let agent = make_agent("worker", 0.9);
        let agent_id = agent.id;
        registry.register(agent).unwrap();

        let mut ledger = AssignmentLedger::new();
        let err = ledger
            .reassign(
                &mut registry,
                Uuid::new_v4(),
                agent_id,
                &AssignmentConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::AssignmentNotFound(_)));
    }

    #[test]
    fn reassign_to_full_agent_restores_the_source() {
        let mut registry = AgentRegistry::new();
        let source = make_agent("source", 0.9);
        let mut crowded = make_agent("crowded", 0.9);
        crowded.max_concurrent = 1;
        let source_id = source.id;
        let crowded_id = crowded.id;
        registry.register(source).unwrap();
        registry.register(crowded).unwrap();
        // fill the crowded agent so the matcher leaves only the source
        registry
            .apply_load_delta(crowded_id, LoadDelta::Assign(Uuid::new_v4()))
            .unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = make_task();
        let assignment = assign_one(&mut ledger, &mut registry, &task);
        assert_eq!(assignment.agent_id, source_id);

        let err = ledger
            .reassign(
                &mut registry,
                task.id,
                crowded_id,
                &AssignmentConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Registry(RegistryError::CapacityExceeded { .. })
        ));
        // the task stayed on the source
        assert_eq!(registry.get(source_id).unwrap().current_tasks, vec![task.id]);
        assert_eq!(ledger.get(task.id).unwrap().agent_id, source_id);
    }

    #[test]
    fn assign_critical_commits_past_capacity() {
        let mut registry = AgentRegistry::new();
        let mut agent = make_agent("packed", 0.9);
        agent.max_concurrent = 1;
        let agent_id = agent.id;
        registry.register(agent).unwrap();
        registry
            .apply_load_delta(agent_id, LoadDelta::Assign(Uuid::new_v4()))
            .unwrap();

        let mut ledger = AssignmentLedger::new();
        let task = TaskRequest::new(TaskKind::Text, TaskPriority::Critical, 5);
        let candidates = matcher::critical_candidates(&registry);
        let ranked = scoring::rank(&candidates, &task, &ScoringConfig::default());
        let assignment = ledger
            .assign_critical(&mut registry, &task, &ranked, &AssignmentConfig::default())
            .unwrap();

        assert_eq!(assignment.agent_id, agent_id);
        assert!(assignment.reasoning.starts_with("critical override"));
        let agent = registry.get(agent_id).unwrap();
        assert_eq!(agent.current_tasks.len(), 2);
        assert!(agent.current_load_pct > 100.0);
        assert_eq!(agent.availability, AgentAvailability::Busy);
    }

    #[test]
    fn entries_for_agent_lists_only_that_agent() {
        let mut registry = AgentRegistry::new();
        let a = make_agent("a", 0.9);
        let a_id = a.id;
        registry.register(a).unwrap();
        registry.register(make_agent("b", 0.9)).unwrap();

        let mut ledger = AssignmentLedger::new();
        let first = make_task();
        let second = make_task();
        assign_one(&mut ledger, &mut registry, &first);
        assign_one(&mut ledger, &mut registry, &second);

        let total: usize = registry
            .list()
            .iter()
            .map(|agent| ledger.entries_for_agent(agent.id).len())
            .sum();
        assert_eq!(total, 2);
        for entry in ledger.entries_for_agent(a_id) {
            assert_eq!(entry.assignment.agent_id, a_id);
        }
    }
}
