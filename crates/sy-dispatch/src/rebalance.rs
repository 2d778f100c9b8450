//! Load redistribution sweep. Finds agents running past the overload
//! threshold and moves at most one low- or medium-priority task from each
//! to a lightly loaded capable agent. Best effort by design: a sweep never
//! fails, it only reports what it could and could not move.

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sy_core::config::OrchestratorConfig;
use sy_core::types::{TaskPriority, TaskRequest};

use crate::ledger::AssignmentLedger;
use crate::matcher;
use crate::registry::AgentRegistry;
use crate::scoring;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One completed migration within a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct Migration {
    pub task_id: Uuid,
    pub from_agent: Uuid,
    pub to_agent: Uuid,
}

/// What a sweep saw and did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebalanceReport {
    pub agents_scanned: usize,
    /// Agents above the overload threshold when the sweep started.
    pub overloaded: usize,
    pub migrations: Vec<Migration>,
    /// Overloaded agents the sweep could not relieve.
    pub stranded: usize,
}

impl RebalanceReport {
    pub fn is_quiet(&self) -> bool {
        self.overloaded == 0
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Run one redistribution pass over the registry and ledger.
///
/// Sources are visited hottest first. Migration failures are logged and the
/// task stays where it is; overload is tolerated over starvation.
pub fn sweep(
    registry: &mut AgentRegistry,
    ledger: &mut AssignmentLedger,
    cfg: &OrchestratorConfig,
) -> RebalanceReport {
    let mut report = RebalanceReport {
        agents_scanned: registry.agent_count(),
        ..RebalanceReport::default()
    };

    let mut sources: Vec<(Uuid, f64)> = registry
        .list()
        .into_iter()
        .filter(|agent| agent.current_load_pct > cfg.rebalancer.overload_threshold_pct)
        .map(|agent| (agent.id, agent.current_load_pct))
        .collect();
    // hottest first; id settles equal loads so sweeps are repeatable
    sources.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    report.overloaded = sources.len();

    for (source_id, load_pct) in sources {
        match relieve(registry, ledger, cfg, source_id, load_pct) {
            Some(migration) => report.migrations.push(migration),
            None => report.stranded += 1,
        }
    }

    if report.is_quiet() {
        debug!(agents = report.agents_scanned, "rebalance sweep found no overload");
    } else {
        info!(
            agents = report.agents_scanned,
            overloaded = report.overloaded,
            migrated = report.migrations.len(),
            stranded = report.stranded,
            "rebalance sweep complete"
        );
    }
    report
}

/// Try to move one task off an overloaded agent. Returns `None` when the
/// agent is left as-is.
fn relieve(
    registry: &mut AgentRegistry,
    ledger: &mut AssignmentLedger,
    cfg: &OrchestratorConfig,
    source_id: Uuid,
    load_pct: f64,
) -> Option<Migration> {
    let Ok(agent) = registry.get(source_id) else {
        return None;
    };
    // a single-task agent keeps its task; migrating it would only shift the load
    if agent.current_tasks.len() <= 1 {
        debug!(agent_id = %source_id, load_pct, "overloaded but holds one task, leaving in place");
        return None;
    }

    let Some((task_id, request)) = movable_task(ledger, source_id) else {
        debug!(agent_id = %source_id, load_pct, "no low or medium priority task to migrate");
        return None;
    };

    let destination = {
        let candidates: Vec<_> = matcher::capable_agents(registry, &request)
            .into_iter()
            .filter(|candidate| {
                candidate.id != source_id
                    && candidate.current_load_pct < cfg.rebalancer.migration_target_pct
            })
            .collect();
        scoring::rank(&candidates, &request, &cfg.scoring)
            .first()
            .map(|candidate| candidate.agent.id)
    };
    let Some(to_agent) = destination else {
        debug!(
            agent_id = %source_id,
            task_id = %task_id,
            "no capable destination under target load"
        );
        return None;
    };

    match ledger.reassign(registry, task_id, to_agent, &cfg.assignment) {
        Ok(_) => Some(Migration {
            task_id,
            from_agent: source_id,
            to_agent,
        }),
        Err(err) => {
            warn!(
                task_id = %task_id,
                from = %source_id,
                to = %to_agent,
                error = %err,
                "migration failed, task left in place"
            );
            None
        }
    }
}

/// Lowest-priority, then oldest, migratable task held by the agent. Only
/// low and medium priority work moves.
fn movable_task(ledger: &AssignmentLedger, agent_id: Uuid) -> Option<(Uuid, TaskRequest)> {
    ledger
        .entries_for_agent(agent_id)
        .into_iter()
        .filter(|entry| entry.request.priority <= TaskPriority::Medium)
        .min_by(|a, b| {
            a.request
                .priority
                .cmp(&b.request.priority)
                .then_with(|| a.request.created_at.cmp(&b.request.created_at))
                .then_with(|| a.assignment.task_id.cmp(&b.assignment.task_id))
        })
        .map(|entry| (entry.assignment.task_id, entry.request.clone()))
}
