//! Rolling orchestration counters and point-in-time snapshots. Counters are
//! monotonic event tallies; everything else in a snapshot is recomputed from
//! the registry and ledger, so a snapshot is observational and never
//! authoritative.

use chrono::{DateTime, Utc};

use sy_core::types::OrchestrationMetrics;

use crate::ledger::AssignmentLedger;
use crate::registry::AgentRegistry;

// ---------------------------------------------------------------------------
// EventCounters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EventCounters {
    pub assignments_made: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub reassignments: u64,
    pub critical_overrides: u64,
    started_at: DateTime<Utc>,
}

impl EventCounters {
    pub fn new() -> Self {
        Self {
            assignments_made: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            reassignments: 0,
            critical_overrides: 0,
            started_at: Utc::now(),
        }
    }

    pub fn record_assignment(&mut self) {
        self.assignments_made += 1;
    }

    /// A critical override is still an assignment.
    pub fn record_critical_override(&mut self) {
        self.assignments_made += 1;
        self.critical_overrides += 1;
    }

    pub fn record_completion(&mut self, success: bool) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
    }

    pub fn record_reassignments(&mut self, count: u64) {
        self.reassignments += count;
    }

    /// Build a full metrics snapshot from the counters plus live registry
    /// and ledger state.
    pub fn snapshot(
        &self,
        registry: &AgentRegistry,
        ledger: &AssignmentLedger,
    ) -> OrchestrationMetrics {
        let finished = self.tasks_completed + self.tasks_failed;
        // optimistic before any completion, matching a fresh agent record
        let success_rate = if finished > 0 {
            self.tasks_completed as f64 / finished as f64
        } else {
            1.0
        };

        let online: Vec<_> = registry.list().into_iter().filter(|a| !a.is_offline()).collect();
        let average_utilization_pct = if online.is_empty() {
            0.0
        } else {
            online.iter().map(|a| a.current_load_pct).sum::<f64>() / online.len() as f64
        };

        let uptime_secs = (Utc::now() - self.started_at).num_seconds().max(1) as f64;
        let throughput_per_minute = finished as f64 / (uptime_secs / 60.0);

        OrchestrationMetrics {
            assignments_made: self.assignments_made,
            tasks_completed: self.tasks_completed,
            tasks_failed: self.tasks_failed,
            reassignments: self.reassignments,
            critical_overrides: self.critical_overrides,
            active_assignments: ledger.active_count() as u64,
            agents_total: registry.agent_count() as u64,
            agents_online: registry.online_count() as u64,
            success_rate,
            average_utilization_pct,
            throughput_per_minute,
            timestamp: Utc::now(),
        }
    }
}

impl Default for EventCounters {
    fn default() -> Self {
        Self::new()
    }
}
