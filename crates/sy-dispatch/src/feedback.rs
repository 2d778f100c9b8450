//! Performance feedback loop: folds completion outcomes into an agent's
//! running reputation aggregates.
//!
//! These five fields (`tasks_completed`, `success_rate`, `average_quality`,
//! `avg_response_time_ms`, `quality_score`) have no other writer in the
//! workspace; everything downstream (scoring, confidence) reads them.

use chrono::Utc;
use sy_core::types::{Agent, TaskOutcome};
use tracing::debug;

/// Incremental weighted-average update, `n` being the completions so far.
/// Failed tasks count against the success rate and response time but never
/// dilute the quality average.
pub fn apply_outcome(agent: &mut Agent, outcome: &TaskOutcome) {
    let n = agent.performance.tasks_completed as f64;
    let success = if outcome.success { 1.0 } else { 0.0 };

    agent.performance.success_rate = (agent.performance.success_rate * n + success) / (n + 1.0);
    if outcome.success {
        agent.performance.average_quality =
            (agent.performance.average_quality * n + outcome.quality) / (n + 1.0);
    }
    agent.avg_response_time_ms =
        (agent.avg_response_time_ms * n + outcome.duration_ms as f64) / (n + 1.0);
    agent.quality_score =
        (agent.performance.average_quality * agent.performance.success_rate).min(0.99);
    agent.performance.tasks_completed += 1;
    agent.performance.last_updated = Utc::now();

    debug!(
        agent_id = %agent.id,
        success = outcome.success,
        tasks_completed = agent.performance.tasks_completed,
        success_rate = agent.performance.success_rate,
        quality_score = agent.quality_score,
        "recorded task outcome"
    );
}
