//! Multi-factor scoring: a deterministic, explainable rank over capable
//! agents. Given identical agent snapshots and an identical request, the
//! ranking is identical — no randomness anywhere in this path.

use serde::Serialize;
use sy_core::config::ScoringConfig;
use sy_core::types::{Agent, AgentKind, TaskKind, TaskPriority, TaskRequest};

use crate::matcher;

// ---------------------------------------------------------------------------
// ScoreBreakdown
// ---------------------------------------------------------------------------

/// Weighted contribution of each factor to the total, kept around so an
/// assignment can explain itself.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub quality: f64,
    pub availability: f64,
    pub cost: f64,
    pub speed: f64,
    pub capability_match: f64,
    pub load_balance: f64,
    pub bonus: f64,
    /// Weighted sum plus bonuses, clamped to at most 1.0.
    pub total: f64,
}

impl ScoreBreakdown {
    /// One-line factor summary for reasoning strings and logs.
    pub fn describe(&self) -> String {
        format!(
            "quality {:.3}, availability {:.3}, cost {:.3}, speed {:.3}, capability {:.3}, load {:.3}, bonus {:.3}, total {:.3}",
            self.quality,
            self.availability,
            self.cost,
            self.speed,
            self.capability_match,
            self.load_balance,
            self.bonus,
            self.total
        )
    }
}

// ---------------------------------------------------------------------------
// ScoredCandidate
// ---------------------------------------------------------------------------

/// An agent snapshot paired with its score for one request.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub agent: Agent,
    pub breakdown: ScoreBreakdown,
}

impl ScoredCandidate {
    pub fn total(&self) -> f64 {
        self.breakdown.total
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score one agent for one request.
///
/// Cost and speed clamp at zero when an agent sits past its normalization
/// ceiling. Availability and load balance may run negative for agents past
/// capacity, which only the critical path ever scores; that keeps overloaded
/// agents ranked below idle ones without a special case.
pub fn score_agent(agent: &Agent, task: &TaskRequest, cfg: &ScoringConfig) -> ScoreBreakdown {
    let quality = cfg.quality_weight * agent.quality_score;
    let availability = cfg.availability_weight * (1.0 - agent.current_load_pct / 100.0);
    let cost = cfg.cost_weight * (1.0 - agent.cost_per_task / cfg.cost_ceiling).max(0.0);
    let speed =
        cfg.speed_weight * (1.0 - agent.avg_response_time_ms / cfg.time_ceiling_ms).max(0.0);

    let matched = matcher::matched_capability_count(agent, task);
    let required = matcher::required_capability_count(task).max(1);
    let capability_match = cfg.capability_weight * (matched as f64 / required as f64);

    let load_balance = cfg.load_balance_weight
        * (1.0 - agent.current_tasks.len() as f64 / agent.max_concurrent as f64);

    let mut bonus = 0.0;
    if task.priority == TaskPriority::Critical {
        bonus += cfg.critical_bonus;
    }
    if task.complexity > 7 && agent.kind == AgentKind::Specialist {
        bonus += cfg.specialist_complexity_bonus;
    }
    if task.kind == TaskKind::Video && agent.has_capability(matcher::VIDEO_GENERATION) {
        bonus += cfg.video_affinity_bonus;
    }

    let total =
        (quality + availability + cost + speed + capability_match + load_balance + bonus).min(1.0);

    ScoreBreakdown {
        quality,
        availability,
        cost,
        speed,
        capability_match,
        load_balance,
        bonus,
        total,
    }
}

/// Score and sort candidates, best first. Score ties settle on agent id so
/// equal snapshots always produce the same order.
pub fn rank(agents: &[&Agent], task: &TaskRequest, cfg: &ScoringConfig) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = agents
        .iter()
        .map(|agent| ScoredCandidate {
            agent: (*agent).clone(),
            breakdown: score_agent(agent, task, cfg),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.breakdown
            .total
            .total_cmp(&a.breakdown.total)
            .then_with(|| a.agent.id.cmp(&b.agent.id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use sy_core::types::AgentAvailability;
    use uuid::Uuid;

    fn idle_agent(quality: f64) -> Agent {
        Agent::new("scored", AgentKind::Generalist, 4)
            .with_capabilities(["text-generation"])
            .with_quality_score(quality)
            .with_cost_per_task(0.5)
            .with_avg_response_time_ms(300_000.0)
    }

    fn text_task() -> TaskRequest {
        TaskRequest::new(TaskKind::Text, TaskPriority::Medium, 5)
    }

    #[test]
    fn idle_perfect_fit_scores_near_the_weight_budget() {
        let cfg = ScoringConfig::default();
        let agent = idle_agent(0.8);
        let score = score_agent(&agent, &text_task(), &cfg);

        assert!((score.quality - 0.25 * 0.8).abs() < 1e-9);
        assert!((score.availability - 0.20).abs() < 1e-9);
        assert!((score.cost - 0.15 * 0.5).abs() < 1e-9);
        assert!((score.speed - 0.15 * 0.5).abs() < 1e-9);
        assert!((score.capability_match - 0.15).abs() < 1e-9);
        assert!((score.load_balance - 0.10).abs() < 1e-9);
        assert_eq!(score.bonus, 0.0);

        let expected = score.quality
            + score.availability
            + score.cost
            + score.speed
            + score.capability_match
            + score.load_balance;
        assert!((score.total - expected).abs() < 1e-9);
    }

    #[test]
    fn cost_and_speed_clamp_at_the_ceiling() {
        let cfg = ScoringConfig::default();
        let agent = idle_agent(0.8)
            .with_cost_per_task(5.0)
            .with_avg_response_time_ms(2_000_000.0);
        let score = score_agent(&agent, &text_task(), &cfg);
        assert_eq!(score.cost, 0.0);
        assert_eq!(score.speed, 0.0);
    }

    #[test]
    fn load_reduces_availability_and_balance() {
        let cfg = ScoringConfig::default();
        let mut agent = idle_agent(0.8);
        agent.current_tasks = vec![Uuid::new_v4(), Uuid::new_v4()];
        agent.recompute_load();

        let score = score_agent(&agent, &text_task(), &cfg);
        assert!((score.availability - 0.20 * 0.5).abs() < 1e-9);
        assert!((score.load_balance - 0.10 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn overloaded_agent_scores_below_idle_twin() {
        let cfg = ScoringConfig::default();
        let idle = idle_agent(0.8);
        let mut crammed = idle_agent(0.8);
        crammed.max_concurrent = 1;
        crammed.current_tasks = vec![Uuid::new_v4(), Uuid::new_v4()];
        crammed.recompute_load();
        assert!(crammed.current_load_pct > 100.0);
        assert_eq!(crammed.availability, AgentAvailability::Busy);

        let task = text_task();
        assert!(score_agent(&crammed, &task, &cfg).total < score_agent(&idle, &task, &cfg).total);
    }

    #[test]
    fn critical_priority_adds_its_bonus() {
        let cfg = ScoringConfig::default();
        let agent = idle_agent(0.8);
        let normal = score_agent(&agent, &text_task(), &cfg);
        let critical = score_agent(
            &agent,
            &TaskRequest::new(TaskKind::Text, TaskPriority::Critical, 5),
            &cfg,
        );
        assert!((critical.bonus - 0.10).abs() < 1e-9);
        assert!((critical.total - (normal.total + 0.10)).abs() < 1e-9);
    }

    #[test]
    fn specialist_bonus_needs_complexity_above_seven() {
        let cfg = ScoringConfig::default();
        let specialist = Agent::new("deep", AgentKind::Specialist, 4)
            .with_capabilities(["complex-reasoning"])
            .with_quality_score(0.8);

        let plain = TaskRequest::new(TaskKind::Reasoning, TaskPriority::Medium, 7);
        let hard = TaskRequest::new(TaskKind::Reasoning, TaskPriority::Medium, 8);

        assert_eq!(score_agent(&specialist, &plain, &cfg).bonus, 0.0);
        assert!((score_agent(&specialist, &hard, &cfg).bonus - 0.05).abs() < 1e-9);
    }

    #[test]
    fn video_affinity_bonus_requires_the_capability() {
        let cfg = ScoringConfig::default();
        let video_task = TaskRequest::new(TaskKind::Video, TaskPriority::Medium, 5);

        let video_agent = Agent::new("studio", AgentKind::Hybrid, 4)
            .with_capabilities([matcher::VIDEO_GENERATION]);
        let other_agent = Agent::new("writer", AgentKind::Hybrid, 4)
            .with_capabilities(["text-generation"]);

        assert!((score_agent(&video_agent, &video_task, &cfg).bonus - 0.10).abs() < 1e-9);
        assert_eq!(score_agent(&other_agent, &video_task, &cfg).bonus, 0.0);
    }

    #[test]
    fn total_clamps_at_one() {
        let cfg = ScoringConfig::default();
        let star = Agent::new("star", AgentKind::Specialist, 8)
            .with_capabilities([matcher::VIDEO_GENERATION])
            .with_quality_score(1.0)
            .with_cost_per_task(0.0)
            .with_avg_response_time_ms(1.0);
        let stacked = TaskRequest::new(TaskKind::Video, TaskPriority::Critical, 9);

        let score = score_agent(&star, &stacked, &cfg);
        assert!(score.bonus > 0.2);
        assert_eq!(score.total, 1.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let cfg = ScoringConfig::default();
        let agent = idle_agent(0.73);
        let task = text_task();
        let first = score_agent(&agent, &task, &cfg);
        let second = score_agent(&agent, &task, &cfg);
        assert_eq!(first.total, second.total);
        assert_eq!(first.describe(), second.describe());
    }

    #[test]
    fn rank_orders_by_total_then_id() {
        let cfg = ScoringConfig::default();
        let strong = idle_agent(0.9);
        let weak = idle_agent(0.2);
        let task = text_task();

        let ranked = rank(&[&weak, &strong], &task, &cfg);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].agent.id, strong.id);
        assert!(ranked[0].total() > ranked[1].total());

        // equal agents order by id, so the ranking is stable across runs
        let twin_a = idle_agent(0.5);
        let twin_b = idle_agent(0.5);
        let first = rank(&[&twin_a, &twin_b], &task, &cfg);
        let second = rank(&[&twin_b, &twin_a], &task, &cfg);
        assert_eq!(first[0].agent.id, second[0].agent.id);
    }
}
