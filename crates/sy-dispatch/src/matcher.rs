//! Capability matching: which agents may take a task at all.
//!
//! Matching is read-only. An empty result is not an error here; the
//! orchestrator boundary decides whether that is fatal.

use sy_core::types::{Agent, TaskKind, TaskRequest};

use crate::registry::AgentRegistry;

pub const VIDEO_GENERATION: &str = "video-generation";

/// Static task-kind to capability mapping, used when a request carries no
/// explicit requirements.
pub fn kind_capabilities(kind: TaskKind) -> &'static [&'static str] {
    match kind {
        TaskKind::Text => &["text-generation"],
        TaskKind::Image => &["image-generation"],
        TaskKind::Video => &[VIDEO_GENERATION],
        TaskKind::Audio => &["audio-generation"],
        TaskKind::Reasoning => &["complex-reasoning"],
    }
}

/// How many of the task's effective requirements the agent covers. The
/// explicit requirement list overrides the kind mapping when present.
pub fn matched_capability_count(agent: &Agent, task: &TaskRequest) -> usize {
    if task.required_capabilities.is_empty() {
        kind_capabilities(task.kind)
            .iter()
            .filter(|c| agent.has_capability(c))
            .count()
    } else {
        task.required_capabilities
            .iter()
            .filter(|c| agent.has_capability(c))
            .count()
    }
}

/// Size of the task's effective requirement set.
pub fn required_capability_count(task: &TaskRequest) -> usize {
    if task.required_capabilities.is_empty() {
        kind_capabilities(task.kind).len()
    } else {
        task.required_capabilities.len()
    }
}

/// A non-empty intersection with the effective requirements qualifies; the
/// scoring engine grades partial coverage.
pub fn is_capable(agent: &Agent, task: &TaskRequest) -> bool {
    matched_capability_count(agent, task) > 0
}

/// Agents eligible for normal assignment: online, spare capacity, and at
/// least one matching capability.
pub fn capable_agents<'a>(registry: &'a AgentRegistry, task: &TaskRequest) -> Vec<&'a Agent> {
    registry
        .list_available()
        .into_iter()
        .filter(|agent| is_capable(agent, task))
        .collect()
}

/// Critical-path candidate pool: the capacity gate is dropped and capability
/// fit is left to the scoring engine; only offline agents are excluded.
pub fn critical_candidates(registry: &AgentRegistry) -> Vec<&Agent> {
    registry
        .list()
        .into_iter()
        .filter(|agent| !agent.is_offline())
        .collect()
}
