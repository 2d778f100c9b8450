use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AgentKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Specialist,
    Generalist,
    Hybrid,
}

// ---------------------------------------------------------------------------
// AgentAvailability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAvailability {
    Available,
    Busy,
    Offline,
}

impl AgentAvailability {
    /// Returns `true` when a transition from `self` to `target` is valid.
    ///
    /// `available <-> busy` follows load; `offline` is entered and left
    /// administratively and shields the agent from matching while set.
    pub fn can_transition_to(&self, target: &AgentAvailability) -> bool {
        matches!(
            (self, target),
            (AgentAvailability::Available, AgentAvailability::Busy)
                | (AgentAvailability::Busy, AgentAvailability::Available)
                | (AgentAvailability::Available, AgentAvailability::Offline)
                | (AgentAvailability::Busy, AgentAvailability::Offline)
                | (AgentAvailability::Offline, AgentAvailability::Available)
        )
    }
}

impl std::fmt::Display for AgentAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentAvailability::Available => "available",
            AgentAvailability::Busy => "busy",
            AgentAvailability::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// PerformanceRecord
// ---------------------------------------------------------------------------

/// Running reputation aggregates for one agent.
///
/// Written exclusively by the performance feedback path; fresh agents start
/// with a neutral record that the incremental averages overwrite on the
/// first completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub tasks_completed: u64,
    pub success_rate: f64,
    pub average_quality: f64,
    pub last_updated: DateTime<Utc>,
}

impl Default for PerformanceRecord {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            success_rate: 1.0,
            average_quality: 0.0,
            last_updated: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub kind: AgentKind,
    pub capabilities: Vec<String>,
    pub max_concurrent: usize,
    pub current_tasks: Vec<Uuid>,
    /// Maintained by the registry on every load mutation, never stale.
    pub current_load_pct: f64,
    pub cost_per_task: f64,
    pub quality_score: f64,
    pub avg_response_time_ms: f64,
    pub availability: AgentAvailability,
    pub performance: PerformanceRecord,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, kind: AgentKind, max_concurrent: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            capabilities: Vec::new(),
            max_concurrent: max_concurrent.max(1),
            current_tasks: Vec::new(),
            current_load_pct: 0.0,
            cost_per_task: 0.0,
            quality_score: 0.5,
            avg_response_time_ms: 60_000.0,
            availability: AgentAvailability::Available,
            performance: PerformanceRecord::default(),
            registered_at: Utc::now(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cost_per_task(mut self, cost: f64) -> Self {
        self.cost_per_task = cost.max(0.0);
        self
    }

    pub fn with_quality_score(mut self, quality: f64) -> Self {
        self.quality_score = quality.clamp(0.0, 1.0);
        self
    }

    pub fn with_avg_response_time_ms(mut self, ms: f64) -> Self {
        self.avg_response_time_ms = ms.max(1.0);
        self
    }

    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    pub fn has_spare_capacity(&self) -> bool {
        self.current_tasks.len() < self.max_concurrent
    }

    pub fn is_offline(&self) -> bool {
        self.availability == AgentAvailability::Offline
    }

    /// Recompute the derived load percentage and the load-driven half of the
    /// availability machine. Offline is administrative and is left alone.
    ///
    /// Call sites outside the registry should not use this directly; the
    /// registry is the single mutation choke point.
    pub fn recompute_load(&mut self) {
        self.current_load_pct =
            self.current_tasks.len() as f64 / self.max_concurrent as f64 * 100.0;
        if self.availability != AgentAvailability::Offline {
            self.availability = if self.current_load_pct >= 100.0 {
                AgentAvailability::Busy
            } else {
                AgentAvailability::Available
            };
        }
    }
}

// ---------------------------------------------------------------------------
// TaskKind / TaskPriority / TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Text,
    Image,
    Video,
    Audio,
    Reasoning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Queued,
    Assigned,
    Completed,
    Failed,
    Reassigned,
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` when a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Created, TaskStatus::Queued)
                | (TaskStatus::Queued, TaskStatus::Assigned)
                | (TaskStatus::Queued, TaskStatus::Cancelled)
                | (TaskStatus::Assigned, TaskStatus::Completed)
                | (TaskStatus::Assigned, TaskStatus::Failed)
                | (TaskStatus::Assigned, TaskStatus::Reassigned)
                | (TaskStatus::Assigned, TaskStatus::Cancelled)
                | (TaskStatus::Reassigned, TaskStatus::Assigned)
        )
    }
}

// ---------------------------------------------------------------------------
// TaskRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub id: Uuid,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    /// 1 (trivial) through 10 (hardest), clamped at construction.
    pub complexity: u8,
    /// Explicit capability requirements. Empty means "derive from `kind`".
    pub required_capabilities: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl TaskRequest {
    pub fn new(kind: TaskKind, priority: TaskPriority, complexity: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            priority,
            complexity: complexity.clamp(1, 10),
            required_capabilities: Vec::new(),
            deadline: None,
            status: TaskStatus::Created,
            created_at: Utc::now(),
        }
    }

    pub fn with_required_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

// ---------------------------------------------------------------------------
// TaskOutcome
// ---------------------------------------------------------------------------

/// Completion report payload from the external executor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    pub quality: f64,
    pub duration_ms: u64,
}

impl TaskOutcome {
    pub fn new(success: bool, quality: f64, duration_ms: u64) -> Self {
        Self {
            success,
            quality: quality.clamp(0.0, 1.0),
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskAssignment
// ---------------------------------------------------------------------------

/// The live binding of one task to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: Uuid,
    pub agent_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    /// Informational only; nothing enforces it.
    pub estimated_completion: DateTime<Utc>,
    pub confidence: f64,
    pub reasoning: String,
    /// Next-best candidates recorded at assignment time, at most two.
    pub fallback_agents: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// OrchestrationMetrics
// ---------------------------------------------------------------------------

/// Observational process-wide snapshot. Recomputable from the registry and
/// ledger at any time; never authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationMetrics {
    pub assignments_made: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub reassignments: u64,
    pub critical_overrides: u64,
    pub active_assignments: u64,
    pub agents_total: u64,
    pub agents_online: u64,
    pub success_rate: f64,
    pub average_utilization_pct: f64,
    pub throughput_per_minute: f64,
    pub timestamp: DateTime<Utc>,
}
