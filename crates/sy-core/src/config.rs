use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level orchestrator configuration, loaded from TOML by the host
/// process. Every knob has a serde default so a partial file (or no file at
/// all) yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub assignment: AssignmentConfig,
    #[serde(default)]
    pub rebalancer: RebalancerConfig,
}

impl OrchestratorConfig {
    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Parse from a TOML string.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: OrchestratorConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via
    /// type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.selection.validate()?;
        self.assignment.validate()?;
        self.rebalancer.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Weights and normalization ceilings for the scoring engine. The six
/// factor weights must sum to 1.0; bonuses sit outside that budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,
    #[serde(default = "default_availability_weight")]
    pub availability_weight: f64,
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
    #[serde(default = "default_speed_weight")]
    pub speed_weight: f64,
    #[serde(default = "default_capability_weight")]
    pub capability_weight: f64,
    #[serde(default = "default_load_balance_weight")]
    pub load_balance_weight: f64,
    /// Cost normalization ceiling: an agent costing this much per task scores
    /// zero on the cost factor. Domain calibration, not an algorithmic value.
    #[serde(default = "default_cost_ceiling")]
    pub cost_ceiling: f64,
    /// Response-time normalization ceiling in milliseconds.
    #[serde(default = "default_time_ceiling_ms")]
    pub time_ceiling_ms: f64,
    #[serde(default = "default_critical_bonus")]
    pub critical_bonus: f64,
    #[serde(default = "default_specialist_complexity_bonus")]
    pub specialist_complexity_bonus: f64,
    #[serde(default = "default_video_affinity_bonus")]
    pub video_affinity_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            quality_weight: default_quality_weight(),
            availability_weight: default_availability_weight(),
            cost_weight: default_cost_weight(),
            speed_weight: default_speed_weight(),
            capability_weight: default_capability_weight(),
            load_balance_weight: default_load_balance_weight(),
            cost_ceiling: default_cost_ceiling(),
            time_ceiling_ms: default_time_ceiling_ms(),
            critical_bonus: default_critical_bonus(),
            specialist_complexity_bonus: default_specialist_complexity_bonus(),
            video_affinity_bonus: default_video_affinity_bonus(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            self.quality_weight,
            self.availability_weight,
            self.cost_weight,
            self.speed_weight,
            self.capability_weight,
            self.load_balance_weight,
        ];
        if weights.iter().any(|w| *w < 0.0 || *w > 1.0) {
            return Err(ConfigError::Validation(
                "scoring weights must each be between 0.0 and 1.0".to_string(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Validation(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        if self.cost_ceiling <= 0.0 {
            return Err(ConfigError::Validation(
                "scoring.cost_ceiling must be positive".to_string(),
            ));
        }
        if self.time_ceiling_ms <= 0.0 {
            return Err(ConfigError::Validation(
                "scoring.time_ceiling_ms must be positive".to_string(),
            ));
        }
        let bonuses = [
            self.critical_bonus,
            self.specialist_complexity_bonus,
            self.video_affinity_bonus,
        ];
        if bonuses.iter().any(|b| *b < 0.0) {
            return Err(ConfigError::Validation(
                "scoring bonuses must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_quality_weight() -> f64 {
    0.25
}
fn default_availability_weight() -> f64 {
    0.20
}
fn default_cost_weight() -> f64 {
    0.15
}
fn default_speed_weight() -> f64 {
    0.15
}
fn default_capability_weight() -> f64 {
    0.15
}
fn default_load_balance_weight() -> f64 {
    0.10
}
fn default_cost_ceiling() -> f64 {
    1.0
}
fn default_time_ceiling_ms() -> f64 {
    600_000.0
}
fn default_critical_bonus() -> f64 {
    0.10
}
fn default_specialist_complexity_bonus() -> f64 {
    0.05
}
fn default_video_affinity_bonus() -> f64 {
    0.10
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Score gap above which the top candidate wins outright.
    #[serde(default = "default_clear_winner_margin")]
    pub clear_winner_margin: f64,
    /// Score gap below which a lower-loaded candidate may displace the top.
    #[serde(default = "default_tie_break_window")]
    pub tie_break_window: f64,
    /// How many leading candidates the tie-break considers.
    #[serde(default = "default_tie_break_pool")]
    pub tie_break_pool: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            clear_winner_margin: default_clear_winner_margin(),
            tie_break_window: default_tie_break_window(),
            tie_break_pool: default_tie_break_pool(),
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clear_winner_margin < 0.0 || self.tie_break_window < 0.0 {
            return Err(ConfigError::Validation(
                "selection margins must not be negative".to_string(),
            ));
        }
        if self.tie_break_pool < 2 {
            return Err(ConfigError::Validation(
                "selection.tie_break_pool must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_clear_winner_margin() -> f64 {
    0.2
}
fn default_tie_break_window() -> f64 {
    0.1
}
fn default_tie_break_pool() -> usize {
    3
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    #[serde(default = "default_max_fallback_agents")]
    pub max_fallback_agents: usize,
    /// Confidence boost per matched required capability.
    #[serde(default = "default_capability_boost")]
    pub capability_boost: f64,
    /// Total cap on the capability boost.
    #[serde(default = "default_capability_boost_cap")]
    pub capability_boost_cap: f64,
    /// Confidence penalty applied above the overload threshold.
    #[serde(default = "default_overload_penalty")]
    pub overload_penalty: f64,
    #[serde(default = "default_overload_penalty_threshold_pct")]
    pub overload_penalty_threshold_pct: f64,
    /// Confidence boost for specialists on complex work.
    #[serde(default = "default_specialist_bonus")]
    pub specialist_bonus: f64,
    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            max_fallback_agents: default_max_fallback_agents(),
            capability_boost: default_capability_boost(),
            capability_boost_cap: default_capability_boost_cap(),
            overload_penalty: default_overload_penalty(),
            overload_penalty_threshold_pct: default_overload_penalty_threshold_pct(),
            specialist_bonus: default_specialist_bonus(),
            confidence_cap: default_confidence_cap(),
        }
    }
}

impl AssignmentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capability_boost < 0.0
            || self.capability_boost_cap < 0.0
            || self.overload_penalty < 0.0
            || self.specialist_bonus < 0.0
        {
            return Err(ConfigError::Validation(
                "assignment boosts and penalties must not be negative".to_string(),
            ));
        }
        if self.overload_penalty_threshold_pct <= 0.0 || self.overload_penalty_threshold_pct > 100.0
        {
            return Err(ConfigError::Validation(
                "assignment.overload_penalty_threshold_pct must be within (0, 100]".to_string(),
            ));
        }
        if self.confidence_cap <= 0.0 || self.confidence_cap > 1.0 {
            return Err(ConfigError::Validation(
                "assignment.confidence_cap must be within (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_max_fallback_agents() -> usize {
    2
}
fn default_capability_boost() -> f64 {
    0.1
}
fn default_capability_boost_cap() -> f64 {
    0.2
}
fn default_overload_penalty() -> f64 {
    0.15
}
fn default_overload_penalty_threshold_pct() -> f64 {
    80.0
}
fn default_specialist_bonus() -> f64 {
    0.1
}
fn default_confidence_cap() -> f64 {
    0.99
}

// ---------------------------------------------------------------------------
// Rebalancer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancerConfig {
    #[serde(default = "default_rebalancer_enabled")]
    pub enabled: bool,
    #[serde(default = "default_rebalancer_interval_secs")]
    pub interval_secs: u64,
    /// Agents loaded above this percentage are migration sources.
    #[serde(default = "default_overload_threshold_pct")]
    pub overload_threshold_pct: f64,
    /// Agents loaded below this percentage qualify as destinations.
    #[serde(default = "default_migration_target_pct")]
    pub migration_target_pct: f64,
}

impl Default for RebalancerConfig {
    fn default() -> Self {
        Self {
            enabled: default_rebalancer_enabled(),
            interval_secs: default_rebalancer_interval_secs(),
            overload_threshold_pct: default_overload_threshold_pct(),
            migration_target_pct: default_migration_target_pct(),
        }
    }
}

impl RebalancerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "rebalancer.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.overload_threshold_pct <= 0.0 || self.overload_threshold_pct > 100.0 {
            return Err(ConfigError::Validation(
                "rebalancer.overload_threshold_pct must be within (0, 100]".to_string(),
            ));
        }
        if self.migration_target_pct <= 0.0
            || self.migration_target_pct >= self.overload_threshold_pct
        {
            return Err(ConfigError::Validation(
                "rebalancer.migration_target_pct must be positive and below the overload threshold"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_rebalancer_enabled() -> bool {
    true
}
fn default_rebalancer_interval_secs() -> u64 {
    30
}
fn default_overload_threshold_pct() -> f64 {
    85.0
}
fn default_migration_target_pct() -> f64 {
    70.0
}
