//! Configuration for bidforge.
//!
//! Settings are read from `.bidforge/bidforge.toml` and layered:
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [defaults]
//! express_mode = false
//! agent_timeout_secs = 300
//! max_phase_retries = 1
//! max_rejection_reruns = 3
//!
//! [gates]
//! weakness_threshold = 3
//! page_deviation_limit = 0.3
//! traceability_floor = 0.8
//!
//! [quality]
//! pass_threshold = 0.75
//! max_revision_rounds = 3
//! fallback_score_step = 0.05
//!
//! [artifacts]
//! research_tokens = 8000
//! analysis_tokens = 10000
//! plan_tokens = 12000
//! implement_tokens = 15000
//!
//! [agent]
//! claude_cmd = "claude"
//! model = "claude-sonnet-4-5"
//!
//! [lookup]
//! catalog = "catalog.json"
//! ```
//!
//! Environment overrides: `BIDFORGE_EXPRESS`, `BIDFORGE_AGENT_TIMEOUT`,
//! `CLAUDE_CMD`.

use crate::compaction::ArtifactBudgets;
use crate::compaction::budget::{
    DEFAULT_ANALYSIS_TOKENS, DEFAULT_IMPLEMENT_TOKENS, DEFAULT_PLAN_TOKENS,
    DEFAULT_RESEARCH_TOKENS,
};
use crate::executor::DEFAULT_AGENT_TIMEOUT_SECS;
use crate::gates::GatePolicy;
use crate::graph::{DEFAULT_MAX_PHASE_RETRIES, DEFAULT_MAX_REJECTION_RERUNS, EngineSettings};
use crate::init::BIDFORGE_DIR;
use crate::quality::{
    DEFAULT_FALLBACK_SCORE_STEP, DEFAULT_MAX_REVISION_ROUNDS, DEFAULT_PASS_THRESHOLD,
    QualityPolicy,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "bidforge.toml";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Run-level defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Force conditional gates to auto-pass
    #[serde(default)]
    pub express_mode: bool,
    /// Per-attempt agent timeout in seconds
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    /// Graph-level retries of a degraded agent attempt
    #[serde(default = "default_max_phase_retries")]
    pub max_phase_retries: u32,
    /// Human-driven re-runs allowed per phase
    #[serde(default = "default_max_rejection_reruns")]
    pub max_rejection_reruns: u32,
}

fn default_agent_timeout_secs() -> u64 {
    DEFAULT_AGENT_TIMEOUT_SECS
}

fn default_max_phase_retries() -> u32 {
    DEFAULT_MAX_PHASE_RETRIES
}

fn default_max_rejection_reruns() -> u32 {
    DEFAULT_MAX_REJECTION_RERUNS
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            express_mode: false,
            agent_timeout_secs: default_agent_timeout_secs(),
            max_phase_retries: default_max_phase_retries(),
            max_rejection_reruns: default_max_rejection_reruns(),
        }
    }
}

/// Thresholds for the conditional gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatesSection {
    #[serde(default = "default_weakness_threshold")]
    pub weakness_threshold: usize,
    #[serde(default = "default_page_deviation_limit")]
    pub page_deviation_limit: f32,
    #[serde(default = "default_traceability_floor")]
    pub traceability_floor: f32,
}

fn default_weakness_threshold() -> usize {
    GatePolicy::default().weakness_threshold
}

fn default_page_deviation_limit() -> f32 {
    GatePolicy::default().page_deviation_limit
}

fn default_traceability_floor() -> f32 {
    GatePolicy::default().traceability_floor
}

impl Default for GatesSection {
    fn default() -> Self {
        Self {
            weakness_threshold: default_weakness_threshold(),
            page_deviation_limit: default_page_deviation_limit(),
            traceability_floor: default_traceability_floor(),
        }
    }
}

impl GatesSection {
    pub fn to_policy(&self) -> GatePolicy {
        GatePolicy {
            weakness_threshold: self.weakness_threshold,
            page_deviation_limit: self.page_deviation_limit,
            traceability_floor: self.traceability_floor,
        }
    }
}

/// Quality loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySection {
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f32,
    #[serde(default = "default_max_revision_rounds")]
    pub max_revision_rounds: u32,
    /// Score increment applied when a revision reports no new score
    #[serde(default = "default_fallback_score_step")]
    pub fallback_score_step: f32,
}

fn default_pass_threshold() -> f32 {
    DEFAULT_PASS_THRESHOLD
}

fn default_max_revision_rounds() -> u32 {
    DEFAULT_MAX_REVISION_ROUNDS
}

fn default_fallback_score_step() -> f32 {
    DEFAULT_FALLBACK_SCORE_STEP
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            max_revision_rounds: default_max_revision_rounds(),
            fallback_score_step: default_fallback_score_step(),
        }
    }
}

impl QualitySection {
    pub fn to_policy(&self) -> QualityPolicy {
        QualityPolicy {
            pass_threshold: self.pass_threshold,
            max_revision_rounds: self.max_revision_rounds,
            fallback_score_step: self.fallback_score_step,
        }
    }
}

/// Token budgets per artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsSection {
    #[serde(default = "default_research_tokens")]
    pub research_tokens: usize,
    #[serde(default = "default_analysis_tokens")]
    pub analysis_tokens: usize,
    #[serde(default = "default_plan_tokens")]
    pub plan_tokens: usize,
    #[serde(default = "default_implement_tokens")]
    pub implement_tokens: usize,
}

fn default_research_tokens() -> usize {
    DEFAULT_RESEARCH_TOKENS
}

fn default_analysis_tokens() -> usize {
    DEFAULT_ANALYSIS_TOKENS
}

fn default_plan_tokens() -> usize {
    DEFAULT_PLAN_TOKENS
}

fn default_implement_tokens() -> usize {
    DEFAULT_IMPLEMENT_TOKENS
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            research_tokens: default_research_tokens(),
            analysis_tokens: default_analysis_tokens(),
            plan_tokens: default_plan_tokens(),
            implement_tokens: default_implement_tokens(),
        }
    }
}

impl ArtifactsSection {
    pub fn to_budgets(&self) -> ArtifactBudgets {
        ArtifactBudgets {
            research: self.research_tokens,
            analysis: self.analysis_tokens,
            plan: self.plan_tokens,
            implement: self.implement_tokens,
        }
    }
}

/// Claude CLI integration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSection {
    /// Claude CLI command (default: "claude")
    #[serde(default)]
    pub claude_cmd: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            claude_cmd: None,
            model: default_model(),
        }
    }
}

/// Reference catalog used by the lookup ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupSection {
    /// Catalog file, relative to `.bidforge/`
    #[serde(default = "default_catalog")]
    pub catalog: String,
}

fn default_catalog() -> String {
    "catalog.json".to_string()
}

impl Default for LookupSection {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
        }
    }
}

/// The complete bidforge.toml configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BidforgeToml {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub gates: GatesSection,
    #[serde(default)]
    pub quality: QualitySection,
    #[serde(default)]
    pub artifacts: ArtifactsSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub lookup: LookupSection,
}

impl BidforgeToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse bidforge.toml")
    }

    /// Load `.bidforge/bidforge.toml`, or defaults when it does not exist.
    pub fn load_or_default(bidforge_dir: &Path) -> Result<Self> {
        let config_path = bidforge_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize bidforge.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.defaults.agent_timeout_secs == 0 {
            warnings.push("agent_timeout_secs is 0: every agent call will time out".to_string());
        }

        let unit_ranges = [
            ("quality.pass_threshold", self.quality.pass_threshold),
            ("quality.fallback_score_step", self.quality.fallback_score_step),
            ("gates.page_deviation_limit", self.gates.page_deviation_limit),
            ("gates.traceability_floor", self.gates.traceability_floor),
        ];
        for (name, value) in unit_ranges {
            if !(0.0..=1.0).contains(&value) {
                warnings.push(format!("{} = {} is outside [0, 1]", name, value));
            }
        }

        if self.quality.max_revision_rounds == 0 {
            warnings.push(
                "quality.max_revision_rounds is 0: drafts below the threshold escalate immediately"
                    .to_string(),
            );
        }

        let budgets = [
            ("research_tokens", self.artifacts.research_tokens),
            ("analysis_tokens", self.artifacts.analysis_tokens),
            ("plan_tokens", self.artifacts.plan_tokens),
            ("implement_tokens", self.artifacts.implement_tokens),
        ];
        for (name, value) in budgets {
            if value == 0 {
                warnings.push(format!("artifacts.{} is 0: no artifact can fit", name));
            }
        }

        if self.agent.model.trim().is_empty() {
            warnings.push("agent.model is empty".to_string());
        }

        warnings
    }
}

/// Resolved configuration for one invocation.
///
/// It merges settings from:
/// 1. bidforge.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct BidforgeConfig {
    pub project_dir: PathBuf,
    pub bidforge_dir: PathBuf,
    pub toml: BidforgeToml,
    /// CLI override: force express mode on
    pub cli_express: bool,
    /// CLI override for the agent timeout
    pub cli_agent_timeout: Option<u64>,
}

impl BidforgeConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let bidforge_dir = project_dir.join(BIDFORGE_DIR);
        let toml = BidforgeToml::load_or_default(&bidforge_dir)?;

        Ok(Self {
            project_dir,
            bidforge_dir,
            toml,
            cli_express: false,
            cli_agent_timeout: None,
        })
    }

    pub fn with_cli_args(
        project_dir: PathBuf,
        express: bool,
        agent_timeout: Option<u64>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.cli_express = express;
        config.cli_agent_timeout = agent_timeout;
        Ok(config)
    }

    /// Express mode (file → `BIDFORGE_EXPRESS` → `--express`).
    pub fn express_mode(&self) -> bool {
        if self.cli_express {
            return true;
        }
        match std::env::var("BIDFORGE_EXPRESS") {
            Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => self.toml.defaults.express_mode,
        }
    }

    /// Agent timeout (file → `BIDFORGE_AGENT_TIMEOUT` → CLI).
    pub fn agent_timeout(&self) -> Duration {
        let secs = self
            .cli_agent_timeout
            .or_else(|| {
                std::env::var("BIDFORGE_AGENT_TIMEOUT")
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
            })
            .unwrap_or(self.toml.defaults.agent_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Claude command (file → `CLAUDE_CMD` → "claude").
    pub fn claude_cmd(&self) -> String {
        std::env::var("CLAUDE_CMD")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.toml.agent.claude_cmd.clone())
            .unwrap_or_else(|| "claude".to_string())
    }

    pub fn model(&self) -> &str {
        &self.toml.agent.model
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            budgets: self.toml.artifacts.to_budgets(),
            gates: self.toml.gates.to_policy(),
            quality: self.toml.quality.to_policy(),
            max_phase_retries: self.toml.defaults.max_phase_retries,
            max_rejection_reruns: self.toml.defaults.max_rejection_reruns,
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.bidforge_dir.join(CONFIG_FILE)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.bidforge_dir.join("checkpoints")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.bidforge_dir.join("logs")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.bidforge_dir.join(&self.toml.lookup.catalog)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
