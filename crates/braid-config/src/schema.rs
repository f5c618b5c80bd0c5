use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `braid.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BraidConfig {
    pub reasoning: ReasoningConfig,
    pub embedding: EmbeddingConfig,
    pub memory: MemoryConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub logging: LoggingConfig,
    pub services: ServicesConfig,
}

// ── Reasoning ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Reasoning model identifier, e.g. "gpt-4o-mini".
    pub model: String,
    /// System prompt seeded into every new session.
    pub system_prompt: Option<String>,
    /// Path to a file containing the system prompt (overrides `system_prompt`).
    pub system_prompt_file: Option<PathBuf>,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            system_prompt: None,
            system_prompt_file: None,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

// ── Embedding ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier.
    pub model: String,
    /// Vector width the model produces (1536 for text-embedding-3-small).
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".into(),
            dimensions: 1536,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path to the SQLite database.
    pub db_path: PathBuf,
    /// Longest text one memory item may carry; longer input is clipped.
    pub max_item_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("braid.db"),
            max_item_chars: 800,
        }
    }
}

// ── Retrieval ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// How many memory items to surface per turn.
    pub k: usize,
    /// Minimum score for an item to count as relevant. When nothing passes,
    /// the plain top-k is returned instead.
    pub min_score: Option<f32>,
    /// Weight of cosine similarity vs. keyword overlap (1.0 = pure cosine).
    pub alpha: f32,
    /// Favor recent items with a mild recency multiplier.
    pub time_weighting: bool,
    /// Half-life of the recency decay, in days.
    pub half_life_days: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 4,
            min_score: None,
            alpha: 1.0,
            time_weighting: false,
            half_life_days: 14.0,
        }
    }
}

// ── Context ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum messages sent to the reasoning provider per turn. Older
    /// messages are trimmed block-wise; the system prefix always survives.
    pub max_messages: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_messages: 40 }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
    /// Log file path (None = stdout only).
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            file: None,
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// External service API keys and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// OpenAI API key. Can also be set via OPENAI_API_KEY; the config file
    /// takes priority over the environment variable.
    pub openai_api_key: Option<String>,
    /// Override the OpenAI-compatible API base URL (for proxies or local
    /// inference servers).
    pub openai_base_url: Option<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: None,
        }
    }
}

// ── Default for root ───────────────────────────────────────────

impl Default for BraidConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasoningConfig::default(),
            embedding: EmbeddingConfig::default(),
            memory: MemoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
            logging: LoggingConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl BraidConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Reasoning model ───
        if self.reasoning.model.is_empty() {
            warnings.push(ConfigWarning {
                field: "reasoning.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'gpt-4o-mini'".into()),
            });
        }

        // ── Temperature ───
        if self.reasoning.temperature < 0.0 || self.reasoning.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "reasoning.temperature".into(),
                message: format!("temperature {} is out of range", self.reasoning.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }

        // ── Max tokens ───
        if self.reasoning.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "reasoning.max_tokens".into(),
                message: "max_tokens is 0 — assistant won't produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1024".into()),
            });
        }

        // ── Embedding dimensions ───
        if self.embedding.dimensions == 0 {
            warnings.push(ConfigWarning {
                field: "embedding.dimensions".into(),
                message: "dimensions is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to the model's vector width, e.g. 1536".into()),
            });
        }

        // ── Retrieval ───
        if self.retrieval.k == 0 {
            warnings.push(ConfigWarning {
                field: "retrieval.k".into(),
                message: "k is 0 — no memory will ever be surfaced".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. 4".into()),
            });
        }
        if self.retrieval.alpha < 0.0 || self.retrieval.alpha > 1.0 {
            warnings.push(ConfigWarning {
                field: "retrieval.alpha".into(),
                message: format!("alpha {} is out of range", self.retrieval.alpha),
                severity: WarningSeverity::Error,
                hint: Some("alpha blends cosine vs. keyword overlap and must be in [0, 1]".into()),
            });
        }
        if let Some(min) = self.retrieval.min_score {
            if !(-1.0..=1.0).contains(&min) {
                warnings.push(ConfigWarning {
                    field: "retrieval.min_score".into(),
                    message: format!("min_score {} is outside cosine range", min),
                    severity: WarningSeverity::Warning,
                    hint: Some("Cosine scores fall in [-1, 1]; a typical threshold is 0.3".into()),
                });
            }
        }
        if self.retrieval.time_weighting && self.retrieval.half_life_days <= 0.0 {
            warnings.push(ConfigWarning {
                field: "retrieval.half_life_days".into(),
                message: "half-life must be positive when time weighting is on".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 14.0".into()),
            });
        }

        // ── Context ───
        if self.context.max_messages < 4 {
            warnings.push(ConfigWarning {
                field: "context.max_messages".into(),
                message: format!(
                    "max_messages {} leaves almost no room for conversation",
                    self.context.max_messages
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Values under 4 can trim everything but the latest exchange".into()),
            });
        }

        // ── Memory ───
        if self.memory.max_item_chars == 0 {
            warnings.push(ConfigWarning {
                field: "memory.max_item_chars".into(),
                message: "max_item_chars is 0 — every memory write would be rejected".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 800".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
