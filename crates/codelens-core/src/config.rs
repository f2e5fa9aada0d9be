//! Configuration types for CodeLens.
//!
//! - [`GlobalConfig`] is loaded from `~/.codelens/config.yaml` and covers the
//!   model services, intent analysis, retrieval fan-out, reranking and the
//!   heuristic scores.
//! - [`ProjectConfig`] is loaded from `<project>/.codelens/config.yaml` and may
//!   override retrieval settings for one project.
//!
//! Missing files yield defaults. All YAML keys are camelCase.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use codelens_model::{ChatConfig, EmbeddingConfig};

use crate::constants::{CODELENS_HOME_DIR, CONFIG_FILENAME, DEFAULT_TECHNICAL_TERMS, PROJECT_DIR};
use crate::context::{RetrievalConfig, SourceType, DEFAULT_TIMEOUT_SECONDS, DEFAULT_TOP_K};
use crate::errors::{CodelensError, CodelensResult};
use crate::rerank::PromptTemplate;

// ============================================================================
// GlobalConfig
// ============================================================================

/// Global (user-level) configuration.
///
/// # Example YAML
///
/// ```yaml
/// llm:
///   provider: openrouter
///   modelId: google/gemini-2.0-flash-001
/// retrieval:
///   finalTopK: 8
///   timeoutSeconds: 15
///   sources:
///     vector:
///       topK: 12
///       minRelevanceScore: 0.3
/// reranker:
///   maxAttempts: 2
///   promptTemplate: function_analysis
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Chat-completion service used by intent analysis and reranking.
    #[serde(default)]
    pub llm: ChatConfig,

    /// Embedding service used to query the vector index.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub intent: IntentConfig,

    #[serde(default)]
    pub retrieval: BuilderConfig,

    #[serde(default)]
    pub reranker: RerankerConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl GlobalConfig {
    /// Load the global configuration from `~/.codelens/config.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidGlobalConfig`] if the file exists but cannot be parsed.
    pub fn load_default() -> CodelensResult<Self> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the global configuration from a specific path.
    ///
    /// If the file does not exist, returns a default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidGlobalConfig`] if the file cannot be parsed, or
    /// [`CodelensError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> CodelensResult<Self> {
        if !path.exists() {
            tracing::debug!(
                "Global config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CodelensError::InvalidGlobalConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            CodelensError::InvalidGlobalConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        // Soft warnings are logged once the engine is built from this config.
        config.validate()?;

        Ok(config)
    }

    /// Get the default global config directory (`~/.codelens`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CODELENS_HOME_DIR))
    }

    /// Get the default global config file path (`~/.codelens/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// Apply project overrides to the retrieval settings.
    pub fn resolve_builder_config(&self, project: &ProjectConfig) -> BuilderConfig {
        let mut config = self.retrieval.clone();

        let Some(ref over) = project.retrieval else {
            return config;
        };

        if let Some(final_top_k) = over.final_top_k {
            tracing::debug!("Project override: retrieval.finalTopK = {}", final_top_k);
            config.final_top_k = final_top_k;
        }
        if let Some(parallel) = over.parallel_retrieval {
            tracing::debug!("Project override: retrieval.parallelRetrieval = {}", parallel);
            config.parallel_retrieval = parallel;
        }
        if let Some(timeout) = over.timeout_seconds {
            tracing::debug!("Project override: retrieval.timeoutSeconds = {}", timeout);
            config.timeout_seconds = timeout;
        }

        if let Some(ref sources) = over.sources {
            for source in SourceType::PRIORITY {
                let Some(source_over) = sources.get(source) else {
                    continue;
                };
                let target = config.sources.get_mut(source);
                if let Some(enable) = source_over.enable {
                    tracing::debug!("Project override: {}.enable = {}", source, enable);
                    target.enable = enable;
                }
                if let Some(top_k) = source_over.top_k {
                    tracing::debug!("Project override: {}.topK = {}", source, top_k);
                    target.top_k = top_k;
                }
                if let Some(min) = source_over.min_relevance_score {
                    tracing::debug!("Project override: {}.minRelevanceScore = {}", source, min);
                    target.min_relevance_score = min;
                }
            }
        }

        config
    }

    /// Validates the entire configuration, returning collected warnings.
    ///
    /// # Errors
    ///
    /// Returns the first critical error as `CodelensError::InvalidConfiguration`.
    pub fn validate(&self) -> CodelensResult<Vec<String>> {
        let mut all_warnings = Vec::new();

        all_warnings.extend(self.retrieval.validate()?);
        all_warnings.extend(self.reranker.validate()?);
        all_warnings.extend(self.scoring.validate()?);

        if self.llm.timeout_secs == 0 {
            return Err(CodelensError::invalid_configuration(
                "llm.timeoutSecs cannot be 0",
                "Set a request timeout in seconds (default: 30)",
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(CodelensError::invalid_configuration(
                "embedding.dimension cannot be 0",
                "Set the dimension of the embedding model (e.g. 768)",
            ));
        }

        Ok(all_warnings)
    }
}

// ============================================================================
// IntentConfig
// ============================================================================

/// Intent analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentConfig {
    /// Ask the chat model before falling back to pattern extraction.
    #[serde(default = "default_true")]
    pub use_llm: bool,

    /// Vocabulary scanned for keyword hits.
    #[serde(default = "default_technical_terms")]
    pub technical_terms: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_technical_terms() -> Vec<String> {
    DEFAULT_TECHNICAL_TERMS.iter().map(|s| s.to_string()).collect()
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            technical_terms: default_technical_terms(),
        }
    }
}

// ============================================================================
// BuilderConfig
// ============================================================================

const DEFAULT_FINAL_TOP_K: usize = 10;
const DEFAULT_MISSING_SOURCE_PENALTY: f64 = 0.1;

/// Multi-source retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderConfig {
    /// Size of the final context.
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,

    /// Run retrievers concurrently.
    #[serde(default = "default_true")]
    pub parallel_retrieval: bool,

    /// Per-branch deadline, measured from fan-out start.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Confidence subtracted for each enabled source that produced nothing
    /// because it was unavailable, failed, or timed out.
    #[serde(default = "default_missing_source_penalty")]
    pub missing_source_penalty: f64,

    #[serde(default)]
    pub sources: SourcesConfig,
}

fn default_final_top_k() -> usize {
    DEFAULT_FINAL_TOP_K
}

fn default_timeout_seconds() -> f64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_missing_source_penalty() -> f64 {
    DEFAULT_MISSING_SOURCE_PENALTY
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            final_top_k: DEFAULT_FINAL_TOP_K,
            parallel_retrieval: true,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            missing_source_penalty: DEFAULT_MISSING_SOURCE_PENALTY,
            sources: SourcesConfig::default(),
        }
    }
}

impl BuilderConfig {
    /// Validated per-call config for one source.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidConfiguration`] for out-of-range values.
    pub fn retrieval_config(&self, source: SourceType) -> CodelensResult<RetrievalConfig> {
        let settings = self.sources.get(source);
        RetrievalConfig::new(
            settings.top_k,
            self.parallel_retrieval,
            self.timeout_seconds,
            settings.min_relevance_score,
        )
        .map_err(|e| match e {
            CodelensError::InvalidConfiguration { message, hint } => {
                CodelensError::InvalidConfiguration {
                    message: format!("retrieval.sources.{}: {}", source, message),
                    hint,
                }
            }
            other => other,
        })
    }

    /// Validate the retrieval configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> CodelensResult<Vec<String>> {
        let mut warnings = Vec::new();

        if self.final_top_k == 0 {
            return Err(CodelensError::invalid_configuration(
                "retrieval.finalTopK cannot be 0",
                "Set finalTopK to at least 1 (recommended: 5-20)",
            ));
        }
        if !(0.0..=1.0).contains(&self.missing_source_penalty) {
            return Err(CodelensError::invalid_configuration(
                format!(
                    "retrieval.missingSourcePenalty must be within [0, 1] (got {})",
                    self.missing_source_penalty
                ),
                "Use a value such as 0.1",
            ));
        }

        for source in SourceType::PRIORITY {
            self.retrieval_config(source)?;
        }

        let enabled: Vec<SourceType> = SourceType::PRIORITY
            .into_iter()
            .filter(|s| self.sources.get(*s).enable)
            .collect();
        if enabled.is_empty() {
            warnings.push("retrieval.sources: every source is disabled; context will be empty".to_string());
        }

        let candidate_budget: usize = enabled.iter().map(|s| self.sources.get(*s).top_k).sum();
        if !enabled.is_empty() && self.final_top_k > candidate_budget {
            warnings.push(format!(
                "retrieval.finalTopK ({}) exceeds the combined source topK ({}); reranking will never run",
                self.final_top_k, candidate_budget
            ));
        }

        Ok(warnings)
    }
}

/// Per-source settings for all three retrievers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesConfig {
    #[serde(default)]
    pub call_graph: SourceConfig,

    #[serde(default)]
    pub vector: SourceConfig,

    #[serde(default)]
    pub dependency: SourceConfig,
}

impl SourcesConfig {
    pub fn get(&self, source: SourceType) -> &SourceConfig {
        match source {
            SourceType::CallGraph => &self.call_graph,
            SourceType::Vector => &self.vector,
            SourceType::Dependency => &self.dependency,
        }
    }

    pub fn get_mut(&mut self, source: SourceType) -> &mut SourceConfig {
        match source {
            SourceType::CallGraph => &mut self.call_graph,
            SourceType::Vector => &mut self.vector,
            SourceType::Dependency => &mut self.dependency,
        }
    }
}

/// Settings for one retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    #[serde(default = "default_source_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub min_relevance_score: f64,
}

fn default_source_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enable: true,
            top_k: DEFAULT_TOP_K,
            min_relevance_score: 0.0,
        }
    }
}

// ============================================================================
// RerankerConfig
// ============================================================================

/// LLM reranker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankerConfig {
    /// When disabled, oversized candidate sets are cut by score instead.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Total LLM attempts per rerank call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff; attempt `n` waits `n * backoffMs` before the next try.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Maximum characters of each candidate shown in the prompt.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    #[serde(default)]
    pub prompt_template: PromptTemplate,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_preview_chars() -> usize {
    300
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            preview_chars: default_preview_chars(),
            prompt_template: PromptTemplate::default(),
        }
    }
}

impl RerankerConfig {
    /// Validate the reranker configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> CodelensResult<Vec<String>> {
        let mut warnings = Vec::new();

        if self.max_attempts == 0 {
            return Err(CodelensError::invalid_configuration(
                "reranker.maxAttempts cannot be 0",
                "Set maxAttempts to at least 1 (default: 3)",
            ));
        }
        if self.preview_chars == 0 {
            return Err(CodelensError::invalid_configuration(
                "reranker.previewChars cannot be 0",
                "Set previewChars to at least 1 (default: 300)",
            ));
        }

        let worst_case_ms = (1..u64::from(self.max_attempts)).sum::<u64>() * self.backoff_ms;
        if worst_case_ms > 10_000 {
            warnings.push(format!(
                "reranker backoff may add up to {} ms per request",
                worst_case_ms
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// ScoringConfig
// ============================================================================

/// Relevance scores assigned by the graph retrievers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    /// Exact-name function definition.
    pub definition: f64,
    pub caller: f64,
    pub callee: f64,
    /// Keyword substring hit on a function name or body.
    pub keyword_match: f64,
    pub includes: f64,
    pub included_by: f64,
    /// Project-wide most included headers.
    pub top_headers: f64,
    /// Maximum keyword hits kept per keyword.
    pub keyword_hits_per_term: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            definition: 1.0,
            caller: 0.8,
            callee: 0.7,
            keyword_match: 0.7,
            includes: 0.8,
            included_by: 0.7,
            top_headers: 0.6,
            keyword_hits_per_term: 3,
        }
    }
}

impl ScoringConfig {
    /// Validate the scoring configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any score is outside `[0, 1]`.
    pub fn validate(&self) -> CodelensResult<Vec<String>> {
        let scores = [
            ("definition", self.definition),
            ("caller", self.caller),
            ("callee", self.callee),
            ("keywordMatch", self.keyword_match),
            ("includes", self.includes),
            ("includedBy", self.included_by),
            ("topHeaders", self.top_headers),
        ];
        for (name, score) in scores {
            if !(0.0..=1.0).contains(&score) {
                return Err(CodelensError::invalid_configuration(
                    format!("scoring.{} must be within [0, 1] (got {})", name, score),
                    "Relevance scores are normalized to the range 0.0-1.0",
                ));
            }
        }

        let mut warnings = Vec::new();
        if self.keyword_hits_per_term == 0 {
            warnings.push(
                "scoring.keywordHitsPerTerm is 0; the call-graph keyword fallback is disabled"
                    .to_string(),
            );
        }
        Ok(warnings)
    }
}

// ============================================================================
// ProjectConfig
// ============================================================================

/// Project-level configuration.
///
/// # Example YAML
///
/// ```yaml
/// retrieval:
///   finalTopK: 6
///   sources:
///     dependency:
///       enable: false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Per-project retrieval overrides; unset fields inherit from global config.
    #[serde(default)]
    pub retrieval: Option<BuilderConfigOverride>,
}

impl ProjectConfig {
    /// Load `<root>/.codelens/config.yaml`, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidProjectConfig`] if the file exists but cannot be parsed.
    pub fn load_from_project(project_root: &Path) -> CodelensResult<Self> {
        Self::from_path(&Self::config_path_for_project(project_root))
    }

    /// Load the project configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidProjectConfig`] if the file exists but cannot be parsed.
    pub fn from_path(path: &Path) -> CodelensResult<Self> {
        if !path.exists() {
            tracing::debug!(
                "Project config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CodelensError::InvalidProjectConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            CodelensError::InvalidProjectConfig(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get the config file path for a given project root.
    pub fn config_path_for_project(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join(CONFIG_FILENAME)
    }
}

/// Project-level overrides of [`BuilderConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderConfigOverride {
    #[serde(default)]
    pub final_top_k: Option<usize>,

    #[serde(default)]
    pub parallel_retrieval: Option<bool>,

    #[serde(default)]
    pub timeout_seconds: Option<f64>,

    #[serde(default)]
    pub sources: Option<SourcesOverride>,
}

/// Per-source overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesOverride {
    #[serde(default)]
    pub call_graph: Option<SourceConfigOverride>,

    #[serde(default)]
    pub vector: Option<SourceConfigOverride>,

    #[serde(default)]
    pub dependency: Option<SourceConfigOverride>,
}

impl SourcesOverride {
    fn get(&self, source: SourceType) -> Option<&SourceConfigOverride> {
        match source {
            SourceType::CallGraph => self.call_graph.as_ref(),
            SourceType::Vector => self.vector.as_ref(),
            SourceType::Dependency => self.dependency.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfigOverride {
    #[serde(default)]
    pub enable: Option<bool>,

    #[serde(default)]
    pub top_k: Option<usize>,

    #[serde(default)]
    pub min_relevance_score: Option<f64>,
}

// ============================================================================
// Tests
// ============================================================================
