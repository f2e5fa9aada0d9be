//! CodeLens engine and per-project sessions.
//!
//! The [`CodelensEngine`] holds the global configuration. Opening a project
//! yields a [`ProjectSession`] that owns everything scoped to that project:
//! store handles, the intent analyzer, the builder and the reranker.
//! No state is shared between sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use codelens_db::graph::{open_graph_store, GraphStore, GraphStoreConfig};
use codelens_db::vector::{open_vector_index, VectorIndexConfig};
use codelens_model::{create_chat_model, create_embedding_model, ChatModel, EmbeddingModel};

use crate::builder::{BuildOutcome, MultiSourceBuilder};
use crate::config::{GlobalConfig, ProjectConfig};
use crate::constants::{GRAPH_DIR, PROJECT_DIR, VECTORS_DIR};
use crate::context::{IntentAnalysis, SourceType};
use crate::db_adapter::EmbeddedVectorStore;
use crate::errors::{CodelensError, CodelensResult};
use crate::intent::IntentAnalyzer;
use crate::rerank::LlmReranker;
use crate::retriever::{CallGraphRetriever, DependencyRetriever, VectorRetriever};

// ============================================================================
// CodelensEngine
// ============================================================================

/// Entry point: global configuration plus project opening.
///
/// # Example
///
/// ```ignore
/// use codelens_core::CodelensEngine;
/// use std::path::Path;
///
/// let engine = CodelensEngine::with_defaults()?;
/// let session = engine.open_project(Path::new("/src/opensbi"))?;
/// let bundle = session.build_context("what calls sbi_init?");
/// ```
#[derive(Debug, Clone)]
pub struct CodelensEngine {
    global_config: GlobalConfig,
}

/// Model handles to use instead of the ones built from configuration.
///
/// `None` means "no model": intent analysis falls back to patterns, the
/// reranker to score order, and the vector source is left out.
#[derive(Debug, Clone, Default)]
pub struct SessionModels {
    pub chat: Option<Arc<dyn ChatModel>>,
    pub embedding: Option<Arc<dyn EmbeddingModel>>,
}

impl CodelensEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create an engine from an already loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CodelensError::InvalidConfiguration`] if validation fails.
    pub fn new(global_config: GlobalConfig) -> CodelensResult<Self> {
        for warning in global_config.validate()? {
            warn!("Config warning: {}", warning);
        }
        Ok(Self { global_config })
    }

    /// Create an engine from `~/.codelens/config.yaml` (or defaults).
    pub fn with_defaults() -> CodelensResult<Self> {
        Self::new(GlobalConfig::load_default()?)
    }

    /// Create an engine from a config file at `path` (defaults if absent).
    pub fn from_config_path(path: &Path) -> CodelensResult<Self> {
        Self::new(GlobalConfig::from_path(path)?)
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.global_config
    }

    // -------------------------------------------------------------------------
    // Projects
    // -------------------------------------------------------------------------

    /// Open a project with models built from the global configuration.
    ///
    /// A chat model that cannot be created (e.g. missing API key) is logged
    /// and left out; so is the embedding model.
    ///
    /// # Errors
    ///
    /// - [`CodelensError::ProjectNotFound`] if `root` is not a directory
    /// - [`CodelensError::InvalidProjectConfig`] if the project config cannot be parsed
    /// - [`CodelensError::InvalidConfiguration`] if the resolved settings are invalid
    pub fn open_project(&self, root: &Path) -> CodelensResult<ProjectSession> {
        let chat = match create_chat_model(&self.global_config.llm) {
            Ok(model) => Some(Arc::from(model)),
            Err(e) => {
                info!("Chat model unavailable, continuing without LLM: {}", e);
                None
            }
        };
        let embedding = match create_embedding_model(&self.global_config.embedding) {
            Ok(model) => Some(Arc::from(model)),
            Err(e) => {
                info!("Embedding model unavailable, vector source disabled: {}", e);
                None
            }
        };

        self.open_project_with(root, SessionModels { chat, embedding })
    }

    /// Open a project with explicitly supplied models.
    pub fn open_project_with(
        &self,
        root: &Path,
        models: SessionModels,
    ) -> CodelensResult<ProjectSession> {
        if !root.is_dir() {
            return Err(CodelensError::ProjectNotFound(root.to_path_buf()));
        }

        let project_config = ProjectConfig::load_from_project(root)?;
        let builder_config = self.global_config.resolve_builder_config(&project_config);
        let scoring = self.global_config.scoring.clone();

        let reranker = Arc::new(LlmReranker::new(
            models.chat.clone(),
            self.global_config.reranker.clone(),
        ));
        let mut builder = MultiSourceBuilder::new(builder_config, reranker)?;

        let data_dir = root.join(PROJECT_DIR);

        if let Some(graph) = open_graph(&data_dir.join(GRAPH_DIR)) {
            builder = builder
                .with_retriever(Arc::new(CallGraphRetriever::new(
                    Arc::clone(&graph),
                    scoring.clone(),
                )))
                .with_retriever(Arc::new(DependencyRetriever::new(graph, scoring)));
        }

        let mut vector_chunks = None;
        if let Some(embedder) = models.embedding.clone() {
            let config = VectorIndexConfig::new(embedder.dimension(), data_dir.join(VECTORS_DIR));
            match open_vector_index(&config) {
                Ok(index) => {
                    let store = EmbeddedVectorStore::new(embedder, index)?;
                    vector_chunks = store.len().ok();
                    builder = builder.with_retriever(Arc::new(VectorRetriever::new(Arc::new(store))));
                }
                Err(e) => warn!("Vector index at {} not usable: {}", config.path.display(), e),
            }
        }

        let analyzer = IntentAnalyzer::new(models.chat.clone(), self.global_config.intent.clone());

        info!("Opened project {}", root.display());
        Ok(ProjectSession {
            root: root.to_path_buf(),
            analyzer,
            builder,
            chat_model: models.chat.map(|m| m.model_id().to_string()),
            embedding_model: models.embedding.map(|m| m.model_id().to_string()),
            vector_chunks,
        })
    }
}

fn open_graph(path: &Path) -> Option<Arc<dyn GraphStore>> {
    match open_graph_store(&GraphStoreConfig::new(path)) {
        Ok(graph) => Some(graph),
        Err(e) => {
            warn!("Graph store at {} not usable: {}", path.display(), e);
            None
        }
    }
}

// ============================================================================
// ProjectSession
// ============================================================================

/// Everything needed to answer questions about one project.
///
/// ## Sync Design
///
/// Calls block until the context is assembled. A session is `Send + Sync` and
/// may serve concurrent requests; the stores are read-only here.
pub struct ProjectSession {
    root: PathBuf,
    analyzer: IntentAnalyzer,
    builder: MultiSourceBuilder,
    chat_model: Option<String>,
    embedding_model: Option<String>,
    vector_chunks: Option<usize>,
}

/// Intent plus final context for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub question: String,
    pub intent: IntentAnalysis,
    pub outcome: BuildOutcome,
}

/// Health snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub project_root: PathBuf,

    /// Component name → liveness (`retriever_<source>`, `reranker`).
    pub health: BTreeMap<String, bool>,

    pub available_sources: Vec<SourceType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Chunks in the vector index, when it could be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_chunks: Option<usize>,
}

impl ProjectSession {
    /// Assemble a session from parts.
    pub fn new(root: impl Into<PathBuf>, analyzer: IntentAnalyzer, builder: MultiSourceBuilder) -> Self {
        Self {
            root: root.into(),
            analyzer,
            builder,
            chat_model: None,
            embedding_model: None,
            vector_chunks: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn builder(&self) -> &MultiSourceBuilder {
        &self.builder
    }

    /// Extract the intent of a question.
    pub fn analyze(&self, question: &str) -> IntentAnalysis {
        self.analyzer.analyze(question)
    }

    /// Analyze a question and build its context with the configured `finalTopK`.
    pub fn build_context(&self, question: &str) -> ContextBundle {
        self.build_context_top_k(question, None)
    }

    /// Like [`build_context`](Self::build_context), optionally overriding `finalTopK`.
    pub fn build_context_top_k(&self, question: &str, final_top_k: Option<usize>) -> ContextBundle {
        let request_id = Uuid::new_v4();
        debug!("[{}] Building context for {:?}", request_id, question);

        let intent = self.analyze(question);
        let top_k = final_top_k.unwrap_or(self.builder.config().final_top_k);
        let outcome = self.builder.build_top_k(question, &intent, top_k);

        ContextBundle {
            request_id,
            generated_at: Utc::now(),
            question: question.to_string(),
            intent,
            outcome,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            project_root: self.root.clone(),
            health: self.builder.health_check(),
            available_sources: self.builder.available_sources(),
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
            vector_chunks: self.vector_chunks,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
