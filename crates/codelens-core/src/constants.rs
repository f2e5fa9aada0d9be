//! Common constants used throughout codelens-core.
//!
//! Paths, directory names and the default heuristic vocabularies.

// ============================================================================
// Directory Names
// ============================================================================

/// Per-project metadata directory at the project root.
///
/// Layout: `.codelens/{config.yaml, graph/, vectors/}`
pub const PROJECT_DIR: &str = ".codelens";

/// Graph store directory inside [`PROJECT_DIR`].
pub const GRAPH_DIR: &str = "graph";

/// Vector index directory inside [`PROJECT_DIR`].
pub const VECTORS_DIR: &str = "vectors";

/// Config file name, both globally and per project.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// The name of the global configuration directory (`~/.codelens`).
pub const CODELENS_HOME_DIR: &str = ".codelens";

// ============================================================================
// Intent Vocabulary
// ============================================================================

/// English question words and fillers never treated as identifiers.
pub const STOP_WORDS: &[&str] = &[
    "what", "about", "this", "that", "function", "does", "call", "who", "how", "where", "when",
    "why", "which", "the", "and", "or", "but", "is", "are", "was", "were", "have", "has", "had",
    "will", "would", "could", "should", "may", "might", "can", "must", "shall",
];

/// Default technical vocabulary scanned for keyword hits.
pub const DEFAULT_TECHNICAL_TERMS: &[&str] = &[
    "api",
    "apis",
    "driver",
    "interrupt",
    "memory",
    "allocation",
    "boot",
    "initialization",
    "platform",
    "device",
    "register",
    "callback",
    "handler",
    "manager",
    "service",
    "interface",
    "protocol",
];

/// Words that mark a question as being about call relationships.
pub const CALL_CUES: &[&str] = &[
    "call", "calls", "called", "calling", "caller", "callers", "callee", "callees", "invoke",
    "invokes", "invoked", "invoking",
];

/// Substrings that allow the dependency retriever's project-wide header fallback.
pub const DEPENDENCY_CUES: &[&str] = &["include", "header", "dependency", "dependencies"];
