//! Code graph entity definitions.
//!
//! All structs use camelCase for JSON serialization, matching the JSONL files
//! written by the ingestion pipeline.

use serde::{Deserialize, Serialize};

// ============================================================================
// FunctionRecord
// ============================================================================

/// A function definition found in the codebase.
///
/// ## Example
///
/// ```json
/// {
///   "name": "sbi_init",
///   "filePath": "lib/sbi/sbi_init.c",
///   "startLine": 240,
///   "endLine": 310,
///   "code": "int sbi_init(struct sbi_scratch *scratch) { ... }"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    /// Function name as written in the source.
    pub name: String,

    /// Path of the file that defines the function, relative to the project root.
    pub file_path: String,

    /// First line of the definition (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,

    /// Last line of the definition (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,

    /// Full source text of the definition.
    #[serde(default)]
    pub code: String,
}

impl FunctionRecord {
    /// Create a function record with the required fields.
    pub fn new(name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
            start_line: None,
            end_line: None,
            code: String::new(),
        }
    }

    /// Set the source text.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Set the line range.
    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }
}

// ============================================================================
// CallRecord
// ============================================================================

/// A directed call edge: `caller` invokes `callee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub caller: String,
    pub callee: String,

    /// File containing the call site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Line of the call site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl CallRecord {
    pub fn new(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
            file_path: None,
            line: None,
        }
    }
}

// ============================================================================
// IncludeRecord
// ============================================================================

/// A directed include edge: `source` contains `#include "target"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeRecord {
    pub source: String,
    pub target: String,

    /// Whether the include used angle brackets (`<...>`).
    #[serde(default)]
    pub system: bool,
}

impl IncludeRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            system: false,
        }
    }
}

// ============================================================================
// Query results
// ============================================================================

/// A function on the other end of a call edge.
///
/// Returned by caller/callee queries. `file_path` and `code` are filled in when
/// the related function is itself defined in the indexed codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedFunction {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Line of the call site that links the two functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_line: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A header together with the number of files that include it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderUsage {
    pub path: String,
    pub include_count: usize,
}

/// Aggregate counts for a loaded graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub function_count: usize,
    pub call_count: usize,
    pub include_count: usize,
}

// ============================================================================
// Tests
// ============================================================================
