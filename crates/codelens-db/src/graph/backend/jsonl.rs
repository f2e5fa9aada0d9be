//! JSONL file-backed graph store.
//!
//! Layout of the store directory:
//!
//! ```text
//! <dir>/functions.jsonl   one FunctionRecord per line
//! <dir>/calls.jsonl       one CallRecord per line
//! <dir>/includes.jsonl    one IncludeRecord per line
//! ```
//!
//! Everything is loaded into memory on open. The store is immutable afterwards,
//! so concurrent readers need no locking.

use super::super::entities::{
    CallRecord, FunctionRecord, GraphStats, HeaderUsage, IncludeRecord, RelatedFunction,
};
use super::super::traits::GraphStore;
use crate::error::{DbError, DbResult};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Filename for function definitions.
pub const FUNCTIONS_FILENAME: &str = "functions.jsonl";

/// Filename for call edges.
pub const CALLS_FILENAME: &str = "calls.jsonl";

/// Filename for include edges.
pub const INCLUDES_FILENAME: &str = "includes.jsonl";

/// In-memory graph loaded from JSONL files.
pub struct JsonlGraphStore {
    /// Source directory, if loaded from disk.
    path: Option<PathBuf>,

    functions: Vec<FunctionRecord>,
    calls: Vec<CallRecord>,
    includes: Vec<IncludeRecord>,

    /// Function name → index of its first definition.
    by_name: HashMap<String, usize>,

    /// Callee name → indices into `calls`.
    callers_of: HashMap<String, Vec<usize>>,

    /// Caller name → indices into `calls`.
    callees_of: HashMap<String, Vec<usize>>,
}

impl JsonlGraphStore {
    /// Open the store at `dir`. Missing files are treated as empty.
    pub fn open(dir: &Path) -> DbResult<Self> {
        let functions: Vec<FunctionRecord> = read_jsonl(&dir.join(FUNCTIONS_FILENAME))?;
        let calls: Vec<CallRecord> = read_jsonl(&dir.join(CALLS_FILENAME))?;
        let includes: Vec<IncludeRecord> = read_jsonl(&dir.join(INCLUDES_FILENAME))?;

        let mut store = Self::from_records(functions, calls, includes);
        store.path = Some(dir.to_path_buf());

        debug!(
            "Loaded graph store from {:?}: {} functions, {} calls, {} includes",
            dir,
            store.functions.len(),
            store.calls.len(),
            store.includes.len()
        );
        Ok(store)
    }

    /// Build a store directly from records.
    pub fn from_records(
        functions: Vec<FunctionRecord>,
        calls: Vec<CallRecord>,
        includes: Vec<IncludeRecord>,
    ) -> Self {
        let mut by_name = HashMap::new();
        for (idx, f) in functions.iter().enumerate() {
            by_name.entry(f.name.clone()).or_insert(idx);
        }

        let mut callers_of: HashMap<String, Vec<usize>> = HashMap::new();
        let mut callees_of: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, call) in calls.iter().enumerate() {
            callers_of.entry(call.callee.clone()).or_default().push(idx);
            callees_of.entry(call.caller.clone()).or_default().push(idx);
        }

        Self {
            path: None,
            functions,
            calls,
            includes,
            by_name,
            callers_of,
            callees_of,
        }
    }

    /// Aggregate counts.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            function_count: self.functions.len(),
            call_count: self.calls.len(),
            include_count: self.includes.len(),
        }
    }

    fn function(&self, name: &str) -> Option<&FunctionRecord> {
        self.by_name.get(name).map(|&idx| &self.functions[idx])
    }

    /// Resolve the other end of a set of call edges, deduplicated by name.
    fn related(&self, edges: &[usize], pick: impl Fn(&CallRecord) -> &str) -> Vec<RelatedFunction> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for &idx in edges {
            let call = &self.calls[idx];
            let name = pick(call);
            if !seen.insert(name.to_string()) {
                continue;
            }

            let def = self.function(name);
            out.push(RelatedFunction {
                name: name.to_string(),
                file_path: def
                    .map(|d| d.file_path.clone())
                    .or_else(|| call.file_path.clone()),
                call_line: call.line,
                code: def.map(|d| d.code.clone()).filter(|c| !c.is_empty()),
            });
        }
        out
    }
}

impl GraphStore for JsonlGraphStore {
    fn query_function_by_name(&self, name: &str) -> DbResult<Option<FunctionRecord>> {
        trace!("query_function_by_name({})", name);
        Ok(self.function(name).cloned())
    }

    fn query_callers(&self, name: &str) -> DbResult<Vec<RelatedFunction>> {
        let edges = self.callers_of.get(name).map(Vec::as_slice).unwrap_or(&[]);
        Ok(self.related(edges, |c| c.caller.as_str()))
    }

    fn query_callees(&self, name: &str) -> DbResult<Vec<RelatedFunction>> {
        let edges = self.callees_of.get(name).map(Vec::as_slice).unwrap_or(&[]);
        Ok(self.related(edges, |c| c.callee.as_str()))
    }

    fn query_file_includes(&self, path: &str) -> DbResult<Vec<IncludeRecord>> {
        Ok(self
            .includes
            .iter()
            .filter(|inc| path_matches(&inc.source, path))
            .cloned()
            .collect())
    }

    fn query_file_included_by(&self, path: &str) -> DbResult<Vec<IncludeRecord>> {
        Ok(self
            .includes
            .iter()
            .filter(|inc| path_matches(&inc.target, path))
            .cloned()
            .collect())
    }

    fn query_top_included_files(&self, limit: usize) -> DbResult<Vec<HeaderUsage>> {
        // Count in first-seen order so equal counts keep a stable order.
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for inc in &self.includes {
            let count = counts.entry(inc.target.as_str()).or_insert_with(|| {
                order.push(inc.target.as_str());
                0
            });
            *count += 1;
        }

        let mut usage: Vec<HeaderUsage> = order
            .into_iter()
            .map(|path| HeaderUsage {
                path: path.to_string(),
                include_count: counts[path],
            })
            .collect();
        usage.sort_by(|a, b| b.include_count.cmp(&a.include_count));
        usage.truncate(limit);
        Ok(usage)
    }

    fn search_functions(&self, keyword: &str, limit: usize) -> DbResult<Vec<FunctionRecord>> {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .functions
            .iter()
            .filter(|f| {
                f.name.to_lowercase().contains(&needle) || f.code.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn is_available(&self) -> bool {
        match &self.path {
            Some(path) => path.is_dir(),
            None => true,
        }
    }
}

/// True when `stored` equals `query` or ends with `/<query>`.
fn path_matches(stored: &str, query: &str) -> bool {
    let query = query.trim_start_matches("./");
    stored == query
        || stored
            .strip_suffix(query)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

/// Read a JSONL file into records, skipping invalid lines.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> DbResult<Vec<T>> {
    if !path.exists() {
        trace!("{:?} not present, treating as empty", path);
        return Ok(Vec::new());
    }

    let file = File::open(path).map_err(|e| DbError::graph_io(path, e.to_string()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DbError::graph_io(path, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping invalid line {} in {:?}: {}", line_num + 1, path, e),
        }
    }
    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_store() -> JsonlGraphStore {
        JsonlGraphStore::from_records(
            vec![
                FunctionRecord::new("sbi_init", "lib/sbi/sbi_init.c").with_code("int sbi_init(void) {}"),
                FunctionRecord::new("init_coldboot", "lib/sbi/sbi_init.c")
                    .with_code("static void init_coldboot(void) { sbi_init(); }"),
                FunctionRecord::new("sbi_console_init", "lib/sbi/sbi_console.c"),
            ],
            vec![
                CallRecord::new("init_coldboot", "sbi_init"),
                CallRecord::new("fw_entry", "sbi_init"),
                CallRecord::new("init_coldboot", "sbi_init"),
                CallRecord::new("sbi_init", "sbi_console_init"),
            ],
            vec![
                IncludeRecord::new("lib/sbi/sbi_init.c", "include/sbi/sbi_console.h"),
                IncludeRecord::new("lib/sbi/sbi_init.c", "include/sbi/sbi_types.h"),
                IncludeRecord::new("lib/sbi/sbi_console.c", "include/sbi/sbi_types.h"),
            ],
        )
    }

    #[test]
    fn test_callers_are_deduplicated_and_resolved() {
        let store = sample_store();
        let callers = store.query_callers("sbi_init").unwrap();

        assert_eq!(callers.len(), 2);
        assert_eq!(callers[0].name, "init_coldboot");
        assert_eq!(callers[0].file_path.as_deref(), Some("lib/sbi/sbi_init.c"));
        assert!(callers[0].code.is_some());
        // fw_entry is not defined in the graph
        assert_eq!(callers[1].file_path, None);
    }

    #[test]
    fn test_callees() {
        let store = sample_store();
        let callees = store.query_callees("sbi_init").unwrap();
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].name, "sbi_console_init");
    }

    #[test]
    fn test_include_queries_match_bare_file_name() {
        let store = sample_store();

        let includes = store.query_file_includes("sbi_init.c").unwrap();
        assert_eq!(includes.len(), 2);

        let included_by = store.query_file_included_by("sbi_types.h").unwrap();
        assert_eq!(included_by.len(), 2);

        // "init.c" must not match "sbi_init.c"
        assert!(store.query_file_includes("init.c").unwrap().is_empty());
    }

    #[test]
    fn test_top_included_files() {
        let store = sample_store();
        let top = store.query_top_included_files(1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].path, "include/sbi/sbi_types.h");
        assert_eq!(top[0].include_count, 2);
    }

    #[test]
    fn test_search_functions_is_case_insensitive_and_bounded() {
        let store = sample_store();
        let hits = store.search_functions("SBI_", 10).unwrap();
        assert_eq!(hits.len(), 3);

        let hits = store.search_functions("init", 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_open_from_directory_skips_invalid_lines() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(FUNCTIONS_FILENAME),
            "{\"name\":\"main\",\"filePath\":\"src/main.c\"}\nnot json\n\n",
        )
        .unwrap();

        let store = JsonlGraphStore::open(temp.path()).unwrap();
        assert!(store.is_available());
        assert_eq!(store.stats().function_count, 1);
        assert_eq!(store.stats().call_count, 0);
    }

    #[test]
    fn test_missing_directory_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = JsonlGraphStore::open(&temp.path().join("absent")).unwrap();
        assert!(!store.is_available());
    }
}
