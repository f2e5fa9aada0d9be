//! Shared test utilities for codelens-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Get a Command for the codelens binary.
///
/// # Panics
///
/// Panics if the codelens binary cannot be found.
#[allow(deprecated)]
pub fn codelens_cmd() -> Command {
    let mut cmd = Command::cargo_bin("codelens").expect("codelens binary should exist");
    cmd.env_remove("CODELENS_CONFIG")
        .env_remove("CODELENS_PROJECT")
        .env_remove("CODELENS_VERBOSE")
        .env_remove("OPENROUTER_MODEL")
        .env("NO_COLOR", "1");
    cmd
}

/// Global config whose chat and embedding endpoints point at a closed local
/// port, with an API key variable that is never set.
pub const OFFLINE_CONFIG: &str = r#"
llm:
  baseUrl: http://127.0.0.1:9/v1/chat/completions
  apiKeyEnv: CODELENS_TEST_UNSET_API_KEY
  timeoutSecs: 2
embedding:
  baseUrl: http://127.0.0.1:9
  timeoutSecs: 2
reranker:
  maxAttempts: 1
  backoffMs: 0
retrieval:
  timeoutSeconds: 10
"#;

/// Write the offline config into `dir` and return its path.
pub fn write_offline_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.yaml");
    fs::write(&path, OFFLINE_CONFIG).expect("write config");
    path
}

/// Create a project with a small OpenSBI-like code graph under `root`.
pub fn create_fixture_project(root: &Path) {
    let graph = root.join(".codelens").join("graph");
    fs::create_dir_all(&graph).expect("create graph dir");

    fs::write(
        graph.join("functions.jsonl"),
        concat!(
            r#"{"name":"sbi_init","filePath":"lib/sbi/sbi_init.c","code":"void sbi_init(struct sbi_scratch *scratch) {}","startLine":240,"endLine":310}"#,
            "\n",
            r#"{"name":"sbi_console_init","filePath":"lib/sbi/sbi_console.c","code":"int sbi_console_init(struct sbi_scratch *scratch) { return 0; }"}"#,
            "\n",
        ),
    )
    .expect("write functions");

    fs::write(
        graph.join("calls.jsonl"),
        concat!(
            r#"{"caller":"_start_warm","callee":"sbi_init","filePath":"firmware/fw_base.S","line":512}"#,
            "\n",
            r#"{"caller":"sbi_init","callee":"sbi_console_init"}"#,
            "\n",
        ),
    )
    .expect("write calls");

    fs::write(
        graph.join("includes.jsonl"),
        concat!(
            r#"{"source":"lib/sbi/sbi_init.c","target":"include/sbi/sbi_console.h"}"#,
            "\n",
            r#"{"source":"lib/sbi/sbi_console.c","target":"include/sbi/sbi_console.h"}"#,
            "\n",
        ),
    )
    .expect("write includes");
}
