//! CLI definition and command dispatch for CodeLens.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--verbose`, `--project`)
//! 2. Environment variables (`CODELENS_CONFIG`, `CODELENS_VERBOSE`, `CODELENS_PROJECT`)
//! 3. Config file (`~/.codelens/config.yaml` or the `--config` path)
//! 4. Built-in defaults
//!
//! Per-project retrieval overrides are read from `<project>/.codelens/config.yaml`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};

use codelens_core::{
    CodelensEngine, ContextBundle, ContextItem, EntityKind, IntentAnalysis, ProjectSession,
    SourceStatus,
};

use crate::ui::style::indent;
use crate::ui::{table, ColorMode, MessageType, Style};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// CodeLens – context retrieval for questions about a C codebase
#[derive(Parser, Debug)]
#[command(name = "codelens")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "CODELENS_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.codelens/config.yaml)
    #[arg(long, global = true, env = "CODELENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project root holding the `.codelens/` indexes
    #[arg(long, global = true, env = "CODELENS_PROJECT", default_value = ".")]
    pub project: PathBuf,

    /// Color output mode: always, never, or auto
    #[arg(long, global = true, env = "CODELENS_COLOR", default_value = "auto")]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show how a question is understood (entities, intent, keywords)
    #[command(after_help = r#"EXAMPLES:
    codelens intent "what calls sbi_init?"
    codelens intent "where is sbi_console.h included?" --json
"#)]
    Intent {
        /// The question to analyze
        question: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Retrieve and rank context for a question
    #[command(after_help = r#"EXAMPLES:
    # Ranked context from every enabled source
    codelens context "what calls sbi_init?"

    # Keep only the best 5 items
    codelens context "how is the console initialized?" --top-k 5

    # Full bundle (intent, per-source report, items) as JSON
    codelens context "what does sbi_hart.c include?" --json
"#)]
    Context {
        /// The question to answer
        question: String,

        /// Number of items to return (default: retrieval.finalTopK)
        #[arg(long)]
        top_k: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show source and reranker health for the project
    #[command(after_help = r#"EXAMPLES:
    codelens status
    codelens status --json | jq '.availableSources'
"#)]
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Entry point
// ============================================================================

/// Run the CLI.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays parseable.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "codelens_core={lvl},codelens_cli={lvl},codelens_db={lvl},codelens_model={lvl}",
        lvl = log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let style = Style::new(cli.color);

    let session = match open_session(&cli) {
        Ok(session) => session,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check --project and ~/.codelens/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context(
                    "Failed to open project",
                    Some(&format!("{:#}", e)),
                    Some(&hint),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Intent { question, json } => handle_intent(&style, &session, &question, json),
        Command::Context {
            question,
            top_k,
            json,
        } => handle_context(&style, &session, &question, top_k, json),
        Command::Status { json } => handle_status(&style, &session, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style.message(MessageType::Err, &format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn open_session(cli: &Cli) -> Result<ProjectSession> {
    let engine = match &cli.config {
        Some(path) => CodelensEngine::from_config_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CodelensEngine::with_defaults().context("loading global config")?,
    };
    engine
        .open_project(&cli.project)
        .with_context(|| format!("opening project {}", cli.project.display()))
}

// ============================================================================
// Command handlers
// ============================================================================

fn handle_intent(style: &Style, session: &ProjectSession, question: &str, json: bool) -> Result<()> {
    let intent = session.analyze(question);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&intent).context("serializing intent")?
        );
        return Ok(());
    }

    println!("{}", style.section("INTENT"));
    println!();
    print_intent(style, &intent);
    Ok(())
}

fn handle_context(
    style: &Style,
    session: &ProjectSession,
    question: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    if top_k == Some(0) {
        anyhow::bail!("--top-k must be at least 1");
    }

    let bundle = session.build_context_top_k(question, top_k);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&bundle).context("serializing context bundle")?
        );
        return Ok(());
    }

    print_bundle(style, &bundle);
    Ok(())
}

fn handle_status(style: &Style, session: &ProjectSession, json: bool) -> Result<()> {
    let status = session.status();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("serializing status")?
        );
        return Ok(());
    }

    println!("{}", style.section("STATUS"));
    println!();
    println!(
        "  {}",
        style.key_value("Project", &status.project_root.display().to_string())
    );
    println!(
        "  {}",
        style.key_value("Chat model", status.chat_model.as_deref().unwrap_or("(none)"))
    );
    println!(
        "  {}",
        style.key_value(
            "Embedding model",
            status.embedding_model.as_deref().unwrap_or("(none)")
        )
    );
    if let Some(chunks) = status.vector_chunks {
        println!("  {}", style.key_value("Indexed chunks", &chunks.to_string()));
    }
    let available: Vec<&str> = status.available_sources.iter().map(|s| s.as_str()).collect();
    println!(
        "  {}",
        style.key_value(
            "Available sources",
            &if available.is_empty() {
                "(none)".to_string()
            } else {
                available.join(", ")
            }
        )
    );
    println!();
    println!(
        "{}",
        indent(&table::render_health_table(&status.health, |alive| style.health(alive)), 2)
    );
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

fn print_intent(style: &Style, intent: &IntentAnalysis) {
    println!("  {}", style.key_value("Type", intent.intent_type.as_str()));
    println!(
        "  {}",
        style.key_value("Confidence", &format!("{:.2}", intent.confidence))
    );
    for (label, kind) in [
        ("Functions", EntityKind::Function),
        ("Files", EntityKind::File),
        ("Concepts", EntityKind::Concept),
    ] {
        let names: Vec<&str> = intent.entity_names(kind).collect();
        if !names.is_empty() {
            println!("  {}", style.key_value(label, &names.join(", ")));
        }
    }
    for (label, set) in [
        ("Variables", &intent.variables),
        ("Keywords", &intent.keywords),
        ("Search terms", &intent.search_terms),
    ] {
        if !set.is_empty() {
            println!("  {}", style.key_value(label, &join(set)));
        }
    }
}

fn print_bundle(style: &Style, bundle: &ContextBundle) {
    let outcome = &bundle.outcome;

    println!("{}", style.section("CONTEXT"));
    println!();
    println!("  {}", style.key_value("Question", &bundle.question));
    println!(
        "  {}",
        style.key_value(
            "Intent",
            &format!(
                "{} ({:.2})",
                bundle.intent.intent_type, bundle.intent.confidence
            )
        )
    );
    println!("  {}", style.key_value("Request", &bundle.request_id.to_string()));
    println!(
        "  {}",
        style.key_value(
            "Generated",
            &bundle.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    );
    println!();

    println!("{}", style.section("SOURCES"));
    println!();
    println!("{}", indent(&table::render_sources_table(&outcome.sources), 2));
    for report in &outcome.sources {
        if report.status.is_missing() {
            println!(
                "{}",
                style.message(
                    MessageType::Warn,
                    &format!("{} source {}", report.source, describe_missing(report.status))
                )
            );
        }
    }
    println!();

    if outcome.items.is_empty() {
        println!(
            "{}",
            style.message(MessageType::Warn, "No context found for this question")
        );
        return;
    }

    println!(
        "{}",
        style.message(
            MessageType::Ok,
            &format!(
                "{} items ({} merged, {} unique{}), confidence {:.2}, {} ms",
                outcome.items.len(),
                outcome.merged_count,
                outcome.deduped_count,
                if outcome.reranked { ", reranked" } else { "" },
                outcome.confidence,
                outcome.elapsed_ms
            )
        )
    );
    println!();

    for (rank, item) in outcome.items.iter().enumerate() {
        let label = item_label(item);
        println!(
            "{}",
            style.item_header(
                rank + 1,
                item.source_type().as_str(),
                item.relevance_score(),
                label.as_deref()
            )
        );
        println!("{}", indent(item.content(), 4));
        println!();
    }
}

fn describe_missing(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Unavailable => "is unavailable",
        SourceStatus::Failed => "failed",
        SourceStatus::TimedOut => "timed out",
        SourceStatus::Ok | SourceStatus::Disabled => "is fine",
    }
}

/// `relation_type` plus the function or file it concerns, when known.
fn item_label(item: &ContextItem) -> Option<String> {
    let relation = item.metadata_str("relation_type")?;
    let subject = item
        .metadata_str("function_name")
        .or_else(|| item.metadata_str("file_path"));
    Some(match subject {
        Some(subject) => format!("{} {}", relation, subject),
        None => relation.to_string(),
    })
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// Tests
// ============================================================================
