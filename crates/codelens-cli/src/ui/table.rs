//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `codelens context` | `render_sources_table()` |
//! | `codelens status` | `render_health_table()` |

use std::collections::BTreeMap;

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use codelens_core::SourceReport;

/// Render the per-source report of a build.
///
/// # Example Output
///
/// ```text
/// SOURCE       STATUS        ITEMS   CANDIDATES   TIME
/// call_graph   ok                3            5   12 ms
/// vector       unavailable       0            0   0 ms
/// ```
pub fn render_sources_table(sources: &[SourceReport]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("SOURCE"),
        Cell::new("STATUS"),
        Cell::new("ITEMS").set_alignment(CellAlignment::Right),
        Cell::new("CANDIDATES").set_alignment(CellAlignment::Right),
        Cell::new("TIME").set_alignment(CellAlignment::Right),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(12)), // SOURCE
        ColumnConstraint::LowerBoundary(Width::Fixed(12)), // STATUS
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),  // ITEMS
        ColumnConstraint::LowerBoundary(Width::Fixed(10)), // CANDIDATES
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // TIME
    ]);

    for report in sources {
        table.add_row(vec![
            Cell::new(report.source.as_str()),
            Cell::new(report.status.as_str()),
            Cell::new(report.item_count).set_alignment(CellAlignment::Right),
            Cell::new(report.total_candidates).set_alignment(CellAlignment::Right),
            Cell::new(format!("{} ms", report.elapsed_ms)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render component liveness. `render_state` formats the health cell.
///
/// # Example Output
///
/// ```text
/// COMPONENT              HEALTH
/// reranker               down
/// retriever_call_graph   up
/// ```
pub fn render_health_table(
    health: &BTreeMap<String, bool>,
    render_state: impl Fn(bool) -> String,
) -> String {
    if health.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![Cell::new("COMPONENT"), Cell::new("HEALTH")]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(20)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
    ]);

    for (component, alive) in health {
        table.add_row(vec![Cell::new(component), Cell::new(render_state(*alive))]);
    }

    table.trim_fmt().to_string()
}
