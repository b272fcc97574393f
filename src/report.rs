use std::fmt::Write;

use crate::dashboard::DashboardState;
use crate::ingest::DateSource;
use crate::summary::{Pivot, Summaries};

pub fn date_source_label(source: DateSource) -> &'static str {
    match source {
        DateSource::UseSubmissionDate(_) => "Submission Date",
        DateSource::UseDate(_) => "Date",
        DateSource::NoDateSource => "none",
    }
}

/// Plain-text grid for terminal output.
pub fn render_pivot(pivot: &Pivot) -> String {
    let mut output = String::new();
    let name_width = pivot
        .rows
        .iter()
        .map(|t| t.to_string().chars().count())
        .max()
        .unwrap_or(0)
        .max("Tech".len());

    let _ = write!(output, "{:<name_width$}", "Tech");
    for month in &pivot.columns {
        let _ = write!(output, "  {month:>7}");
    }
    let _ = writeln!(output, "  {:>7}", "Total");

    for (idx, tech) in pivot.rows.iter().enumerate() {
        let _ = write!(output, "{:<name_width$}", tech.to_string());
        for count in &pivot.cells[idx] {
            let _ = write!(output, "  {count:>7}");
        }
        let _ = writeln!(output, "  {:>7}", pivot.row_total(idx));
    }

    output
}

pub fn build_report(source_name: &str, state: &DashboardState) -> String {
    let ingest = &state.ingest;
    let mut output = String::new();

    let _ = writeln!(output, "# FTTH Survey Summary by Tech");
    let _ = writeln!(
        output,
        "Generated from {} ({} rows read, {} without a usable date, dates from {})",
        source_name,
        ingest.rows_read,
        ingest.dropped_rows,
        date_source_label(ingest.date_source)
    );
    let _ = writeln!(output);

    let tables = match &state.view.summaries {
        Summaries::NoMatchingRecords => {
            let _ = writeln!(output, "No matching records for the selected filters.");
            return output;
        }
        Summaries::Tables(tables) => tables,
    };

    let _ = writeln!(output, "## Survey Counts by Tech");
    let _ = writeln!(output, "| Tech | Survey Count |");
    let _ = writeln!(output, "|---|---:|");
    for (tech, count) in &tables.by_technician {
        let _ = writeln!(output, "| {tech} | {count} |");
    }
    let _ = writeln!(output, "| **Total** | **{}** |", tables.total);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");
    for (month, count) in &tables.by_month {
        let _ = writeln!(output, "- {month}: {count} surveys");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Surveys per Tech and Month");
    let pivot = &tables.pivot;
    let _ = write!(output, "| Tech |");
    for month in &pivot.columns {
        let _ = write!(output, " {month} |");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "|---|{}", "---:|".repeat(pivot.columns.len()));
    for (idx, tech) in pivot.rows.iter().enumerate() {
        let _ = write!(output, "| {tech} |");
        for count in &pivot.cells[idx] {
            let _ = write!(output, " {count} |");
        }
        let _ = writeln!(output);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Measurements");
    let mut any_measurement = false;
    for (tech, m) in &tables.measurements {
        let drop = m.drop_length.mean();
        let hours = m.prep_hours.mean();
        if drop.is_none() && hours.is_none() {
            continue;
        }
        any_measurement = true;
        let _ = writeln!(
            output,
            "- {}: avg drop {} across {} surveys, prep {:.1} hours total",
            tech,
            drop.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1} ft")),
            m.drop_length.count,
            m.prep_hours.sum
        );
    }
    if !any_measurement {
        let _ = writeln!(output, "No drop length or prep hour measurements recorded.");
    }

    let mut recent: Vec<_> = state.view.filtered.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Surveys");
    for record in recent.iter().take(5) {
        let _ = writeln!(
            output,
            "- {} on {} (row {})",
            record.technician,
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.row
        );
    }

    output
}
