use std::path::Path;

use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use insights_generator::{RecommendEvents, RunReport, StatsPerTerm};

const HEADERS: [&str; 9] = [
    "Term",
    "Events",
    "Searches",
    "Clicks",
    "Conversions",
    "CTR %",
    "CVR %",
    "Mean pos",
    "Median pos",
];

fn row_cells(s: &StatsPerTerm) -> [String; 9] {
    [
        s.term.clone(),
        s.total_events.to_string(),
        s.total_searches.to_string(),
        s.total_clicks.to_string(),
        s.total_conversions.to_string(),
        format!("{:.2}", s.click_through_rate_percent),
        format!("{:.2}", s.conversion_rate_percent),
        format!("{:.2}", s.mean_click_position),
        format!("{:.1}", s.median_click_position),
    ]
}

/// Per-term statistics as a table. Numeric columns are right-aligned.
pub fn render_stats(stats: &[StatsPerTerm]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    if !colored::control::SHOULD_COLORIZE.should_colorize() {
        table.force_no_tty();
    }
    table.set_header(
        HEADERS
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan)),
    );
    for row in stats {
        table.add_row(row_cells(row));
    }
    for i in 1..HEADERS.len() {
        if let Some(column) = table.column_mut(i) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table.to_string()
}

pub fn print_report(report: &RunReport, dry_run: bool) {
    println!();
    println!("{}", render_stats(&report.stats));

    let summary = format!("{} events generated", report.events.len());
    if report.cancelled {
        println!("  {}  {} (interrupted, nothing sent)", "⚠".yellow(), summary);
    } else if dry_run {
        println!("  {}  {} (dry run, nothing sent)", "➜".green(), summary);
    } else {
        println!(
            "  {}  {}, {} sent to Insights",
            "➜".green(),
            summary,
            report.delivered.to_string().cyan()
        );
    }
}

pub fn print_recommend_summary(records: usize, events: &RecommendEvents, similar: &Path, fbt: &Path) {
    println!();
    println!("  {}  {} records browsed", "➜".green(), records.to_string().cyan());
    println!(
        "  {}  {} clicks written to {}",
        "➜".green(),
        events.similar.len().to_string().cyan(),
        similar.display()
    );
    println!(
        "  {}  {} conversions written to {}",
        "➜".green(),
        events.fbt.len().to_string().cyan(),
        fbt.display()
    );
}
