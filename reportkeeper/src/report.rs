// reportkeeper/src/report.rs
//! Run summary output: one table row per processed service.

use comfy_table::Table;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use reportkeeper_core::processor::RunSummary;

pub fn print_summary(summary: &RunSummary) {
    let mut table = Table::new();
    table.set_header(vec![
        "Service", "IDs", "Enriched", "Flagged", "Emails", "Failures",
    ]);
    for service in &summary.services {
        table.add_row(vec![
            service.url.clone(),
            service.ids_assigned.to_string(),
            service.enriched.to_string(),
            service.flagged.to_string(),
            service.emails_sent.to_string(),
            service.failures.to_string(),
        ]);
    }
    println!("{table}");

    let failures = summary.total_failures();
    let colored = std::io::stdout().is_terminal();
    let line = if failures == 0 {
        format!("Run {} completed without failures", summary.run_id)
    } else {
        format!("Run {} completed with {} failure(s)", summary.run_id, failures)
    };
    match (failures == 0, colored) {
        (true, true) => println!("{}", line.green()),
        (false, true) => println!("{}", line.red()),
        (_, false) => println!("{line}"),
    }
}
