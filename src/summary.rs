//! Plain-text table for the end-of-run report printed by `tabload load`.

use std::{fmt::Write as _, time::Duration};

use crate::loader::RunSummary;

const HEADERS: [&str; 7] = [
    "file", "format", "resumed", "read", "inserted", "dropped", "line",
];

pub fn render_run_summary(summary: &RunSummary, elapsed: Duration) -> String {
    let headers = HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let rows = summary
        .files
        .iter()
        .map(|file| {
            vec![
                file.path.display().to_string(),
                file.format.to_string(),
                file.resume_from.to_string(),
                file.assembly.rows_read.to_string(),
                file.inserts.rows_inserted.to_string(),
                file.inserts.rows_dropped.to_string(),
                file.assembly.final_line.to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let mut output = render_table(&headers, &rows);
    let _ = writeln!(
        output,
        "{} file(s) loaded, {} skipped: {} row(s) inserted, {} dropped in {} failed batch(es)",
        summary.files.len(),
        summary.skipped.len(),
        summary.rows_inserted(),
        summary.rows_dropped(),
        summary.batches_failed()
    );
    let _ = writeln!(output, "Elapsed: {:.3}s", elapsed.as_secs_f64());
    output
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = value.replace(['\n', '\r', '\t'], " ");
            let padding = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}
