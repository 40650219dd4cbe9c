pub mod normalize;
pub mod reconcile;
pub mod rename;
pub mod table;
pub mod window;

use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;

use crate::api::tickets::{TicketClient, TicketQuery};
use crate::pipeline::normalize::NormalizedRow;
use crate::pipeline::table::Table;

/// Which ticket shape a run extracts. The two shapes produce separate
/// tables and are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldsMode {
    /// Full ticket shape, one daily window per calendar day.
    Full,
    /// `id` + `actions` only, one offset-paginated sweep over the range.
    ActionsOnly,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub fields_mode: FieldsMode,
    pub team_exclusion: Option<String>,
    pub page_size: usize,
}

/// Outcome of a run. Warnings carry the windows that contributed nothing;
/// the table holds everything the remaining windows produced.
pub struct ExtractReport {
    pub table: Table,
    pub windows_completed: usize,
    pub warnings: Vec<String>,
}

/// Runs the extraction pipeline: windows -> fetch -> normalize ->
/// reconcile. Windows are processed one at a time; a transport error or
/// non-success status on one window is surfaced as a warning and that
/// window contributes zero rows, so partial data wins over total failure.
/// `on_progress(done, total)` fires after every window.
pub async fn run_extraction(
    client: &TicketClient,
    options: &ExtractOptions,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<ExtractReport> {
    let mut rows: Vec<NormalizedRow> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let windows_completed;

    match options.fields_mode {
        FieldsMode::Full => {
            let windows = window::daily_windows(options.start, options.end)?;
            let query = TicketQuery::full(options.team_exclusion.as_deref());
            let total = windows.len();

            for (done, fetch_window) in windows.iter().enumerate() {
                match client.fetch_window(fetch_window, &query).await {
                    Ok(tickets) => {
                        rows.extend(tickets.iter().map(normalize::normalize));
                    }
                    Err(err) => {
                        warnings.push(format!("window {} skipped: {}", fetch_window.start, err));
                    }
                }
                on_progress(done + 1, total);
            }
            windows_completed = total;
        }
        FieldsMode::ActionsOnly => {
            let sweep = window::range_window(options.start, options.end)?;
            let query = TicketQuery::actions_only();

            match client.fetch_paged(&sweep, &query, options.page_size).await {
                Ok(fetch) => {
                    // A failed page ends the sweep early but everything
                    // fetched before it still makes it into the table.
                    if let Some(warning) = fetch.warning {
                        warnings.push(format!("window {}: {}", sweep.start, warning));
                    }
                    for ticket in &fetch.tickets {
                        rows.extend(normalize::normalize_actions(ticket));
                    }
                }
                Err(err) => {
                    warnings.push(format!("window {} skipped: {}", sweep.start, err));
                }
            }
            on_progress(1, 1);
            windows_completed = 1;
        }
    }

    Ok(ExtractReport {
        table: reconcile::reconcile(rows),
        windows_completed,
        warnings,
    })
}

/// Post-hoc row filter on `createdBy_email`: case-insensitive, trimmed
/// exact match against the allow-list. A table without the column keeps
/// no rows, since none can match.
pub fn retain_allowed_emails(table: &mut Table, allowlist: &[String]) {
    let allowed: HashSet<String> = allowlist
        .iter()
        .map(|email| email.trim().to_lowercase())
        .collect();

    let Some(column) = table.column_index("createdBy_email") else {
        table.clear_rows();
        return;
    };

    table.retain_rows(|row| {
        matches!(&row[column], Value::String(email) if allowed.contains(&email.trim().to_lowercase()))
    });
}
