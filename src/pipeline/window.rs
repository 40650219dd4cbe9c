use anyhow::Result;
use chrono::NaiveDate;

use crate::errors::TicketFlowError;

/// Upper bound on `$top`/`$skip` pages per window. A server that keeps
/// misreporting full pages must not spin the fetch loop forever.
pub const MAX_PAGES: usize = 500;

/// One bounded sub-range of the overall date span, fetched as one or more
/// API calls. Bounds are the ISO timestamps that go into the
/// `createdDate ge .. and createdDate le ..` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: String,
    pub end: String,
}

fn day_start(day: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", day.format("%Y-%m-%d"))
}

fn day_end(day: NaiveDate) -> String {
    format!("{}T23:59:59.999Z", day.format("%Y-%m-%d"))
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        anyhow::bail!(
            "{}",
            TicketFlowError::InvalidDateRange(format!(
                "start date {} is after end date {}",
                start, end
            ))
        );
    }
    Ok(())
}

/// One window per calendar day, covering `[start, end]` inclusive with no
/// gaps and no overlaps.
pub fn daily_windows(start: NaiveDate, end: NaiveDate) -> Result<Vec<FetchWindow>> {
    check_range(start, end)?;

    let mut windows = Vec::new();
    let mut day = start;
    while day <= end {
        windows.push(FetchWindow {
            start: day_start(day),
            end: day_end(day),
        });
        day = day
            .succ_opt()
            .ok_or_else(|| anyhow::anyhow!("date overflow past {}", day))?;
    }
    Ok(windows)
}

/// The whole span as a single window, for offset-paginated fetching.
pub fn range_window(start: NaiveDate, end: NaiveDate) -> Result<FetchWindow> {
    check_range(start, end)?;
    Ok(FetchWindow {
        start: day_start(start),
        end: day_end(end),
    })
}
