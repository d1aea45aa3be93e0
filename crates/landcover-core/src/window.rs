//! Temporal window generation.
//!
//! Windows start at fixed month offsets from the series start and each spans
//! `step` calendar months. The last window is not clipped to the series end.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// One evaluation window of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalWindow {
    /// Position in the generated sequence.
    pub index: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TemporalWindow {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }

    /// Window range with its end clipped to `limit`.
    pub fn clamped_to(&self, limit: NaiveDate) -> DateRange {
        DateRange::new(self.start, self.end.min(limit))
    }

    /// `"YYYY-MM"` of the window start.
    pub fn label(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }

    /// UTC midnight of the window start.
    pub fn time_start(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn time_start_millis(&self) -> i64 {
        self.time_start().timestamp_millis()
    }
}

fn add_months(date: NaiveDate, months: i64) -> PipelineResult<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs() as u32))
    };
    shifted.ok_or_else(|| PipelineError::InvalidRequest(format!("{date} + {months} months is out of range")))
}

/// Fractional number of calendar months from `a` to `b`.
///
/// Whole months are counted first; the remaining days are expressed as a
/// fraction of the month that follows the last whole-month anchor.
pub fn months_between(a: NaiveDate, b: NaiveDate) -> PipelineResult<f64> {
    if b < a {
        return months_between(b, a).map(|m| -m);
    }
    let mut whole = (b.year() as i64 - a.year() as i64) * 12 + (b.month() as i64 - a.month() as i64);
    let mut anchor = add_months(a, whole)?;
    if anchor > b {
        whole -= 1;
        anchor = add_months(a, whole)?;
    }
    let next = add_months(a, whole + 1)?;
    let rest = (b - anchor).num_days() as f64;
    let span = (next - anchor).num_days() as f64;
    Ok(whole as f64 + rest / span)
}

/// Produce the ordered, non-overlapping windows for `[start, end)`.
///
/// `total = round(months_between(start, end)) - 1`; windows begin at
/// offsets `0, step, 2·step, …` while the offset is `<= total`.
pub fn generate_windows(start: NaiveDate, end: NaiveDate, step: u32) -> PipelineResult<Vec<TemporalWindow>> {
    if step == 0 {
        return Err(PipelineError::InvalidRequest("window step must be at least one month".to_string()));
    }
    if end <= start {
        return Err(PipelineError::InvalidRequest(format!("end date {end} is not after start date {start}")));
    }
    let total = months_between(start, end)?.round() as i64 - 1;
    let mut windows = Vec::new();
    let mut offset = 0i64;
    while offset <= total {
        let ws = add_months(start, offset)?;
        let we = add_months(start, offset + step as i64)?;
        windows.push(TemporalWindow { index: windows.len(), start: ws, end: we });
        offset += step as i64;
    }
    Ok(windows)
}
