//! Analysis window applied to the feature table before prediction.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SliperError};
use crate::time_window::{date_range, range_ending, range_starting, round_to, Frequency, TimeWindow};

/// Analysis period settings.
///
/// Resolution order, first match wins:
/// 1. `time_period` with a reference time: range ending at the rounded reference
/// 2. `time_start` and `time_end`
/// 3. `time_start` and `time_period`
/// 4. `time_end` and `time_period`
///
/// Anything else means no filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPeriod {
    pub time_start: Option<NaiveDateTime>,
    pub time_end: Option<NaiveDateTime>,
    pub time_period: Option<u32>,
    pub time_frequency: Frequency,
    pub time_rounding: Frequency,
}

impl Default for AnalysisPeriod {
    fn default() -> Self {
        Self {
            time_start: None,
            time_end: None,
            time_period: None,
            time_frequency: TimeWindow::days(1),
            time_rounding: TimeWindow::days(1),
        }
    }
}

impl AnalysisPeriod {
    /// Resolve the analysis index for `reference`. `None` disables filtering.
    pub fn index(&self, reference: Option<NaiveDateTime>) -> Result<Option<Vec<NaiveDateTime>>> {
        let freq = &self.time_frequency;

        if let (Some(period), Some(reference)) = (self.time_period, reference) {
            let end = round_to(reference, &self.time_rounding);
            return Ok(Some(range_ending(end, period as usize, freq)));
        }
        if let (Some(start), Some(end)) = (self.time_start, self.time_end) {
            if start > end {
                return Err(SliperError::configuration(format!(
                    "analysis time_start {start} is after time_end {end}"
                )));
            }
            return Ok(Some(date_range(start, end, freq)));
        }
        if let (Some(start), Some(period)) = (self.time_start, self.time_period) {
            return Ok(Some(range_starting(start, period as usize, freq)));
        }
        if let (Some(end), Some(period)) = (self.time_end, self.time_period) {
            return Ok(Some(range_ending(end, period as usize, freq)));
        }
        Ok(None)
    }

    /// First and last instant of the resolved index.
    pub fn bounds(&self, reference: Option<NaiveDateTime>) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        Ok(self
            .index(reference)?
            .and_then(|index| Some((*index.first()?, *index.last()?))))
    }
}
