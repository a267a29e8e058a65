//! `<int><unit>` time windows and calendar helpers.
//!
//! A window is written as an optional positive integer followed by `h`
//! (hours) or `d` (days), case-insensitive: `"24h"`, `"2d"`, `"h"`.
//! Windows longer than [`MAX_WINDOW_DAYS`] are rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{Result, SliperError};

/// Upper bound on any window, about a century.
pub const MAX_WINDOW_DAYS: u32 = 36_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Hour,
    Day,
}

impl TimeUnit {
    pub fn as_char(self) -> char {
        match self {
            TimeUnit::Hour => 'h',
            TimeUnit::Day => 'd',
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            TimeUnit::Hour => Duration::hours(1),
            TimeUnit::Day => Duration::days(1),
        }
    }

    fn max_amount(self) -> u32 {
        match self {
            TimeUnit::Hour => MAX_WINDOW_DAYS * 24,
            TimeUnit::Day => MAX_WINDOW_DAYS,
        }
    }
}

/// A positive amount of hours or days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeWindow {
    pub amount: u32,
    pub unit: TimeUnit,
}

/// Tick of a time index. Same grammar as a block size.
pub type Frequency = TimeWindow;

impl TimeWindow {
    pub const fn hours(amount: u32) -> Self {
        Self {
            amount,
            unit: TimeUnit::Hour,
        }
    }

    pub const fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: TimeUnit::Day,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let code = input.trim().to_ascii_lowercase();
        let invalid = |reason| SliperError::InvalidTimeWindow {
            input: input.to_string(),
            reason,
        };
        if code.is_empty() {
            return Err(invalid("empty window"));
        }

        let split = code.find(|c: char| !c.is_ascii_digit()).unwrap_or(code.len());
        let (digits, unit) = code.split_at(split);
        let amount = if digits.is_empty() {
            1
        } else {
            digits.parse::<u32>().map_err(|_| invalid("amount out of range"))?
        };
        let unit = match unit {
            "h" => TimeUnit::Hour,
            "d" => TimeUnit::Day,
            "" => return Err(invalid("missing unit, expected h or d")),
            _ => return Err(invalid("unsupported unit, expected h or d")),
        };
        let window = Self { amount, unit };
        window.validate()?;
        Ok(window)
    }

    /// Reject zero amounts and windows beyond [`MAX_WINDOW_DAYS`]. Covers
    /// windows built with [`TimeWindow::hours`] or [`TimeWindow::days`].
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason| SliperError::InvalidTimeWindow {
            input: self.to_string(),
            reason,
        };
        if self.amount == 0 {
            return Err(invalid("amount must be positive"));
        }
        if self.amount > self.unit.max_amount() {
            return Err(invalid("window is longer than the supported maximum"));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        match self.unit {
            TimeUnit::Hour => Duration::hours(i64::from(self.amount)),
            TimeUnit::Day => Duration::days(i64::from(self.amount)),
        }
    }

    /// The single-unit tick of this window (`"24h"` → `"1h"`).
    pub fn tick(&self) -> TimeWindow {
        TimeWindow {
            amount: 1,
            unit: self.unit,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.as_char())
    }
}

impl FromStr for TimeWindow {
    type Err = SliperError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = SliperError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TimeWindow> for String {
    fn from(value: TimeWindow) -> Self {
        value.to_string()
    }
}

fn offset_in_step(t: NaiveDateTime, step: &TimeWindow) -> Duration {
    let step_secs = step.duration().num_seconds();
    let secs = t.and_utc().timestamp().rem_euclid(step_secs);
    Duration::seconds(secs) + Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// Largest multiple of `step` (counted from the Unix epoch) not after `t`.
pub fn floor_to(t: NaiveDateTime, step: &TimeWindow) -> NaiveDateTime {
    t - offset_in_step(t, step)
}

/// Smallest multiple of `step` (counted from the Unix epoch) not before `t`.
pub fn ceil_to(t: NaiveDateTime, step: &TimeWindow) -> NaiveDateTime {
    let offset = offset_in_step(t, step);
    if offset.is_zero() {
        t
    } else {
        t - offset + step.duration()
    }
}

/// Nearest multiple of `step`; halfway rounds up.
pub fn round_to(t: NaiveDateTime, step: &TimeWindow) -> NaiveDateTime {
    let floor = floor_to(t, step);
    if (t - floor) * 2 >= step.duration() {
        floor + step.duration()
    } else {
        floor
    }
}

/// `start, start + step, ...` up to and including `end`.
pub fn date_range(start: NaiveDateTime, end: NaiveDateTime, step: &TimeWindow) -> Vec<NaiveDateTime> {
    let delta = step.duration();
    let mut out = Vec::new();
    let mut next = Some(start);
    while let Some(t) = next.filter(|&t| t <= end) {
        out.push(t);
        next = t.checked_add_signed(delta);
    }
    out
}

/// `periods` instants at `step` ending at `end`, ascending.
pub fn range_ending(end: NaiveDateTime, periods: usize, step: &TimeWindow) -> Vec<NaiveDateTime> {
    let delta = step.duration();
    (0..periods)
        .rev()
        .filter_map(|k| end.checked_sub_signed(delta * k as i32))
        .collect()
}

/// `periods` instants at `step` starting at `start`.
pub fn range_starting(start: NaiveDateTime, periods: usize, step: &TimeWindow) -> Vec<NaiveDateTime> {
    let delta = step.duration();
    (0..periods)
        .filter_map(|k| start.checked_add_signed(delta * k as i32))
        .collect()
}

/// Which side of a run a range lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSide {
    Observed,
    Forecast,
}

/// Range of `periods` ticks around `run`: observed ranges end at `run`,
/// forecast ranges start at it.
///
/// A non-positive observed period falls back to one tick; a non-positive
/// forecast period yields `None`. Both cases are recorded in `diag`.
pub fn time_range_around(
    run: NaiveDateTime,
    periods: i64,
    freq: &Frequency,
    side: RangeSide,
    diag: &mut Diagnostics,
) -> Option<Vec<NaiveDateTime>> {
    let periods = if periods > 0 {
        periods as usize
    } else {
        match side {
            RangeSide::Observed => {
                diag.warn(format!("Observed period {periods} must be greater than 0; set to 1"));
                1
            }
            RangeSide::Forecast => {
                diag.warn(format!("Forecast period {periods} must be greater than 0; range skipped"));
                return None;
            }
        }
    };
    Some(match side {
        RangeSide::Observed => range_ending(run, periods, freq),
        RangeSide::Forecast => range_starting(run, periods, freq),
    })
}
