//! Observed/forecast partition of a time index around a reference instant.
//!
//! The pivot is floored with `ref_rounding`. From there two sweeps walk
//! outward in blocks of `observed_hours` / `forecast_hours`, each block
//! ending one `ref_frequency` tick before the next so blocks abut without
//! overlap. Blocks are clipped to the index range. Any block whose interval
//! strictly contains the unfloored pivot is relabelled as mixed.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SliperError};
use crate::time_window::{date_range, floor_to, range_ending, range_starting, Frequency, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Observed,
    Forecast,
    Mixed,
}

/// How one side of the pivot is blocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionMode {
    /// One synthetic block of the requested length adjacent to the pivot.
    Unique,
    /// Consecutive blocks over the whole index.
    #[default]
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionSettings {
    pub observed_hours: TimeWindow,
    pub forecast_hours: TimeWindow,
    pub observed_partition: PartitionMode,
    pub forecast_partition: PartitionMode,
    pub ref_frequency: Frequency,
    pub ref_rounding: Frequency,
    pub observed_label: String,
    pub forecast_label: String,
    pub mixed_label: String,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            observed_hours: TimeWindow::hours(24),
            forecast_hours: TimeWindow::hours(48),
            observed_partition: PartitionMode::Multiple,
            forecast_partition: PartitionMode::Multiple,
            ref_frequency: TimeWindow::hours(1),
            ref_rounding: TimeWindow::days(1),
            observed_label: "observed".to_string(),
            forecast_label: "forecast".to_string(),
            mixed_label: "observed_forecast".to_string(),
        }
    }
}

impl PartitionSettings {
    /// Check every window of the settings.
    pub fn validate(&self) -> Result<()> {
        for window in [
            &self.observed_hours,
            &self.forecast_hours,
            &self.ref_frequency,
            &self.ref_rounding,
        ] {
            window.validate()?;
        }
        Ok(())
    }

    fn label(&self, period_type: PeriodType) -> &str {
        match period_type {
            PeriodType::Observed => &self.observed_label,
            PeriodType::Forecast => &self.forecast_label,
            PeriodType::Mixed => &self.mixed_label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub period_type: PeriodType,
    /// Sweep that produced the period; never `Mixed`.
    pub origin: PeriodType,
    /// Label of `period_type` in the configured vocabulary.
    pub period_label: String,
    /// `<origin label>_<id:04>_Period`; unchanged by the mixed relabel.
    pub period_tag: String,
    /// Dense, 1-based, counted outward from the pivot per sweep.
    pub period_id: u32,
    pub time_start: NaiveDateTime,
    pub time_end: NaiveDateTime,
    /// Calendar date of `time_start`.
    pub time_key: NaiveDate,
    /// `ref_frequency` ticks from `time_start` to `time_end`.
    pub time_range: Vec<NaiveDateTime>,
    pub time_pivot: NaiveDateTime,
}

impl TimePeriod {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.time_start && t <= self.time_end && self.time_range.binary_search(&t).is_ok()
    }
}

/// Partition of one reference run, sorted by `(time_key, period_tag)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTable {
    pub pivot: NaiveDateTime,
    pub periods: Vec<TimePeriod>,
}

impl PeriodTable {
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Type of the period whose `time_range` holds `t`.
    pub fn period_type_at(&self, t: NaiveDateTime) -> Option<PeriodType> {
        self.periods.iter().find(|p| p.contains(t)).map(|p| p.period_type)
    }

    /// Periods produced by the observed sweep, mixed ones included.
    pub fn observed(&self) -> impl Iterator<Item = &TimePeriod> + '_ {
        self.periods.iter().filter(|p| p.origin == PeriodType::Observed)
    }

    /// Periods produced by the forecast sweep, mixed ones included.
    pub fn forecast(&self) -> impl Iterator<Item = &TimePeriod> + '_ {
        self.periods.iter().filter(|p| p.origin == PeriodType::Forecast)
    }

    pub fn mixed(&self) -> impl Iterator<Item = &TimePeriod> + '_ {
        self.periods.iter().filter(|p| p.period_type == PeriodType::Mixed)
    }
}

/// Replace the sweep side of `index` with one synthetic block. Entries on
/// the other side are kept.
fn apply_unique_modes(
    index: &[NaiveDateTime],
    reference: NaiveDateTime,
    settings: &PartitionSettings,
) -> Vec<NaiveDateTime> {
    let mut index = index.to_vec();

    if settings.observed_partition == PartitionMode::Unique {
        let window = settings.observed_hours;
        let mut merged = range_ending(reference, window.amount as usize, &window.tick());
        merged.extend(index.iter().copied().filter(|&t| t > reference));
        index = merged;
        index.sort();
        index.dedup();
    }
    if settings.forecast_partition == PartitionMode::Unique {
        let window = settings.forecast_hours;
        let mut merged: Vec<NaiveDateTime> = index.iter().copied().filter(|&t| t <= reference).collect();
        merged.extend(range_starting(reference, window.amount as usize, &window.tick()));
        index = merged;
        index.sort();
        index.dedup();
    }
    index
}

struct Sweep<'a> {
    settings: &'a PartitionSettings,
    origin: PeriodType,
    start: NaiveDateTime,
    end: NaiveDateTime,
    pivot: NaiveDateTime,
    next_id: u32,
}

impl Sweep<'_> {
    fn emit(&mut self, block_start: NaiveDateTime, block_end: NaiveDateTime) -> Option<TimePeriod> {
        let clipped_start = block_start.max(self.start);
        let clipped_end = block_end.min(self.end);
        if clipped_start > clipped_end {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        let label = self.settings.label(self.origin);
        Some(TimePeriod {
            period_type: self.origin,
            origin: self.origin,
            period_label: label.to_string(),
            period_tag: format!("{label}_{id:04}_Period"),
            period_id: id,
            time_start: clipped_start,
            time_end: clipped_end,
            time_key: clipped_start.date(),
            time_range: date_range(clipped_start, clipped_end, &self.settings.ref_frequency),
            time_pivot: self.pivot,
        })
    }
}

/// `t + delta`, failing with the window that pushed it past the calendar.
fn shift(t: NaiveDateTime, delta: Duration, window: &TimeWindow) -> Result<NaiveDateTime> {
    t.checked_add_signed(delta)
        .ok_or_else(|| SliperError::InvalidTimeWindow {
            input: window.to_string(),
            reason: "block runs past the supported calendar range",
        })
}

/// Partition `index` around `pivot`.
///
/// An empty index yields an empty table.
pub fn divide_time_range(
    index: &[NaiveDateTime],
    pivot: NaiveDateTime,
    settings: &PartitionSettings,
) -> Result<PeriodTable> {
    settings.validate()?;
    let reference = floor_to(pivot, &settings.ref_rounding);
    let mut index = apply_unique_modes(index, reference, settings);
    index.sort();

    let (Some(&start), Some(&end)) = (index.first(), index.last()) else {
        return Ok(PeriodTable {
            pivot,
            periods: Vec::new(),
        });
    };

    let tick = settings.ref_frequency.duration();
    let obs_block = settings.observed_hours.duration();
    let fc_block = settings.forecast_hours.duration();
    let mut periods = Vec::new();

    let mut observed = Sweep {
        settings,
        origin: PeriodType::Observed,
        start,
        end,
        pivot,
        next_id: 1,
    };
    let obs_window = &settings.observed_hours;
    let mut current_end = reference;
    while current_end >= start {
        let current_start = shift(shift(current_end, -obs_block, obs_window)?, tick, obs_window)?;
        periods.extend(observed.emit(current_start, current_end));
        match current_start.checked_sub_signed(tick) {
            Some(t) => current_end = t,
            None => break,
        }
    }

    let mut forecast = Sweep {
        origin: PeriodType::Forecast,
        next_id: 1,
        ..observed
    };
    let fc_window = &settings.forecast_hours;
    let mut next_start = reference.checked_add_signed(tick);
    while let Some(current_start) = next_start.filter(|&t| t <= end) {
        let current_end = shift(shift(current_start, fc_block, fc_window)?, -tick, fc_window)?;
        periods.extend(forecast.emit(current_start, current_end));
        next_start = current_end.checked_add_signed(tick);
    }

    for period in &mut periods {
        if period.time_start < pivot && pivot < period.time_end {
            period.period_type = PeriodType::Mixed;
            period.period_label = settings.mixed_label.clone();
        }
    }

    periods.sort_by(|a, b| {
        a.time_key
            .cmp(&b.time_key)
            .then_with(|| a.period_tag.cmp(&b.period_tag))
    });

    debug!(
        pivot = %pivot,
        reference = %reference,
        periods = periods.len(),
        "time range divided"
    );

    Ok(PeriodTable { pivot, periods })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn hourly(from: NaiveDateTime, to: NaiveDateTime) -> Vec<NaiveDateTime> {
        date_range(from, to, &TimeWindow::hours(1))
    }

    #[test]
    fn pivot_inside_first_forecast_block_is_mixed() {
        let index = hourly(at(8, 0), at(13, 0));
        let table = divide_time_range(&index, at(10, 6), &PartitionSettings::default()).unwrap();

        let mixed: Vec<&TimePeriod> = table.mixed().collect();
        assert_eq!(mixed.len(), 1);
        let p = mixed[0];
        assert!(p.time_start <= at(10, 6) && at(10, 6) <= p.time_end);
        assert_eq!(p.period_tag, "forecast_0001_Period");
        assert_eq!(p.period_label, "observed_forecast");
        assert_eq!((p.time_start, p.time_end), (at(10, 1), at(12, 0)));
    }

    #[test]
    fn blocks_abut_and_cover_the_index_once() {
        let index = hourly(at(8, 0), at(13, 0));
        let table = divide_time_range(&index, at(10, 6), &PartitionSettings::default()).unwrap();

        let mut covered: Vec<NaiveDateTime> = table
            .periods
            .iter()
            .flat_map(|p| p.time_range.iter().copied())
            .collect();
        covered.sort();
        assert_eq!(covered, index);
    }

    #[test]
    fn ids_are_dense_and_tags_padded() {
        let index = hourly(at(7, 0), at(10, 0));
        let table = divide_time_range(&index, at(10, 0), &PartitionSettings::default()).unwrap();

        let mut ids: Vec<u32> = table.observed().map(|p| p.period_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(table.forecast().next().is_none());
        let tags: Vec<&str> = table.periods.iter().map(|p| p.period_tag.as_str()).collect();
        // Blocks 3 and 4 both start on Jan 7, so the tag decides.
        assert_eq!(
            tags,
            vec![
                "observed_0003_Period",
                "observed_0004_Period",
                "observed_0002_Period",
                "observed_0001_Period"
            ]
        );
        let oldest = &table.periods[1];
        assert_eq!((oldest.time_start, oldest.time_end), (at(7, 0), at(7, 0)));
    }

    #[test]
    fn custom_labels_flow_into_tags() {
        let settings = PartitionSettings {
            observed_label: "obs".into(),
            forecast_label: "fcst".into(),
            ..PartitionSettings::default()
        };
        let index = hourly(at(9, 0), at(11, 0));
        let table = divide_time_range(&index, at(10, 0), &settings).unwrap();
        assert!(table.periods.iter().any(|p| p.period_tag == "obs_0001_Period"));
        assert!(table.periods.iter().any(|p| p.period_tag == "fcst_0001_Period"));
    }

    #[test]
    fn unique_observed_synthesizes_one_block() {
        let settings = PartitionSettings {
            observed_hours: TimeWindow::hours(6),
            observed_partition: PartitionMode::Unique,
            ..PartitionSettings::default()
        };
        let index = hourly(at(10, 0), at(10, 12));
        let table = divide_time_range(&index, at(10, 0), &settings).unwrap();

        let observed: Vec<&TimePeriod> = table.observed().collect();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].time_start, at(9, 19));
        assert_eq!(observed[0].time_end, at(10, 0));
        assert_eq!(observed[0].time_range.len(), 6);
    }

    #[test]
    fn unique_forecast_keeps_observed_side() {
        let settings = PartitionSettings {
            forecast_hours: TimeWindow::hours(3),
            forecast_partition: PartitionMode::Unique,
            ..PartitionSettings::default()
        };
        let index = hourly(at(9, 12), at(12, 0));
        let table = divide_time_range(&index, at(10, 0), &settings).unwrap();

        let forecast: Vec<&TimePeriod> = table.forecast().collect();
        assert_eq!(forecast.len(), 1);
        assert_eq!((forecast[0].time_start, forecast[0].time_end), (at(10, 1), at(10, 2)));
        assert_eq!(table.observed().count(), 1);
        assert_eq!(table.period_type_at(at(11, 0)), None);
    }

    #[test]
    fn lookup_by_timestamp() {
        let index = hourly(at(9, 0), at(11, 0));
        let table = divide_time_range(&index, at(10, 0), &PartitionSettings::default()).unwrap();
        assert_eq!(table.period_type_at(at(9, 10)), Some(PeriodType::Observed));
        assert_eq!(table.period_type_at(at(10, 5)), Some(PeriodType::Forecast));
        assert_eq!(table.period_type_at(at(20, 0)), None);
    }

    #[test]
    fn oversized_windows_are_rejected_before_sweeping() {
        let t = at(10, 0);
        let settings = PartitionSettings {
            observed_hours: TimeWindow::days(999_999_999),
            ..PartitionSettings::default()
        };
        assert!(matches!(
            divide_time_range(&[t], t, &settings),
            Err(SliperError::InvalidTimeWindow { .. })
        ));

        let json = r#"{"observed_hours": "999999999d"}"#;
        assert!(serde_json::from_str::<PartitionSettings>(json).is_err());
    }

    #[test]
    fn blocks_past_the_calendar_start_are_an_error() {
        let first = NaiveDateTime::MIN;
        let index = vec![first, first + Duration::hours(6)];
        let err = divide_time_range(&index, index[1], &PartitionSettings::default()).unwrap_err();
        assert!(matches!(err, SliperError::InvalidTimeWindow { .. }));
    }

    #[test]
    fn empty_index_gives_empty_table() {
        let table = divide_time_range(&[], at(10, 0), &PartitionSettings::default()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn settings_parse_from_json_with_defaults() {
        let s: PartitionSettings =
            serde_json::from_str(r#"{"observed_hours": "12h", "forecast_partition": "unique"}"#).unwrap();
        assert_eq!(s.observed_hours, TimeWindow::hours(12));
        assert_eq!(s.forecast_hours, TimeWindow::hours(48));
        assert_eq!(s.forecast_partition, PartitionMode::Unique);
        assert_eq!(s.ref_rounding, TimeWindow::days(1));
    }
}
