//! Threshold classification of predicted counts into alert bands.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SliperError};

/// Severity bands in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertBand {
    White,
    Green,
    Yellow,
    Orange,
    Red,
}

impl AlertBand {
    /// Priority order used by [`classify`].
    pub const ALL: [AlertBand; 5] = [
        AlertBand::White,
        AlertBand::Green,
        AlertBand::Yellow,
        AlertBand::Orange,
        AlertBand::Red,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertBand::White => "white",
            AlertBand::Green => "green",
            AlertBand::Yellow => "yellow",
            AlertBand::Orange => "orange",
            AlertBand::Red => "red",
        }
    }
}

impl fmt::Display for AlertBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed range `[min, max]`; `None` leaves that side unbounded.
/// Serialized as a two-element array, e.g. `[14, null]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRange(pub Option<u64>, pub Option<u64>);

impl BandRange {
    pub const fn new(min: Option<u64>, max: Option<u64>) -> Self {
        Self(min, max)
    }

    pub fn min(&self) -> Option<u64> {
        self.0
    }

    pub fn max(&self) -> Option<u64> {
        self.1
    }

    pub fn contains(&self, count: u64) -> bool {
        self.0.map_or(true, |min| count >= min) && self.1.map_or(true, |max| count <= max)
    }
}

/// The five band ranges of one domain.
///
/// Accepts both `white` and the `white_range` key spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSet {
    #[serde(alias = "white_range")]
    pub white: BandRange,
    #[serde(alias = "green_range")]
    pub green: BandRange,
    #[serde(alias = "yellow_range")]
    pub yellow: BandRange,
    #[serde(alias = "orange_range")]
    pub orange: BandRange,
    #[serde(alias = "red_range")]
    pub red: BandRange,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            white: BandRange::new(Some(0), Some(0)),
            green: BandRange::new(Some(1), Some(2)),
            yellow: BandRange::new(Some(3), Some(5)),
            orange: BandRange::new(Some(6), Some(13)),
            red: BandRange::new(Some(14), None),
        }
    }
}

impl ThresholdSet {
    pub fn range(&self, band: AlertBand) -> BandRange {
        match band {
            AlertBand::White => self.white,
            AlertBand::Green => self.green,
            AlertBand::Yellow => self.yellow,
            AlertBand::Orange => self.orange,
            AlertBand::Red => self.red,
        }
    }

    /// First band, in priority order, whose range contains `count`.
    pub fn band_for(&self, count: u64) -> Option<AlertBand> {
        AlertBand::ALL
            .into_iter()
            .find(|&band| self.range(band).contains(count))
    }

    /// Check that the bands cover the non-negative integers, in order,
    /// without gaps or overlaps.
    pub fn validate(&self) -> Result<()> {
        let last = AlertBand::ALL.len() - 1;
        let mut previous_max: Option<u64> = None;

        for (i, band) in AlertBand::ALL.into_iter().enumerate() {
            let range = self.range(band);
            let bad = |reason: String| SliperError::configuration(format!("band \"{band}\" {reason}"));

            if let (Some(min), Some(max)) = (range.min(), range.max()) {
                if min > max {
                    return Err(bad(format!("has min {min} greater than max {max}")));
                }
            }
            match (i, range.min()) {
                (0, None) | (0, Some(0)) => {}
                (0, Some(min)) => {
                    return Err(bad(format!("starts at {min}; counts below it have no band")))
                }
                (_, None) => return Err(bad("is unbounded below but is not the first band".into())),
                (_, Some(min)) => {
                    let expected = match previous_max {
                        Some(m) => Some(m.checked_add(1).ok_or_else(|| {
                            SliperError::configuration(format!(
                                "band \"{band}\" follows a band that ends at the largest count"
                            ))
                        })?),
                        None => None,
                    };
                    if Some(min) != expected {
                        return Err(bad(format!(
                            "starts at {min}, expected {} to follow the previous band",
                            expected.map_or_else(|| "a bounded value".to_string(), |e| e.to_string())
                        )));
                    }
                }
            }
            if range.max().is_none() && i != last {
                return Err(bad("is unbounded above but is not the last band".into()));
            }
            previous_max = range.max();
        }
        Ok(())
    }
}

/// Per-domain threshold sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertThresholdTable {
    areas: BTreeMap<String, ThresholdSet>,
}

impl AlertThresholdTable {
    /// Build a table, validating every domain's bands.
    pub fn new(areas: BTreeMap<String, ThresholdSet>) -> Result<Self> {
        let table = Self { areas };
        table.validate()?;
        Ok(table)
    }

    /// Table without validation. Used to exercise classification of
    /// malformed sets.
    pub fn unchecked(areas: BTreeMap<String, ThresholdSet>) -> Self {
        Self { areas }
    }

    pub fn validate(&self) -> Result<()> {
        for (domain, set) in &self.areas {
            set.validate().map_err(|e| match e {
                SliperError::Configuration { message } => {
                    SliperError::configuration(format!("thresholds of \"{domain}\": {message}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn get(&self, domain: &str) -> Option<&ThresholdSet> {
        self.areas.get(domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> + '_ {
        self.areas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

/// Display attributes of one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStyle {
    pub id: i64,
    pub rgb: [u8; 3],
    pub opacity: f64,
}

impl AlertStyle {
    /// `"r,g,b,opacity"`. Integral opacities keep one decimal (`1.0`).
    pub fn rgba_string(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("{r},{g},{b},{}", format_decimal(self.opacity))
    }
}

fn format_decimal(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Band → style map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertStyles {
    styles: BTreeMap<AlertBand, AlertStyle>,
}

impl AlertStyles {
    pub fn new(styles: BTreeMap<AlertBand, AlertStyle>) -> Self {
        Self { styles }
    }

    pub fn get(&self, band: AlertBand) -> Option<&AlertStyle> {
        self.styles.get(&band)
    }
}

impl Default for AlertStyles {
    fn default() -> Self {
        let rgb = [
            [255, 255, 255],
            [0, 128, 0],
            [255, 255, 0],
            [255, 165, 0],
            [255, 0, 0],
        ];
        let styles = AlertBand::ALL
            .into_iter()
            .zip(rgb)
            .enumerate()
            .map(|(id, (band, rgb))| {
                (
                    band,
                    AlertStyle {
                        id: id as i64,
                        rgb,
                        opacity: 0.1,
                    },
                )
            })
            .collect();
        Self { styles }
    }
}

/// A resolved alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub band: AlertBand,
    pub id: i64,
    pub color: String,
    pub rgba: String,
}

/// Outcome of [`classify`]. `Undefined` means no band contains the count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Alert(Alert),
    Undefined,
}

impl Classification {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Classification::Alert(alert) => Some(alert),
            Classification::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Classification::Undefined)
    }
}

/// Classify `count` for `domain`: first matching band in priority order,
/// styled from `styles`.
pub fn classify(
    domain: &str,
    count: u64,
    thresholds: &AlertThresholdTable,
    styles: &AlertStyles,
) -> Result<Classification> {
    let set = thresholds
        .get(domain)
        .ok_or_else(|| SliperError::UnknownDomain(domain.to_string()))?;

    let Some(band) = set.band_for(count) else {
        return Ok(Classification::Undefined);
    };

    let style = styles
        .get(band)
        .ok_or_else(|| SliperError::StyleNotFound(band.to_string()))?;

    Ok(Classification::Alert(Alert {
        band,
        id: style.id,
        color: band.to_string(),
        rgba: style.rgba_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(set: ThresholdSet) -> AlertThresholdTable {
        AlertThresholdTable::new([("area_a".to_string(), set)].into_iter().collect()).unwrap()
    }

    #[test]
    fn zero_is_white() {
        let c = classify("area_a", 0, &table(ThresholdSet::default()), &AlertStyles::default()).unwrap();
        let alert = c.alert().unwrap();
        assert_eq!(alert.band, AlertBand::White);
        assert_eq!(alert.id, 0);
        assert_eq!(alert.rgba, "255,255,255,0.1");
    }

    #[test]
    fn unbounded_red_catches_large_counts() {
        let t = table(ThresholdSet::default());
        let styles = AlertStyles::default();
        for count in [14, 15, 10_000] {
            let c = classify("area_a", count, &t, &styles).unwrap();
            let alert = c.alert().unwrap();
            assert_eq!(alert.band, AlertBand::Red);
            assert_eq!(alert.id, 4);
            assert_eq!(alert.color, "red");
            assert_eq!(alert.rgba, "255,0,0,0.1");
        }
    }

    #[test]
    fn band_boundaries_follow_default_table() {
        let set = ThresholdSet::default();
        let expected = [
            (0, AlertBand::White),
            (1, AlertBand::Green),
            (2, AlertBand::Green),
            (3, AlertBand::Yellow),
            (5, AlertBand::Yellow),
            (6, AlertBand::Orange),
            (13, AlertBand::Orange),
            (14, AlertBand::Red),
        ];
        for (count, band) in expected {
            assert_eq!(set.band_for(count), Some(band), "count {count}");
        }
    }

    #[test]
    fn unknown_domain_fails() {
        let err = classify("area_z", 1, &table(ThresholdSet::default()), &AlertStyles::default()).unwrap_err();
        assert!(matches!(err, SliperError::UnknownDomain(ref d) if d == "area_z"));
    }

    #[test]
    fn gap_yields_undefined_not_error() {
        let mut set = ThresholdSet::default();
        set.red = BandRange::new(Some(20), None);
        let t = AlertThresholdTable::unchecked([("area_a".to_string(), set)].into_iter().collect());
        let c = classify("area_a", 16, &t, &AlertStyles::default()).unwrap();
        assert!(c.is_undefined());
    }

    #[test]
    fn missing_style_fails() {
        let styles = AlertStyles::new(BTreeMap::new());
        let err = classify("area_a", 3, &table(ThresholdSet::default()), &styles).unwrap_err();
        assert!(matches!(err, SliperError::StyleNotFound(ref b) if b == "yellow"));
    }

    #[test]
    fn band_ending_at_the_largest_count_must_be_last() {
        let mut set = ThresholdSet::default();
        set.orange = BandRange::new(Some(6), Some(u64::MAX));
        set.red = BandRange::new(Some(u64::MAX), None);
        let err = set.validate().unwrap_err();
        assert!(matches!(err, SliperError::Configuration { .. }));
        assert!(err.to_string().contains("largest count"));
    }

    #[test]
    fn overlap_resolves_to_first_band() {
        let mut set = ThresholdSet::default();
        set.green = BandRange::new(Some(0), Some(2));
        assert_eq!(set.band_for(0), Some(AlertBand::White));
        assert!(set.validate().is_err());
    }

    #[test]
    fn validation_rejects_malformed_tables() {
        let mut gap = ThresholdSet::default();
        gap.yellow = BandRange::new(Some(4), Some(5));
        assert!(matches!(gap.validate(), Err(SliperError::Configuration { .. })));

        let mut open_middle = ThresholdSet::default();
        open_middle.orange = BandRange::new(Some(6), None);
        assert!(open_middle.validate().is_err());

        let mut inverted = ThresholdSet::default();
        inverted.green = BandRange::new(Some(2), Some(1));
        assert!(inverted.validate().is_err());

        let mut late_start = ThresholdSet::default();
        late_start.white = BandRange::new(Some(1), Some(0));
        assert!(late_start.validate().is_err());

        let err = AlertThresholdTable::new([("area_b".to_string(), gap)].into_iter().collect()).unwrap_err();
        assert!(err.to_string().contains("area_b"));
    }

    #[test]
    fn unbounded_white_is_accepted() {
        let mut set = ThresholdSet::default();
        set.white = BandRange::new(None, Some(0));
        assert!(set.validate().is_ok());
    }

    #[test]
    fn thresholds_parse_from_range_keys() {
        let json = r#"{
            "white_range": [0, 0], "green_range": [1, 2], "yellow_range": [3, 5],
            "orange_range": [6, 13], "red_range": [14, null]
        }"#;
        let set: ThresholdSet = serde_json::from_str(json).unwrap();
        assert_eq!(set, ThresholdSet::default());
    }

    #[test]
    fn rgba_keeps_decimal_on_integral_opacity() {
        let style = AlertStyle {
            id: 9,
            rgb: [1, 2, 3],
            opacity: 1.0,
        };
        assert_eq!(style.rgba_string(), "1,2,3,1.0");
        let style = AlertStyle { opacity: 0.25, ..style };
        assert_eq!(style.rgba_string(), "1,2,3,0.25");
    }
}
