//! Run configuration document.
//!
//! ```json
//! {
//!   "methods":   { "kernel": { "active": true, "filter_columns": ["rain", "sm"] } },
//!   "partition": { "observed_hours": "24h", "forecast_hours": "48h" },
//!   "analysis":  { "time_period": 30, "time_frequency": "1d" },
//!   "areas":     { "alert_area_a": { "white_range": [0, 0], "...": "..." } },
//!   "styles":    { "white": { "id": 0, "rgb": [255, 255, 255], "opacity": 0.1 } },
//!   "output_order": "input"
//! }
//! ```
//!
//! Every section is optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::alert::{AlertStyles, AlertThresholdTable};
use crate::analysis::AnalysisPeriod;
use crate::error::Result;
use crate::method::{select_method, MethodConfigs};
use crate::partition::PartitionSettings;
use crate::pipeline::RecordOrder;

fn default_methods() -> MethodConfigs {
    let mut kernel = Map::new();
    kernel.insert("active".to_string(), json!(true));
    [("kernel".to_string(), kernel)].into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Defaults to a single active `kernel` method.
    #[serde(default = "default_methods")]
    pub methods: MethodConfigs,
    #[serde(default)]
    pub partition: PartitionSettings,
    #[serde(default)]
    pub analysis: AnalysisPeriod,
    /// Threshold sets keyed by alert area.
    #[serde(default)]
    pub areas: AlertThresholdTable,
    #[serde(default)]
    pub styles: AlertStyles,
    #[serde(default)]
    pub output_order: RecordOrder,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            methods: default_methods(),
            partition: PartitionSettings::default(),
            analysis: AnalysisPeriod::default(),
            areas: AlertThresholdTable::default(),
            styles: AlertStyles::default(),
            output_order: RecordOrder::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Threshold tables are well formed, exactly one method is active and
    /// every time window is within bounds.
    pub fn validate(&self) -> Result<()> {
        self.areas.validate()?;
        select_method(&self.methods)?;
        self.partition.validate()?;
        self.analysis.time_frequency.validate()?;
        self.analysis.time_rounding.validate()?;
        Ok(())
    }
}
