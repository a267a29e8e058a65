//! Soil-slip forecasting core.
//!
//! Predicts landslide counts per alert area from rain and soil-moisture
//! predictors with a precomputed kernel-regression model, classifies each
//! count into an alert band and labels it observed, forecast or mixed
//! relative to the run's reference time.
//!
//! Data flow for one run:
//!
//! ```text
//! FeatureTable ─► PredictionMethod::organize_datasets_in ─► exec (kernel::predict)
//!              ─► organize_datasets_out ─► alert::classify ─► PredictionRecord
//!                                              ▲
//!                       partition::divide_time_range (period labels)
//! ```

pub mod alert;
pub mod analysis;
pub mod binder;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod kernel;
pub mod matrix;
pub mod method;
pub mod model;
pub mod partition;
pub mod pipeline;
pub mod time_window;

pub use alert::{classify, AlertBand, AlertStyle, AlertStyles, AlertThresholdTable, BandRange, Classification, ThresholdSet};
pub use config::RunConfig;
pub use diagnostics::Diagnostics;
pub use error::{Result, SliperError};
pub use features::{FeatureRecord, FeatureTable};
pub use matrix::Matrix;
pub use model::{KernelKind, TrainedModel};
pub use partition::{divide_time_range, PartitionSettings, PeriodTable, PeriodType, TimePeriod};
pub use pipeline::{Forecaster, PredictionRecord, RecordOrder, RunOutput};
pub use time_window::{Frequency, TimeWindow};
