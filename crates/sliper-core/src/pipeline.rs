//! One reference-time run: analysis filter, partition, per-area prediction
//! and classification.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::alert::{classify, Classification};
use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SliperError};
use crate::features::FeatureTable;
use crate::method::{select_method, PredictionMethod};
use crate::model::TrainedModel;
use crate::partition::{divide_time_range, PeriodTable, PeriodType};

/// Order of [`RunOutput::records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrder {
    /// Same order as the feature table.
    #[default]
    Input,
    /// Domain ascending, then day of year descending, as the kernel saw them.
    Kernel,
}

/// One classified prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub domain: String,
    pub timestamp: NaiveDateTime,
    pub predicted_count: u64,
    /// `None` when the count matched no band.
    pub alert_id: Option<i64>,
    pub alert_color: Option<String>,
    pub alert_rgba_string: Option<String>,
    pub period_type: PeriodType,
}

/// Result of [`Forecaster::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub time_run: NaiveDateTime,
    /// One record per analysed feature row, ordered by the configured
    /// [`RecordOrder`].
    pub records: Vec<PredictionRecord>,
    pub periods: PeriodTable,
    pub diagnostics: Diagnostics,
}

/// Configured engine. Holds only read-only state, so one instance can serve
/// concurrent runs.
#[derive(Debug, Clone)]
pub struct Forecaster {
    config: RunConfig,
    method: PredictionMethod,
}

impl Forecaster {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let (name, params) = select_method(&config.methods)?;
        let method = PredictionMethod::from_selection(&name, &params)?;
        info!(method = %name, areas = config.areas.len(), "forecaster configured");
        Ok(Self { config, method })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn method(&self) -> &PredictionMethod {
        &self.method
    }

    /// Predict and classify every feature row for the run at `time_run`.
    ///
    /// Fails as a whole: no partial output is returned.
    pub fn run(&self, time_run: NaiveDateTime, features: &FeatureTable, model: &TrainedModel) -> Result<RunOutput> {
        let _span = info_span!("run", time_run = %time_run).entered();
        features.validate()?;
        model.validate()?;

        let mut diag = Diagnostics::new();
        diag.method = self.method.name().to_string();

        let kept = self.analysed_rows(time_run, features, &mut diag)?;
        let table = features.subset(&kept);

        let domains = table.domains();
        if let Some(unknown) = domains.iter().find(|d| self.config.areas.get(d).is_none()) {
            return Err(SliperError::UnknownDomain(unknown.clone()));
        }
        for area in self.config.areas.domains() {
            if !domains.iter().any(|d| d == area) {
                diag.note(format!("Area \"{area}\" has no feature rows"));
            }
        }

        let periods = divide_time_range(&table.timestamps(), time_run, &self.config.partition)?;
        let attrs = model.to_attributes();

        let mut indexed = Vec::with_capacity(table.len());
        let mut outside_periods = 0usize;

        for domain in &domains {
            info!(area = %domain, "area started");
            let rows = table.domain_rows(domain);
            let area_table = table.subset(&rows);

            let mut area_diag = Diagnostics::new();
            let bundle = self.method.organize_datasets_in(&area_table, &attrs, &mut area_diag)?;
            let raw = self.method.exec(&bundle, &mut area_diag)?;
            let frame = self.method.organize_datasets_out(&raw, &bundle.context)?;
            let counts = frame.predicted_counts()?;

            for ((record, &count), &area_row) in frame.table.records.iter().zip(counts).zip(&frame.source_rows) {
                let classification = classify(domain, count, &self.config.areas, &self.config.styles)?;
                let (alert_id, alert_color, alert_rgba_string) = match classification {
                    Classification::Alert(alert) => (Some(alert.id), Some(alert.color), Some(alert.rgba)),
                    Classification::Undefined => {
                        area_diag.undefined_alerts += 1;
                        (None, None, None)
                    }
                };

                let period_type = periods.period_type_at(record.timestamp).unwrap_or_else(|| {
                    outside_periods += 1;
                    if record.timestamp <= time_run {
                        PeriodType::Observed
                    } else {
                        PeriodType::Forecast
                    }
                });

                indexed.push((
                    kept[rows[area_row]],
                    PredictionRecord {
                        domain: record.domain.clone(),
                        timestamp: record.timestamp,
                        predicted_count: count,
                        alert_id,
                        alert_color,
                        alert_rgba_string,
                        period_type,
                    },
                ));
            }
            debug!(area = %domain, rows = rows.len(), undefined = area_diag.undefined_alerts, "area done");
            diag.merge(area_diag);
        }

        if diag.undefined_alerts > 0 {
            diag.warn(format!(
                "{} predictions matched no alert band and are undefined",
                diag.undefined_alerts
            ));
        }
        if outside_periods > 0 {
            diag.note(format!(
                "{outside_periods} records fall outside every partition period; labelled against the pivot"
            ));
        }

        if self.config.output_order == RecordOrder::Input {
            indexed.sort_by_key(|(source, _)| *source);
        }
        let records: Vec<PredictionRecord> = indexed.into_iter().map(|(_, r)| r).collect();
        info!(records = records.len(), periods = periods.len(), "run complete");

        Ok(RunOutput {
            time_run,
            records,
            periods,
            diagnostics: diag,
        })
    }

    /// Indices of the feature rows inside the analysis window.
    fn analysed_rows(
        &self,
        time_run: NaiveDateTime,
        features: &FeatureTable,
        diag: &mut Diagnostics,
    ) -> Result<Vec<usize>> {
        let all = 0..features.len();
        let Some((start, end)) = self.config.analysis.bounds(Some(time_run))? else {
            return Ok(all.collect());
        };
        let kept: Vec<usize> = all
            .filter(|&i| {
                let t = features.records[i].timestamp;
                t >= start && t <= end
            })
            .collect();
        let dropped = features.len() - kept.len();
        if dropped > 0 {
            diag.note(format!("{dropped} feature rows outside the analysis period {start} .. {end}"));
        }
        Ok(kept)
    }
}
