//! Prediction-method registry.
//!
//! Methods are variants of [`PredictionMethod`]. Each variant declares a
//! static parameter schema that the binder resolves before execution, and
//! exposes the three stages the pipeline drives:
//! `organize_datasets_in` → `exec` → `organize_datasets_out`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::binder::{bind, AttrValue, Attributes, ParamDefault, ParamSpec};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SliperError};
use crate::features::FeatureTable;
use crate::kernel;
use crate::model::{
    KernelKind, TrainedModel, ATTR_KERNEL_EXPONENT, ATTR_KERNEL_KIND, ATTR_TRAINING_CENTER,
    ATTR_TRAINING_COEFFICIENT, ATTR_TRAINING_MEAN, ATTR_TRAINING_SCALE,
};

/// Result column written by `organize_datasets_out`.
pub const PREDICTION_FIELD: &str = "soil_slips_prediction";

/// Per-method configuration as read from the run configuration: the
/// `active` flag plus free-form parameters.
pub type MethodConfigs = BTreeMap<String, Map<String, Value>>;

const ACTIVE_FLAG: &str = "active";

// ── Selection ─────────────────────────────────────────────────────────────────

/// Pick the single active method. Returns its name and its parameters with
/// the `active` flag removed.
pub fn select_method(configs: &MethodConfigs) -> Result<(String, Map<String, Value>)> {
    let mut active = Vec::new();
    for (name, cfg) in configs {
        let flag = match cfg.get(ACTIVE_FLAG) {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(SliperError::configuration(format!(
                    "method \"{name}\" has a non-boolean active flag: {other}"
                )))
            }
        };
        if flag {
            active.push((name, cfg));
        }
    }

    match active.as_slice() {
        [] => Err(SliperError::configuration("no active methods found in the configuration")),
        [(name, cfg)] => {
            let params = cfg
                .iter()
                .filter(|(k, _)| k.as_str() != ACTIVE_FLAG)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(((*name).clone(), params))
        }
        many => {
            let names: Vec<&str> = many.iter().map(|(n, _)| n.as_str()).collect();
            Err(SliperError::configuration(format!(
                "multiple active methods found: {names:?}; only one can be active"
            )))
        }
    }
}

// ── Kernel method ─────────────────────────────────────────────────────────────

/// Attributes `organize_datasets_in` requires for the kernel method.
pub const KERNEL_REQUIRED_ATTRIBUTES: [&str; 6] = [
    ATTR_TRAINING_CENTER,
    ATTR_TRAINING_SCALE,
    ATTR_TRAINING_MEAN,
    ATTR_TRAINING_COEFFICIENT,
    ATTR_KERNEL_KIND,
    ATTR_KERNEL_EXPONENT,
];

const KERNEL_DATASETS: &str = "kernel_datasets";
const KERNEL_CENTER: &str = "kernel_matrix_center";
const KERNEL_SCALE: &str = "kernel_matrix_max";
const KERNEL_MEAN: &str = "kernel_matrix_mean";
const KERNEL_COEFFICIENT: &str = "kernel_coefficient";
const KERNEL_TYPE: &str = "kernel_type";
const KERNEL_EXPONENT: &str = "kernel_exponent";

/// Declared parameter schema of the kernel evaluation step.
pub const KERNEL_PARAMS: &[ParamSpec] = &[
    ParamSpec::required(KERNEL_DATASETS),
    ParamSpec::with_default(KERNEL_CENTER, ParamDefault::Null),
    ParamSpec::with_default(KERNEL_SCALE, ParamDefault::Null),
    ParamSpec::with_default(KERNEL_MEAN, ParamDefault::Null),
    ParamSpec::with_default(KERNEL_COEFFICIENT, ParamDefault::Null),
    ParamSpec::with_default(KERNEL_TYPE, ParamDefault::Text("polynomial")),
    ParamSpec::with_default(KERNEL_EXPONENT, ParamDefault::Int(3)),
];

/// Source attribute → kernel parameter name.
const KERNEL_KEY_MAP: [(&str, &str); 6] = [
    (ATTR_TRAINING_CENTER, KERNEL_CENTER),
    (ATTR_TRAINING_SCALE, KERNEL_SCALE),
    (ATTR_TRAINING_MEAN, KERNEL_MEAN),
    (ATTR_TRAINING_COEFFICIENT, KERNEL_COEFFICIENT),
    (ATTR_KERNEL_KIND, KERNEL_TYPE),
    (ATTR_KERNEL_EXPONENT, KERNEL_EXPONENT),
];

/// Feature-table preparation options of the kernel method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSettings {
    /// Predictor columns to keep, in order. `None` keeps every column.
    pub filter_columns: Option<Vec<String>>,
    /// Domain → numeric index appended as an extra column.
    pub group_index: Option<BTreeMap<String, f64>>,
    /// Append the day-of-year as the last predictor before the group index.
    pub include_day_of_year: bool,
}

impl KernelSettings {
    const KEYS: [&'static str; 3] = ["filter_columns", "group_index", "include_day_of_year"];
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            filter_columns: None,
            group_index: None,
            include_day_of_year: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelMethod {
    pub settings: KernelSettings,
    /// Method parameters that override model attributes (`kernel_kind`,
    /// `kernel_exponent`, ...).
    pub params: Attributes,
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// The available prediction methods.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionMethod {
    Kernel(KernelMethod),
}

/// Carrier passed from `organize_datasets_in` to `organize_datasets_out`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodContext {
    /// Copy of the feature table in kernel row order.
    pub carrier: Option<FeatureTable>,
    /// For each carrier row, its row index in the caller's table.
    pub source_rows: Vec<usize>,
}

/// Input bundle of one method execution.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBundle {
    pub datasets: Attributes,
    pub context: MethodContext,
}

/// Feature table with result columns attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionFrame {
    pub table: FeatureTable,
    pub source_rows: Vec<usize>,
    pub results: BTreeMap<String, Vec<u64>>,
}

impl PredictionFrame {
    pub fn predicted_counts(&self) -> Result<&[u64]> {
        self.results
            .get(PREDICTION_FIELD)
            .map(Vec::as_slice)
            .ok_or_else(|| SliperError::state(format!("result column \"{PREDICTION_FIELD}\" is missing")))
    }
}

impl PredictionMethod {
    /// Instantiate the method selected by [`select_method`].
    pub fn from_selection(name: &str, params: &Map<String, Value>) -> Result<Self> {
        match name {
            "kernel" | "fx_kernel" => {
                let settings: KernelSettings = serde_json::from_value(Value::Object(params.clone()))?;
                let mut attrs = Attributes::new();
                for (key, value) in params {
                    if KernelSettings::KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    attrs.insert(key.clone(), AttrValue::from_json(key, value)?);
                }
                Ok(PredictionMethod::Kernel(KernelMethod { settings, params: attrs }))
            }
            other => Err(SliperError::configuration(format!(
                "method \"{other}\" is not expected by the registry"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PredictionMethod::Kernel(_) => "kernel",
        }
    }

    pub fn declared_params(&self) -> &'static [ParamSpec] {
        match self {
            PredictionMethod::Kernel(_) => KERNEL_PARAMS,
        }
    }

    /// Validate attributes and build the method's input bundle. The caller's
    /// table is copied, never modified.
    pub fn organize_datasets_in(
        &self,
        table: &FeatureTable,
        attrs: &Attributes,
        diag: &mut Diagnostics,
    ) -> Result<MethodBundle> {
        match self {
            PredictionMethod::Kernel(method) => kernel_datasets_in(method, table, attrs, diag),
        }
    }

    /// Bind the declared parameters and run the predictor. Predictor errors
    /// are returned unchanged.
    pub fn exec(&self, bundle: &MethodBundle, diag: &mut Diagnostics) -> Result<Vec<f64>> {
        match self {
            PredictionMethod::Kernel(_) => kernel_exec(bundle, diag),
        }
    }

    /// Clip at zero, round half to even into integer counts and attach them to the carrier
    /// table under [`PREDICTION_FIELD`].
    pub fn organize_datasets_out(&self, raw: &[f64], context: &MethodContext) -> Result<PredictionFrame> {
        let table = context
            .carrier
            .as_ref()
            .ok_or_else(|| SliperError::state("method context carries no feature table"))?;
        if raw.len() != table.len() {
            return Err(SliperError::shape_mismatch("prediction rows", table.len(), raw.len()));
        }

        let counts: Vec<u64> = raw
            .iter()
            .map(|&v| if v.is_nan() { 0 } else { v.max(0.0).round_ties_even() as u64 })
            .collect();

        let mut results = BTreeMap::new();
        results.insert(PREDICTION_FIELD.to_string(), counts);
        Ok(PredictionFrame {
            table: table.clone(),
            source_rows: context.source_rows.clone(),
            results,
        })
    }
}

fn kernel_datasets_in(
    method: &KernelMethod,
    table: &FeatureTable,
    attrs: &Attributes,
    diag: &mut Diagnostics,
) -> Result<MethodBundle> {
    let mut merged = attrs.clone();
    merged.extend(method.params.iter().map(|(k, v)| (k.clone(), v.clone())));

    for name in KERNEL_REQUIRED_ATTRIBUTES {
        if merged.get(name).map_or(true, AttrValue::is_null) {
            return Err(SliperError::missing_attribute(name));
        }
    }

    let prepared = match &method.settings.filter_columns {
        Some(columns) => table.select_columns(columns)?,
        None => table.clone(),
    };
    let order = prepared.kernel_order();
    let sorted = prepared.subset(&order);
    let matrix = sorted.to_matrix(
        method.settings.include_day_of_year,
        method.settings.group_index.as_ref(),
    )?;

    let columns = sorted.matrix_columns(
        method.settings.include_day_of_year,
        method.settings.group_index.is_some(),
    );
    debug!(rows = matrix.rows, columns = ?columns, "kernel datasets organized");
    diag.n_rows += matrix.rows;
    diag.n_features = diag.n_features.max(matrix.cols);

    let mut datasets = Attributes::new();
    datasets.insert(KERNEL_DATASETS.to_string(), AttrValue::Matrix(matrix));
    for (source, target) in KERNEL_KEY_MAP {
        if let Some(value) = merged.remove(source) {
            datasets.insert(target.to_string(), value);
        }
    }

    Ok(MethodBundle {
        datasets,
        context: MethodContext {
            carrier: Some(sorted),
            source_rows: order,
        },
    })
}

fn kernel_exec(bundle: &MethodBundle, diag: &mut Diagnostics) -> Result<Vec<f64>> {
    let args = bind(KERNEL_PARAMS, bundle.datasets.clone(), diag);

    let features = args.get(KERNEL_DATASETS).as_matrix(KERNEL_DATASETS)?;
    let center = args.get(KERNEL_CENTER).as_matrix(KERNEL_CENTER)?.clone();
    let scale = args.get(KERNEL_SCALE).to_vector(KERNEL_SCALE)?;
    let mean = args.get(KERNEL_MEAN).to_vector(KERNEL_MEAN)?;
    let coefficients = args.get(KERNEL_COEFFICIENT).to_vector(KERNEL_COEFFICIENT)?;
    let kind: KernelKind = args.get(KERNEL_TYPE).as_text(KERNEL_TYPE)?.parse()?;
    let exponent = args.get(KERNEL_EXPONENT).as_float(KERNEL_EXPONENT)?;

    let model = TrainedModel::new(center, scale, mean, coefficients, kind, exponent)?;
    kernel::predict(features, &model)
}
