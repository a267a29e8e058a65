//! Trained kernel-regression artifacts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::binder::{AttrValue, Attributes};
use crate::error::{Result, SliperError};
use crate::matrix::Matrix;

pub const ATTR_TRAINING_CENTER: &str = "training_center";
pub const ATTR_TRAINING_SCALE: &str = "training_scale";
pub const ATTR_TRAINING_MEAN: &str = "training_mean";
pub const ATTR_TRAINING_COEFFICIENT: &str = "training_coefficient";
pub const ATTR_KERNEL_KIND: &str = "kernel_kind";
pub const ATTR_KERNEL_EXPONENT: &str = "kernel_exponent";

/// Kernel family used to compare test rows with training centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// `(x·c + 1)^p`
    Polynomial,
    /// `x·c`
    Linear,
    /// `exp(-(‖x − c‖²)² / 2σ²)`, σ taken from the kernel parameter.
    Gaussian,
}

impl KernelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            KernelKind::Polynomial => "polynomial",
            KernelKind::Linear => "linear",
            KernelKind::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KernelKind {
    type Err = SliperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polynomial" => Ok(KernelKind::Polynomial),
            "linear" => Ok(KernelKind::Linear),
            "gaussian" => Ok(KernelKind::Gaussian),
            other => Err(SliperError::configuration(format!(
                "kernel kind \"{other}\" is not supported (expected polynomial, linear or gaussian)"
            ))),
        }
    }
}

/// Precomputed model consumed read-only by the kernel predictor.
///
/// `center` is `K × M'`; `scale` and `mean` have length `M'`; `coefficients`
/// has length `K`. Predictions may present fewer than `M'` feature columns,
/// in which case every artifact is projected onto its leading columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub center: Matrix,
    pub scale: Vec<f64>,
    pub mean: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub kernel_kind: KernelKind,
    /// Polynomial degree, or σ for the gaussian kernel. Ignored by linear.
    pub exponent: f64,
}

impl TrainedModel {
    /// Assemble and check a model from its parts.
    pub fn new(
        center: Matrix,
        scale: Vec<f64>,
        mean: Vec<f64>,
        coefficients: Vec<f64>,
        kernel_kind: KernelKind,
        exponent: f64,
    ) -> Result<Self> {
        let model = Self {
            center,
            scale,
            mean,
            coefficients,
            kernel_kind,
            exponent,
        };
        model.validate()?;
        Ok(model)
    }

    /// Number of predictor columns the model was trained with (`M'`).
    pub fn width(&self) -> usize {
        self.center.cols
    }

    pub fn n_centers(&self) -> usize {
        self.center.rows
    }

    /// Check that the artifacts agree on `K` and `M'` and that the kernel
    /// parameter is usable.
    pub fn validate(&self) -> Result<()> {
        let (k, m) = (self.center.rows, self.center.cols);
        if self.center.data.len() != k * m {
            return Err(SliperError::invalid_model(format!(
                "center holds {} values for a {k} x {m} matrix",
                self.center.data.len()
            )));
        }
        if self.scale.len() != m {
            return Err(SliperError::invalid_model(format!(
                "scale has {} columns, center has {m}",
                self.scale.len()
            )));
        }
        if self.mean.len() != m {
            return Err(SliperError::invalid_model(format!(
                "mean has {} columns, center has {m}",
                self.mean.len()
            )));
        }
        if self.coefficients.len() != self.center.rows {
            return Err(SliperError::invalid_model(format!(
                "{} coefficients for {} training centers",
                self.coefficients.len(),
                self.center.rows
            )));
        }
        if !self.exponent.is_finite() {
            return Err(SliperError::invalid_model(format!(
                "kernel parameter {} is not finite",
                self.exponent
            )));
        }
        if self.kernel_kind == KernelKind::Gaussian && self.exponent <= 0.0 {
            return Err(SliperError::invalid_model(format!(
                "gaussian sigma must be positive, got {}",
                self.exponent
            )));
        }
        Ok(())
    }

    /// Project `scale`, `mean` and `center` onto their first `m` columns.
    ///
    /// Truncation only, never interpolation. `m` larger than the trained
    /// width is a shape mismatch.
    pub fn project(&self, m: usize) -> Result<TrainedModel> {
        if m > self.width() {
            return Err(SliperError::shape_mismatch(
                "model column projection",
                self.width(),
                m,
            ));
        }
        Ok(TrainedModel {
            center: self.center.truncate_cols(m)?,
            scale: self.scale[..m].to_vec(),
            mean: self.mean[..m].to_vec(),
            coefficients: self.coefficients.clone(),
            kernel_kind: self.kernel_kind,
            exponent: self.exponent,
        })
    }

    /// Loosely-typed view used by the method registry.
    pub fn to_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(ATTR_TRAINING_CENTER.into(), AttrValue::Matrix(self.center.clone()));
        attrs.insert(ATTR_TRAINING_SCALE.into(), AttrValue::Vector(self.scale.clone()));
        attrs.insert(ATTR_TRAINING_MEAN.into(), AttrValue::Vector(self.mean.clone()));
        attrs.insert(
            ATTR_TRAINING_COEFFICIENT.into(),
            AttrValue::Vector(self.coefficients.clone()),
        );
        attrs.insert(
            ATTR_KERNEL_KIND.into(),
            AttrValue::Text(self.kernel_kind.as_str().into()),
        );
        attrs.insert(ATTR_KERNEL_EXPONENT.into(), AttrValue::Float(self.exponent));
        attrs
    }
}
