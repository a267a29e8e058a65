//! Kernel-regression evaluation.
//!
//! Pipeline for a feature matrix `X` (`n × M`) and a model trained with
//! `M' ≥ M` predictors:
//!
//!   1. project the model artifacts onto their first `M` columns
//!   2. normalize: `X / scale`
//!   3. center: `− mean`
//!   4. kernel matrix `K[i,j] = k(x_i, c_j)` against the training centers
//!   5. `raw = K · coefficients`
//!
//! The output is the raw float vector in input row order. Clipping and
//! integer conversion belong to the method registry.
#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::error::{Result, SliperError};
use crate::matrix::{dot, sq_dist, Matrix};
use crate::model::{KernelKind, TrainedModel};

/// Kernel value between one centered test row and one training center.
///
/// The gaussian kernel uses the square of the squared distance.
#[inline]
pub fn kernel_value(kind: KernelKind, param: f64, x: &[f64], c: &[f64]) -> f64 {
    match kind {
        KernelKind::Linear => dot(x, c),
        KernelKind::Polynomial => (dot(x, c) + 1.0).powf(param),
        KernelKind::Gaussian => {
            let d = sq_dist(x, c);
            (-(d * d) / (2.0 * param * param)).exp()
        }
    }
}

/// Gram matrix between the rows of `x1` (`n × M`) and `x2` (`k × M`).
pub fn kernel_matrix(x1: &Matrix, x2: &Matrix, kind: KernelKind, param: f64) -> Result<Matrix> {
    if x1.cols != x2.cols {
        return Err(SliperError::shape_mismatch("kernel center columns", x2.cols, x1.cols));
    }
    let data = x1
        .iter_rows()
        .flat_map(|xi| x2.iter_rows().map(move |cj| kernel_value(kind, param, xi, cj)))
        .collect();
    Matrix::new(data, x1.rows, x2.rows)
}

/// Divide by the scale vector and subtract the mean, column by column.
///
/// `scale` and `mean` must already be projected to `features.cols`.
pub fn normalize_and_center(features: &Matrix, scale: &[f64], mean: &[f64]) -> Result<Matrix> {
    if scale.len() != features.cols {
        return Err(SliperError::shape_mismatch("scale columns", features.cols, scale.len()));
    }
    if mean.len() != features.cols {
        return Err(SliperError::shape_mismatch("mean columns", features.cols, mean.len()));
    }
    if let Some(column) = scale.iter().position(|&s| s == 0.0) {
        return Err(SliperError::Division { column });
    }

    let mut out = features.clone();
    for r in 0..out.rows {
        for c in 0..out.cols {
            let v = out.get(r, c) / scale[c] - mean[c];
            out.set(r, c, v);
        }
    }
    Ok(out)
}

/// Evaluate the model for every row of `features`.
pub fn predict(features: &Matrix, model: &TrainedModel) -> Result<Vec<f64>> {
    let projected = model.project(features.cols)?;
    let centered = normalize_and_center(features, &projected.scale, &projected.mean)?;

    if centered.cols != projected.center.cols {
        return Err(SliperError::shape_mismatch(
            "kernel center columns",
            projected.center.cols,
            centered.cols,
        ));
    }
    if projected.coefficients.len() != projected.center.rows {
        return Err(SliperError::shape_mismatch(
            "kernel coefficients",
            projected.center.rows,
            projected.coefficients.len(),
        ));
    }

    let kind = projected.kernel_kind;
    let param = projected.exponent;
    let center = &projected.center;
    let coefficients = &projected.coefficients;

    let eval_row = |i: usize| -> f64 {
        let xi = centered.row(i);
        (0..center.rows)
            .map(|j| kernel_value(kind, param, xi, center.row(j)) * coefficients[j])
            .sum()
    };

    #[cfg(feature = "threading")]
    let raw: Vec<f64> = (0..centered.rows).into_par_iter().map(eval_row).collect();
    #[cfg(not(feature = "threading"))]
    let raw: Vec<f64> = (0..centered.rows).map(eval_row).collect();

    Ok(raw)
}
