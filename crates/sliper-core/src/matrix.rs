use serde::{Deserialize, Serialize};

use crate::error::{Result, SliperError};

/// Dense row-major matrix of f64 values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    /// Row-major values, length `rows × cols`.
    pub data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

/// Wire form of [`Matrix`], shape-checked on the way in.
#[derive(Deserialize)]
struct RawMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = SliperError;

    fn try_from(raw: RawMatrix) -> Result<Self> {
        Matrix::new(raw.data, raw.rows, raw.cols)
    }
}

impl Matrix {
    /// Wrap row-major `data`. Fails when the length disagrees with the shape.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SliperError::shape_mismatch("matrix data", rows * cols, data.len()));
        }
        Ok(Self { data, rows, cols })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Build from nested rows; every row must have the same width.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(SliperError::shape_mismatch("matrix row width", cols, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f64) {
        self.data[row * self.cols + col] = val;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |r| self.row(r))
    }

    /// Copy of the first `cols` columns. Fails if `cols` exceeds the width.
    pub fn truncate_cols(&self, cols: usize) -> Result<Self> {
        if cols > self.cols {
            return Err(SliperError::shape_mismatch("matrix column projection", self.cols, cols));
        }
        if cols == self.cols {
            return Ok(self.clone());
        }
        let mut data = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            data.extend_from_slice(&self.row(r)[..cols]);
        }
        Ok(Self {
            data,
            rows: self.rows,
            cols,
        })
    }
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
