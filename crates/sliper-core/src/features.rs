//! Feature records: one row per (domain, timestamp).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SliperError};
use crate::matrix::Matrix;

/// Name under which the day-of-year joins the numeric columns.
pub const DAY_OF_YEAR_COLUMN: &str = "day_of_the_year";
/// Name of the optional numeric domain index column.
pub const DOMAIN_INDEX_COLUMN: &str = "n_domain";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Alert-area identifier.
    pub domain: String,
    pub timestamp: NaiveDateTime,
    /// Predictor values, aligned with the table's `columns`.
    pub values: Vec<f64>,
    /// 1-based ordinal day of `timestamp`.
    pub day_of_year: u32,
}

impl FeatureRecord {
    /// Build a record, deriving `day_of_year` from the timestamp.
    pub fn new(domain: impl Into<String>, timestamp: NaiveDateTime, values: Vec<f64>) -> Self {
        Self {
            domain: domain.into(),
            timestamp,
            values,
            day_of_year: timestamp.ordinal(),
        }
    }
}

/// Column-named table of feature records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub records: Vec<FeatureRecord>,
}

impl FeatureTable {
    /// Build a table and check its invariants: every record is as wide as
    /// `columns` and each (domain, timestamp) pair occurs once.
    pub fn new(columns: Vec<String>, records: Vec<FeatureRecord>) -> Result<Self> {
        let table = Self { columns, records };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for record in &self.records {
            if record.values.len() != self.columns.len() {
                return Err(SliperError::shape_mismatch(
                    "feature record width",
                    self.columns.len(),
                    record.values.len(),
                ));
            }
            if !seen.insert((record.domain.as_str(), record.timestamp)) {
                return Err(SliperError::state(format!(
                    "duplicate feature row for domain \"{}\" at {}",
                    record.domain, record.timestamp
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct domains in ascending order.
    pub fn domains(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.domain.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct timestamps in ascending order.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        let set: BTreeSet<NaiveDateTime> = self.records.iter().map(|r| r.timestamp).collect();
        set.into_iter().collect()
    }

    /// Copy of the rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self.columns.clone(),
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// Row indices of `domain`, in table order.
    pub fn domain_rows(&self, domain: &str) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.domain == domain)
            .map(|(i, _)| i)
            .collect()
    }

    /// Copy restricted to the named columns, in the given order. A name that
    /// is not a column of this table is a missing attribute.
    pub fn select_columns(&self, names: &[String]) -> Result<FeatureTable> {
        let positions = names
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| SliperError::missing_attribute(name.clone()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let records = self
            .records
            .iter()
            .map(|r| FeatureRecord {
                values: positions.iter().map(|&p| r.values[p]).collect(),
                ..r.clone()
            })
            .collect();
        Ok(FeatureTable {
            columns: names.to_vec(),
            records,
        })
    }

    /// Row order used for kernel evaluation: domain ascending, then
    /// day-of-year descending. Ties keep table order.
    pub fn kernel_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = &self.records[a];
            let rb = &self.records[b];
            ra.domain
                .cmp(&rb.domain)
                .then(rb.day_of_year.cmp(&ra.day_of_year))
        });
        order
    }

    /// Column names of [`FeatureTable::to_matrix`] for the same options.
    pub fn matrix_columns(&self, include_day_of_year: bool, with_group_index: bool) -> Vec<String> {
        let mut names = self.columns.clone();
        if include_day_of_year {
            names.push(DAY_OF_YEAR_COLUMN.to_string());
        }
        if with_group_index {
            names.push(DOMAIN_INDEX_COLUMN.to_string());
        }
        names
    }

    /// Numeric matrix of the predictor columns, optionally followed by the
    /// day-of-year and a per-domain index looked up in `group_index`.
    pub fn to_matrix(
        &self,
        include_day_of_year: bool,
        group_index: Option<&BTreeMap<String, f64>>,
    ) -> Result<Matrix> {
        let extra = usize::from(include_day_of_year) + usize::from(group_index.is_some());
        let cols = self.columns.len() + extra;
        let mut data = Vec::with_capacity(self.records.len() * cols);
        for record in &self.records {
            data.extend_from_slice(&record.values);
            if include_day_of_year {
                data.push(f64::from(record.day_of_year));
            }
            if let Some(index) = group_index {
                let n = index
                    .get(&record.domain)
                    .ok_or_else(|| SliperError::missing_attribute(format!("group_index.{}", record.domain)))?;
                data.push(*n);
            }
        }
        Matrix::new(data, self.records.len(), cols)
    }
}
