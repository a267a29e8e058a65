//! Per-call diagnostics collector.
//!
//! Non-fatal conditions (defaulted parameters, undefined alert bands,
//! records outside every partition period) are pushed here and returned
//! with the result. Each entry is mirrored to `tracing` at the matching level.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Active prediction method, empty until a method is selected.
    pub method: String,
    /// Feature rows presented to the predictor.
    pub n_rows: usize,
    /// Feature columns presented to the predictor (`M`).
    pub n_features: usize,
    /// Classifications that matched no band.
    pub undefined_alerts: usize,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("{message}");
        self.notes.push(message);
    }

    /// Fold another collector into this one. Counters add, messages append
    /// in order, and `method` is taken from `other` when this one is unset.
    pub fn merge(&mut self, other: Diagnostics) {
        if self.method.is_empty() {
            self.method = other.method;
        }
        self.n_rows += other.n_rows;
        self.n_features = self.n_features.max(other.n_features);
        self.undefined_alerts += other.undefined_alerts;
        self.warnings.extend(other.warnings);
        self.notes.extend(other.notes);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
