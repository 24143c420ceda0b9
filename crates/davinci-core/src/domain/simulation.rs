//! Simulation output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::config::Fidelity;
use crate::domain::digest::PayloadHasher;
use crate::domain::error::{StageError, StageResult};
use crate::domain::plan::PlanResult;

/// A named table of numeric samples (one CSV file on disk).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSeries {
    pub name: String,
    pub columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl DataSeries {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. The row width must match the column count.
    pub fn push_row(&mut self, row: Vec<f64>) -> StageResult<()> {
        if row.len() != self.columns.len() {
            return Err(StageError::internal(format!(
                "series {} expects {} columns, got {}",
                self.name,
                self.columns.len(),
                row.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Samples of one column; `None` if the column is unknown or a row is short.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.rows.iter().map(|r| r.get(idx).copied()).collect()
    }

    /// Render as CSV with a header row. Values use shortest round-trip formatting.
    pub fn to_csv(&self) -> String {
        let mut out = self.columns.join(",");
        out.push('\n');
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }
}

/// Output of `simulate()`: a deterministic function of `(PlanResult, seed)`.
///
/// Fields are private; the value is immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    slug: String,
    seed: u64,
    fidelity: Fidelity,
    plan_digest: String,
    metrics: BTreeMap<String, f64>,
    series: Vec<DataSeries>,
    safety_factor: f64,
    payload_digest: String,
}

impl SimulationResult {
    /// Start building a result for `plan` under `seed`.
    pub fn builder(plan: &PlanResult, seed: u64) -> StageResult<SimulationBuilder> {
        Ok(SimulationBuilder {
            slug: plan.slug.clone(),
            seed,
            fidelity: plan.fidelity,
            plan_digest: plan.digest()?,
            metrics: BTreeMap::new(),
            series: Vec::new(),
            safety_factor: None,
        })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    pub fn plan_digest(&self) -> &str {
        &self.plan_digest
    }

    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Metric lookup that fails with `MissingMetric`.
    pub fn require_metric(&self, name: &str) -> StageResult<f64> {
        self.metric(name).ok_or_else(|| StageError::MissingMetric {
            name: name.to_string(),
        })
    }

    pub fn series(&self) -> &[DataSeries] {
        &self.series
    }

    pub fn series_named(&self, name: &str) -> Option<&DataSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Minimum structural safety factor found by the simulation.
    pub fn safety_factor(&self) -> f64 {
        self.safety_factor
    }

    /// SHA-256 over the bit patterns of every numeric payload.
    pub fn payload_digest(&self) -> &str {
        &self.payload_digest
    }
}

/// Accumulates metrics and series, then seals them into a [`SimulationResult`].
#[derive(Debug)]
pub struct SimulationBuilder {
    slug: String,
    seed: u64,
    fidelity: Fidelity,
    plan_digest: String,
    metrics: BTreeMap<String, f64>,
    series: Vec<DataSeries>,
    safety_factor: Option<f64>,
}

impl SimulationBuilder {
    pub fn metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn series(mut self, series: DataSeries) -> Self {
        self.series.push(series);
        self
    }

    pub fn safety_factor(mut self, value: f64) -> Self {
        self.safety_factor = Some(value);
        self
    }

    /// Validate and seal the result.
    ///
    /// A non-finite metric, sample or safety factor means the numerics broke
    /// down, which is reported as a divergence rather than a result.
    pub fn finish(self) -> StageResult<SimulationResult> {
        let safety_factor = self.safety_factor.ok_or_else(|| StageError::MissingMetric {
            name: "safety_factor".to_string(),
        })?;

        let non_finite = |what: String| StageError::SimulationDivergence {
            solver: format!("result_validation:{what}"),
            iterations: 0,
            residual: f64::MAX,
        };

        if !safety_factor.is_finite() || safety_factor < 0.0 {
            return Err(non_finite("safety_factor".to_string()));
        }
        for (name, value) in &self.metrics {
            if !value.is_finite() {
                return Err(non_finite(name.clone()));
            }
        }
        for series in &self.series {
            if series.rows.iter().flatten().any(|v| !v.is_finite()) {
                return Err(non_finite(series.name.clone()));
            }
        }

        let mut hasher = PayloadHasher::new();
        hasher.label(&self.slug).u64(self.seed);
        hasher.label("safety_factor").value(safety_factor);
        for (name, value) in &self.metrics {
            hasher.label(name).value(*value);
        }
        for series in &self.series {
            hasher.label(&series.name);
            for column in &series.columns {
                hasher.label(column);
            }
            hasher.u64(series.rows.len() as u64);
            for value in series.rows.iter().flatten() {
                hasher.value(*value);
            }
        }

        Ok(SimulationResult {
            slug: self.slug,
            seed: self.seed,
            fidelity: self.fidelity,
            plan_digest: self.plan_digest,
            metrics: self.metrics,
            series: self.series,
            safety_factor,
            payload_digest: hasher.finish(),
        })
    }
}
