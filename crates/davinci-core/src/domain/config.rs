//! Per-invention run configuration.
//!
//! A config carries the shared options (`seed`, `fidelity`,
//! `material_overrides`) plus invention parameters at the top level:
//!
//! ```toml
//! fidelity = "research"
//! pitch_deg = 30
//!
//! [material_overrides]
//! spokes = "bamboo"
//! ```
//!
//! Invention modules read parameters through [`ParamReader`], which rejects
//! anything they did not ask for.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::digest::digest_of;
use crate::domain::error::{CodexError, StageError, StageResult};
use crate::materials::Material;

/// Simulation resolution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// Coarse sweeps and small Monte-Carlo samples, suitable for the site.
    #[default]
    Educational,
    /// Fine sweeps, small time steps and large samples.
    Research,
}

impl Fidelity {
    pub fn name(&self) -> &'static str {
        match self {
            Fidelity::Educational => "educational",
            Fidelity::Research => "research",
        }
    }

    /// Pick the value for this fidelity level.
    pub fn pick<T>(&self, educational: T, research: T) -> T {
        match self {
            Fidelity::Educational => educational,
            Fidelity::Research => research,
        }
    }
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Fidelity {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "educational" => Ok(Fidelity::Educational),
            "research" => Ok(Fidelity::Research),
            other => Err(StageError::invalid_config(format!(
                "unknown fidelity '{other}' (expected educational or research)"
            ))),
        }
    }
}

/// A single invention parameter value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Parse a CLI value: numbers when they parse, text otherwise.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) => ParamValue::Number(n),
            Err(_) => ParamValue::Text(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// Structured configuration for one invention run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InventionConfig {
    /// Default seed when the caller does not pass one explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub fidelity: Fidelity,

    /// Material role -> catalog material name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub material_overrides: BTreeMap<String, String>,

    /// Invention-specific parameters.
    #[serde(flatten)]
    pub params: BTreeMap<String, ParamValue>,
}

impl InventionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fidelity(mut self, fidelity: Fidelity) -> Self {
        self.fidelity = fidelity;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), ParamValue::Number(value));
        self
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), ParamValue::Text(value.into()));
        self
    }

    pub fn with_material(mut self, role: impl Into<String>, material: impl Into<String>) -> Self {
        self.material_overrides.insert(role.into(), material.into());
        self
    }

    /// Apply a `key=value` override. `material.<role>=<name>` targets material
    /// overrides; `fidelity` and `seed` target the shared options.
    pub fn apply_override(&mut self, assignment: &str) -> StageResult<()> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            StageError::invalid_config(format!("override '{assignment}' is not key=value"))
        })?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(StageError::invalid_config(format!(
                "override '{assignment}' has an empty key"
            )));
        }

        if let Some(role) = key.strip_prefix("material.") {
            self.material_overrides
                .insert(role.to_string(), value.to_string());
        } else if key == "fidelity" {
            self.fidelity = value.parse()?;
        } else if key == "seed" {
            let seed = value.parse::<u64>().map_err(|_| {
                StageError::invalid_config(format!("seed '{value}' is not an unsigned integer"))
            })?;
            self.seed = Some(seed);
        } else {
            self.params.insert(key.to_string(), ParamValue::parse(value));
        }
        Ok(())
    }

    /// Load a config from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, CodexError> {
        let content = std::fs::read_to_string(path)?;
        let parse_err = |reason: String| CodexError::ConfigParse {
            path: path.display().to_string(),
            reason,
        };

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string())),
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
            other => Err(parse_err(format!(
                "unsupported config extension {:?} (expected .toml or .json)",
                other.unwrap_or("")
            ))),
        }
    }

    /// Digest of the full configuration (canonical JSON).
    pub fn digest(&self) -> StageResult<String> {
        digest_of(self)
    }
}

/// Reads invention parameters and rejects unrecognized ones.
pub struct ParamReader<'a> {
    config: &'a InventionConfig,
    consumed: BTreeSet<String>,
}

impl<'a> ParamReader<'a> {
    pub fn new(config: &'a InventionConfig) -> Self {
        Self {
            config,
            consumed: BTreeSet::new(),
        }
    }

    /// Read a numeric parameter within `[min, max]`.
    pub fn number(&mut self, key: &str, default: f64, min: f64, max: f64) -> StageResult<f64> {
        self.consumed.insert(key.to_string());
        let value = match self.config.params.get(key) {
            None => default,
            Some(ParamValue::Number(n)) => *n,
            Some(ParamValue::Text(s)) => {
                return Err(StageError::invalid_config(format!(
                    "parameter '{key}' must be a number, got '{s}'"
                )))
            }
        };

        if !value.is_finite() || value < min || value > max {
            return Err(StageError::invalid_config(format!(
                "parameter '{key}' = {value} is outside the physical range [{min}, {max}]"
            )));
        }
        Ok(value)
    }

    /// Read a whole-number parameter within `[min, max]`.
    pub fn count(&mut self, key: &str, default: u32, min: u32, max: u32) -> StageResult<u32> {
        let value = self.number(key, default as f64, min as f64, max as f64)?;
        if value.fract() != 0.0 {
            return Err(StageError::invalid_config(format!(
                "parameter '{key}' = {value} must be a whole number"
            )));
        }
        Ok(value as u32)
    }

    /// Read a string parameter restricted to `allowed`.
    pub fn choice(&mut self, key: &str, default: &str, allowed: &[&str]) -> StageResult<String> {
        self.consumed.insert(key.to_string());
        let value = match self.config.params.get(key) {
            None => default.to_string(),
            Some(ParamValue::Text(s)) => s.clone(),
            Some(ParamValue::Number(n)) => {
                return Err(StageError::invalid_config(format!(
                    "parameter '{key}' must be one of {allowed:?}, got {n}"
                )))
            }
        };

        if !allowed.contains(&value.as_str()) {
            return Err(StageError::invalid_config(format!(
                "parameter '{key}' = '{value}' is not one of {allowed:?}"
            )));
        }
        Ok(value)
    }

    /// Resolve material roles: `(role, default material)` pairs, with overrides applied.
    pub fn materials(&mut self, roles: &[(&str, &str)]) -> StageResult<BTreeMap<String, Material>> {
        for role in self.config.material_overrides.keys() {
            if !roles.iter().any(|(known, _)| known == role) {
                let known: Vec<&str> = roles.iter().map(|(r, _)| *r).collect();
                return Err(StageError::invalid_config(format!(
                    "unknown material role '{role}' (known roles: {known:?})"
                )));
            }
        }

        let mut out = BTreeMap::new();
        for (role, default) in roles {
            let name = self
                .config
                .material_overrides
                .get(*role)
                .map(String::as_str)
                .unwrap_or(default);
            let material = Material::lookup(name).ok_or_else(|| {
                StageError::invalid_config(format!(
                    "unknown material '{name}' for role '{role}'"
                ))
            })?;
            out.insert(role.to_string(), material);
        }
        Ok(out)
    }

    /// Fail if the config carried parameters nobody read.
    pub fn finish(self) -> StageResult<()> {
        let unknown: Vec<&str> = self
            .config
            .params
            .keys()
            .filter(|k| !self.consumed.contains(k.as_str()))
            .map(String::as_str)
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(StageError::invalid_config(format!(
                "unrecognized option(s): {}",
                unknown.join(", ")
            )))
        }
    }
}
