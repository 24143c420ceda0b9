//! Canonical JSON and payload digests.
//!
//! Two kinds of digest are used:
//! - [`compute_digest`]: SHA-256 over canonical JSON (sorted keys, integer-valued
//!   floats collapsed to integers). Used for configs, plans and run identity.
//! - [`PayloadHasher`]: SHA-256 over the raw IEEE-754 bit patterns of numeric
//!   payloads. Used for simulation results, where "identical" means bit-identical.

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::domain::error::{StageError, StageResult};

/// Parameters read from TOML arrive as integers, the same values set in code
/// arrive as floats. Both must digest the same.
fn canonical_number(n: &Number) -> StageResult<Number> {
    match n.as_f64() {
        Some(f) if !f.is_finite() => Err(StageError::invalid_config(
            "non-finite number cannot be digested",
        )),
        Some(f) if !(n.is_i64() || n.is_u64()) && f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Ok(Number::from(f as i64))
        }
        _ => Ok(n.clone()),
    }
}

fn canonicalize(value: &Value) -> StageResult<Value> {
    Ok(match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, v) in entries {
                sorted.insert(key.clone(), canonicalize(v)?);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(canonicalize).collect::<StageResult<_>>()?)
        }
        Value::Number(n) => Value::Number(canonical_number(n)?),
        other => other.clone(),
    })
}

/// Compact JSON with sorted keys and integer-valued floats written as integers.
pub fn canonical_json(value: &Value) -> StageResult<String> {
    serde_json::to_string(&canonicalize(value)?).map_err(|e| StageError::internal(e.to_string()))
}

/// SHA-256 hex digest of the canonical JSON form of `value`.
pub fn compute_digest(value: &Value) -> StageResult<String> {
    let canonical = canonical_json(value)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// SHA-256 hex digest of any serializable value via canonical JSON.
pub fn digest_of<T: serde::Serialize>(value: &T) -> StageResult<String> {
    let json = serde_json::to_value(value).map_err(|e| StageError::internal(e.to_string()))?;
    compute_digest(&json)
}

/// Incremental hasher over labelled numeric payloads.
///
/// Every label is length-prefixed and every `f64` is fed as its little-endian
/// bit pattern, so `-0.0` and `0.0` hash differently and no formatting is involved.
pub struct PayloadHasher {
    hasher: Sha256,
}

impl Default for PayloadHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadHasher {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn label(&mut self, label: &str) -> &mut Self {
        self.hasher.update((label.len() as u64).to_le_bytes());
        self.hasher.update(label.as_bytes());
        self
    }

    pub fn value(&mut self, value: f64) -> &mut Self {
        self.hasher.update(value.to_bits().to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let input = serde_json::json!({ "b": 1, "a": 2 });
        assert_eq!(canonical_json(&input).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_canonical_json_integer_float() {
        let input = serde_json::json!({ "pitch_deg": 30.0 });
        assert_eq!(canonical_json(&input).unwrap(), r#"{"pitch_deg":30}"#);
    }

    #[test]
    fn test_integer_and_float_params_digest_alike() {
        let from_toml = serde_json::json!({ "params": { "rpm": 40, "crew": [4] } });
        let from_code = serde_json::json!({ "params": { "crew": [4.0], "rpm": 40.0 } });
        assert_eq!(
            compute_digest(&from_toml).unwrap(),
            compute_digest(&from_code).unwrap()
        );
    }

    #[test]
    fn test_digest_stable_across_key_order() {
        let a = serde_json::json!({ "geometry": "pyramid", "side_braccia": 12 });
        let b = serde_json::json!({ "side_braccia": 12, "geometry": "pyramid" });
        assert_eq!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn test_payload_hasher_distinguishes_signed_zero() {
        let mut a = PayloadHasher::new();
        a.label("x").value(0.0);
        let mut b = PayloadHasher::new();
        b.label("x").value(-0.0);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_payload_hasher_label_boundaries() {
        let mut a = PayloadHasher::new();
        a.label("ab").label("c");
        let mut b = PayloadHasher::new();
        b.label("a").label("bc");
        assert_ne!(a.finish(), b.finish());
    }
}
