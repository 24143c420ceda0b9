//! Run specification and identity.

use davinci_core::{Fidelity, InventionConfig, StageResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of one pipeline run.
///
/// The run id is derived from the inputs only, so re-running the same
/// `(slug, seed, config)` yields the same id and the same manifest path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSpec {
    pub run_id: String,
    pub slug: String,
    pub seed: u64,
    pub fidelity: Fidelity,

    /// Canonical digest of the invention config.
    pub config_digest: String,
}

impl RunSpec {
    pub fn new(slug: &str, seed: u64, config: &InventionConfig) -> StageResult<Self> {
        let config_digest = config.digest()?;
        Ok(Self {
            run_id: compute_run_id(slug, seed, &config_digest),
            slug: slug.to_string(),
            seed,
            fidelity: config.fidelity,
            config_digest,
        })
    }
}

/// Digest of the ordered run inputs.
fn compute_run_id(slug: &str, seed: u64, config_digest: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(slug.as_bytes());
    hasher.update(b"\0");
    hasher.update(seed.to_le_bytes());
    hasher.update(b"\0");
    hasher.update(config_digest.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_deterministic() {
        let config = InventionConfig::new().with_param("pitch_deg", 30.0);
        let a = RunSpec::new("aerial_screw", 42, &config).unwrap();
        let b = RunSpec::new("aerial_screw", 42, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.run_id.len(), 64);
    }

    #[test]
    fn test_run_id_sensitive_to_inputs() {
        let config = InventionConfig::new();
        let base = RunSpec::new("parachute", 0, &config).unwrap();
        let other_seed = RunSpec::new("parachute", 1, &config).unwrap();
        let other_slug = RunSpec::new("aerial_screw", 0, &config).unwrap();
        let other_config =
            RunSpec::new("parachute", 0, &config.clone().with_text("geometry", "flat")).unwrap();

        assert_ne!(base.run_id, other_seed.run_id);
        assert_ne!(base.run_id, other_slug.run_id);
        assert_ne!(base.run_id, other_config.run_id);
        assert_ne!(base.config_digest, other_config.config_digest);
    }

    #[test]
    fn test_config_seed_is_part_of_config_digest() {
        let plain = InventionConfig::new();
        let seeded = InventionConfig {
            seed: Some(9),
            ..InventionConfig::new()
        };
        // The config's own seed is part of its digest, the run seed is separate.
        let a = RunSpec::new("parachute", 9, &plain).unwrap();
        let b = RunSpec::new("parachute", 9, &seeded).unwrap();
        assert_eq!(a.seed, b.seed);
        assert_ne!(a.config_digest, b.config_digest);
    }
}
