//! Build-stage output.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in metres.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn include(&mut self, point: [f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        self.include(other.min);
        self.include(other.max);
    }

    pub fn extent(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn is_valid(&self) -> bool {
        (0..3).all(|axis| self.min[axis].is_finite() && self.max[axis] >= self.min[axis])
    }
}

/// One exported component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CadPart {
    pub name: String,
    pub material: String,
    /// Key dimensions of the part (metres).
    pub dimensions: BTreeMap<String, f64>,
    pub triangle_count: usize,
    pub mass_kg: f64,
}

/// Result of `build()` once the meshes have been exported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CadArtifact {
    pub slug: String,
    pub seed: u64,
    pub parts: Vec<CadPart>,
    pub bounding_box: BoundingBox,
    /// STL files written for this run; empty when persistence is off.
    pub exported_files: Vec<PathBuf>,
}

impl CadArtifact {
    pub fn total_mass_kg(&self) -> f64 {
        self.parts.iter().map(|p| p.mass_kg).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.triangle_count).sum()
    }
}
