//! Invention identity.

use serde::{Deserialize, Serialize};

/// Identifies one invention module.
///
/// Created once at registration and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InventionDescriptor {
    /// Stable identifier used on the CLI and in artifact paths.
    pub slug: String,
    pub display_name: String,
    /// Manuscript reference (codex and folio).
    pub provenance: String,
    /// Approximate date of the drawing.
    pub era: String,
    pub summary: String,
}

impl InventionDescriptor {
    pub fn new(
        slug: impl Into<String>,
        display_name: impl Into<String>,
        provenance: impl Into<String>,
        era: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            display_name: display_name.into(),
            provenance: provenance.into(),
            era: era.into(),
            summary: summary.into(),
        }
    }
}
