//! Da Vinci Codex core library.
//!
//! Domain model, invention registry, the four-stage invention contract,
//! seeded simulation primitives, geometry export, FMEA safety evaluation and
//! the reference inventions.

pub mod artifacts;
pub mod domain;
pub mod geometry;
pub mod harness;
pub mod invention;
pub mod inventions;
pub mod materials;
pub mod metrics;
pub mod obs;
pub mod registry;
pub mod safety;
pub mod sim;
pub mod telemetry;
pub mod units;

pub use artifacts::{ArtifactStore, DEFAULT_ARTIFACT_ROOT};
pub use domain::{
    BoundingBox, CadArtifact, CadPart, CodexError, DataSeries, Fidelity, InventionConfig,
    InventionDescriptor, ParamReader, ParamValue, PlanResult, RegistryError, Result,
    SimulationResult, StageError, StageResult,
};
pub use geometry::{CadModel, Mesh};
pub use invention::Invention;
pub use materials::{Material, MaterialKind};
pub use metrics::METRICS;
pub use registry::{get_invention, list_inventions, reset_global, InventionFactory, Registry};
pub use safety::{
    AcceptanceCheck, FmeaWorksheet, HazardFinding, SafetyCriteria, SafetyVerdict, VerdictKind,
};
pub use sim::{CancelToken, SimContext};
