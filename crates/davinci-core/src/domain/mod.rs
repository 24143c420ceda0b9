pub mod cad;
pub mod config;
pub mod descriptor;
pub mod digest;
pub mod error;
pub mod plan;
pub mod simulation;

pub use cad::{BoundingBox, CadArtifact, CadPart};
pub use config::{Fidelity, InventionConfig, ParamReader, ParamValue};
pub use descriptor::InventionDescriptor;
pub use digest::{canonical_json, compute_digest, digest_of, PayloadHasher};
pub use error::{CodexError, RegistryError, Result, StageError, StageResult};
pub use plan::PlanResult;
pub use simulation::{DataSeries, SimulationBuilder, SimulationResult};
