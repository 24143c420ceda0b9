//! On-disk artifact layout.
//!
//! Layout under the artifact root:
//!
//! ```text
//! <root>/<slug>/sim/<series>_seed<seed>.csv
//! <root>/<slug>/sim/metrics_seed<seed>.json
//! <root>/<slug>/cad/<part>_seed<seed>.stl
//! <root>/<slug>/safety/risk_summary_seed<seed>.md
//! <root>/<slug>/runs/seed<seed>.json
//! <root>/logs/davinci.log
//! ```
//!
//! Paths are keyed by slug and seed, so concurrent runs of different
//! `(slug, seed)` pairs never touch the same file. Every write goes to a
//! temporary file in the destination directory and is renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::domain::error::{StageError, StageResult};
use crate::metrics::METRICS;

/// Default artifact root, relative to the working directory.
pub const DEFAULT_ARTIFACT_ROOT: &str = "artifacts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slug_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    pub fn series_path(&self, slug: &str, series: &str, seed: u64) -> PathBuf {
        self.slug_dir(slug)
            .join("sim")
            .join(format!("{series}_seed{seed}.csv"))
    }

    pub fn metrics_path(&self, slug: &str, seed: u64) -> PathBuf {
        self.slug_dir(slug)
            .join("sim")
            .join(format!("metrics_seed{seed}.json"))
    }

    pub fn stl_path(&self, slug: &str, part: &str, seed: u64) -> PathBuf {
        self.slug_dir(slug)
            .join("cad")
            .join(format!("{part}_seed{seed}.stl"))
    }

    pub fn risk_summary_path(&self, slug: &str, seed: u64) -> PathBuf {
        self.slug_dir(slug)
            .join("safety")
            .join(format!("risk_summary_seed{seed}.md"))
    }

    pub fn manifest_path(&self, slug: &str, seed: u64) -> PathBuf {
        self.slug_dir(slug)
            .join("runs")
            .join(format!("seed{seed}.json"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("logs").join("davinci.log")
    }

    /// Atomically write `data` to `path`, creating parent directories.
    pub fn write_bytes(&self, path: &Path, data: &[u8]) -> StageResult<PathBuf> {
        let artifact_err = |reason: String| StageError::Artifact {
            path: path.display().to_string(),
            reason,
        };

        let dir = path
            .parent()
            .ok_or_else(|| artifact_err("artifact path has no parent directory".to_string()))?;
        fs::create_dir_all(dir).map_err(|e| artifact_err(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| artifact_err(e.to_string()))?;
        tmp.write_all(data).map_err(|e| artifact_err(e.to_string()))?;
        tmp.flush().map_err(|e| artifact_err(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| artifact_err(e.error.to_string()))?;

        METRICS.inc_artifacts_written();
        tracing::debug!(path = %path.display(), bytes = data.len(), "artifact written");
        Ok(path.to_path_buf())
    }

    pub fn write_text(&self, path: &Path, text: &str) -> StageResult<PathBuf> {
        self.write_bytes(path, text.as_bytes())
    }

    /// Write pretty JSON with a trailing newline.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> StageResult<PathBuf> {
        let mut content = serde_json::to_string_pretty(value).map_err(|e| StageError::Artifact {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        content.push('\n');
        self.write_bytes(path, content.as_bytes())
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_ROOT)
    }
}
