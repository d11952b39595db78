//! Disk cache for intermediate planning artifacts.
//!
//! Each phase's output (topology, closed paths, fares, fare graph) can be
//! written as JSON and reloaded on the next run instead of refetching. Every
//! file records the scope it was computed for, e.g. the origin and cutoff,
//! and is ignored when loaded for a different scope.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Errors writing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize {kind}: {source}")]
    Json {
        kind: ArtifactKind,
        source: serde_json::Error,
    },
}

/// The artifacts produced at phase boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Adjacency,
    ClosedPaths,
    Fares,
    FareGraph,
}

impl ArtifactKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Adjacency => "adjacency.json",
            Self::ClosedPaths => "closed_paths.json",
            Self::Fares => "fares.json",
            Self::FareGraph => "graph.json",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Adjacency => "adjacency map",
            Self::ClosedPaths => "closed paths",
            Self::Fares => "fares",
            Self::FareGraph => "fare graph",
        };
        f.write_str(name)
    }
}

/// Artifact with metadata.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    /// What the data was computed for.
    scope: String,
    /// Unix timestamp when the artifact was written.
    saved_at_secs: u64,
    data: T,
}

/// Directory of JSON artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Try to load an artifact.
    ///
    /// Returns `None` if the file doesn't exist, is invalid, or was computed
    /// for a different scope.
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind, scope: &str) -> Option<T> {
        let path = self.path(kind);
        let contents = std::fs::read_to_string(&path).ok()?;
        let envelope: Envelope<T> = match serde_json::from_str(&contents) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable artifact");
                return None;
            }
        };

        if envelope.scope != scope {
            debug!(%kind, cached = %envelope.scope, wanted = %scope, "artifact scope mismatch");
            return None;
        }

        info!(%kind, path = %path.display(), "loaded cached artifact");
        Some(envelope.data)
    }

    /// Save an artifact, creating the directory if needed.
    pub fn save<T: Serialize>(
        &self,
        kind: ArtifactKind,
        scope: &str,
        data: &T,
    ) -> Result<(), ArtifactError> {
        let saved_at_secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let envelope = Envelope {
            scope: scope.to_string(),
            saved_at_secs,
            data,
        };

        if !self.dir.as_os_str().is_empty() && !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|source| ArtifactError::Io {
                path: self.dir.clone(),
                source,
            })?;
        }

        let json = serde_json::to_string(&envelope)
            .map_err(|source| ArtifactError::Json { kind, source })?;

        let path = self.path(kind);
        std::fs::write(&path, json).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(%kind, path = %path.display(), "saved artifact");
        Ok(())
    }
}
