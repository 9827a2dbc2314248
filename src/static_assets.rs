//! Resolution of request paths against the directory of pre-built SPA files.
//!
//! The root is canonicalized once at startup. Every candidate is canonicalized
//! again before it is served, so a symlink inside the root that points
//! elsewhere is caught by the same containment check as a `..` would be.

use std::{
    io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tokio::fs;

use crate::{
    configuration::AssetSettings,
    domain::{ParseRequestPathError, RequestPath},
    telemetry,
};

#[derive(Error)]
pub enum AssetRootError {
    #[error("Static root {path} is not accessible")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Static root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Fallback document `{name}` is not a valid relative path")]
    InvalidFallbackDocument {
        name: String,
        #[source]
        source: ParseRequestPathError,
    },

    #[error("SPA fallback is enabled but no fallback document is named")]
    EmptyFallbackDocument,
}

impl std::fmt::Debug for AssetRootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        telemetry::error_chain_fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum ResolveAssetError {
    #[error("{requested} resolves to {resolved}, outside the static root")]
    OutsideRoot { requested: String, resolved: PathBuf },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A regular file inside the static root.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl Asset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> mime_guess::Mime {
        mime_guess::from_path(&self.path).first_or_octet_stream()
    }

    /// Weak validator built from size and modification time, so it changes
    /// whenever the file is rebuilt without hashing its contents.
    pub fn etag(&self) -> String {
        let modified = self
            .modified
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!("\"{:x}-{:x}\"", modified, self.len)
    }
}

#[derive(Debug, PartialEq)]
pub enum AssetResolution {
    Found(Asset),
    FallbackToRoot(Asset),
    NotFound,
}

enum Lookup {
    File(Asset),
    Directory,
    Missing,
    Outside(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StaticAssets {
    root: PathBuf,
    fallback_document: Option<PathBuf>,
}

impl StaticAssets {
    /// Canonicalizes the configured root. Refuses to build if the root does not
    /// exist or is not a directory.
    pub fn new(settings: &AssetSettings) -> Result<Self, AssetRootError> {
        let root = std::fs::canonicalize(&settings.root).map_err(|source| {
            AssetRootError::Inaccessible {
                path: settings.root.clone(),
                source,
            }
        })?;
        if !root.is_dir() {
            return Err(AssetRootError::NotADirectory(root));
        }

        let fallback_document = if settings.spa_fallback {
            let document = RequestPath::parse(&settings.fallback_document).map_err(|source| {
                AssetRootError::InvalidFallbackDocument {
                    name: settings.fallback_document.clone(),
                    source,
                }
            })?;
            if document.is_root() {
                return Err(AssetRootError::EmptyFallbackDocument);
            }
            let document = document.to_relative_path();
            if !root.join(&document).is_file() {
                tracing::warn!(
                    "Fallback document {} is missing, unmatched paths will return 404",
                    root.join(&document).display()
                );
            }
            Some(document)
        } else {
            None
        };

        Ok(Self {
            root,
            fallback_document,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spa_fallback(&self) -> bool {
        self.fallback_document.is_some()
    }

    /// Maps a normalized request path to a file in the root.
    ///
    /// Directories and missing paths fall back to the root document when one
    /// is configured and present.
    #[tracing::instrument(name = "Resolve static asset", skip(self), fields(path = %path))]
    pub async fn resolve(&self, path: &RequestPath) -> Result<AssetResolution, ResolveAssetError> {
        if !path.is_root() {
            match self.lookup(&self.root.join(path.to_relative_path())).await? {
                Lookup::File(asset) => return Ok(AssetResolution::Found(asset)),
                Lookup::Outside(resolved) => {
                    return Err(ResolveAssetError::OutsideRoot {
                        requested: path.to_string(),
                        resolved,
                    })
                }
                Lookup::Directory | Lookup::Missing => {}
            }
        }

        let Some(document) = &self.fallback_document else {
            return Ok(AssetResolution::NotFound);
        };
        match self.lookup(&self.root.join(document)).await? {
            Lookup::File(asset) => Ok(AssetResolution::FallbackToRoot(asset)),
            Lookup::Outside(resolved) => {
                tracing::warn!(
                    "Fallback document resolves to {}, outside the static root",
                    resolved.display()
                );
                Ok(AssetResolution::NotFound)
            }
            Lookup::Directory | Lookup::Missing => Ok(AssetResolution::NotFound),
        }
    }

    async fn lookup(&self, candidate: &Path) -> Result<Lookup, io::Error> {
        let resolved = match fs::canonicalize(candidate).await {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => return Err(e),
            // Missing entries, paths walking through a regular file, overlong names
            Err(e) => {
                tracing::debug!("No entry at {}: {}", candidate.display(), e);
                return Ok(Lookup::Missing);
            }
        };
        if !resolved.starts_with(&self.root) {
            return Ok(Lookup::Outside(resolved));
        }

        let metadata = fs::metadata(&resolved).await?;
        if metadata.is_file() {
            Ok(Lookup::File(Asset {
                len: metadata.len(),
                modified: metadata.modified().ok(),
                path: resolved,
            }))
        } else if metadata.is_dir() {
            Ok(Lookup::Directory)
        } else {
            Ok(Lookup::Missing)
        }
    }
}
