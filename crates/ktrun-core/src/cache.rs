//! Content-addressed artifact cache.
//!
//! One flat directory; one jar per `(base name, checksum)` pair. A jar that
//! exists at its computed path is a hit, with no further validation.
//! Artifacts are built in a staging directory next to the cache and renamed
//! into place, so a partially written jar is never visible under its final
//! name. Concurrent builders of the same checksum produce equivalent bytes,
//! which makes the losing rename harmless.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::checksum::sha256_hex;
use crate::error::{Error, Result};

/// Extension of compiled artifacts.
pub const ARTIFACT_EXTENSION: &str = "jar";

/// A cache slot for one expanded source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Base name of the source resource.
    pub base_name: String,

    /// Checksum of the expanded source.
    pub checksum: String,

    /// Where the artifact lives once built.
    pub path: PathBuf,
}

/// The artifact cache directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    /// Cache rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Compute the slot for a source.
    ///
    /// The checksum is appended to the base name unless the base name
    /// already ends with it (as scriptlets materialized from stdin do).
    pub fn entry(&self, base_name: &str, checksum: &str) -> CacheEntry {
        let file_name = if base_name.ends_with(&format!(".{}", checksum)) {
            format!("{}.{}", base_name, ARTIFACT_EXTENSION)
        } else {
            format!("{}.{}.{}", base_name, checksum, ARTIFACT_EXTENSION)
        };

        CacheEntry {
            base_name: base_name.to_string(),
            checksum: checksum.to_string(),
            path: self.dir.join(file_name),
        }
    }

    /// Whether the slot already holds an artifact.
    pub fn contains(&self, entry: &CacheEntry) -> bool {
        entry.path.is_file()
    }

    /// Build an artifact into the slot.
    ///
    /// `build` receives the staging path it must write the artifact to. The
    /// artifact is moved to its final path only if `build` succeeds and the
    /// file exists; on failure the staging directory is discarded.
    pub fn insert_with<F>(&self, entry: &CacheEntry, build: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        fs::create_dir_all(&self.dir)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.dir)?;

        let file_name = entry
            .path
            .file_name()
            .ok_or_else(|| Error::Resource(format!("invalid cache path {}", entry.path.display())))?;
        let staged = staging.path().join(file_name);

        build(&staged)?;

        if !staged.is_file() {
            return Err(Error::Compilation {
                script: entry.base_name.clone(),
                message: "compiler reported success but produced no artifact".to_string(),
            });
        }

        fs::rename(&staged, &entry.path)?;
        tracing::debug!("Cached artifact {}", entry.path.display());

        Ok(entry.path.clone())
    }

    /// Local copy of a URL include, keyed by the URL's hash.
    pub fn include_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("include.{}.kts", sha256_hex(url)))
    }

    /// All regular files in the cache directory, sorted.
    pub fn entries(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete every regular file in the cache directory (non-recursive).
    ///
    /// Returns the number of files removed.
    pub fn clear(&self) -> Result<usize> {
        let files = self.entries()?;
        for file in &files {
            fs::remove_file(file)?;
        }
        tracing::info!("Cleared {} cached files from {}", files.len(), self.dir.display());
        Ok(files.len())
    }
}

/// Write `bytes` to `path` unless a file is already there.
///
/// The content is written to a temporary sibling and renamed into place.
pub fn write_if_absent(path: &Path, bytes: &[u8]) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }

    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
