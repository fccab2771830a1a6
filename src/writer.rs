//! Artifact Persistence
//!
//! Writes compiled artifacts to disk, either directly or through a temporary
//! file renamed into place. Unchanged files are left alone.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hashing::content_digest;
use crate::provider::CompileArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOperation {
    Stat,
    CreateDir,
    Read,
    Write,
    Rename,
}

impl fmt::Display for FsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stat => "stat",
            Self::CreateDir => "create directory",
            Self::Read => "read",
            Self::Write => "write",
            Self::Rename => "rename",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("Failed to {operation} {}: {source}", .path.display())]
pub struct WriteError {
    pub operation: FsOperation,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WriteError {
    fn new(operation: FsOperation, path: &Path, source: io::Error) -> Self {
        Self {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Direct,
    /// Temporary file in the target directory, then rename.
    Atomic,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Written,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub digest: String,
    pub bytes: usize,
    pub status: WriteStatus,
}

/// Persists one artifact. The target path must be absolute.
pub fn persist(artifact: &CompileArtifact, mode: WriteMode) -> Result<WrittenArtifact, WriteError> {
    persist_contents(&artifact.target.output_path, &artifact.contents, mode)
}

pub fn persist_contents(
    path: &Path,
    contents: &str,
    mode: WriteMode,
) -> Result<WrittenArtifact, WriteError> {
    if !path.is_absolute() {
        return Err(WriteError::new(
            FsOperation::Write,
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "output path is not absolute"),
        ));
    }

    let digest = content_digest(contents);
    let written = |status| WrittenArtifact {
        path: path.to_path_buf(),
        digest: digest.clone(),
        bytes: contents.len(),
        status,
    };

    if let Some(existing) = read_existing(path)? {
        if content_digest(&existing) == digest {
            log::debug!("Unchanged, skipping write: {}", path.display());
            return Ok(written(WriteStatus::Unchanged));
        }
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("/"));
    fs::create_dir_all(parent).map_err(|e| WriteError::new(FsOperation::CreateDir, parent, e))?;

    match mode {
        WriteMode::Direct => {
            fs::write(path, contents).map_err(|e| WriteError::new(FsOperation::Write, path, e))?;
        }
        WriteMode::Atomic => write_atomic(parent, path, contents)?,
    }

    log::debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(written(WriteStatus::Written))
}

fn read_existing(path: &Path) -> Result<Option<String>, WriteError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => fs::read_to_string(path)
            .map(Some)
            .or_else(|e| match e.kind() {
                io::ErrorKind::InvalidData => Ok(None),
                _ => Err(WriteError::new(FsOperation::Read, path, e)),
            }),
        Ok(_) => Err(WriteError::new(
            FsOperation::Stat,
            path,
            io::Error::new(io::ErrorKind::Other, "target exists and is not a file"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WriteError::new(FsOperation::Stat, path, e)),
    }
}

fn write_atomic(parent: &Path, path: &Path, contents: &str) -> Result<(), WriteError> {
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| WriteError::new(FsOperation::Write, parent, e))?;
    temp.write_all(contents.as_bytes())
        .and_then(|_| temp.flush())
        .map_err(|e| WriteError::new(FsOperation::Write, temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| WriteError::new(FsOperation::Rename, path, e.error))?;
    Ok(())
}
