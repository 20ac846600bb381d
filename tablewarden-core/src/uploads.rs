//! Staging area for bulk-load files.
//!
//! Uploaded files are written under a generated unique name; the ledger
//! refers to them by that name and the reconciler resolves it back to a path.

use crate::{Result, error::TableWardenError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedUpload {
    /// Generated name recorded as `file_name` in ledger metadata
    pub file_name: String,
    /// Absolute location of the staged file
    pub path: PathBuf,
}

/// Upload directory with name generation and traversal-safe lookup.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Store rooted at `dir`; the directory is created on first stage.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding staged files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `contents` under a fresh name that keeps the original extension.
    ///
    /// # Errors
    /// Returns an I/O error if the directory or file cannot be written.
    pub async fn stage(&self, original_name: &str, contents: &[u8]) -> Result<StagedUpload> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            TableWardenError::io(
                format!("Failed to create upload directory {}", self.dir.display()),
                e,
            )
        })?;

        let file_name = generated_name(original_name);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, contents).await.map_err(|e| {
            TableWardenError::io(format!("Failed to write upload {}", path.display()), e)
        })?;

        tracing::info!(
            "Staged upload {} as {} ({} bytes)",
            original_name,
            file_name,
            contents.len()
        );
        Ok(StagedUpload { file_name, path })
    }

    /// Path of a staged file.
    ///
    /// # Errors
    /// `InvalidArgument` for anything but a bare file name, `NotFound` when
    /// no such file is staged.
    pub async fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        if !is_bare_file_name(file_name) {
            return Err(TableWardenError::invalid_argument(format!(
                "invalid upload file name '{}'",
                file_name
            )));
        }

        let path = self.dir.join(file_name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(TableWardenError::not_found("Upload", file_name)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TableWardenError::not_found("Upload", file_name))
            }
            Err(e) => Err(TableWardenError::io(
                format!("Failed to inspect upload {}", path.display()),
                e,
            )),
        }
    }
}

fn generated_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext.to_ascii_lowercase()),
        None => uuid::Uuid::new_v4().to_string(),
    }
}

fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}
