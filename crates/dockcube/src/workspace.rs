//! Request-scoped workspaces
//!
//! Materializes a submission's files into a fresh host directory, resolves the
//! effective language and picks the main file.

use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::Language;
use crate::types::SourceFiles;

/// Prefix of every workspace directory name
pub const WORKSPACE_PREFIX: &str = "dockcube-run-";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("submission contains no files")]
    NoFiles,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve the effective language of a submission.
///
/// The first file (in supply order) with a recognized extension decides;
/// otherwise the declared language is used if it is registered.
pub fn resolve_language(files: &SourceFiles, declared: &str) -> Option<Language> {
    files
        .paths()
        .find_map(Language::detect)
        .or_else(|| declared.parse().ok())
}

/// Reject absolute paths and parent-directory components
pub fn validate_path(path: &str) -> Result<(), WorkspaceError> {
    if path.trim().is_empty() {
        return Err(WorkspaceError::InvalidPath("empty file path".to_owned()));
    }

    let escapes = Path::new(path).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(WorkspaceError::InvalidPath(format!(
            "path traversal not allowed: {path}"
        )));
    }

    Ok(())
}

/// An ephemeral directory holding one request's files
///
/// The directory is removed by [`cleanup()`](Self::cleanup), or when the
/// workspace is dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    language: Language,
    main_file: String,
}

impl Workspace {
    /// Write `files` into a new directory under `root` (system temp dir if `None`)
    #[instrument(skip(files), fields(files = files.len()))]
    pub async fn materialize(
        root: Option<&Path>,
        files: &SourceFiles,
        language: Language,
    ) -> Result<Self, WorkspaceError> {
        if files.is_empty() {
            return Err(WorkspaceError::NoFiles);
        }
        for path in files.paths() {
            validate_path(path)?;
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => {
                tokio::fs::create_dir_all(root).await?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();

        for (name, content) in files.iter() {
            let target = path.join(name);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| WorkspaceError::Write {
                        path: name.to_owned(),
                        source,
                    })?;
            }
            tokio::fs::write(&target, content)
                .await
                .map_err(|source| WorkspaceError::Write {
                    path: name.to_owned(),
                    source,
                })?;
        }

        let main_file = files
            .paths()
            .find(|p| language.matches(p))
            .or_else(|| files.paths().next())
            .map(str::to_owned)
            .ok_or(WorkspaceError::NoFiles)?;

        debug!(path = %path.display(), %language, %main_file, "workspace ready");

        Ok(Self {
            dir: Some(dir),
            path,
            language,
            main_file,
        })
    }

    /// Host path of the workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Main file, relative to the workspace root
    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    /// Regular files in the workspace, relative and sorted
    pub fn files(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut files = Vec::new();
        collect_files(&self.path, Path::new(""), &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Relative paths of files carrying `extension` (without the dot)
    pub fn files_with_extension(&self, extension: &str) -> Result<Vec<String>, WorkspaceError> {
        Ok(self
            .files()?
            .into_iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
            })
            .map(|p| p.to_string_lossy().into_owned())
            .collect())
    }

    /// Whether the directory has not been removed yet
    pub fn is_active(&self) -> bool {
        self.dir.is_some()
    }

    /// Remove the workspace directory. Idempotent.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn cleanup(&mut self) -> Result<(), WorkspaceError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        if let Err(e) = dir.close() {
            warn!(error = %e, "failed to remove workspace");
            return Err(e.into());
        }
        debug!("workspace removed");
        Ok(())
    }
}

fn collect_files(root: &Path, rel: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(root.join(rel))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let rel_path = rel.join(entry.file_name());
        if file_type.is_dir() {
            collect_files(root, &rel_path, out)?;
        } else if file_type.is_file() {
            out.push(rel_path);
        }
    }
    Ok(())
}
