use std::path::Path;

use tar::Builder;

use crate::container::ContainerError;
use crate::workspace::Workspace;

/// Pack the workspace's regular files into an in-memory tar archive with
/// paths relative to the workspace root.
pub fn pack_workspace(workspace: &Workspace) -> Result<Vec<u8>, ContainerError> {
    let files = workspace
        .files()
        .map_err(|e| ContainerError::Runtime(e.to_string()))?;
    pack_files(workspace.path(), files.iter().map(|p| p.as_path()))
}

fn pack_files<'a>(
    root: &Path,
    files: impl IntoIterator<Item = &'a Path>,
) -> Result<Vec<u8>, ContainerError> {
    let mut builder = Builder::new(Vec::new());
    builder.mode(tar::HeaderMode::Deterministic);
    for rel in files {
        builder
            .append_path_with_name(root.join(rel), rel)
            .map_err(ContainerError::Archive)?;
    }
    builder.into_inner().map_err(ContainerError::Archive)
}
