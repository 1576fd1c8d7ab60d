//! Fixed names of the ComfyUI tree and of the files this tool drops into it.

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

use super::error::PathError;

pub const CUSTOM_NODES_DIR: &str = "custom_nodes";
/// Present in the parent of `custom_nodes` for every ComfyUI checkout.
pub const HOST_MARKER: &str = "main.py";
pub const REPO_LIST_FILE: &str = "comfy-repos.txt";
pub const MANIFEST_FILE: &str = "requirements.txt";
pub const LAUNCHER_FILE: &str = "start-prep.bat";

const ENTRY_STEM: &str = "clone-custom-nodes";
const HELPER_STEM: &str = "package-preparation";

/// File name of the orchestrator entry copied into `custom_nodes`.
pub fn entry_file_name() -> String {
    format!("{ENTRY_STEM}{EXE_SUFFIX}")
}

/// File name of the preparation helper copied next to each manifest.
pub fn helper_file_name() -> String {
    format!("{HELPER_STEM}{EXE_SUFFIX}")
}

/// Check that `raw` names a `custom_nodes` directory inside a ComfyUI tree.
///
/// The checks run in order and stop at the first failure, so every failure
/// mode has its own message.
pub fn validate_target_dir(raw: &str) -> Result<PathBuf, PathError> {
    if raw.trim().is_empty() {
        return Err(PathError::Empty);
    }

    let path = PathBuf::from(raw);
    if !path.exists() {
        return Err(PathError::Missing(raw.to_string()));
    }
    if !path.is_dir() {
        return Err(PathError::NotDirectory(raw.to_string()));
    }
    if !is_custom_nodes_dir(&path) {
        return Err(PathError::WrongName);
    }

    let has_marker = path
        .parent()
        .is_some_and(|parent| parent.join(HOST_MARKER).exists());
    if !has_marker {
        return Err(PathError::NotHostRoot);
    }

    Ok(path)
}

pub fn is_custom_nodes_dir(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == CUSTOM_NODES_DIR)
}

/// Local directory name `git clone` creates for `url`.
pub fn repo_dir_name(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let segment = trimmed.rsplit('/').next().unwrap_or(trimmed);
    segment.strip_suffix(".git").unwrap_or(segment).to_string()
}
