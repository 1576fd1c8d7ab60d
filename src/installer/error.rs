//! Error types for the installer workflow.
//!
//! The `Display` text of each variant is what the front end shows the user,
//! so messages are written for people, not for logs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a path is not a usable `custom_nodes` directory.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("Path cannot be empty!")]
    Empty,

    #[error("Path does not exist: {0}")]
    Missing(String),

    #[error("Path is not a directory: {0}")]
    NotDirectory(String),

    #[error("Directory must be named 'custom_nodes'")]
    WrongName,

    #[error(
        "Directory does not appear to be a ComfyUI installation (main.py not found in parent directory)"
    )]
    NotHostRoot,
}

#[derive(Debug, Error)]
pub enum RepoListError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("No repository URLs provided")]
    NoUrls,

    #[error("Invalid GitHub URLs found:\n{}", .0.join("\n"))]
    InvalidUrls(Vec<String>),

    #[error("{} not found!", .0.display())]
    NotFound(PathBuf),

    #[error("Error saving repositories: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Required file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Error copying required files: {0}")]
    Copy(#[from] io::Error),
}

/// Structural failures that stop a whole clone run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("This command must be run from the 'custom_nodes' directory!")]
    WrongWorkingDir,

    #[error("{0} not found in current directory!")]
    MissingHelper(String),

    #[error(transparent)]
    RepoList(#[from] RepoListError),

    #[error("failed to write progress: {0}")]
    Output(#[from] io::Error),
}
