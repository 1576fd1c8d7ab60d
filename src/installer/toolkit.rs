use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::ToolkitError;
use super::layout::{LAUNCHER_FILE, entry_file_name, helper_file_name};

const LAUNCHER_TEMPLATE: &str = include_str!("../../assets/start-prep.bat");

/// The files the front end drops into `custom_nodes` before a clone run.
///
/// Entry and helper are copies of one executable; which role a copy plays is
/// chosen by the subcommand it is launched with.
#[derive(Debug, Clone)]
pub struct Toolkit {
    source_exe: PathBuf,
}

impl Toolkit {
    pub fn new(source_exe: PathBuf) -> Self {
        Self { source_exe }
    }

    pub fn from_current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn install_into(&self, target: &Path) -> Result<(), ToolkitError> {
        if !self.source_exe.is_file() {
            return Err(ToolkitError::SourceMissing(self.source_exe.clone()));
        }

        copy_executable(&self.source_exe, &target.join(entry_file_name()))?;
        copy_executable(&self.source_exe, &target.join(helper_file_name()))?;
        fs::write(target.join(LAUNCHER_FILE), LAUNCHER_TEMPLATE)?;

        tracing::info!("copied installation files to {}", target.display());
        Ok(())
    }
}

/// Copy `source` to `dest`, skipping the copy when both name the same file.
pub fn copy_executable(source: &Path, dest: &Path) -> io::Result<()> {
    if same_file(source, dest) {
        return Ok(());
    }
    fs::copy(source, dest)?;
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
