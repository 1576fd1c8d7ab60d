use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::model::config::ToolsConfig;

use super::layout::MANIFEST_FILE;
use super::process::{CommandRunner, Invocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No manifest in the directory; nothing to do.
    NoManifest,
    Installed,
    Failed(String),
}

impl InstallOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, InstallOutcome::Failed(_))
    }
}

/// Installs the `requirements.txt` of one directory with pip.
pub struct DependencyInstaller<'a> {
    runner: &'a dyn CommandRunner,
    tools: &'a ToolsConfig,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(runner: &'a dyn CommandRunner, tools: &'a ToolsConfig) -> Self {
        Self { runner, tools }
    }

    /// Prefer the portable build's embedded interpreter, else the configured one.
    pub fn python_executable(&self, working_dir: &Path) -> PathBuf {
        let bundled = working_dir.join(&self.tools.bundled_python);
        if bundled.exists() {
            return std::path::absolute(&bundled).unwrap_or(bundled);
        }
        PathBuf::from(&self.tools.python)
    }

    pub fn install(&self, working_dir: &Path, out: &mut dyn Write) -> io::Result<InstallOutcome> {
        if !working_dir.join(MANIFEST_FILE).exists() {
            writeln!(out, "No {MANIFEST_FILE} found in current directory")?;
            return Ok(InstallOutcome::NoManifest);
        }

        let python = self.python_executable(working_dir);
        writeln!(out, "Using Python executable: {}", python.display())?;

        let invocation = Invocation::new(python.as_os_str(), working_dir)
            .args(["-s", "-m", "pip", "install", "-r", MANIFEST_FILE]);

        let outcome = match self.runner.run(&invocation) {
            Ok(output) if output.success() => InstallOutcome::Installed,
            Ok(output) => InstallOutcome::Failed(output.stderr),
            Err(err) => InstallOutcome::Failed(err.to_string()),
        };

        match &outcome {
            InstallOutcome::Failed(detail) => {
                tracing::error!("pip install failed in {}: {detail}", working_dir.display());
                writeln!(out, "Error installing requirements: {detail}")?;
            }
            _ => writeln!(out, "Requirements installed successfully")?,
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::process::testing::{FakeRunner, failed, ok};
    use crate::model::config::AppConfig;
    use std::fs;

    fn tools() -> ToolsConfig {
        AppConfig::defaults().unwrap().tools
    }

    #[test]
    fn missing_manifest_is_a_silent_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|_| ok(""));
        let tools = tools();
        let mut out = Vec::new();

        let outcome = DependencyInstaller::new(&runner, &tools)
            .install(dir.path(), &mut out)
            .unwrap();

        assert_eq!(outcome, InstallOutcome::NoManifest);
        assert!(runner.calls().is_empty());
        assert!(String::from_utf8(out).unwrap().contains("No requirements.txt found"));
    }

    #[test]
    fn runs_pip_without_user_site_packages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "numpy\n").unwrap();
        let runner = FakeRunner::new(|_| ok("Successfully installed numpy"));
        let tools = tools();
        let mut out = Vec::new();

        let outcome = DependencyInstaller::new(&runner, &tools)
            .install(dir.path(), &mut out)
            .unwrap();

        assert_eq!(outcome, InstallOutcome::Installed);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "python");
        assert_eq!(calls[0].cwd, dir.path());
        let args: Vec<_> = calls[0].args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(args, ["-s", "-m", "pip", "install", "-r", "requirements.txt"]);
        assert!(String::from_utf8(out).unwrap().contains("installed successfully"));
    }

    #[test]
    fn prefers_bundled_interpreter() {
        let root = tempfile::tempdir().unwrap();
        let embedded = root.path().join("python_embeded");
        fs::create_dir(&embedded).unwrap();
        fs::write(embedded.join("python.exe"), "").unwrap();
        let node_dir = root.path().join("ComfyUI/custom_nodes/node-a");
        fs::create_dir_all(&node_dir).unwrap();

        let runner = FakeRunner::new(|_| ok(""));
        let tools = tools();
        let python = DependencyInstaller::new(&runner, &tools).python_executable(&node_dir);

        assert!(python.is_absolute());
        assert!(python.ends_with("python_embeded/python.exe"));
        assert!(python.exists());
    }

    #[test]
    fn pip_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "nope==0\n").unwrap();
        let runner = FakeRunner::new(|_| failed("No matching distribution"));
        let tools = tools();
        let mut out = Vec::new();

        let outcome = DependencyInstaller::new(&runner, &tools)
            .install(dir.path(), &mut out)
            .unwrap();

        assert!(outcome.is_failure());
        assert!(
            String::from_utf8(out)
                .unwrap()
                .contains("Error installing requirements: No matching distribution")
        );
    }
}
