//! The clone run: clone every listed repository into `custom_nodes` and
//! install the requirements each one declares.
//!
//! Every repository and every manifest is handled on its own. A failure is
//! printed and the run moves on; only a broken setup (wrong directory,
//! missing helper, missing list) stops the run before it starts.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::model::config::ToolsConfig;

use super::error::OrchestratorError;
use super::layout::{
    MANIFEST_FILE, REPO_LIST_FILE, helper_file_name, is_custom_nodes_dir, repo_dir_name,
};
use super::process::{CommandRunner, Invocation};
use super::repo_list::read_urls;
use super::toolkit::copy_executable;

pub const BANNER_WIDTH: usize = 50;

pub fn banner() -> String {
    "=".repeat(BANNER_WIDTH)
}

/// Per-item counts of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub repositories: usize,
    pub cloned: usize,
    pub skipped: usize,
    pub clone_failures: usize,
    pub installs_succeeded: usize,
    pub installs_failed: usize,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Repositories: {} total, {} cloned, {} skipped, {} failed to clone",
            self.repositories, self.cloned, self.skipped, self.clone_failures
        )?;
        write!(
            f,
            "Requirements: {} installed, {} failed",
            self.installs_succeeded, self.installs_failed
        )
    }
}

enum CloneResult {
    Cloned(PathBuf),
    Skipped,
    Failed,
}

pub struct Orchestrator<'a> {
    root: PathBuf,
    runner: &'a dyn CommandRunner,
    tools: &'a ToolsConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(root: PathBuf, runner: &'a dyn CommandRunner, tools: &'a ToolsConfig) -> Self {
        Self {
            root,
            runner,
            tools,
        }
    }

    pub fn run(&self, out: &mut dyn Write) -> Result<RunReport, OrchestratorError> {
        if !is_custom_nodes_dir(&self.root) {
            return Err(OrchestratorError::WrongWorkingDir);
        }

        let helper = self.root.join(helper_file_name());
        if !helper.is_file() {
            return Err(OrchestratorError::MissingHelper(helper_file_name()));
        }

        let urls = read_urls(&self.root.join(REPO_LIST_FILE))?;
        writeln!(out, "Found {} repositories to process", urls.len())?;

        let mut report = RunReport {
            repositories: urls.len(),
            ..Default::default()
        };

        for url in &urls {
            writeln!(out, "\nProcessing repository: {url}")?;

            let repo_dir = match self.clone_repository(url, out)? {
                CloneResult::Cloned(dir) => {
                    report.cloned += 1;
                    dir
                }
                CloneResult::Skipped => {
                    report.skipped += 1;
                    continue;
                }
                CloneResult::Failed => {
                    report.clone_failures += 1;
                    continue;
                }
            };

            for manifest_dir in find_manifest_dirs(&repo_dir) {
                writeln!(out, "Found {MANIFEST_FILE} in {}", manifest_dir.display())?;
                if self.prepare(&helper, &manifest_dir, out)? {
                    report.installs_succeeded += 1;
                } else {
                    report.installs_failed += 1;
                }
            }
        }

        writeln!(out, "\n{}", banner())?;
        writeln!(out, "{report}")?;
        tracing::info!(
            cloned = report.cloned,
            skipped = report.skipped,
            clone_failures = report.clone_failures,
            installs_failed = report.installs_failed,
            "clone run finished"
        );

        Ok(report)
    }

    fn clone_repository(
        &self,
        url: &str,
        out: &mut dyn Write,
    ) -> Result<CloneResult, OrchestratorError> {
        let name = repo_dir_name(url);
        let repo_dir = self.root.join(&name);

        if repo_dir.exists() {
            writeln!(out, "Repository {name} already exists, skipping...")?;
            return Ok(CloneResult::Skipped);
        }

        let invocation = Invocation::new(&self.tools.git, &self.root).args(["clone", url]);
        match self.runner.run(&invocation) {
            Ok(output) if output.success() => Ok(CloneResult::Cloned(repo_dir)),
            Ok(output) => {
                tracing::warn!("git clone {url} exited with {:?}", output.code);
                writeln!(out, "Error cloning {url}: {}", output.stderr.trim_end())?;
                Ok(CloneResult::Failed)
            }
            Err(err) => {
                tracing::warn!("git clone {url} could not start: {err}");
                writeln!(out, "Error while cloning {url}: {err}")?;
                Ok(CloneResult::Failed)
            }
        }
    }

    /// Copy the helper into `dir`, run it there, and remove it again.
    ///
    /// Returns whether the install succeeded. The helper is removed whatever
    /// the outcome, and a failed removal is only a warning.
    fn prepare(
        &self,
        helper: &Path,
        dir: &Path,
        out: &mut dyn Write,
    ) -> Result<bool, OrchestratorError> {
        let local_helper = dir.join(helper_file_name());
        if let Err(err) = copy_executable(helper, &local_helper) {
            writeln!(
                out,
                "Error copying installation files to {}: {err}",
                dir.display()
            )?;
            writeln!(
                out,
                "Skipping installation for {} due to file copy error",
                dir.display()
            )?;
            return Ok(false);
        }
        writeln!(out, "Copied installation files to {}", dir.display())?;

        let invocation = Invocation::new(local_helper.as_os_str(), dir).arg("prepare");
        let failure = match self.runner.run(&invocation) {
            Ok(output) => {
                out.write_all(output.stdout.as_bytes())?;
                out.write_all(output.stderr.as_bytes())?;
                if output.success() {
                    None
                } else {
                    Some(match output.code {
                        Some(code) => format!("exited with status {code}"),
                        None => "terminated by signal".to_string(),
                    })
                }
            }
            Err(err) => Some(err.to_string()),
        };

        if let Some(detail) = &failure {
            tracing::error!("preparation failed in {}: {detail}", dir.display());
            writeln!(
                out,
                "Error running {} in {}: {detail}",
                helper_file_name(),
                dir.display()
            )?;
        }

        // The helper is a full copy of this binary; never leave it in a clone.
        if let Err(err) = fs::remove_file(&local_helper) {
            tracing::warn!("could not remove {}: {err}", local_helper.display());
            writeln!(
                out,
                "Warning: Could not remove temporary files from {}: {err}",
                dir.display()
            )?;
        }

        Ok(failure.is_none())
    }
}

/// Every directory under `repo_dir` that holds a manifest, in walk order.
pub fn find_manifest_dirs(repo_dir: &Path) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(repo_dir);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    builder
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| entry.file_name() == MANIFEST_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::layout::CUSTOM_NODES_DIR;
    use crate::installer::process::testing::{FakeRunner, failed, ok};
    use crate::model::config::AppConfig;
    use std::io;
    use std::sync::Arc;

    struct Fixture {
        _root: tempfile::TempDir,
        nodes: PathBuf,
        tools: ToolsConfig,
    }

    impl Fixture {
        fn new(urls: &[&str]) -> Self {
            let root = tempfile::tempdir().unwrap();
            let nodes = root.path().join(CUSTOM_NODES_DIR);
            fs::create_dir(&nodes).unwrap();
            fs::write(nodes.join(helper_file_name()), b"helper").unwrap();
            fs::write(nodes.join(REPO_LIST_FILE), urls.join("\n")).unwrap();
            Self {
                _root: root,
                nodes,
                tools: AppConfig::defaults().unwrap().tools,
            }
        }

        fn run(&self, runner: &FakeRunner) -> (Result<RunReport, OrchestratorError>, String) {
            let mut out = Vec::new();
            let result = Orchestrator::new(self.nodes.clone(), runner, &self.tools).run(&mut out);
            (result, String::from_utf8(out).unwrap())
        }
    }

    /// `git clone` creates the repository directory; a clone of `node-a`
    /// gets a manifest at its root and one in a nested folder.
    fn git_and_helper(nodes: PathBuf, fail: &'static [&'static str]) -> FakeRunner {
        let nodes = Arc::new(nodes);
        FakeRunner::new(move |inv| {
            if inv.program == "git" {
                let url = inv.args[1].to_str().unwrap();
                if fail.iter().any(|bad| *bad == url) {
                    return failed("fatal: repository not found");
                }
                let dir = nodes.join(repo_dir_name(url));
                fs::create_dir_all(dir.join("nested")).unwrap();
                if url.ends_with("node-a") {
                    fs::write(dir.join(MANIFEST_FILE), "numpy").unwrap();
                    fs::write(dir.join("nested").join(MANIFEST_FILE), "torch").unwrap();
                }
                return ok("");
            }
            assert!(Path::new(&inv.program).is_file(), "helper copied before run");
            assert_eq!(inv.args, ["prepare"]);
            ok("Requirements installed successfully\n")
        })
    }

    #[test]
    fn clones_and_prepares_each_manifest() {
        let fx = Fixture::new(&[
            "https://github.com/acme/node-a",
            "https://github.com/acme/node-b",
        ]);
        let runner = git_and_helper(fx.nodes.clone(), &[]);

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert_eq!(report.cloned, 2);
        assert_eq!(report.installs_succeeded, 2);
        assert!(fx.nodes.join("node-a").is_dir());
        assert!(fx.nodes.join("node-b").is_dir());
        assert!(!fx.nodes.join("node-a").join(helper_file_name()).exists());
        assert!(!fx.nodes.join("node-a/nested").join(helper_file_name()).exists());

        let helper_cwds: Vec<_> = runner
            .calls()
            .into_iter()
            .filter(|inv| inv.program != "git")
            .map(|inv| inv.cwd)
            .collect();
        assert_eq!(
            helper_cwds,
            vec![fx.nodes.join("node-a/nested"), fx.nodes.join("node-a")]
        );

        assert!(out.starts_with("Found 2 repositories to process"));
        assert!(out.contains(&banner()));
        assert!(out.contains("Requirements: 2 installed, 0 failed"));
    }

    #[test]
    fn rerun_skips_existing_clones() {
        let fx = Fixture::new(&[
            "https://github.com/acme/node-a",
            "https://github.com/acme/node-b/",
        ]);
        fs::create_dir(fx.nodes.join("node-a")).unwrap();
        fs::create_dir(fx.nodes.join("node-b")).unwrap();
        fs::write(fx.nodes.join("node-a").join(MANIFEST_FILE), "numpy").unwrap();
        let runner = git_and_helper(fx.nodes.clone(), &[]);

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert!(runner.calls().is_empty());
        assert_eq!(report.skipped, 2);
        assert_eq!(report.cloned, 0);
        assert!(out.contains("Repository node-a already exists, skipping..."));
        assert!(out.contains("Repository node-b already exists, skipping..."));
    }

    #[test]
    fn clone_failure_does_not_stop_the_batch() {
        let fx = Fixture::new(&[
            "https://github.com/acme/broken",
            "https://github.com/acme/node-b",
        ]);
        let runner = git_and_helper(fx.nodes.clone(), &["https://github.com/acme/broken"]);

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert_eq!(report.clone_failures, 1);
        assert_eq!(report.cloned, 1);
        assert!(fx.nodes.join("node-b").is_dir());
        assert!(out.contains(
            "Error cloning https://github.com/acme/broken: fatal: repository not found"
        ));
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn failed_install_removes_helper_and_continues() {
        let fx = Fixture::new(&["https://github.com/acme/node-a"]);
        let nodes = fx.nodes.clone();
        let runner = FakeRunner::new(move |inv| {
            if inv.program == "git" {
                let dir = nodes.join("node-a");
                fs::create_dir_all(dir.join("nested")).unwrap();
                fs::write(dir.join(MANIFEST_FILE), "numpy").unwrap();
                fs::write(dir.join("nested").join(MANIFEST_FILE), "torch").unwrap();
                return ok("");
            }
            if inv.cwd.ends_with("nested") {
                failed("pip exploded")
            } else {
                ok("")
            }
        });

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert_eq!(report.installs_succeeded, 1);
        assert_eq!(report.installs_failed, 1);
        assert!(!fx.nodes.join("node-a").join(helper_file_name()).exists());
        assert!(!fx.nodes.join("node-a/nested").join(helper_file_name()).exists());
        assert!(out.contains("exited with status 1"));
        assert!(!out.contains("Warning: Could not remove"));
        assert!(out.contains("Requirements: 1 installed, 1 failed"));
    }

    #[test]
    fn helper_that_cannot_start_is_still_removed() {
        let fx = Fixture::new(&["https://github.com/acme/node-a"]);
        let nodes = fx.nodes.clone();
        let runner = FakeRunner::new(move |inv| {
            if inv.program == "git" {
                let dir = nodes.join("node-a");
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join(MANIFEST_FILE), "numpy").unwrap();
                return ok("");
            }
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "exec format error"))
        });

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert_eq!(report.installs_failed, 1);
        assert!(!fx.nodes.join("node-a").join(helper_file_name()).exists());
        assert!(out.contains("exec format error"));
    }

    #[test]
    fn failed_helper_removal_is_only_a_warning() {
        let fx = Fixture::new(&[
            "https://github.com/acme/node-a",
            "https://github.com/acme/node-c",
        ]);
        let nodes = fx.nodes.clone();
        let runner = FakeRunner::new(move |inv| {
            if inv.program == "git" {
                let url = inv.args[1].to_str().unwrap();
                let dir = nodes.join(repo_dir_name(url));
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join(MANIFEST_FILE), "numpy").unwrap();
                return ok("");
            }
            // node-a's helper turns into a non-empty directory while it runs
            if inv.cwd.ends_with("node-a") {
                let helper = Path::new(&inv.program);
                fs::remove_file(helper).unwrap();
                fs::create_dir(helper).unwrap();
                fs::write(helper.join("lock"), "").unwrap();
            }
            ok("Requirements installed successfully\n")
        });

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert_eq!(report.installs_succeeded, 2);
        assert_eq!(report.installs_failed, 0);
        assert!(out.contains(&format!(
            "Warning: Could not remove temporary files from {}",
            fx.nodes.join("node-a").display()
        )));
        assert!(!fx.nodes.join("node-c").join(helper_file_name()).exists());
    }

    #[test]
    fn helper_copy_failure_skips_that_directory() {
        let fx = Fixture::new(&[
            "https://github.com/acme/node-a",
            "https://github.com/acme/node-c",
        ]);
        let nodes = fx.nodes.clone();
        let runner = FakeRunner::new(move |inv| {
            if inv.program == "git" {
                let url = inv.args[1].to_str().unwrap();
                let dir = nodes.join(repo_dir_name(url));
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join(MANIFEST_FILE), "numpy").unwrap();
                if url.ends_with("node-a") {
                    // a directory in the helper's place blocks the copy
                    let blocker = dir.join(helper_file_name());
                    fs::create_dir(&blocker).unwrap();
                    fs::write(blocker.join("keep"), "").unwrap();
                }
                return ok("");
            }
            ok("")
        });

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert_eq!(report.installs_succeeded, 1);
        assert_eq!(report.installs_failed, 1);
        assert!(out.contains(&format!(
            "Skipping installation for {} due to file copy error",
            fx.nodes.join("node-a").display()
        )));
        let helper_cwds: Vec<_> = runner
            .calls()
            .into_iter()
            .filter(|inv| inv.program != "git")
            .map(|inv| inv.cwd)
            .collect();
        assert_eq!(helper_cwds, vec![fx.nodes.join("node-c")]);
    }

    #[test]
    fn git_that_cannot_start_counts_as_clone_failure() {
        let fx = Fixture::new(&[
            "https://github.com/acme/node-a",
            "https://github.com/acme/node-b",
        ]);
        let runner = FakeRunner::new(|inv| {
            assert_eq!(inv.program, "git");
            Err(io::Error::new(io::ErrorKind::NotFound, "git not installed"))
        });

        let (report, out) = fx.run(&runner);
        let report = report.unwrap();

        assert_eq!(report.clone_failures, 2);
        assert_eq!(report.cloned, 0);
        assert_eq!(runner.calls().len(), 2);
        assert!(out.contains(
            "Error while cloning https://github.com/acme/node-a: git not installed"
        ));
        assert!(out.contains(
            "Error while cloning https://github.com/acme/node-b: git not installed"
        ));
    }

    #[test]
    fn refuses_to_run_outside_custom_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let tools = AppConfig::defaults().unwrap().tools;
        let runner = FakeRunner::new(|_| ok(""));
        let mut out = Vec::new();

        let err = Orchestrator::new(dir.path().to_path_buf(), &runner, &tools)
            .run(&mut out)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::WrongWorkingDir));
    }

    #[test]
    fn missing_helper_or_list_is_fatal() {
        let fx = Fixture::new(&[]);
        let runner = FakeRunner::new(|_| ok(""));

        fs::remove_file(fx.nodes.join(REPO_LIST_FILE)).unwrap();
        let (result, _) = fx.run(&runner);
        assert!(matches!(result, Err(OrchestratorError::RepoList(_))));

        fs::remove_file(fx.nodes.join(helper_file_name())).unwrap();
        let (result, _) = fx.run(&runner);
        assert!(matches!(result, Err(OrchestratorError::MissingHelper(_))));
    }

    #[test]
    fn manifest_search_is_recursive_and_includes_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".gitignore"), "a/\n").unwrap();
        fs::write(dir.path().join("a/b").join(MANIFEST_FILE), "").unwrap();
        fs::write(dir.path().join(".hidden").join(MANIFEST_FILE), "").unwrap();
        fs::write(dir.path().join("requirements-dev.txt"), "").unwrap();

        let found = find_manifest_dirs(dir.path());
        assert_eq!(
            found,
            vec![dir.path().join(".hidden"), dir.path().join("a/b")]
        );
    }
}
