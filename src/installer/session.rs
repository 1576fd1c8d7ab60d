//! The four front-end actions. Each takes the raw form input and returns the
//! text the user sees; nothing here fails past this boundary.

use std::path::Path;
use std::sync::Arc;

use super::layout::{entry_file_name, validate_target_dir};
use super::orchestrator::banner;
use super::process::{CommandRunner, Invocation};
use super::repo_list;
use super::toolkit::Toolkit;

pub const COMPLETION_MESSAGE: &str = "Installation process completed!";

#[derive(Clone)]
pub struct NodeInstaller {
    runner: Arc<dyn CommandRunner>,
    toolkit: Toolkit,
}

impl NodeInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>, toolkit: Toolkit) -> Self {
        Self { runner, toolkit }
    }

    pub fn validate_path(&self, path: &str) -> String {
        let message = match validate_target_dir(path) {
            Ok(_) => "Path is valid".to_string(),
            Err(err) => err.to_string(),
        };
        format!("Path validation: {message}")
    }

    pub fn load_repos(&self, path: &str) -> String {
        repo_list::load(path)
    }

    pub fn save_repos(&self, repos_text: &str, path: &str) -> String {
        tracing::info!("attempting to save repositories to {path}");

        let target = match validate_target_dir(path) {
            Ok(target) => target,
            Err(err) => return format!("Error: {err}"),
        };
        let urls = match repo_list::validate_urls(repos_text) {
            Ok(urls) => urls,
            Err(err) => return format!("Error: {err}"),
        };

        if let Err(err) = self.toolkit.install_into(&target) {
            tracing::error!("error copying files: {err}");
            return format!("Error: {err}");
        }

        match repo_list::save(&urls, path) {
            Ok(()) => "Repository list and required files saved successfully!".to_string(),
            Err(err) => {
                tracing::error!("error saving repositories: {err}");
                format!("Error: {err}")
            }
        }
    }

    /// Run the clone entry in `path` and collect everything it printed.
    pub fn install_nodes(&self, path: &str) -> String {
        tracing::info!("starting node installation in {path}");

        let target = match validate_target_dir(path) {
            Ok(target) => target,
            Err(err) => return format!("Error: {err}"),
        };

        let entry = target.join(entry_file_name());
        if !entry.is_file() {
            return format!(
                "Error: {} not found! Please save repository list first.",
                entry_file_name()
            );
        }

        let output = match self.runner.run(&entry_invocation(&entry, &target)) {
            Ok(output) => output,
            Err(err) => {
                tracing::error!("installation error: {err}");
                return format!("Installation error: {err}");
            }
        };

        if !output.stdout.is_empty() {
            tracing::info!("installation output: {}", output.stdout);
        }
        if !output.stderr.is_empty() {
            tracing::error!("installation errors: {}", output.stderr);
        }

        let mut formatted = String::new();
        if !output.stdout.is_empty() {
            formatted.push_str(&output.stdout);
            formatted.push('\n');
        }
        if !output.stderr.is_empty() {
            formatted.push_str("\nErrors:\n");
            formatted.push_str(&output.stderr);
        }
        formatted.push('\n');
        formatted.push_str(&banner());
        formatted.push('\n');
        formatted.push_str(COMPLETION_MESSAGE);

        tracing::info!("{COMPLETION_MESSAGE}");
        formatted.trim().to_string()
    }
}

fn entry_invocation(entry: &Path, target: &Path) -> Invocation {
    Invocation::new(entry.as_os_str(), target).arg("clone")
}
