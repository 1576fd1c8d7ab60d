use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::error::RepoListError;
use super::layout::{REPO_LIST_FILE, validate_target_dir};

static GITHUB_REPO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://github\.com/[A-Za-z0-9-]+/[A-Za-z0-9._-]+/?$")
        .expect("valid github repository regex")
});

pub fn is_valid_repo_url(url: &str) -> bool {
    GITHUB_REPO_RE.is_match(url)
}

/// Split `text` into trimmed, non-blank lines and check every one of them.
///
/// All offending lines are reported together, in input order.
pub fn validate_urls(text: &str) -> Result<Vec<String>, RepoListError> {
    let urls = non_blank_lines(text);
    if urls.is_empty() {
        return Err(RepoListError::NoUrls);
    }

    let invalid: Vec<String> = urls
        .iter()
        .filter(|url| !is_valid_repo_url(url))
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(RepoListError::InvalidUrls(invalid));
    }

    Ok(urls)
}

/// Overwrite the repository list in `target_dir` with `urls`.
///
/// Nothing is written unless the directory and every URL validate.
pub fn save<S: AsRef<str>>(urls: &[S], target_dir: &str) -> Result<(), RepoListError> {
    let dir = validate_target_dir(target_dir)?;

    let invalid: Vec<String> = urls
        .iter()
        .map(|url| url.as_ref().trim())
        .filter(|url| !is_valid_repo_url(url))
        .map(str::to_string)
        .collect();
    if !invalid.is_empty() {
        return Err(RepoListError::InvalidUrls(invalid));
    }

    let body = urls
        .iter()
        .map(|url| url.as_ref().trim())
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(dir.join(REPO_LIST_FILE), body)?;
    tracing::info!("repository list saved to {}", dir.display());
    Ok(())
}

/// Raw content of the repository list, or an empty string when there is none
/// to read for any reason.
pub fn load(target_dir: &str) -> String {
    let Ok(dir) = validate_target_dir(target_dir) else {
        return String::new();
    };

    let list_path = dir.join(REPO_LIST_FILE);
    if !list_path.exists() {
        return String::new();
    }

    fs::read_to_string(&list_path).unwrap_or_else(|err| {
        tracing::error!("error loading repositories from {}: {err}", list_path.display());
        String::new()
    })
}

/// URLs of a list file in order, as the clone run consumes them.
pub fn read_urls(list_path: &Path) -> Result<Vec<String>, RepoListError> {
    let raw = fs::read_to_string(list_path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            RepoListError::NotFound(list_path.to_path_buf())
        } else {
            RepoListError::Io(err)
        }
    })?;
    Ok(non_blank_lines(&raw))
}

fn non_blank_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
