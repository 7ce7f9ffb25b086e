use crate::adapters::github::RepoRef;
use crate::core::request::parse_repository;
use anyhow::{Context, Result};
use git2::Repository;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Command;

static GITHUB_REMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[:/]([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$").unwrap()
});

pub struct GitIntegration {
    repo: Repository,
}

impl GitIntegration {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(repo_path).context("Failed to find git repository")?;
        Ok(Self { repo })
    }

    pub fn get_remote_url(&self) -> Result<Option<String>> {
        let remote = self.repo.find_remote("origin")?;
        Ok(remote.url().map(|s| s.to_string()))
    }

    /// `owner/name` of the `origin` remote, when it points at GitHub.
    pub fn detect_repository(&self) -> Result<RepoRef> {
        let url = self
            .get_remote_url()?
            .context("origin remote has no URL")?;
        parse_remote_url(&url)
            .with_context(|| format!("origin remote '{}' is not a GitHub repository", url))
    }
}

/// Handles `https://github.com/o/r(.git)`, `git@github.com:o/r.git` and
/// `ssh://git@github.com/o/r`.
pub fn parse_remote_url(url: &str) -> Option<RepoRef> {
    let caps = GITHUB_REMOTE.captures(url.trim())?;
    Some(RepoRef::new(&caps[1], &caps[2]))
}

/// Repository from an explicit `owner/repo`, else from the local checkout.
pub fn resolve_repository(explicit: Option<&str>) -> Result<RepoRef> {
    match explicit {
        Some(repo) => {
            let (owner, name) = parse_repository(repo)?;
            Ok(RepoRef::new(owner, name))
        }
        None => GitIntegration::new(".")
            .and_then(|git| git.detect_repository())
            .context("could not determine repository (use --repo owner/name)"),
    }
}

/// PR number for the current branch, via `gh pr view`.
pub fn detect_pr_number(repo: &RepoRef) -> Result<u64> {
    let repo_arg = repo.to_string();
    let args = [
        "pr", "view", "--json", "number", "-q", ".number", "--repo", &repo_arg,
    ];

    let output = Command::new("gh")
        .args(args)
        .output()
        .context("failed to run gh (install GitHub CLI or pass --pr)")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "gh pr view failed: {} (try specifying --pr)",
            stderr.trim()
        );
    }

    let pr_number = String::from_utf8(output.stdout)?.trim().to_string();
    if pr_number.is_empty() {
        anyhow::bail!("Unable to determine PR number from gh output");
    }
    pr_number
        .parse()
        .with_context(|| format!("gh returned a non-numeric PR number '{}'", pr_number))
}

/// Token from `gh auth token`, the last resort after config and environment.
pub fn gh_auth_token() -> Result<String> {
    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("failed to run gh auth token")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("gh auth token failed: {}", stderr.trim());
    }
    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("gh auth token returned no token; run 'gh auth login' or set GITHUB_TOKEN");
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_common_remote_forms() {
        for url in [
            "https://github.com/octo/widgets.git",
            "https://github.com/octo/widgets",
            "git@github.com:octo/widgets.git",
            "ssh://git@github.com/octo/widgets",
        ] {
            assert_eq!(
                parse_remote_url(url),
                Some(RepoRef::new("octo", "widgets")),
                "{}",
                url
            );
        }
        assert_eq!(
            parse_remote_url("https://github.com/octo/my.repo.git"),
            Some(RepoRef::new("octo", "my.repo"))
        );
        assert_eq!(parse_remote_url("https://gitlab.com/octo/widgets"), None);
    }

    #[test]
    fn detects_repository_from_origin() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.remote("origin", "git@github.com:octo/widgets.git").unwrap();

        let git = GitIntegration::new(dir.path()).unwrap();
        assert_eq!(git.detect_repository().unwrap(), RepoRef::new("octo", "widgets"));
    }

    #[test]
    fn explicit_repository_is_validated() {
        assert_eq!(
            resolve_repository(Some("octo/widgets")).unwrap(),
            RepoRef::new("octo", "widgets")
        );
        assert!(resolve_repository(Some("not-a-repo")).is_err());
    }
}
