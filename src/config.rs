use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub repo: Option<String>,
    pub pr: Option<u64>,

    /// Default `--author` filter for `list`.
    pub author: Option<String>,

    #[serde(default = "default_true")]
    pub validate: bool,

    #[serde(default = "default_true")]
    pub expand_suggestions: bool,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default)]
    pub review: ReviewDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReviewDefaults {
    /// Event used by `review` and `close-pending-review` when none is given.
    pub event: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: None,
            pr: None,
            author: None,
            validate: true,
            expand_suggestions: true,
            api_url: default_api_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            review: ReviewDefaults::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        for candidate in [".ghcomment.yml", ".ghcomment.yaml"] {
            let config_path = PathBuf::from(candidate);
            if config_path.exists() {
                return Self::from_file(&config_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".ghcomment.yml");
            if home_config.exists() {
                return Self::from_file(&home_config);
            }
        }

        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn merge_with_cli(&mut self, cli_repo: Option<String>, cli_pr: Option<u64>, cli_validate: Option<bool>) {
        if let Some(repo) = cli_repo {
            self.repo = Some(repo);
        }
        if let Some(pr) = cli_pr {
            self.pr = Some(pr);
        }
        if let Some(validate) = cli_validate {
            self.validate = validate;
        }
    }

    /// Config `token`, then `GITHUB_TOKEN`, then `GH_TOKEN`. The `gh auth token`
    /// fallback lives with the other `gh` helpers in `core::git`.
    pub fn token_from_env(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .or_else(|| std::env::var("GH_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    2
}

fn default_true() -> bool {
    true
}
