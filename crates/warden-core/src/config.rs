use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// Top-level configuration loaded from `.warden.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
/// Credentials are never read from the TOML-loaded fields alone; the client
/// constructors fall back to environment variables when a field is unset.
///
/// # Examples
///
/// ```
/// use warden_core::WardenConfig;
///
/// let config = WardenConfig::default();
/// assert_eq!(config.review.max_patch_chars, 2000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// GitHub API settings.
    #[serde(default)]
    pub github: GithubConfig,
    /// Jira issue tracker settings.
    #[serde(default)]
    pub jira: JiraConfig,
    /// Review behavior settings.
    #[serde(default)]
    pub review: ReviewConfig,
}

impl WardenConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Io`] if the file cannot be read, or
    /// [`WardenError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use warden_core::WardenConfig;
    /// use std::path::Path;
    ///
    /// let config = WardenConfig::from_file(Path::new(".warden.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, WardenError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::WardenConfig;
    ///
    /// let toml = r#"
    /// [review]
    /// max_patch_chars = 4000
    /// "#;
    /// let config = WardenConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.review.max_patch_chars, 4000);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, WardenError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use warden_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (e.g. `"openai"`, `"anthropic"`, `"ollama"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider. Falls back to the provider's environment
    /// variable (`OPENAI_API_KEY` for the default provider).
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 120).
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// GitHub API configuration.
///
/// # Examples
///
/// ```
/// use warden_core::GithubConfig;
///
/// let config = GithubConfig::default();
/// assert_eq!(config.api_url, "https://api.github.com");
/// assert_eq!(config.max_retries, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL; override for GitHub Enterprise.
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Personal access token. Falls back to `GITHUB_TOKEN`.
    pub token: Option<String>,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
    /// Retries after the first attempt for read calls (default: 2).
    /// Write calls never retry.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between read retries in milliseconds, doubled per
    /// attempt (default: 500).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}

fn default_github_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            token: None,
            timeout_secs: default_github_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Jira issue tracker configuration.
///
/// All credential fields fall back to environment variables
/// (`JIRA_BASE_URL`, `JIRA_PROJECT_KEY`, `JIRA_USER_EMAIL`,
/// `JIRA_API_TOKEN`). When credentials are absent the ticket stage is
/// skipped rather than failing the run.
///
/// # Examples
///
/// ```
/// use warden_core::JiraConfig;
///
/// let config = JiraConfig::default();
/// assert_eq!(config.issue_type, "Bug");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Jira site base URL, e.g. `"https://example.atlassian.net"`.
    pub base_url: Option<String>,
    /// Project the tickets are filed under.
    pub project_key: Option<String>,
    /// Account email for basic auth.
    pub user_email: Option<String>,
    /// API token for basic auth.
    pub api_token: Option<String>,
    /// Issue type for created tickets (default: `"Bug"`).
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_jira_timeout")]
    pub timeout_secs: u64,
}

fn default_issue_type() -> String {
    "Bug".into()
}

fn default_jira_timeout() -> u64 {
    30
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            project_key: None,
            user_email: None,
            api_token: None,
            issue_type: default_issue_type(),
            timeout_secs: default_jira_timeout(),
        }
    }
}

/// Review behavior configuration.
///
/// # Examples
///
/// ```
/// use warden_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.max_patch_chars, 2000);
/// assert_eq!(config.label, "warden-reviewed");
/// assert!(config.skip_patterns.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Per-file cap on patch characters sent to the model (default: 2000).
    #[serde(default = "default_max_patch_chars")]
    pub max_patch_chars: usize,
    /// Glob patterns for changed files to skip before analysis.
    #[serde(default)]
    pub skip_patterns: Vec<String>,
    /// Label applied to reviewed pull requests.
    #[serde(default = "default_label")]
    pub label: String,
    /// Repository directory that generated test files are committed under.
    #[serde(default = "default_test_dir")]
    pub test_dir: String,
}

fn default_max_patch_chars() -> usize {
    2000
}

fn default_label() -> String {
    "warden-reviewed".into()
}

fn default_test_dir() -> String {
    "tests/warden".into()
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_patch_chars: default_max_patch_chars(),
            skip_patterns: Vec::new(),
            label: default_label(),
            test_dir: default_test_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = WardenConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.timeout_secs, 30);
        assert_eq!(config.github.max_retries, 2);
        assert_eq!(config.github.retry_backoff_ms, 500);
        assert_eq!(config.jira.issue_type, "Bug");
        assert!(config.jira.base_url.is_none());
        assert_eq!(config.review.max_patch_chars, 2000);
        assert_eq!(config.review.label, "warden-reviewed");
        assert_eq!(config.review.test_dir, "tests/warden");
        assert!(config.review.skip_patterns.is_empty());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[review]
max_patch_chars = 4000
"#;
        let config = WardenConfig::from_toml(toml).unwrap();
        assert_eq!(config.review.max_patch_chars, 4000);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
base_url = "https://api.anthropic.com"
timeout_secs = 60

[github]
api_url = "https://github.example.com/api/v3"
timeout_secs = 10
max_retries = 4

[jira]
base_url = "https://example.atlassian.net"
project_key = "OPS"
issue_type = "Defect"

[review]
max_patch_chars = 1000
skip_patterns = ["*.lock", "vendor/**"]
label = "reviewed"
"#;
        let config = WardenConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.github.api_url, "https://github.example.com/api/v3");
        assert_eq!(config.github.max_retries, 4);
        assert_eq!(config.jira.base_url.as_deref(), Some("https://example.atlassian.net"));
        assert_eq!(config.jira.project_key.as_deref(), Some("OPS"));
        assert_eq!(config.jira.issue_type, "Defect");
        assert_eq!(config.review.max_patch_chars, 1000);
        assert_eq!(config.review.skip_patterns, vec!["*.lock", "vendor/**"]);
        assert_eq!(config.review.label, "reviewed");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = WardenConfig::from_toml("").unwrap();
        assert_eq!(config.review.max_patch_chars, 2000);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = WardenConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn credentials_default_to_unset() {
        let config = WardenConfig::from_toml("").unwrap();
        assert!(config.llm.api_key.is_none());
        assert!(config.github.token.is_none());
        assert!(config.jira.api_token.is_none());
        assert!(config.jira.user_email.is_none());
    }
}
