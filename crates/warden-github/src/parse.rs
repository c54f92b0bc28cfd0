use url::Url;

use warden_core::{PrLocator, Result, WardenError};

/// Parse a GitHub pull request URL into its coordinates.
///
/// Accepts `https://github.com/{owner}/{repo}/pull/{number}` with optional
/// trailing segments (`/files`, `/commits`), query, fragment, and trailing
/// slashes. The host must be exactly `github.com` (hosts are compared
/// case-insensitively); the pull request number is the numeric prefix of the
/// fourth path segment.
///
/// # Errors
///
/// Returns [`WardenError::InvalidUrl`] describing the first check that
/// failed.
///
/// # Examples
///
/// ```
/// use warden_github::parse_pr_url;
///
/// let pr = parse_pr_url("https://github.com/rust-lang/cargo/pull/1234/files").unwrap();
/// assert_eq!(pr.owner, "rust-lang");
/// assert_eq!(pr.repo, "cargo");
/// assert_eq!(pr.number, 1234);
///
/// assert!(parse_pr_url("https://github.com/rust-lang/cargo/issues/1234").is_err());
/// ```
pub fn parse_pr_url(input: &str) -> Result<PrLocator> {
    let trimmed = input.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| WardenError::InvalidUrl(format!("'{input}': {e}")))?;

    if url.host_str() != Some("github.com") {
        return Err(WardenError::InvalidUrl(format!(
            "'{input}': host must be github.com"
        )));
    }

    let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 4 {
        return Err(WardenError::InvalidUrl(format!(
            "'{input}': expected /owner/repo/pull/number"
        )));
    }
    if segments[2] != "pull" {
        return Err(WardenError::InvalidUrl(format!(
            "'{input}': third path segment must be 'pull', got '{}'",
            segments[2]
        )));
    }

    let digits: String = segments[3]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Err(WardenError::InvalidUrl(format!(
            "'{input}': '{}' does not start with a pull request number",
            segments[3]
        )));
    }
    let number: u64 = digits
        .parse()
        .map_err(|_| WardenError::InvalidUrl(format!("'{input}': pull request number too large")))?;

    Ok(PrLocator {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        number,
    })
}
