use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A normalized `owner/name` pair identifying a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid repository reference {input:?}: expected owner/name or https://github.com/owner/name")]
pub struct InvalidRepoFormat {
    pub input: String,
}

const HOSTS: &[&str] = &["github.com", "www.github.com"];

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name` or a hosting URL, optionally ending in `.git`.
    pub fn parse(input: &str) -> Result<Self, InvalidRepoFormat> {
        let invalid = || InvalidRepoFormat {
            input: input.to_string(),
        };
        let trimmed = input.trim();

        let path = if trimmed.contains("://") {
            let url = url::Url::parse(trimmed).map_err(|_| invalid())?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid());
            }
            let host = url.host_str().unwrap_or("");
            if !HOSTS.contains(&host.to_lowercase().as_str()) {
                return Err(invalid());
            }
            url.path().trim_matches('/').to_string()
        } else {
            trimmed.to_string()
        };

        let path = path.strip_suffix(".git").unwrap_or(&path);
        let mut parts = path.split('/');
        let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(invalid());
        }

        Ok(Self::new(owner, name))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl FromStr for RepoRef {
    type Err = InvalidRepoFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_name() {
        let repo = RepoRef::parse("octo/demo").unwrap();
        assert_eq!(repo, RepoRef::new("octo", "demo"));
        assert_eq!(repo.to_string(), "octo/demo");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(
            RepoRef::parse("  octo/demo \n").unwrap(),
            RepoRef::new("octo", "demo")
        );
    }

    #[test]
    fn test_parse_https_url() {
        assert_eq!(
            RepoRef::parse("https://github.com/octo/demo").unwrap(),
            RepoRef::new("octo", "demo")
        );
        assert_eq!(
            RepoRef::parse("http://www.github.com/octo/demo/").unwrap(),
            RepoRef::new("octo", "demo")
        );
    }

    #[test]
    fn test_parse_url_with_git_suffix() {
        assert_eq!(
            RepoRef::parse("https://github.com/octo/demo.git").unwrap(),
            RepoRef::new("octo", "demo")
        );
    }

    #[test]
    fn test_parse_keeps_dots_in_name() {
        assert_eq!(
            RepoRef::parse("octo/demo.rs").unwrap(),
            RepoRef::new("octo", "demo.rs")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in [
            "",
            "octo",
            "octo/",
            "/demo",
            "octo/demo/extra",
            "octo demo/x",
            "https://gitlab.com/octo/demo",
            "ftp://github.com/octo/demo",
            "https://github.com/octo",
        ] {
            let err = RepoRef::parse(input).unwrap_err();
            assert_eq!(err.input, input, "input {input:?} should be rejected");
        }
    }

    #[test]
    fn test_from_str() {
        let repo: RepoRef = "octo/demo".parse().unwrap();
        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.name, "demo");
    }
}
