/// Config schema: repositories to poll, cache lifetime, GitHub access, install roots.
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Environment variable consulted when the config carries no token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillhubConfig {
    /// Lifetime of cached listings and manifests, in seconds.
    pub cache_timeout_secs: u64,
    /// Personal access token; raises the listing endpoint's rate limit.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub github_token: Option<Secret<String>>,
    /// Base URL of the REST API serving tree listings.
    pub api_base_url: String,
    /// Base URL serving raw file content.
    pub raw_base_url: String,
    /// Installation roots, relative to the working directory.
    pub install_roots: Vec<String>,
    /// Repositories to discover skills from.
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for SkillhubConfig {
    fn default() -> Self {
        Self {
            cache_timeout_secs: 3600,
            github_token: None,
            api_base_url: "https://api.github.com".into(),
            raw_base_url: "https://raw.githubusercontent.com".into(),
            install_roots: vec![".github/skills".into(), ".claude/skills".into()],
            repositories: vec![RepositoryConfig {
                owner: "anthropics".into(),
                repo: "skills".into(),
                path: "skills".into(),
                branch: default_branch(),
                single_skill: false,
            }],
        }
    }
}

impl SkillhubConfig {
    /// Token from the config file, falling back to `GITHUB_TOKEN`.
    pub fn resolved_github_token(&self) -> Option<Secret<String>> {
        self.resolved_github_token_with(|name| std::env::var(name).ok())
    }

    fn resolved_github_token_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Secret<String>> {
        if let Some(token) = &self.github_token
            && !token.expose_secret().trim().is_empty()
        {
            return Some(token.clone());
        }
        lookup(GITHUB_TOKEN_ENV)
            .filter(|t| !t.trim().is_empty())
            .map(Secret::new)
    }

    /// Find a configured repository by `owner/repo`.
    pub fn find_repository(&self, source: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.source() == source)
    }

    /// Remove every repository entry matching `owner/repo`. Returns whether any was removed.
    pub fn remove_repository(&mut self, source: &str) -> bool {
        let before = self.repositories.len();
        self.repositories.retain(|r| r.source() != source);
        self.repositories.len() != before
    }
}

/// One repository source, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub owner: String,
    pub repo: String,
    /// Directory prefix to search; empty means the whole repository.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// `path` points at a single skill directory instead of a container.
    #[serde(default, alias = "singleSkill")]
    pub single_skill: bool,
}

impl RepositoryConfig {
    pub fn source(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn default_branch() -> String {
    "main".into()
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_defaults_and_camel_case_alias() {
        let parsed: RepositoryConfig =
            serde_json::from_str(r#"{"owner":"o","repo":"r","singleSkill":true}"#).unwrap();
        assert_eq!(parsed.branch, "main");
        assert_eq!(parsed.path, "");
        assert!(parsed.single_skill);
    }

    #[test]
    fn token_prefers_config_over_env() {
        let cfg = SkillhubConfig {
            github_token: Some(Secret::new("from-config".into())),
            ..Default::default()
        };
        let token = cfg
            .resolved_github_token_with(|_| Some("from-env".into()))
            .unwrap();
        assert_eq!(token.expose_secret(), "from-config");
    }

    #[test]
    fn token_falls_back_to_env_and_ignores_blank() {
        let cfg = SkillhubConfig {
            github_token: Some(Secret::new("  ".into())),
            ..Default::default()
        };
        let token = cfg
            .resolved_github_token_with(|name| {
                (name == GITHUB_TOKEN_ENV).then(|| "from-env".to_string())
            })
            .unwrap();
        assert_eq!(token.expose_secret(), "from-env");
        assert!(cfg.resolved_github_token_with(|_| None).is_none());
    }

    #[test]
    fn token_is_serialized_in_plain_text() {
        let cfg = SkillhubConfig {
            github_token: Some(Secret::new("ghp_x".into())),
            ..Default::default()
        };
        let toml = toml::to_string(&cfg).unwrap();
        assert!(toml.contains("github_token = \"ghp_x\""));
    }

    #[test]
    fn remove_repository_by_source() {
        let mut cfg = SkillhubConfig::default();
        assert!(cfg.find_repository("anthropics/skills").is_some());
        assert!(cfg.remove_repository("anthropics/skills"));
        assert!(!cfg.remove_repository("anthropics/skills"));
        assert!(cfg.repositories.is_empty());
    }
}
