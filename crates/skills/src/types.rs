use std::{collections::BTreeMap, fmt};

use {
    serde::{Deserialize, Serialize},
    skillhub_config::RepositoryConfig,
};

/// File name of the per-skill manifest.
pub const MANIFEST_FILENAME: &str = "SKILL.md";

// ── Repository descriptor ────────────────────────────────────────────────────

/// One repository source to poll for skills. Immutable for a refresh pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub owner: String,
    pub repo: String,
    /// Directory prefix to search, without leading or trailing slashes.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// `path` is itself one skill directory rather than a container of many.
    #[serde(default, alias = "singleSkill")]
    pub single_skill: bool,
}

fn default_branch() -> String {
    "main".into()
}

impl RepositoryDescriptor {
    /// Descriptor for a directory containing many skills.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: &str,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            path: normalize_path(path),
            branch: branch.into(),
            single_skill: false,
        }
    }

    /// Descriptor whose `path` points directly at one skill directory.
    pub fn single(
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: &str,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            single_skill: true,
            ..Self::new(owner, repo, path, branch)
        }
    }

    /// `owner/repo`, the grouping key shown to users.
    pub fn source(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Full addressing tuple, used in diagnostics: `owner/repo@branch:path`.
    pub fn label(&self) -> String {
        let path = self.search_path();
        if path.is_empty() {
            format!("{}/{}@{}", self.owner, self.repo, self.branch)
        } else {
            format!("{}/{}@{}:{path}", self.owner, self.repo, self.branch)
        }
    }

    /// `path` with stray slashes removed. Empty means the repository root.
    pub fn search_path(&self) -> &str {
        self.path.trim_matches('/')
    }
}

impl fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl From<&RepositoryConfig> for RepositoryDescriptor {
    fn from(cfg: &RepositoryConfig) -> Self {
        Self {
            owner: cfg.owner.clone(),
            repo: cfg.repo.clone(),
            path: normalize_path(&cfg.path),
            branch: cfg.branch.clone(),
            single_skill: cfg.single_skill,
        }
    }
}

fn normalize_path(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

// ── Manifest metadata ────────────────────────────────────────────────────────

/// Decoded header of a `SKILL.md`.
///
/// `name` and `description` are always present and empty when the header
/// omits them; callers apply their own fallback (usually the directory name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub compatibility: Option<String>,
    /// Raw `allowed-tools` value.
    #[serde(default, rename = "allowed-tools")]
    pub allowed_tools: Option<String>,
    /// Header keys outside the recognized set, kept verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ManifestMetadata {
    /// `allowed-tools` split on whitespace and commas.
    ///
    /// YAML list markers left over from multiline values are dropped.
    pub fn allowed_tools_list(&self) -> Vec<String> {
        self.allowed_tools
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty() && *t != "-")
            .map(str::to_string)
            .collect()
    }
}

/// Parser output: the decoded header plus everything after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    pub metadata: ManifestMetadata,
    pub body: String,
}

// ── Skill ────────────────────────────────────────────────────────────────────

/// A skill published in a remote repository.
///
/// Recomputed on every resolution pass; two skills are the same skill when
/// their names match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub license: Option<String>,
    pub compatibility: Option<String>,
    pub allowed_tools: Option<String>,
    pub source: RepositoryDescriptor,
    /// Repository-relative directory holding the manifest. Empty for the root.
    pub skill_path: String,
    /// Full manifest text.
    #[serde(skip)]
    pub manifest: String,
    /// Manifest content after the header.
    #[serde(skip)]
    pub body: String,
}

impl Skill {
    /// Repository-relative path of this skill's manifest.
    pub fn manifest_path(&self) -> String {
        manifest_path(&self.skill_path)
    }

    /// Last path component of the skill directory, or the repository name for a root skill.
    pub fn dir_name(&self) -> &str {
        dir_basename(&self.skill_path).unwrap_or(&self.source.repo)
    }
}

/// `dir/SKILL.md`, or just `SKILL.md` for the repository root.
pub(crate) fn manifest_path(dir: &str) -> String {
    if dir.is_empty() {
        MANIFEST_FILENAME.to_string()
    } else {
        format!("{dir}/{MANIFEST_FILENAME}")
    }
}

pub(crate) fn dir_basename(dir: &str) -> Option<&str> {
    dir.rsplit('/').next().filter(|s| !s.is_empty())
}

// ── Installed skill ─────────────────────────────────────────────────────────

/// A skill found on local disk. Matched to remote skills by name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledSkill {
    pub name: String,
    pub description: String,
    /// Skill directory, relative to the scanned base directory.
    pub location: String,
    /// When the scan observed the skill (not when it was installed).
    pub installed_at_ms: u64,
    /// Origin recorded at install time, if any.
    #[serde(default)]
    pub source: Option<RepositoryDescriptor>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_normalizes_path() {
        let d = RepositoryDescriptor::new("acme", "skills", "/skills/", "main");
        assert_eq!(d.path, "skills");
        assert_eq!(d.label(), "acme/skills@main:skills");
        assert_eq!(d.to_string(), "acme/skills");

        let root = RepositoryDescriptor::new("acme", "skills", "", "dev");
        assert_eq!(root.label(), "acme/skills@dev");
    }

    #[test]
    fn descriptor_from_config() {
        let cfg = RepositoryConfig {
            owner: "acme".into(),
            repo: "solo".into(),
            path: "my-skill/".into(),
            branch: "main".into(),
            single_skill: true,
        };
        let d = RepositoryDescriptor::from(&cfg);
        assert_eq!(d, RepositoryDescriptor::single("acme", "solo", "my-skill", "main"));
    }

    #[test]
    fn allowed_tools_list_handles_lists_and_commas() {
        let meta = ManifestMetadata {
            allowed_tools: Some("- Read - Bash(git:*), Write".into()),
            ..Default::default()
        };
        assert_eq!(meta.allowed_tools_list(), vec!["Read", "Bash(git:*)", "Write"]);
        assert!(ManifestMetadata::default().allowed_tools_list().is_empty());
    }

    #[test]
    fn skill_dir_name_falls_back_to_repo() {
        let skill = Skill {
            name: "x".into(),
            description: String::new(),
            license: None,
            compatibility: None,
            allowed_tools: None,
            source: RepositoryDescriptor::new("acme", "tools", "", "main"),
            skill_path: String::new(),
            manifest: String::new(),
            body: String::new(),
        };
        assert_eq!(skill.dir_name(), "tools");
        assert_eq!(skill.manifest_path(), "SKILL.md");
    }
}
