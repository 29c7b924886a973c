//! Repository resolution: one descriptor in, the skills it publishes out.
//!
//! A multi-skill repository costs one listing call (cached per
//! `owner/repo@branch`) plus one raw fetch per manifest. Raw fetches bypass
//! the rate-limited API and are cached too, so a second pass inside the cache
//! window touches the network zero times.

use std::{sync::Arc, time::Duration};

use {
    futures::future::join_all,
    skillhub_config::SkillhubConfig,
    tracing::{debug, warn},
};

use crate::{
    cache::TimedCache,
    error::Result,
    github::{GitHubApi, TreeListing},
    parse::parse_manifest,
    types::{MANIFEST_FILENAME, RepositoryDescriptor, Skill, dir_basename, manifest_path},
};

/// Remaining listing calls below which a warning is logged.
pub const RATE_LIMIT_LOW_WATER: u32 = 10;

/// Values the cache stores, one variant per resource kind.
#[derive(Debug, Clone)]
pub enum CachedResource {
    Listing(Arc<TreeListing>),
    Content(Arc<[u8]>),
}

pub type ResourceCache = TimedCache<CachedResource>;

/// Discriminated cache key; the string form carries the resource kind and
/// the full addressing tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey<'a> {
    Tree {
        owner: &'a str,
        repo: &'a str,
        reference: &'a str,
    },
    Raw {
        owner: &'a str,
        repo: &'a str,
        reference: &'a str,
        path: &'a str,
    },
}

impl std::fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree {
                owner,
                repo,
                reference,
            } => write!(f, "tree:{owner}/{repo}@{reference}"),
            Self::Raw {
                owner,
                repo,
                reference,
                path,
            } => write!(f, "raw:{owner}/{repo}@{reference}:{path}"),
        }
    }
}

/// Per-call settings, read from config at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub cache_timeout: Duration,
}

impl ResolveOptions {
    pub fn from_config(config: &SkillhubConfig) -> Self {
        Self {
            cache_timeout: Duration::from_secs(config.cache_timeout_secs),
        }
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            cache_timeout: Duration::from_secs(3600),
        }
    }
}

/// Resolves repository descriptors into skills.
pub struct SkillResolver {
    api: Arc<dyn GitHubApi>,
    cache: Arc<ResourceCache>,
}

impl SkillResolver {
    pub fn new(api: Arc<dyn GitHubApi>, cache: Arc<ResourceCache>) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// List the skills published under `descriptor`.
    ///
    /// Fails only when the repository listing itself cannot be obtained.
    /// Missing or unreadable manifests drop the one skill they belong to.
    pub async fn resolve(
        &self,
        descriptor: &RepositoryDescriptor,
        options: &ResolveOptions,
    ) -> Result<Vec<Skill>> {
        if descriptor.single_skill {
            let dir = descriptor.search_path();
            return Ok(self
                .load_skill(descriptor, dir, options)
                .await
                .into_iter()
                .collect());
        }

        let listing = self.listing(descriptor, options).await?;
        let dirs = skill_dirs(&listing, descriptor.search_path());
        debug!(repo = %descriptor.label(), candidates = dirs.len(), "resolving manifests");

        let skills: Vec<Skill> = join_all(
            dirs.iter()
                .map(|dir| self.load_skill(descriptor, dir, options)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        debug!(repo = %descriptor.label(), count = skills.len(), "resolved repository");
        Ok(skills)
    }

    /// Every file path belonging to the skill at `skill_path`, taken from the
    /// cached listing.
    pub async fn skill_files(
        &self,
        descriptor: &RepositoryDescriptor,
        skill_path: &str,
        options: &ResolveOptions,
    ) -> Result<Vec<String>> {
        let listing = self.listing(descriptor, options).await?;
        let prefix = dir_prefix(skill_path);
        Ok(listing
            .entries
            .iter()
            .filter(|e| e.is_file() && e.path.starts_with(&prefix))
            .map(|e| e.path.clone())
            .collect())
    }

    /// Recursive listing of the descriptor's branch, served from cache when fresh.
    pub async fn listing(
        &self,
        descriptor: &RepositoryDescriptor,
        options: &ResolveOptions,
    ) -> Result<Arc<TreeListing>> {
        let key = CacheKey::Tree {
            owner: &descriptor.owner,
            repo: &descriptor.repo,
            reference: &descriptor.branch,
        }
        .to_string();

        if let Some(CachedResource::Listing(listing)) = self.cache.get(&key, options.cache_timeout)
        {
            return Ok(listing);
        }

        let listing = self
            .api
            .list_tree(&descriptor.owner, &descriptor.repo, &descriptor.branch)
            .await?;

        if listing.truncated {
            warn!(
                repo = %descriptor.label(),
                entries = listing.entries.len(),
                "repository listing truncated by the server; some skills may be missing"
            );
        }
        if let Some(limit) = listing.rate_limit
            && limit.remaining < RATE_LIMIT_LOW_WATER
        {
            warn!(
                remaining = limit.remaining,
                reset = limit.reset,
                "GitHub API rate limit running low; set a token to raise it"
            );
        }

        let listing = Arc::new(listing);
        self.cache
            .set(key, CachedResource::Listing(Arc::clone(&listing)));
        Ok(listing)
    }

    /// Raw content of one repository file, served from cache when fresh.
    pub async fn fetch_file(
        &self,
        descriptor: &RepositoryDescriptor,
        path: &str,
        options: &ResolveOptions,
    ) -> Result<Arc<[u8]>> {
        let key = CacheKey::Raw {
            owner: &descriptor.owner,
            repo: &descriptor.repo,
            reference: &descriptor.branch,
            path,
        }
        .to_string();

        if let Some(CachedResource::Content(content)) = self.cache.get(&key, options.cache_timeout)
        {
            return Ok(content);
        }

        let bytes = self
            .api
            .fetch_raw(&descriptor.owner, &descriptor.repo, &descriptor.branch, path)
            .await?;
        let content: Arc<[u8]> = Arc::from(bytes);
        self.cache
            .set(key, CachedResource::Content(Arc::clone(&content)));
        Ok(content)
    }

    async fn load_skill(
        &self,
        descriptor: &RepositoryDescriptor,
        dir: &str,
        options: &ResolveOptions,
    ) -> Option<Skill> {
        let path = manifest_path(dir);
        match self.fetch_file(descriptor, &path, options).await {
            Ok(bytes) => Some(build_skill(
                descriptor,
                dir,
                &String::from_utf8_lossy(&bytes),
            )),
            Err(e) => {
                debug!(repo = %descriptor.label(), %path, error = %e, "skipping skill without readable manifest");
                None
            },
        }
    }
}

/// `dir/`, or empty for the repository root.
fn dir_prefix(dir: &str) -> String {
    if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    }
}

/// Directories at or under `base` that hold a manifest file.
fn skill_dirs(listing: &TreeListing, base: &str) -> Vec<String> {
    let prefix = dir_prefix(base);
    listing
        .entries
        .iter()
        .filter(|e| e.is_file() && e.path.starts_with(&prefix))
        .filter_map(|e| {
            if e.path == MANIFEST_FILENAME {
                return Some(String::new());
            }
            e.path
                .strip_suffix(MANIFEST_FILENAME)?
                .strip_suffix('/')
                .map(str::to_string)
        })
        .collect()
}

fn build_skill(descriptor: &RepositoryDescriptor, dir: &str, text: &str) -> Skill {
    let parsed = parse_manifest(text);
    let meta = parsed.metadata;
    let name = if meta.name.is_empty() {
        dir_basename(dir).unwrap_or(&descriptor.repo).to_string()
    } else {
        meta.name
    };

    Skill {
        name,
        description: meta.description,
        license: meta.license,
        compatibility: meta.compatibility,
        allowed_tools: meta.allowed_tools,
        source: descriptor.clone(),
        skill_path: dir.to_string(),
        manifest: text.to_string(),
        body: parsed.body,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::testing::FakeGitHub, std::sync::atomic::Ordering};

    fn resolver(api: FakeGitHub) -> (SkillResolver, Arc<FakeGitHub>) {
        let api = Arc::new(api);
        let resolver = SkillResolver::new(api.clone(), Arc::new(ResourceCache::new()));
        (resolver, api)
    }

    fn names(skills: &[Skill]) -> Vec<String> {
        let mut names: Vec<String> = skills.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn cache_keys_discriminate_resource_kind() {
        let tree = CacheKey::Tree {
            owner: "o",
            repo: "r",
            reference: "main",
        };
        let raw = CacheKey::Raw {
            owner: "o",
            repo: "r",
            reference: "main",
            path: "SKILL.md",
        };
        assert_eq!(tree.to_string(), "tree:o/r@main");
        assert_eq!(raw.to_string(), "raw:o/r@main:SKILL.md");
    }

    #[tokio::test]
    async fn filters_by_directory_prefix() {
        let (resolver, _) = resolver(FakeGitHub::new().with_repo("acme", "skills", "main", &[
            ("skills/a/SKILL.md", "---\nname: a\ndescription: A\n---\n"),
            ("skills/b/SKILL.md", "---\nname: b\ndescription: B\n---\n"),
            ("other/SKILL.md", "---\nname: other\n---\n"),
            ("skills-extra/c/SKILL.md", "---\nname: c\n---\n"),
        ]));
        let d = RepositoryDescriptor::new("acme", "skills", "skills", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert_eq!(names(&skills), vec!["a", "b"]);
        let a = skills.iter().find(|s| s.name == "a").unwrap();
        assert_eq!(a.skill_path, "skills/a");
        assert_eq!(a.description, "A");
        assert_eq!(a.source, d);
    }

    #[tokio::test]
    async fn nested_and_root_manifests() {
        let (resolver, _) = resolver(FakeGitHub::new().with_repo("acme", "tools", "main", &[
            ("SKILL.md", "no header at all"),
            ("group/deep/pdf/SKILL.md", "---\ndescription: PDFs\n---\n"),
            ("group/deep/pdf/NOTSKILL.md", "ignored"),
        ]));
        let d = RepositoryDescriptor::new("acme", "tools", "", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert_eq!(names(&skills), vec!["pdf", "tools"]);
        let root = skills.iter().find(|s| s.name == "tools").unwrap();
        assert_eq!(root.skill_path, "");
        assert_eq!(root.body, "no header at all");
    }

    #[tokio::test]
    async fn name_falls_back_to_directory() {
        let (resolver, _) = resolver(FakeGitHub::new().with_repo("acme", "skills", "main", &[(
            "skills/pdf-tools/SKILL.md",
            "---\ndescription: Work with PDFs\n---\nUse pdftotext.",
        )]));
        let d = RepositoryDescriptor::new("acme", "skills", "skills", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert_eq!(skills[0].name, "pdf-tools");
        assert_eq!(skills[0].body, "Use pdftotext.");
        assert!(skills[0].manifest.starts_with("---\ndescription"));
    }

    #[tokio::test]
    async fn missing_manifest_drops_only_that_skill() {
        let api = FakeGitHub::new()
            .with_repo("acme", "skills", "main", &[(
                "skills/good/SKILL.md",
                "---\nname: good\n---\n",
            )])
            .with_listed_only("acme", "skills", "main", "skills/ghost/SKILL.md");
        let (resolver, api) = resolver(api);
        let d = RepositoryDescriptor::new("acme", "skills", "skills", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert_eq!(names(&skills), vec!["good"]);
        assert_eq!(api.raw_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_pass_within_timeout_uses_no_network() {
        let (resolver, api) = resolver(FakeGitHub::new().with_repo("acme", "skills", "main", &[
            ("skills/a/SKILL.md", "---\nname: a\n---\n"),
            ("skills/b/SKILL.md", "---\nname: b\n---\n"),
        ]));
        let d = RepositoryDescriptor::new("acme", "skills", "skills", "main");
        let options = ResolveOptions::default();

        let first = resolver.resolve(&d, &options).await.unwrap();
        let calls_after_first = api.calls();
        assert_eq!(calls_after_first, 3);

        let second = resolver.resolve(&d, &options).await.unwrap();
        assert_eq!(api.calls(), calls_after_first);

        let mut first_sorted = first.clone();
        let mut second_sorted = second.clone();
        first_sorted.sort_by(|a, b| a.name.cmp(&b.name));
        second_sorted.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(first_sorted, second_sorted);
    }

    #[tokio::test]
    async fn zero_timeout_refetches() {
        let (resolver, api) = resolver(FakeGitHub::new().with_repo("acme", "skills", "main", &[(
            "skills/a/SKILL.md",
            "---\nname: a\n---\n",
        )]));
        let d = RepositoryDescriptor::new("acme", "skills", "skills", "main");
        let options = ResolveOptions {
            cache_timeout: Duration::ZERO,
        };

        resolver.resolve(&d, &options).await.unwrap();
        // Let the entries age past a zero timeout.
        tokio::time::sleep(Duration::from_millis(5)).await;
        resolver.resolve(&d, &options).await.unwrap();
        assert_eq!(api.tree_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_skill_uses_manifest_name() {
        let (resolver, api) = resolver(FakeGitHub::new().with_repo("acme", "solo", "main", &[(
            "my-skill/SKILL.md",
            "---\nname: Fancy Name\ndescription: d\n---\n",
        )]));
        let d = RepositoryDescriptor::single("acme", "solo", "my-skill", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "Fancy Name");
        assert_eq!(skills[0].skill_path, "my-skill");
        assert_eq!(api.tree_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_skill_falls_back_to_path_name() {
        let (resolver, _) = resolver(FakeGitHub::new().with_repo("acme", "solo", "main", &[(
            "my-skill/SKILL.md",
            "plain text manifest",
        )]));
        let d = RepositoryDescriptor::single("acme", "solo", "my-skill", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "my-skill");
    }

    #[tokio::test]
    async fn single_skill_swallows_fetch_errors() {
        let (resolver, _) = resolver(FakeGitHub::new().with_unreachable("acme", "solo"));
        let d = RepositoryDescriptor::single("acme", "solo", "my-skill", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert!(skills.is_empty());
    }

    #[tokio::test]
    async fn missing_repository_is_an_error() {
        let (resolver, _) = resolver(FakeGitHub::new());
        let d = RepositoryDescriptor::new("acme", "gone", "skills", "main");

        let err = resolver
            .resolve(&d, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn truncated_listing_still_resolves() {
        let api = FakeGitHub::new()
            .with_repo("acme", "big", "main", &[(
                "skills/a/SKILL.md",
                "---\nname: a\n---\n",
            )])
            .with_truncated("acme", "big", "main");
        let (resolver, _) = resolver(api);
        let d = RepositoryDescriptor::new("acme", "big", "skills", "main");

        let skills = resolver.resolve(&d, &ResolveOptions::default()).await.unwrap();
        assert_eq!(names(&skills), vec!["a"]);
    }

    #[tokio::test]
    async fn skill_files_reuse_cached_listing() {
        let (resolver, api) = resolver(FakeGitHub::new().with_repo("acme", "skills", "main", &[
            ("skills/a/SKILL.md", "---\nname: a\n---\n"),
            ("skills/a/scripts/run.sh", "echo hi"),
            ("skills/ab/SKILL.md", "---\nname: ab\n---\n"),
        ]));
        let d = RepositoryDescriptor::new("acme", "skills", "skills", "main");
        let options = ResolveOptions::default();

        resolver.resolve(&d, &options).await.unwrap();
        let mut files = resolver.skill_files(&d, "skills/a", &options).await.unwrap();
        files.sort();

        assert_eq!(files, vec!["skills/a/SKILL.md", "skills/a/scripts/run.sh"]);
        assert_eq!(api.tree_calls.load(Ordering::SeqCst), 1);
    }
}
