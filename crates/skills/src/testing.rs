//! In-memory [`GitHubApi`] for resolver, aggregator and installer tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    github::{GitHubApi, RateLimit, TreeEntry, TreeEntryKind, TreeListing},
};

#[derive(Default)]
pub(crate) struct FakeGitHub {
    trees: HashMap<String, TreeListing>,
    files: HashMap<String, Vec<u8>>,
    unreachable: HashSet<String>,
    pub tree_calls: AtomicUsize,
    pub raw_calls: AtomicUsize,
    pub raw_paths: Mutex<Vec<String>>,
}

fn repo_key(owner: &str, repo: &str, reference: &str) -> String {
    format!("{owner}/{repo}@{reference}")
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register files; the tree listing is derived from their paths.
    pub fn with_repo(mut self, owner: &str, repo: &str, reference: &str, files: &[(&str, &str)]) -> Self {
        let mut entries = Vec::new();
        let mut dirs = HashSet::new();
        for (path, content) in files {
            let mut parent = *path;
            while let Some((dir, _)) = parent.rsplit_once('/') {
                if dirs.insert(dir.to_string()) {
                    entries.push(TreeEntry {
                        path: dir.to_string(),
                        kind: TreeEntryKind::Tree,
                    });
                }
                parent = dir;
            }
            entries.push(TreeEntry {
                path: (*path).to_string(),
                kind: TreeEntryKind::Blob,
            });
            self.files.insert(
                format!("{}:{path}", repo_key(owner, repo, reference)),
                content.as_bytes().to_vec(),
            );
        }
        self.trees.insert(repo_key(owner, repo, reference), TreeListing {
            entries,
            truncated: false,
            rate_limit: Some(RateLimit {
                remaining: 4999,
                reset: 0,
            }),
        });
        self
    }

    /// Listing entry with no fetchable content behind it.
    pub fn with_listed_only(mut self, owner: &str, repo: &str, reference: &str, path: &str) -> Self {
        if let Some(tree) = self.trees.get_mut(&repo_key(owner, repo, reference)) {
            tree.entries.push(TreeEntry {
                path: path.to_string(),
                kind: TreeEntryKind::Blob,
            });
        }
        self
    }

    pub fn with_truncated(mut self, owner: &str, repo: &str, reference: &str) -> Self {
        if let Some(tree) = self.trees.get_mut(&repo_key(owner, repo, reference)) {
            tree.truncated = true;
            tree.rate_limit = Some(RateLimit {
                remaining: 3,
                reset: 1_700_000_000,
            });
        }
        self
    }

    /// Every request against this repository fails at the transport level.
    pub fn with_unreachable(mut self, owner: &str, repo: &str) -> Self {
        self.unreachable.insert(format!("{owner}/{repo}"));
        self
    }

    pub fn calls(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst) + self.raw_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn list_tree(&self, owner: &str, repo: &str, reference: &str) -> Result<TreeListing> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.contains(&format!("{owner}/{repo}")) {
            return Err(Error::message(format!("connection refused: {owner}/{repo}")));
        }
        self.trees
            .get(&repo_key(owner, repo, reference))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                resource: format!("repository or branch {owner}/{repo}@{reference}"),
            })
    }

    async fn fetch_raw(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<Vec<u8>> {
        self.raw_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut paths) = self.raw_paths.lock() {
            paths.push(path.to_string());
        }
        if self.unreachable.contains(&format!("{owner}/{repo}")) {
            return Err(Error::message(format!("connection refused: {owner}/{repo}")));
        }
        self.files
            .get(&format!("{}:{path}", repo_key(owner, repo, reference)))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                resource: format!("file {path}"),
            })
    }
}
