//! Fan-out over every configured repository with per-repository fault isolation.

use std::sync::Arc;

use {futures::future::join_all, serde::Serialize, tracing::{info, warn}};

use crate::{
    resolve::{ResolveOptions, SkillResolver},
    types::{RepositoryDescriptor, Skill},
};

/// A repository whose listing could not be obtained during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryFailure {
    pub descriptor: RepositoryDescriptor,
    pub reason: String,
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Skills from every repository that answered, in descriptor order.
    /// Names are not deduplicated across repositories.
    pub skills: Vec<Skill>,
    pub failures: Vec<RepositoryFailure>,
}

impl FetchReport {
    /// User-facing message when nothing could be fetched at all.
    ///
    /// Partial failures produce no diagnostic; they are only logged.
    pub fn diagnostic(&self) -> Option<String> {
        if !self.skills.is_empty() {
            return None;
        }
        let first = self.failures.first()?;
        let mut message = format!(
            "Failed to fetch skills from {}: {}",
            first.descriptor, first.reason
        );
        if self.failures.len() > 1 {
            message.push_str(&format!(" (and {} more)", self.failures.len() - 1));
        }
        Some(message)
    }
}

/// Runs every repository resolution concurrently.
pub struct SkillAggregator {
    resolver: Arc<SkillResolver>,
}

impl SkillAggregator {
    pub fn new(resolver: Arc<SkillResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<SkillResolver> {
        &self.resolver
    }

    /// Resolve all `descriptors`. Never fails as a whole: a repository that
    /// errors contributes a [`RepositoryFailure`] and zero skills.
    pub async fn fetch_all(
        &self,
        descriptors: &[RepositoryDescriptor],
        options: &ResolveOptions,
    ) -> FetchReport {
        let results = join_all(
            descriptors
                .iter()
                .map(|d| self.resolver.resolve(d, options)),
        )
        .await;

        let mut report = FetchReport::default();
        for (descriptor, result) in descriptors.iter().zip(results) {
            match result {
                Ok(skills) => report.skills.extend(skills),
                Err(e) => {
                    warn!(repo = %descriptor.label(), error = %e, "failed to fetch skills");
                    report.failures.push(RepositoryFailure {
                        descriptor: descriptor.clone(),
                        reason: e.to_string(),
                    });
                },
            }
        }

        info!(
            repositories = descriptors.len(),
            skills = report.skills.len(),
            failed = report.failures.len(),
            "aggregated skills"
        );
        report
    }
}
