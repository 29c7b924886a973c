//! The user-facing skill list: remote skills marked with installed state.
//!
//! Refreshes may overlap. Each one takes a generation number up front and
//! its result is applied only if no later refresh has landed first.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use {serde::Serialize, tracing::debug};

use crate::{
    aggregate::{FetchReport, RepositoryFailure, SkillAggregator},
    installed::installed_names,
    resolve::ResolveOptions,
    types::{InstalledSkill, RepositoryDescriptor, Skill},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub skill: Skill,
    pub installed: bool,
}

#[derive(Default)]
struct CatalogState {
    applied_generation: u64,
    entries: Vec<CatalogEntry>,
    failures: Vec<RepositoryFailure>,
}

/// Result of [`SkillCatalog::refresh`].
#[derive(Debug)]
pub struct RefreshOutcome {
    /// False when a newer refresh was applied while this one ran.
    pub applied: bool,
    pub report: FetchReport,
}

#[derive(Default)]
pub struct SkillCatalog {
    next_generation: AtomicU64,
    state: Mutex<CatalogState>,
}

impl SkillCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the generation number for a refresh that is about to start.
    pub fn begin_refresh(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the snapshot with `report` if `generation` is the newest seen.
    pub fn apply(
        &self,
        generation: u64,
        report: &FetchReport,
        installed: &[InstalledSkill],
    ) -> bool {
        let names = installed_names(installed);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if generation <= state.applied_generation {
            debug!(
                generation,
                applied = state.applied_generation,
                "discarding stale refresh"
            );
            return false;
        }

        state.applied_generation = generation;
        state.entries = report
            .skills
            .iter()
            .map(|skill| CatalogEntry {
                installed: names.contains(&skill.name),
                skill: skill.clone(),
            })
            .collect();
        state.failures = report.failures.clone();
        true
    }

    /// Fetch every repository and apply the result, respecting generation order.
    pub async fn refresh(
        &self,
        aggregator: &SkillAggregator,
        descriptors: &[RepositoryDescriptor],
        options: &ResolveOptions,
        installed: &[InstalledSkill],
    ) -> RefreshOutcome {
        let generation = self.begin_refresh();
        let report = aggregator.fetch_all(descriptors, options).await;
        let applied = self.apply(generation, &report, installed);
        RefreshOutcome { applied, report }
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.state
            .lock()
            .map(|s| s.entries.clone())
            .unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<RepositoryFailure> {
        self.state
            .lock()
            .map(|s| s.failures.clone())
            .unwrap_or_default()
    }

    /// First entry with `name`. Names may repeat across repositories.
    pub fn find(&self, name: &str) -> Option<CatalogEntry> {
        self.state
            .lock()
            .ok()?
            .entries
            .iter()
            .find(|e| e.skill.name == name)
            .cloned()
    }

    /// Entries grouped by `owner/repo`, each group sorted by name.
    pub fn grouped_by_source(&self) -> BTreeMap<String, Vec<CatalogEntry>> {
        let mut groups: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
        for entry in self.entries() {
            groups
                .entry(entry.skill.source.source())
                .or_default()
                .push(entry);
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.skill.name.cmp(&b.skill.name));
        }
        groups
    }
}
