//! Local scan of installed skills.
//!
//! Each install root holds one directory per skill with a `SKILL.md` inside.
//! The scan is synchronous and stateless; callers rerun it to refresh.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::debug;

use crate::{
    parse::parse_manifest,
    types::{InstalledSkill, MANIFEST_FILENAME, RepositoryDescriptor},
};

/// Written next to an installed manifest to remember where it came from.
pub const SOURCE_MARKER: &str = ".skillhub-source.json";

/// Scan `roots` (resolved against `base` when relative) for installed skills.
///
/// Missing roots are skipped. Directories without a readable manifest are
/// not skills. Result order follows the filesystem and is not stable.
pub fn scan_installed(base: &Path, roots: &[PathBuf]) -> Vec<InstalledSkill> {
    let observed_at = now_ms();
    let mut skills = Vec::new();

    for root in roots {
        let dir = base.join(root);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %dir.display(), error = %e, "skipping install root");
                continue;
            },
        };

        for entry in entries.flatten() {
            let skill_dir = entry.path();
            if !skill_dir.is_dir() {
                continue;
            }
            if let Some(skill) = read_installed(base, &skill_dir, observed_at) {
                skills.push(skill);
            }
        }
    }

    debug!(count = skills.len(), "scanned installed skills");
    skills
}

fn read_installed(base: &Path, skill_dir: &Path, observed_at: u64) -> Option<InstalledSkill> {
    let content = std::fs::read_to_string(skill_dir.join(MANIFEST_FILENAME)).ok()?;
    let meta = parse_manifest(&content).metadata;
    let dir_name = skill_dir.file_name()?.to_string_lossy().to_string();

    let location = skill_dir
        .strip_prefix(base)
        .unwrap_or(skill_dir)
        .to_string_lossy()
        .replace('\\', "/");

    Some(InstalledSkill {
        name: if meta.name.is_empty() {
            dir_name
        } else {
            meta.name
        },
        description: meta.description,
        location,
        installed_at_ms: observed_at,
        source: read_source_marker(skill_dir),
    })
}

fn read_source_marker(skill_dir: &Path) -> Option<RepositoryDescriptor> {
    let raw = std::fs::read_to_string(skill_dir.join(SOURCE_MARKER)).ok()?;
    match serde_json::from_str(&raw) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            debug!(dir = %skill_dir.display(), error = %e, "ignoring malformed source marker");
            None
        },
    }
}

/// Names of the installed skills, for membership checks.
pub fn installed_names(installed: &[InstalledSkill]) -> HashSet<String> {
    installed.iter().map(|s| s.name.clone()).collect()
}

pub fn find_installed<'a>(installed: &'a [InstalledSkill], name: &str) -> Option<&'a InstalledSkill> {
    installed.iter().find(|s| s.name == name)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
