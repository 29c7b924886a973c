use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::SkillhubConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "skillhub.toml",
    "skillhub.yaml",
    "skillhub.yml",
    "skillhub.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<SkillhubConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./skillhub.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/skillhub/skillhub.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SkillhubConfig::default()` if no config file is found or the
/// one found fails to parse. Callers re-run this on every refresh so edits
/// apply without a restart.
pub fn discover_and_load() -> SkillhubConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SkillhubConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the user-global config directory (`~/.config/skillhub/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "skillhub").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skillhub.toml")
}

/// Serialize `config` in the format implied by `path`'s extension and write it.
///
/// Creates parent directories if needed.
pub fn save_config(config: &SkillhubConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let data = match ext {
        "toml" => toml::to_string_pretty(config)
            .map_err(|e| anyhow::anyhow!("serialize config: {e}"))?,
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    };
    std::fs::write(path, data)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

/// Load the file at `path` without env substitution, apply `f`, and save it back.
///
/// `${VAR}` placeholders survive the edit, so secrets referenced from the
/// environment are never written out in resolved form. A missing file
/// starts from defaults.
pub fn update_config(
    path: &Path,
    f: impl FnOnce(&mut SkillhubConfig),
) -> anyhow::Result<SkillhubConfig> {
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        parse_config(&raw, path)?
    } else {
        SkillhubConfig::default()
    };
    f(&mut config);
    save_config(&config, path)?;
    Ok(config)
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<SkillhubConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
