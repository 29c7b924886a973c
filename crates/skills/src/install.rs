use std::path::{Component, Path, PathBuf};

use {
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    error::{Context, Error, Result},
    installed::SOURCE_MARKER,
    resolve::{ResolveOptions, SkillResolver},
    types::{InstalledSkill, MANIFEST_FILENAME, Skill},
};

/// Install a remote skill into `target_root/<skill-dir-name>/`.
///
/// Copies every file under the skill directory through the raw endpoint,
/// keeping relative structure, then writes a source marker so later scans
/// know where the skill came from. The listing comes from the resolver's
/// cache, so installing right after a refresh costs no listing call.
///
/// `cancel` is checked between files. Any failure, cancellation included,
/// removes the partially written directory.
pub async fn install_skill(
    resolver: &SkillResolver,
    skill: &Skill,
    target_root: &Path,
    options: &ResolveOptions,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let dir_name = skill.dir_name();
    let Some(dir_component) = sanitize_relative_path(dir_name)?.filter(|p| p.components().count() == 1)
    else {
        return Err(Error::InvalidPath {
            path: dir_name.to_string(),
        });
    };
    let target = target_root.join(dir_component);

    if target.exists() {
        return Err(Error::message(format!(
            "skill directory already exists: {}. Uninstall it first.",
            target.display()
        )));
    }

    let mut files = resolver
        .skill_files(&skill.source, &skill.skill_path, options)
        .await
        .with_context(|| format!("failed to list files of skill '{}'", skill.name))?;
    if files.is_empty() {
        files.push(skill.manifest_path());
    }

    tokio::fs::create_dir_all(&target).await?;
    match write_files(resolver, skill, &files, &target, options, cancel).await {
        Ok(()) => {
            info!(skill = %skill.name, files = files.len(), target = %target.display(), "installed skill");
            Ok(target)
        },
        Err(e) => {
            debug!(target = %target.display(), error = %e, "removing partial install");
            let _ = tokio::fs::remove_dir_all(&target).await;
            Err(e)
        },
    }
}

async fn write_files(
    resolver: &SkillResolver,
    skill: &Skill,
    files: &[String],
    target: &Path,
    options: &ResolveOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let prefix = if skill.skill_path.is_empty() {
        String::new()
    } else {
        format!("{}/", skill.skill_path)
    };

    for path in files {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let relative = path.strip_prefix(&prefix).unwrap_or(path);
        let Some(relative) = sanitize_relative_path(relative)? else {
            continue;
        };

        let content = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            content = resolver.fetch_file(&skill.source, path, options) => content?,
        };

        let dest = target.join(&relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, &content[..]).await?;
        debug!(%path, dest = %dest.display(), "wrote skill file");
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let marker = serde_json::to_vec_pretty(&skill.source)?;
    tokio::fs::write(target.join(SOURCE_MARKER), marker).await?;
    Ok(())
}

/// Remove an installed skill's directory.
///
/// Refuses directories that do not hold a manifest.
pub async fn uninstall_skill(base: &Path, installed: &InstalledSkill) -> Result<PathBuf> {
    let dir = base.join(&installed.location);
    if !dir.join(MANIFEST_FILENAME).is_file() {
        return Err(Error::NotFound {
            resource: format!("installed skill '{}' at {}", installed.name, dir.display()),
        });
    }
    tokio::fs::remove_dir_all(&dir).await?;
    info!(skill = %installed.name, dir = %dir.display(), "uninstalled skill");
    Ok(dir)
}

/// Validate a repository-relative path before it is joined onto a local
/// directory. `Ok(None)` for paths with no components.
fn sanitize_relative_path(path: &str) -> Result<Option<PathBuf>> {
    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath {
                    path: path.to_string(),
                });
            },
        }
    }

    if clean.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(clean))
}
