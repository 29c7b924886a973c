//! CLI commands for the configured repository list.

use std::path::Path;

use {
    clap::Subcommand,
    skillhub_config::{RepositoryConfig, SkillhubConfig, find_or_default_config_path, update_config},
};

#[derive(Subcommand)]
pub enum RepoAction {
    /// List configured repositories.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Add a repository (owner/repo or GitHub URL).
    Add {
        source: String,
        /// Directory to search; the repository root when omitted.
        #[arg(long, default_value = "")]
        path: String,
        #[arg(long, default_value = "main")]
        branch: String,
        /// `--path` points at one skill directory.
        #[arg(long)]
        single: bool,
    },
    /// Remove every entry for a repository.
    Remove { source: String },
}

pub fn handle_repos(
    action: RepoAction,
    config: &SkillhubConfig,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(find_or_default_config_path);

    match action {
        RepoAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config.repositories)?);
            } else if config.repositories.is_empty() {
                println!("No repositories configured.");
            } else {
                for repo in &config.repositories {
                    let dir = if repo.path.is_empty() {
                        "/"
                    } else {
                        repo.path.as_str()
                    };
                    let kind = if repo.single_skill {
                        " (single skill)"
                    } else {
                        ""
                    };
                    println!("  {}@{} {dir}{kind}", repo.source(), repo.branch);
                }
            }
        },
        RepoAction::Add {
            source,
            path: dir,
            branch,
            single,
        } => {
            let (owner, repo) = parse_source(&source)?;
            let entry = RepositoryConfig {
                owner,
                repo,
                path: dir.trim_matches('/').to_string(),
                branch,
                single_skill: single,
            };
            if config.repositories.contains(&entry) {
                anyhow::bail!("repository '{}' is already configured", entry.source());
            }
            let label = entry.source();
            update_config(&path, |cfg| cfg.repositories.push(entry))?;
            println!("Added '{label}' to {}", path.display());
        },
        RepoAction::Remove { source } => {
            let (owner, repo) = parse_source(&source)?;
            let source = format!("{owner}/{repo}");
            if config.find_repository(&source).is_none() {
                anyhow::bail!("repository '{source}' is not configured");
            }
            update_config(&path, |cfg| {
                cfg.remove_repository(&source);
            })?;
            println!("Removed '{source}' from {}", path.display());
        },
    }

    Ok(())
}

/// Parse `owner/repo` from a source string.
/// Accepts `owner/repo`, `https://github.com/owner/repo`, or with trailing slash/`.git`.
fn parse_source(source: &str) -> anyhow::Result<(String, String)> {
    let s = source.trim().trim_end_matches('/').trim_end_matches(".git");
    let s = s
        .strip_prefix("https://github.com/")
        .or_else(|| s.strip_prefix("http://github.com/"))
        .or_else(|| s.strip_prefix("github.com/"))
        .unwrap_or(s);
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        anyhow::bail!("invalid repository '{source}': expected 'owner/repo' or GitHub URL");
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
