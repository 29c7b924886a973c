//! CLI commands for browsing, installing and removing skills.

use std::{path::PathBuf, sync::Arc};

use {
    skillhub_config::SkillhubConfig,
    skillhub_skills::{
        Error,
        aggregate::{FetchReport, SkillAggregator},
        catalog::{CatalogEntry, SkillCatalog},
        github::GitHubClient,
        install::{install_skill, uninstall_skill},
        installed::{find_installed, scan_installed},
        parse::parse_manifest,
        resolve::{ResolveOptions, ResourceCache, SkillResolver},
        types::{InstalledSkill, RepositoryDescriptor},
    },
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

/// Everything one CLI invocation needs, built from the freshly loaded config.
pub struct Session {
    config: SkillhubConfig,
    base: PathBuf,
    aggregator: SkillAggregator,
    options: ResolveOptions,
}

impl Session {
    pub fn new(config: SkillhubConfig) -> anyhow::Result<Self> {
        let resolver = SkillResolver::new(
            Arc::new(GitHubClient::from_config(&config)),
            Arc::new(ResourceCache::new()),
        );
        Ok(Self {
            options: ResolveOptions::from_config(&config),
            aggregator: SkillAggregator::new(Arc::new(resolver)),
            base: std::env::current_dir()?,
            config,
        })
    }

    fn descriptors(&self) -> Vec<RepositoryDescriptor> {
        self.config
            .repositories
            .iter()
            .map(RepositoryDescriptor::from)
            .collect()
    }

    fn install_roots(&self) -> Vec<PathBuf> {
        self.config.install_roots.iter().map(PathBuf::from).collect()
    }

    fn scan(&self) -> Vec<InstalledSkill> {
        scan_installed(&self.base, &self.install_roots())
    }

    async fn load_catalog(&self) -> (SkillCatalog, FetchReport) {
        let catalog = SkillCatalog::new();
        let outcome = catalog
            .refresh(&self.aggregator, &self.descriptors(), &self.options, &self.scan())
            .await;
        if let Some(message) = outcome.report.diagnostic() {
            eprintln!("{message}");
        }
        (catalog, outcome.report)
    }

    pub async fn list(&self, json: bool) -> anyhow::Result<()> {
        let (catalog, report) = self.load_catalog().await;

        if json {
            let out = serde_json::json!({
                "skills": catalog.entries(),
                "failures": report.failures,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        let groups = catalog.grouped_by_source();
        if groups.is_empty() {
            println!("No skills found.");
            return Ok(());
        }
        for (source, entries) in &groups {
            println!("{source}");
            for entry in entries {
                let mark = if entry.installed {
                    "✓"
                } else {
                    " "
                };
                println!("  {mark} {} — {}", entry.skill.name, entry.skill.description);
            }
        }
        Ok(())
    }

    pub async fn show(&self, name: &str) -> anyhow::Result<()> {
        let (catalog, _) = self.load_catalog().await;
        let entry = catalog
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("skill '{name}' not found in configured repositories"))?;
        let skill = &entry.skill;
        let meta = parse_manifest(&skill.manifest).metadata;

        println!("Name:          {}", skill.name);
        println!("Description:   {}", skill.description);
        println!("Source:        {}", skill.source.label());
        println!("Path:          {}", skill.manifest_path());
        if let Some(license) = &skill.license {
            println!("License:       {license}");
        }
        if let Some(compatibility) = &skill.compatibility {
            println!("Compatibility: {compatibility}");
        }
        let tools = meta.allowed_tools_list();
        if !tools.is_empty() {
            println!("Tools:         {}", tools.join(", "));
        }
        for (key, value) in &meta.extra {
            println!("{:<15}{value}", format!("{key}:"));
        }
        println!("Installed:     {}", if entry.installed { "yes" } else { "no" });
        println!("\n{}", skill.body);
        Ok(())
    }

    pub fn installed(&self, json: bool) -> anyhow::Result<()> {
        let mut skills = self.scan();
        skills.sort_by(|a, b| a.name.cmp(&b.name));

        if json {
            println!("{}", serde_json::to_string_pretty(&skills)?);
            return Ok(());
        }
        if skills.is_empty() {
            println!("No installed skills.");
            return Ok(());
        }
        for skill in &skills {
            let source = skill
                .source
                .as_ref()
                .map(|s| format!(" [{s}]"))
                .unwrap_or_default();
            println!("  {} — {} ({}){source}", skill.name, skill.description, skill.location);
        }
        Ok(())
    }

    pub async fn install(
        &self,
        name: &str,
        root: Option<PathBuf>,
        from: Option<&str>,
    ) -> anyhow::Result<()> {
        let target_root = match root {
            Some(root) => root,
            None => self
                .install_roots()
                .first()
                .map(|r| self.base.join(r))
                .ok_or_else(|| anyhow::anyhow!("no install roots configured"))?,
        };

        let (catalog, _) = self.load_catalog().await;
        let entry = pick(&catalog.entries(), name, from)?;
        if entry.installed {
            warn!(skill = %name, "a skill with this name is already installed");
        }

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling install");
                on_signal.cancel();
            }
        });

        let result = install_skill(
            self.aggregator.resolver(),
            &entry.skill,
            &target_root,
            &self.options,
            &cancel,
        )
        .await;
        watcher.abort();

        match result {
            Ok(dir) => {
                println!("Installed '{}' into {}", entry.skill.name, dir.display());
                Ok(())
            },
            Err(Error::Cancelled) => {
                eprintln!("Install of '{name}' cancelled.");
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn uninstall(&self, name: &str) -> anyhow::Result<()> {
        let installed = self.scan();
        let skill = find_installed(&installed, name)
            .ok_or_else(|| anyhow::anyhow!("skill '{name}' is not installed"))?;
        let dir = uninstall_skill(&self.base, skill).await?;
        println!("Removed '{name}' from {}", dir.display());
        Ok(())
    }
}

/// Choose the entry to install; `from` disambiguates names shared across repositories.
fn pick(entries: &[CatalogEntry], name: &str, from: Option<&str>) -> anyhow::Result<CatalogEntry> {
    let matches: Vec<&CatalogEntry> = entries
        .iter()
        .filter(|e| e.skill.name == name)
        .filter(|e| from.is_none_or(|f| e.skill.source.source() == f))
        .collect();

    match matches.as_slice() {
        [] => anyhow::bail!("skill '{name}' not found in configured repositories"),
        [one] => Ok((*one).clone()),
        many => {
            let sources: Vec<String> = many.iter().map(|e| e.skill.source.source()).collect();
            anyhow::bail!(
                "skill '{name}' is published by several repositories ({}); pick one with --from",
                sources.join(", ")
            )
        },
    }
}
