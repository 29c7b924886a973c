mod repo_commands;
mod skills_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "skillhub",
    version,
    about = "skillhub: agent skills from GitHub repositories"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and the user config dir).
    #[arg(long, global = true, env = "SKILLHUB_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List skills from every configured repository, grouped by source.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show a skill's metadata and instructions.
    Show {
        /// Skill name.
        name: String,
    },
    /// List skills installed under the configured install roots.
    Installed {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Install a skill into the first install root (or `--root`).
    Install {
        /// Skill name.
        name: String,
        /// Target directory instead of the first configured install root.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Pick the skill from this `owner/repo` when several share the name.
        #[arg(long)]
        from: Option<String>,
    },
    /// Remove an installed skill.
    Uninstall {
        /// Skill name.
        name: String,
    },
    /// Manage configured repositories.
    Repos {
        #[command(subcommand)]
        action: repo_commands::RepoAction,
    },
}

/// Initialise tracing. Logs go to stderr so command output stays parseable.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<skillhub_config::SkillhubConfig> {
    match &cli.config {
        Some(path) => skillhub_config::load_config(path),
        None => Ok(skillhub_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "skillhub starting");

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Repos { action } => {
            repo_commands::handle_repos(action, &config, cli.config.as_deref())
        },
        command => {
            let session = skills_commands::Session::new(config)?;
            match command {
                Commands::List { json } => session.list(json).await,
                Commands::Show { name } => session.show(&name).await,
                Commands::Installed { json } => session.installed(json),
                Commands::Install { name, root, from } => {
                    session.install(&name, root, from.as_deref()).await
                },
                Commands::Uninstall { name } => session.uninstall(&name).await,
                Commands::Repos { .. } => Ok(()),
            }
        },
    }
}
