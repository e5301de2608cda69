use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use depwatch::config::{self, DEFAULT_RUN_TIME, Policy, Settings};
use depwatch::notify::HttpMailer;
use depwatch::oracle::{HttpOracle, HttpSearchProvider};
use depwatch::scheduler::{self, PassDeps};
use depwatch::store::{Store, normalize_key};
use depwatch::types::ComponentKind;

#[derive(Parser)]
#[command(name = "depwatch")]
#[command(version, about = "Dependency update tracking and notification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the update check pass
    Check {
        /// Keep running, executing the pass daily at the configured time
        #[arg(long)]
        auto: bool,
        /// Time of day (24h, HH:MM) for --auto mode
        #[arg(long, default_value = DEFAULT_RUN_TIME)]
        time: String,
    },
    /// Register a project
    AddProject {
        name: String,
        #[arg(long, default_value = "")]
        developers: String,
        /// Comma-separated recipient addresses
        #[arg(long, default_value = "")]
        emails: String,
        /// Notification preference, e.g. "major, minor" or "major, future"
        #[arg(long, default_value = "major, minor")]
        notify: String,
    },
    /// Declare a component for a project
    AddComponent {
        project_id: i64,
        name: String,
        version: String,
        #[arg(long, default_value = "library")]
        kind: String,
        #[arg(long, default_value = "")]
        scope: String,
    },
    /// Administratively cancel a tracked future update
    CancelFuture { library: String, version: String },
}

fn init_tracing() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let data_dir = config::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let file_appender = tracing_appender::rolling::never(&data_dir, "depwatch.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing()?;

    let store = Store::new(&config::db_path())?;

    match cli.command {
        Command::Check { auto, time } => {
            let at = scheduler::parse_run_time(&time)?;
            // Credentials are mandatory before any oracle call
            let settings = Settings::from_env()?;
            let policy = Policy::default();

            let search =
                HttpSearchProvider::new(settings.search_url.clone(), settings.search_api_key.clone());
            let oracle = HttpOracle::new(
                settings.oracle_url.clone(),
                settings.oracle_api_key.clone(),
                settings.oracle_model.clone(),
            );
            let mailer = HttpMailer::new(
                settings.mailer_url.clone(),
                settings.mailer_api_key.clone(),
                settings.mailer_from.clone(),
            );
            let deps = PassDeps {
                store: &store,
                search: &search,
                oracle: &oracle,
                mailer: &mailer,
                policy: &policy,
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async {
                if auto {
                    info!("Auto mode: running daily at {}", time);
                    loop {
                        let delay = scheduler::next_run_delay(chrono::Local::now(), at);
                        info!("Next pass in {}s", delay.as_secs());
                        tokio::time::sleep(delay).await;
                        if let Err(e) = scheduler::run_pass(&deps).await {
                            error!("Pass failed: {}", e);
                        }
                    }
                } else {
                    let summary = scheduler::run_pass(&deps).await?;
                    println!(
                        "Checked {} libraries, emitted {} events, sent {} digests",
                        summary.libraries_checked, summary.events_emitted, summary.digests_sent
                    );
                    Ok::<_, anyhow::Error>(())
                }
            })?;
        }
        Command::AddProject {
            name,
            developers,
            emails,
            notify,
        } => {
            let id = store.add_project(&name, &developers, &emails, &notify)?;
            println!("Created project {id}: {name}");
        }
        Command::AddComponent {
            project_id,
            name,
            version,
            kind,
            scope,
        } => {
            let kind = kind
                .parse::<ComponentKind>()
                .map_err(|_| anyhow::anyhow!("kind must be language, tool, or library"))?;
            let id = store.add_component(project_id, kind, &name, &version, &scope)?;
            println!("Declared component {id}: {name} {version}");
        }
        Command::CancelFuture { library, version } => {
            let key = normalize_key(&library);
            let Some(library) = store.library_by_key(&key)? else {
                anyhow::bail!("no library with key {key}");
            };
            if store.cancel_future(library.id, &version)? {
                println!("Cancelled tracked future update {} {version}", library.name);
            } else {
                println!("No active future update for {} {version}", library.name);
            }
        }
    }

    Ok(())
}
