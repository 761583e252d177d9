use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing::level_filters::LevelFilter;

use quickstatus::config::Config;
use quickstatus::database::{self, Database};
use quickstatus::monitoring::{HttpProber, MonitoringScheduler, SiteStatus};
use quickstatus::sites::SiteManager;
use quickstatus::status::{Banner, OutageReport, SiteReport, StatusService};
use quickstatus::validation::days_before;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/quickstatus/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe all sites every interval until interrupted
    Run,
    /// Run a single probe cycle and exit
    Check,
    /// Manage monitored sites
    Site {
        #[command(subcommand)]
        action: SiteCommand,
    },
    /// Show status, uptime and history of every site
    Status {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// List outages of a site, most recent first
    Outages {
        /// Site name, id, UUID or URL
        site: String,
        /// Only outages that started within this many days
        #[arg(long)]
        since_days: Option<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum SiteCommand {
    /// Register a site
    Add { name: String, url: String },
    /// Remove a site and its outages
    Remove {
        /// Site name, id, UUID or URL
        site: String,
    },
    /// List registered sites
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        logger::init_with_level(LevelFilter::DEBUG);
    } else {
        logger::init();
    }

    let config = Config::from_config(cli.config.as_ref())?;

    match cli.command {
        Command::Config => print!("{config}"),
        Command::Run => {
            let database = open_database(&config).await?;
            let scheduler = Arc::new(build_scheduler(&config, database)?);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            scheduler.run(shutdown).await?;
        }
        Command::Check => {
            let database = open_database(&config).await?;
            let scheduler = build_scheduler(&config, database)?;
            let report = scheduler.run_cycle().await?;
            info!(
                checked = report.checked,
                failed = report.failed,
                opened = report.opened,
                closed = report.closed,
                "Probe cycle finished"
            );
            if let Some(e) = report.fatal {
                return Err(e.into());
            }
        }
        Command::Site { action } => {
            let sites = SiteManager::new(open_database(&config).await?);
            match action {
                SiteCommand::Add { name, url } => {
                    let site = sites.add(&name, &url).await?;
                    println!("Added site #{} {} ({})", site.id, site.name, site.url);
                }
                SiteCommand::Remove { site } => {
                    let site = sites.remove(&site).await?;
                    println!("Removed site #{} {}", site.id, site.name);
                }
                SiteCommand::List => {
                    for site in sites.list().await? {
                        println!("#{:<4} {:<24} {}", site.id, site.name, site.url);
                    }
                }
            }
        }
        Command::Status { json } => {
            let database = open_database(&config).await?;
            let service = StatusService::new(database, config.history.window_days);
            let page = service.page(Utc::now()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_banner(&page.overall);
                for report in &page.sites {
                    print_summary(report);
                }
            }
        }
        Command::Outages { site, since_days, json } => {
            let database = open_database(&config).await?;
            let site = SiteManager::new(database.clone()).find(&site).await?;
            let since = since_days.map(|days| days_before(Utc::now(), days)).transpose()?;
            let outages: Vec<OutageReport> =
                database.list_outages(site.id, since).await?.iter().map(OutageReport::from).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&outages)?);
            } else {
                for outage in &outages {
                    let end = outage.end_time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "ongoing".into());
                    let duration = outage
                        .duration_seconds
                        .map(|s| format!("{s:.0}s"))
                        .unwrap_or_else(|| "-".into());
                    println!(
                        "#{:<5} {:<9} {} -> {} ({})",
                        outage.id,
                        outage.outage_type,
                        outage.start_time.to_rfc3339(),
                        end,
                        duration
                    );
                }
            }
        }
    }

    Ok(())
}

async fn open_database(config: &Config) -> Result<Arc<dyn Database>> {
    let database =
        database::connect(&config.database.path, config.database.max_connections).await?;
    Ok(Arc::new(database))
}

fn build_scheduler(config: &Config, database: Arc<dyn Database>) -> Result<MonitoringScheduler> {
    let prober =
        HttpProber::new(config.probe.timeout_seconds, config.probe.degraded_threshold_ms)?;
    Ok(MonitoringScheduler::new(
        database,
        Arc::new(prober),
        config.interval(),
        config.scheduler.max_concurrency,
    ))
}

fn print_banner(banner: &Banner) {
    println!("[{}] {}\n  {}\n", banner.status, banner.title, banner.message);
}

fn print_summary(report: &SiteReport) {
    let bar: String = report
        .timeline
        .iter()
        .map(|day| match day.status {
            SiteStatus::Operational => '#',
            SiteStatus::Degraded => '~',
            SiteStatus::Down => '!',
            SiteStatus::Unknown => '.',
        })
        .collect();

    println!(
        "{} ({})\n  status: {}  uptime: {}%  response: {}ms  last checked: {}\n  [{}]",
        report.name,
        report.url,
        report.status,
        report.uptime,
        report.response_time_ms,
        report.last_checked,
        bar
    );
}
