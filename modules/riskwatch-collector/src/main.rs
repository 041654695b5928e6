use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pubsub_client::PubSubClient;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use riskwatch_collector::{
    load_settings, normalize_to_geojson, sources, CollectRequest, Collector, CollectorSettings,
    EventSink, Pacing, PubSubSink, Publisher, ReqwestTransport, SupplyChainSystem,
};
use riskwatch_common::{AppConfig, ContextStore, SourceKind};

#[derive(Parser)]
#[command(name = "riskwatch")]
#[command(about = "Supply-chain risk event collector")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Collector settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Context store file, loaded before the command and saved after it
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collection cycle and publish the results
    Collect {
        /// "all" or a comma list such as NOAA,FRED
        #[arg(default_value = "all")]
        sources: String,

        /// Raise per-source limits
        #[arg(long)]
        emergency: bool,
    },

    /// Query a single source without publishing
    Fetch {
        source: SourceKind,

        /// Weather alert area (e.g. FL)
        #[arg(long)]
        region: Option<String>,

        #[arg(long, default_value = "24h")]
        timespan: String,

        #[arg(long, default_value_t = 100)]
        max_records: usize,

        /// Minimum percent change for economic indicators
        #[arg(long, default_value_t = 2.0)]
        change_threshold: f64,
    },

    /// Emergency collection for the given crisis keywords
    Emergency {
        #[arg(required = true)]
        keywords: Vec<String>,

        #[arg(long, default_value = "")]
        focus: String,

        #[arg(long)]
        max_per_source: Option<usize>,
    },

    /// Clear an active emergency
    Deactivate,

    /// Emergency response for a crisis category
    Respond {
        /// natural_disaster, geopolitical, economic, pandemic, cyber or logistics
        crisis_type: String,

        #[arg(long, default_value = "")]
        focus: String,
    },

    /// Show system health and counters
    Status {
        #[arg(long)]
        details: bool,
    },

    /// Convert an event payload to a GeoJSON Feature (reads stdin without a file)
    Normalize { file: Option<PathBuf> },

    /// Collect on a fixed interval until Ctrl-C
    Watch {
        #[arg(default_value = "all")]
        sources: String,

        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json)?;

    let mut store = load_state(cli.state.as_deref())?;
    run(&cli, &mut store).await?;
    if let Some(path) = &cli.state {
        save_state(path, &store)?;
    }
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("riskwatch=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run(cli: &Cli, store: &mut ContextStore) -> Result<()> {
    match &cli.command {
        Commands::Normalize { file } => normalize(file.as_deref()),
        Commands::Collect { sources, emergency } => {
            let system = SupplyChainSystem::new(Some(Arc::new(setup(cli)?)));
            let report = system
                .trigger_data_collection(sources, *emergency, store)
                .await;
            print_json(&report)
        }
        Commands::Fetch {
            source,
            region,
            timespan,
            max_records,
            change_threshold,
        } => {
            let collector = setup(cli)?;
            let request = CollectRequest {
                region: region.clone(),
                timespan: timespan.clone(),
                max_records: *max_records,
                change_threshold: *change_threshold,
                include_retweets: false,
            };
            store.initialize(chrono::Utc::now());
            let envelope = collector.fetch_source(*source, &request, store).await;
            print_json(&envelope)
        }
        Commands::Emergency {
            keywords,
            focus,
            max_per_source,
        } => {
            let report = setup(cli)?
                .emergency_collect(keywords, focus, *max_per_source, store)
                .await;
            print_json(&report)
        }
        Commands::Deactivate => {
            let was_active = setup(cli)?.deactivate_emergency(store);
            print_json(&serde_json::json!({ "deactivated": was_active }))
        }
        Commands::Respond { crisis_type, focus } => {
            let system = SupplyChainSystem::new(Some(Arc::new(setup(cli)?)));
            let report = system.emergency_response(crisis_type, focus, store).await;
            print_json(&report)
        }
        Commands::Status { details } => {
            let system = SupplyChainSystem::new(Some(Arc::new(setup(cli)?)));
            print_json(&system.get_system_status(*details, store))
        }
        Commands::Watch {
            sources,
            interval_secs,
        } => watch(setup(cli)?, sources, *interval_secs, cli.state.as_deref(), store).await,
    }
}

/// Settings file (or defaults) plus environment config, wired into a collector.
fn setup(cli: &Cli) -> Result<Collector> {
    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => CollectorSettings::default(),
    };
    let config = AppConfig::from_env()?;
    Ok(build_collector(&config, settings))
}

fn build_collector(config: &AppConfig, settings: CollectorSettings) -> Collector {
    let pacing = Pacing::from_settings(&settings);
    let transport = Arc::new(ReqwestTransport::new(settings.request_timeout()));
    let adapters = sources::adapters_from_config(config, transport, &pacing);
    let publisher = Publisher::new(build_sink(config), pacing.publish_batches.clone());
    Collector::new(adapters, publisher, settings, pacing)
}

/// Stream publisher from config. Emulator host wins over an access token.
/// Without either, events are collected but not published.
fn build_sink(config: &AppConfig) -> Option<Arc<dyn EventSink>> {
    let Some(project) = config.project_id.as_deref() else {
        warn!("GOOGLE_CLOUD_PROJECT not set, publishing disabled");
        return None;
    };
    let client = match (&config.pubsub_emulator_host, &config.pubsub_access_token) {
        (Some(host), _) => PubSubClient::emulator(host, project, &config.topic),
        (None, Some(token)) => PubSubClient::new(project, &config.topic, token.clone()),
        (None, None) => {
            warn!("No PUBSUB_EMULATOR_HOST or PUBSUB_ACCESS_TOKEN, publishing disabled");
            return None;
        }
    };
    match client {
        Ok(client) => {
            info!(topic = client.topic_path(), "Publisher ready");
            Some(Arc::new(PubSubSink::new(client, &config.topic)))
        }
        Err(e) => {
            warn!(error = %e, "Failed to build Pub/Sub client, publishing disabled");
            None
        }
    }
}

async fn watch(
    collector: Collector,
    sources: &str,
    interval_secs: u64,
    state: Option<&Path>,
    store: &mut ContextStore,
) -> Result<()> {
    let collector = Arc::new(collector);
    let stop = Arc::new(AtomicBool::new(false));
    let wake = Arc::new(Notify::new());
    {
        let collector = collector.clone();
        let stop = stop.clone();
        let wake = wake.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.store(true, Ordering::Relaxed);
                collector.cancel();
                wake.notify_one();
            }
        });
    }

    let system = SupplyChainSystem::new(Some(collector));
    let interval = Duration::from_secs(interval_secs.max(1));
    info!(sources, interval_secs, "Watching");

    while !stop.load(Ordering::Relaxed) {
        let report = system.trigger_data_collection(sources, false, store).await;
        print_json(&report)?;
        if let Some(path) = state {
            save_state(path, store)?;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = wake.notified() => {}
        }
    }

    info!("Watch stopped");
    Ok(())
}

fn normalize(file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    let payload: serde_json::Value =
        serde_json::from_str(&raw).context("Payload is not valid JSON")?;
    print_json(&normalize_to_geojson(&payload))
}

fn load_state(path: Option<&Path>) -> Result<ContextStore> {
    match path {
        Some(path) if path.exists() => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read state file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse state file {}", path.display()))
        }
        _ => Ok(ContextStore::new()),
    }
}

fn save_state(path: &Path, store: &ContextStore) -> Result<()> {
    let raw = serde_json::to_string_pretty(store)?;
    std::fs::write(path, raw)
        .with_context(|| format!("Failed to write state file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
