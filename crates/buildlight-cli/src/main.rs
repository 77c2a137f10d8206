use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use buildlight_core::config::parse_duration;
use buildlight_core::providers::{hue::resolve_bridge_address, BitbucketStatusSource, HueIndicator};
use buildlight_core::{check_once, Config, Monitor, Status};
use clap::{Args, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "buildlight")]
#[command(version, about = "Turns a Philips Hue light into a Bitbucket pipelines status light", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    options: Options,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Poll the repositories and drive the light until interrupted (default)
    Watch,
    /// Poll every repository once and print what we see
    Status,
    /// Print the Hue bridges found on this network
    Discover,
}

/// Everything here overrides the config file
#[derive(Args, Debug, Default)]
struct Options {
    /// Config file (default: <config dir>/buildlight/config.toml)
    #[arg(short, long, env = "BUILDLIGHT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// API key for the Philips Hue bridge
    #[arg(short = 'a', long, env = "API_KEY", global = true)]
    api_key: Option<String>,

    /// Print additional debug messages
    #[arg(
        short,
        long,
        env = "DEBUG",
        global = true,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    debug: bool,

    /// Bitbucket username
    #[arg(short, long, env = "BITBUCKET_USERNAME", global = true)]
    username: Option<String>,

    /// Bitbucket app password
    #[arg(short, long, env = "BITBUCKET_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Repositories to watch as owner/slug, e.g. acme/billing-service
    #[arg(short, long = "repo", env = "REPOSITORIES", value_delimiter = ',', global = true)]
    repositories: Vec<String>,

    /// Interval between polling bitbucket, e.g. 30s or 1m
    #[arg(long, env = "INTERVAL", value_parser = parse_duration, global = true)]
    interval: Option<Duration>,

    /// Interval between light updates, which is also the blink rate
    #[arg(long, env = "TICK_INTERVAL", value_parser = parse_duration, global = true)]
    tick: Option<Duration>,

    /// Hue bridge address, skips discovery
    #[arg(long, env = "HUE_BRIDGE", global = true)]
    bridge_addr: Option<String>,

    /// Id of the light to drive
    #[arg(long, env = "HUE_LIGHT", global = true)]
    light: Option<String>,

    /// Light brightness (1-254)
    #[arg(long, env = "HUE_BRIGHTNESS", global = true)]
    brightness: Option<u8>,

    /// Hue of green
    #[arg(long, env = "GREEN", global = true)]
    green: Option<u16>,

    /// Hue of purple
    #[arg(long, env = "PURPLE", global = true)]
    purple: Option<u16>,

    /// Hue of dark purple
    #[arg(long, env = "DARK_PURPLE", global = true)]
    dark_purple: Option<u16>,

    /// Hue of red
    #[arg(long, env = "RED", global = true)]
    red: Option<u16>,

    /// Hue of yellow
    #[arg(long, env = "YELLOW", global = true)]
    yellow: Option<u16>,
}

impl Options {
    /// Layer CLI and env values over whatever the file gave us
    fn apply(self, config: &mut Config) {
        if self.debug {
            config.debug = true;
        }
        if !self.repositories.is_empty() {
            config.repositories = self.repositories;
        }
        if let Some(interval) = self.interval {
            config.poll_interval = interval;
        }
        if let Some(tick) = self.tick {
            config.tick_interval = tick;
        }

        if self.username.is_some() {
            config.bitbucket.username = self.username;
        }
        if self.password.is_some() {
            config.bitbucket.password = self.password;
        }

        if self.api_key.is_some() {
            config.hue.api_key = self.api_key;
        }
        if self.bridge_addr.is_some() {
            config.hue.bridge_addr = self.bridge_addr;
        }
        if let Some(light) = self.light {
            config.hue.light_id = light;
        }
        if let Some(brightness) = self.brightness {
            config.hue.brightness = brightness;
        }

        let palette = &mut config.palette;
        palette.green = self.green.unwrap_or(palette.green);
        palette.purple = self.purple.unwrap_or(palette.purple);
        palette.dark_purple = self.dark_purple.unwrap_or(palette.dark_purple);
        palette.red = self.red.unwrap_or(palette.red);
        palette.yellow = self.yellow.unwrap_or(palette.yellow);
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "buildlight=debug"
    } else {
        "buildlight=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn watch(config: Config) -> anyhow::Result<()> {
    config.validate_for_light()?;

    let address = resolve_bridge_address(&config.hue).await?;
    tracing::info!("Using Hue bridge at {}", address);

    let source = BitbucketStatusSource::new(&config.bitbucket)?;
    let indicator = HueIndicator::new(address, &config.hue)?;
    let monitor = Monitor::new(config, Arc::new(source), Arc::new(indicator));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutting down");
            shutdown.cancel();
        }
    });

    monitor.run(shutdown).await?;
    Ok(())
}

async fn status(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let source = BitbucketStatusSource::new(&config.bitbucket)?;
    let report = check_once(&source, &config.repositories).await;

    for (repo, result) in &report.results {
        match result {
            Ok(status) => println!("{:<40} {}", repo, status),
            Err(e) => println!("{:<40} error: {}", repo, e),
        }
    }

    let aggregate = report.aggregate();
    if aggregate != Status::NotSet {
        println!("{:<40} {}", "overall", aggregate);
    }

    if report.has_errors() {
        anyhow::bail!("could not fetch status for every repository");
    }
    Ok(())
}

async fn discover() -> anyhow::Result<()> {
    let bridges = buildlight_api::hue::discover_bridges()
        .await
        .context("unable to discover hue bridges")?;

    if bridges.is_empty() {
        anyhow::bail!("no hue bridges found");
    }

    for bridge in bridges {
        match bridge.id {
            Some(id) => println!("{}  {}", bridge.internal_ip_address, id),
            None => println!("{}", bridge.internal_ip_address),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.options.config.as_deref()).context("failed to load config")?;
    cli.options.apply(&mut config);

    // Initialize logging - helps when things go sideways
    init_logging(config.debug);

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(config).await,
        Commands::Status => status(config).await,
        Commands::Discover => discover().await,
    }
}
