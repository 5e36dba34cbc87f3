//! surface-bind - drive an Ableton Push 2 or Move from a live module graph

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surface_bind::config::{AppConfig, ConfigWatcher};
use surface_bind::engine::{EngineSettings, SurfaceEngine};
use surface_bind::error::SurfaceResult;
use surface_bind::events::EventSender;
use surface_bind::graph::memory::MemoryGraph;
use surface_bind::graph::Graph;
use surface_bind::history::FocusTarget;
use surface_bind::paths;
use surface_bind::surface::ProfileKind;
use surface_bind::transport::{discovery, Disconnected, MidiTransport, PortPatterns, Transport};

/// Surface binding engine for Push 2 and Move
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Device profile, overriding the configuration
    #[arg(short, long, value_enum)]
    profile: Option<ProfileKind>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list_ports {
        discovery::print_ports();
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(paths::default_config_path);
    info!("Starting surface-bind v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());

    let (config_watcher, initial_config) = ConfigWatcher::new(config_path).await?;
    info!("Configuration loaded with hot-reload enabled");

    let mut config = (*initial_config).clone();
    if let Some(profile) = args.profile {
        config.device.profile = profile;
    }

    run(config, config_watcher, args.profile, shutdown_signal()).await?;

    info!("surface-bind shutdown complete");
    Ok(())
}

async fn run(
    mut config: AppConfig,
    mut config_watcher: ConfigWatcher,
    profile_override: Option<ProfileKind>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let mut graph = MemoryGraph::from_demo(&config.demo);
    let (mut engine, events) = SurfaceEngine::new(
        config.device.profile.build(),
        EngineSettings::from(&config.engine),
    );

    // Start on the first module so the pads open on the placement view
    if let Some(node) = graph.visible_nodes().first().map(|n| n.id) {
        engine.focus(Some(FocusTarget::new(node)), true);
    }

    let (frame_tx, frame_rx) = mpsc::channel(config.device.frame_queue);
    tokio::spawn(write_frames(frame_rx, config.device.frame_dump.clone()));

    let mut transport = reconnect(&mut engine, &config, &events, &frame_tx, Box::new(Disconnected));
    let mut ticker = tick_interval(&config);

    info!("Entering tick loop ({} ms)", config.engine.poll_interval_ms);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.poll(&mut graph, transport.as_mut(), Instant::now());
                if engine.take_retry_request() {
                    debug!("Retrying surface connection");
                    transport = reconnect(&mut engine, &config, &events, &frame_tx, transport);
                }
            }

            Some(mut new_config) = config_watcher.next_config() => {
                info!("Configuration file changed, reloading...");
                if let Some(profile) = profile_override {
                    new_config.device.profile = profile;
                }
                if new_config.device.profile != config.device.profile {
                    warn!("Device profile changes take effect after a restart");
                    new_config.device.profile = config.device.profile;
                }

                if new_config.engine != config.engine {
                    engine.apply_settings(EngineSettings::from(&new_config.engine));
                    if new_config.engine.poll_interval_ms != config.engine.poll_interval_ms {
                        ticker = tick_interval(&new_config);
                    }
                }

                let ports_changed = new_config.device.input_port != config.device.input_port
                    || new_config.device.output_port != config.device.output_port;
                config = new_config;

                if ports_changed || !engine.is_enabled() {
                    transport = reconnect(&mut engine, &config, &events, &frame_tx, transport);
                }
                info!("Configuration reloaded");
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping tick loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    drop(transport);
    Ok(())
}

fn tick_interval(config: &AppConfig) -> Interval {
    let mut ticker = time::interval(config.engine.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn connect(
    config: &AppConfig,
    events: &EventSender,
    frames: &mpsc::Sender<Vec<u8>>,
) -> SurfaceResult<MidiTransport> {
    let ports = PortPatterns {
        device: config.device.profile.to_string(),
        input: config.device.input_port.clone(),
        output: config.device.output_port.clone(),
    };
    MidiTransport::connect(&ports, events.clone(), frames.clone())
}

/// Replace the transport with a fresh connection
///
/// The previous connection is closed first so its ports are free. On failure
/// the engine is disabled and waits for a retry.
fn reconnect(
    engine: &mut SurfaceEngine,
    config: &AppConfig,
    events: &EventSender,
    frames: &mpsc::Sender<Vec<u8>>,
    previous: Box<dyn Transport>,
) -> Box<dyn Transport> {
    drop(previous);
    match connect(config, events, frames) {
        Ok(transport) => {
            engine.enable();
            Box::new(transport)
        }
        Err(e) => {
            engine.disable(e.to_string());
            Box::new(Disconnected)
        }
    }
}

/// Consume display frames, appending them to the dump file if one is set
async fn write_frames(mut frames: mpsc::Receiver<Vec<u8>>, dump: Option<PathBuf>) {
    let mut file = match &dump {
        Some(path) => match tokio::fs::File::create(path).await {
            Ok(file) => {
                info!("Writing display frames to {}", path.display());
                Some(file)
            }
            Err(e) => {
                warn!("Cannot create frame dump {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    let mut count = 0u64;
    while let Some(frame) = frames.recv().await {
        count += 1;
        if let Some(out) = file.as_mut() {
            if let Err(e) = out.write_all(&frame).await {
                warn!("Frame dump stopped: {}", e);
                file = None;
            }
        }
    }
    debug!("Frame writer finished after {} frames", count);
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
