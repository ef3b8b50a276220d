//! Head pose telemetry: stream stabilized pose and expression parameters over UDP.

use anyhow::Result;
use clap::{Parser, Subcommand};
use head_pose_telemetry::{
    app::TelemetryApp,
    config::{Config, SourceKind},
    source::{open_source, PreDetected},
    telemetry::{TelemetryReceiver, UdpSink},
    Error,
};
use log::{error, info, warn};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Replay a JSON-lines landmark recording
    #[arg(long, conflicts_with = "osf")]
    replay: Option<PathBuf>,

    /// Receive landmarks from OpenSeeFace, optionally on the given address
    #[arg(long)]
    osf: Option<Option<String>>,

    /// Telemetry destination host
    #[arg(long)]
    host: Option<String>,

    /// Telemetry destination port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive and log telemetry messages
    Listen {
        /// Address to listen on [default: 127.0.0.1 on the telemetry port]
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Head Pose Telemetry v{}", env!("CARGO_PKG_VERSION"));

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    if let Some(path) = &args.write_config {
        config.to_file(path)?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(Arc::clone(&stop))?;

    match &args.command {
        Some(Command::Listen { bind }) => {
            let bind = bind.clone().unwrap_or_else(|| config.listen_address());
            listen(&bind, &stop)
        }
        None => run(&config, &stop),
    }
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(path) = &args.replay {
        config.source.kind = SourceKind::Replay;
        config.source.replay_path = Some(path.clone());
    }
    if let Some(bind) = &args.osf {
        config.source.kind = SourceKind::Osf;
        if let Some(bind) = bind {
            config.source.osf_bind.clone_from(bind);
        }
    }
    if let Some(host) = &args.host {
        config.telemetry.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.telemetry.port = port;
    }
}

fn run(config: &Config, stop: &Arc<AtomicBool>) -> Result<()> {
    let source = open_source(&config.source)?;
    let sink = UdpSink::new(&config.telemetry_address())?;

    let mut app = TelemetryApp::new(config, source, PreDetected, sink).with_stop_flag(Arc::clone(stop));
    let stats = app.run()?;
    info!("Sent {} telemetry messages over {} frames", stats.sent, stats.frames);
    Ok(())
}

fn listen(bind: &str, stop: &AtomicBool) -> Result<()> {
    let receiver = TelemetryReceiver::bind(bind, Duration::from_millis(200))?;
    while !stop.load(Ordering::Relaxed) {
        match receiver.recv() {
            Ok(Some((from, frame))) => info!(
                "{from}: t=({:.1}, {:.1}, {:.1}) q=({:.4}, {:.4}, {:.4}, {:.4}) eyes=({:.3}, {:.3}) mouth=({:.3}, {:.3})",
                frame.translation[0],
                frame.translation[1],
                frame.translation[2],
                frame.quaternion.w,
                frame.quaternion.x,
                frame.quaternion.y,
                frame.quaternion.z,
                frame.metrics.left_eye_width,
                frame.metrics.right_eye_width,
                frame.metrics.mouth_width,
                frame.metrics.mouth_length
            ),
            Ok(None) => {}
            Err(Error::Protocol(e)) => warn!("Ignoring malformed message: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    info!("Listener shutting down");
    Ok(())
}

/// Set `stop` on Ctrl+C or SIGTERM
fn spawn_shutdown_listener(stop: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    std::thread::spawn(move || {
        runtime.block_on(shutdown_signal());
        info!("Shutdown signal received");
        stop.store(true, Ordering::Relaxed);
    });
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
