use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shardgate::{GatePolicy, Receiver, ReceiverConfig};

#[derive(Parser, Debug)]
#[command(name = "shardgate-recv")]
#[command(version, about = "Receive a sharded video stream over UDP, record it and play it live")]
struct Args {
    /// Path to YAML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Listen address (overrides config file)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Recording path (overrides config file)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Record only, without starting the live player
    #[arg(long)]
    no_live: bool,

    /// When output starts (overrides config file)
    #[arg(long, value_enum)]
    gate_policy: Option<GatePolicyArg>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GatePolicyArg {
    /// As soon as any parameter unit has arrived
    AnyParameter,
    /// At the first keyframe after a parameter unit
    Keyframe,
}

impl From<GatePolicyArg> for GatePolicy {
    fn from(arg: GatePolicyArg) -> Self {
        match arg {
            GatePolicyArg::AnyParameter => GatePolicy::AnyParameter,
            GatePolicyArg::Keyframe => GatePolicy::Keyframe,
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<ReceiverConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let config = ReceiverConfig::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => ReceiverConfig::default(),
    };

    // Override with CLI args if provided
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(output) = &args.output {
        config.recording_path = output.clone();
    }
    if args.no_live {
        config.live.enabled = false;
    }
    if let Some(policy) = args.gate_policy {
        config.stream.gate_policy = policy.into();
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: ReceiverConfig) -> anyhow::Result<()> {
    info!("=== Shardgate Receiver Starting ===");
    info!("Listen: {}", config.listen_addr);
    info!("Gate policy: {:?}", config.stream.gate_policy);

    let mut handle = Receiver::bind(&config).await?;

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for interrupt")?;
            info!("Interrupt received");
            None
        }
        result = handle.wait() => Some(result),
    };

    let summary = match finished {
        Some(result) => result?,
        None => handle.shutdown().await?,
    };

    info!("Session complete: {}", summary);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            std::process::exit(2);
        }
    };

    if args.print_config {
        match config.to_yaml() {
            Ok(yaml) => {
                print!("{}", yaml);
                return;
            }
            Err(e) => {
                error!("Failed to render config: {}", e);
                std::process::exit(2);
            }
        }
    }

    if let Err(e) = run(config).await {
        error!("Receiver failed: {:#}", e);
        if let Some(stream_error) = e.downcast_ref::<shardgate::StreamError>() {
            for suggestion in stream_error.recovery_suggestions() {
                error!("  - {}", suggestion);
            }
        }
        std::process::exit(1);
    }
}
