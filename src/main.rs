use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use deskcast::config::{GuestInfo, ServerConfig};
use deskcast::pipeline::{PipelineConfig, PipelineEngine};
use deskcast::platform;
use deskcast::session::SessionRegistry;
use deskcast::state::AppState;
use deskcast::video::VideoCodec;
use deskcast::web;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum CodecArg {
    #[default]
    H264,
    H265,
}

impl From<CodecArg> for VideoCodec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::H264 => VideoCodec::H264,
            CodecArg::H265 => VideoCodec::H265,
        }
    }
}

/// deskcast command line arguments
#[derive(Parser, Debug)]
#[command(name = "deskcast")]
#[command(version, about = "Remote desktop streaming over WebRTC with WHEP signaling")]
struct CliArgs {
    /// Bearer token for authentication (required)
    #[arg(long)]
    token: String,

    /// HTTP listen address
    #[arg(short = 'a', long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// Capture frame rate
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Video bitrate in kbps
    #[arg(long, default_value_t = 4000)]
    bitrate: u32,

    /// Video codec
    #[arg(long, value_enum, default_value_t = CodecArg::H264)]
    codec: CodecArg,

    /// Keyframe interval in frames (0 = 2x fps)
    #[arg(long, default_value_t = 0)]
    gop: u32,

    /// GPU index for hardware backends
    #[arg(long, default_value_t = 0)]
    gpu: u32,

    /// Log pipeline stats every five seconds
    #[arg(long)]
    stats: bool,

    /// Serve a virtual machine display instead of the local desktop
    #[arg(long)]
    vm: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServerConfig {
        addr: args.addr,
        token: args.token,
        fps: args.fps,
        bitrate_kbps: args.bitrate,
        codec: args.codec.into(),
        gop: args.gop,
        gpu: args.gpu,
        stats: args.stats,
        vm: args.vm,
    };

    let backends = platform::select(&cfg);
    let guest = GuestInfo::detect(cfg.vm, backends.has_clipboard());

    let engine = PipelineEngine::new(
        PipelineConfig {
            codec: cfg.codec,
            fps: cfg.fps,
            bitrate_kbps: cfg.bitrate_kbps,
            keyframe_interval: cfg.gop,
            gpu: cfg.gpu,
            stats: cfg.stats,
        },
        backends.media,
    );
    let registry = SessionRegistry::new(engine, backends.input, backends.clipboard);

    let state = Arc::new(AppState {
        registry: registry.clone(),
        token: cfg.token.clone(),
        guest,
    });
    let app = web::create_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.addr)
        .await
        .with_context(|| format!("bind {}", cfg.addr))?;

    tracing::info!(
        "starting deskcast on {} ({} fps, {} kbps, codec {}, mode {})",
        cfg.addr,
        cfg.fps,
        cfg.bitrate_kbps,
        cfg.codec,
        guest.mode()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    registry.teardown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
