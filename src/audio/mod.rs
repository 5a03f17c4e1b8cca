//! Audio source contract
//!
//! The audio capturer is an asynchronous producer of compressed Opus
//! packets. It is optional end to end: construction failure degrades the
//! pipeline to video-only.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Opus sample rate used on the wire (48 kHz stereo).
pub const OPUS_SAMPLE_RATE: u32 = 48000;

/// Typical packet duration produced by capturers.
pub const OPUS_FRAME_DURATION: Duration = Duration::from_millis(20);

/// One compressed audio payload with its frame duration.
#[derive(Debug, Clone)]
pub struct OpusPacket {
    pub data: Bytes,
    pub duration: Duration,
}

/// An asynchronous Opus source.
///
/// `run` produces packets into the bounded channel until the stop token is
/// cancelled, then releases its capture resources. A full channel drops the
/// packet rather than blocking the capture cadence.
#[async_trait]
pub trait AudioCapturer: Send {
    async fn run(self: Box<Self>, packets: mpsc::Sender<OpusPacket>, stop: CancellationToken);
}

/// Creates an audio capturer. Selected once at startup; absent when the
/// build carries no audio backend.
pub type AudioCapturerFactory =
    Arc<dyn Fn() -> anyhow::Result<Box<dyn AudioCapturer>> + Send + Sync>;
