//! Capture/encode pipeline
//!
//! One pipeline run owns the capturer, the encoder and the shared tracks.
//! The loop is synchronous and zero-copy: a grabbed frame handle stays
//! valid only until the next grab, so the encode completes inline before
//! the next tick. No queue sits between capture and encode.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::AudioCapturerFactory;
use crate::error::AppError;
use crate::rtc::SharedTracks;
use crate::video::{CapturerFactory, EncoderFactory, EncoderSettings, VideoCodec};

/// Depth of the audio packet queue between capturer and forwarder.
const AUDIO_QUEUE_DEPTH: usize = 16;

/// How many encode errors get logged before going quiet.
const ENCODE_ERROR_LOG_CAP: u32 = 5;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Pipeline parameters fixed at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub codec: VideoCodec,
    pub fps: u32,
    pub bitrate_kbps: u32,
    /// Keyframe interval in frames; 0 means two seconds' worth
    pub keyframe_interval: u32,
    pub gpu: u32,
    pub stats: bool,
}

impl PipelineConfig {
    pub fn effective_keyframe_interval(&self) -> u32 {
        if self.keyframe_interval == 0 {
            self.fps * 2
        } else {
            self.keyframe_interval
        }
    }
}

/// The media backend factory set selected at startup.
#[derive(Clone)]
pub struct MediaFactories {
    pub capturer: CapturerFactory,
    pub encoder: EncoderFactory,
    pub audio: Option<AudioCapturerFactory>,
}

/// A running pipeline as seen by the registry.
pub struct PipelineHandle {
    pub tracks: SharedTracks,
    stop: CancellationToken,
    /// Flips to true once the loop has released capture/encode resources.
    pub done: watch::Receiver<bool>,
}

impl PipelineHandle {
    /// Signal the loop to exit. Teardown is asynchronous; observe `done`.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

/// Builds pipeline runs on demand.
pub struct PipelineEngine {
    cfg: PipelineConfig,
    factories: MediaFactories,
}

impl PipelineEngine {
    pub fn new(cfg: PipelineConfig, factories: MediaFactories) -> Self {
        Self { cfg, factories }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Create capturer, encoder and tracks, then spawn the loop.
    /// Partially built resources are released by drop on failure.
    pub fn start(&self) -> crate::Result<PipelineHandle> {
        let capturer =
            (self.factories.capturer)().map_err(|e| AppError::CaptureInit(e.to_string()))?;

        let settings = EncoderSettings {
            width: capturer.width(),
            height: capturer.height(),
            fps: self.cfg.fps,
            bitrate_kbps: self.cfg.bitrate_kbps,
            keyframe_interval: self.cfg.effective_keyframe_interval(),
            codec: self.cfg.codec,
            gpu: self.cfg.gpu,
            device: capturer.device_context(),
        };
        let encoder = (self.factories.encoder)(&settings)
            .map_err(|e| AppError::EncoderInit(e.to_string()))?;

        let tracks = SharedTracks::new(self.cfg.codec);
        let stop = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);

        tokio::spawn(run_pipeline(
            self.cfg.clone(),
            capturer,
            encoder,
            tracks.clone(),
            self.factories.audio.clone(),
            stop.clone(),
            done_tx,
        ));

        info!(
            "pipeline started ({}x{}, {} fps, {})",
            settings.width, settings.height, self.cfg.fps, self.cfg.codec
        );

        Ok(PipelineHandle {
            tracks,
            stop,
            done: done_rx,
        })
    }
}

async fn run_pipeline(
    cfg: PipelineConfig,
    mut capturer: Box<dyn crate::video::FrameCapturer>,
    mut encoder: Box<dyn crate::video::VideoEncoder>,
    tracks: SharedTracks,
    audio_factory: Option<AudioCapturerFactory>,
    stop: CancellationToken,
    done: watch::Sender<bool>,
) {
    if let Some(factory) = audio_factory {
        start_audio(factory, tracks.clone(), stop.clone());
    }

    let frame_dur = Duration::from_secs_f64(1.0 / cfg.fps.max(1) as f64);
    let mut ticker = tokio::time::interval(frame_dur);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut loops = 0u64;
    let mut grab_fails = 0u64;
    let mut encode_fails = 0u64;
    let mut encode_not_ready = 0u64;
    let mut encode_errors_logged = 0u32;
    let mut last_grab = Duration::ZERO;
    let mut last_encode = Duration::ZERO;
    let mut last_send = Duration::ZERO;
    let mut last_stats = Instant::now();

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                loops += 1;

                // The frame borrow ends before the track write so the loop
                // future never carries it across an await.
                let unit = {
                    let t0 = Instant::now();
                    let frame = match capturer.grab() {
                        Ok(frame) => frame,
                        Err(_) => {
                            grab_fails += 1;
                            continue;
                        }
                    };
                    last_grab = t0.elapsed();

                    let t1 = Instant::now();
                    let unit = match encoder.encode(&frame) {
                        Ok(Some(unit)) => unit,
                        Ok(None) => {
                            encode_not_ready += 1;
                            continue;
                        }
                        Err(e) => {
                            encode_fails += 1;
                            if encode_errors_logged < ENCODE_ERROR_LOG_CAP {
                                encode_errors_logged += 1;
                                warn!("encode error: {e}");
                            }
                            continue;
                        }
                    };
                    last_encode = t1.elapsed();
                    unit
                };

                let t2 = Instant::now();
                // Fan-out write; peers vanishing mid-write are the track's
                // problem, never ours.
                tracks.write_video(unit.data, frame_dur).await;
                last_send = t2.elapsed();

                if cfg.stats && last_stats.elapsed() >= STATS_INTERVAL {
                    info!(
                        "pipeline: loops={} grab_fail={} enc_fail={} enc_not_ready={} | last: grab={:?} enc={:?} send={:?}",
                        loops, grab_fails, encode_fails, encode_not_ready,
                        last_grab, last_encode, last_send
                    );
                    loops = 0;
                    grab_fails = 0;
                    encode_fails = 0;
                    encode_not_ready = 0;
                    last_stats = Instant::now();
                }
            }
        }
    }

    // The encoder may hold references into the capturer's device context,
    // so it goes first. The audio tasks observe the same token and release
    // their source on their own.
    drop(encoder);
    drop(capturer);
    let _ = done.send(true);
    info!("pipeline stopped");
}

/// Bring up the optional audio leg: producer into a bounded queue, forwarder
/// onto the shared track. Construction failure is non-fatal.
fn start_audio(factory: AudioCapturerFactory, tracks: SharedTracks, stop: CancellationToken) {
    let source = match factory() {
        Ok(source) => source,
        Err(e) => {
            warn!("audio capture init failed (continuing without audio): {e}");
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel(AUDIO_QUEUE_DEPTH);
    let producer_stop = stop.clone();
    tokio::spawn(async move {
        source.run(tx, producer_stop).await;
        debug!("audio producer exited");
    });

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                pkt = rx.recv() => match pkt {
                    Some(pkt) => tracks.write_audio(pkt.data, pkt.duration).await,
                    None => break,
                },
            }
        }
        debug!("audio forwarder exited");
    });
}
