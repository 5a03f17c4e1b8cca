//! Shared test fixtures: counting media backends and a WHEP client side.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

use deskcast::audio::OpusPacket;
use deskcast::pipeline::{MediaFactories, PipelineConfig, PipelineEngine};
use deskcast::session::SessionRegistry;
use deskcast::video::{
    EncodedUnit, EncoderSettings, Frame, FrameCapturer, FrameData, PixelFormat, VideoCodec,
    VideoEncoder,
};

/// Counters observing the media backends across a registry's lifetime.
#[derive(Default)]
pub struct MediaStats {
    pub capturers_built: AtomicUsize,
    pub frames_grabbed: AtomicUsize,
    pub units_encoded: AtomicUsize,
    pub audio_packets_sent: AtomicUsize,
}

struct TestCapturer {
    stats: Arc<MediaStats>,
    buf: Vec<u8>,
}

impl FrameCapturer for TestCapturer {
    fn width(&self) -> u32 {
        16
    }

    fn height(&self) -> u32 {
        16
    }

    fn grab(&mut self) -> deskcast::Result<Frame<'_>> {
        self.stats.frames_grabbed.fetch_add(1, Ordering::SeqCst);
        Ok(Frame {
            width: 16,
            height: 16,
            stride: 64,
            format: PixelFormat::Bgra,
            data: FrameData::Cpu(&self.buf),
        })
    }
}

struct TestEncoder {
    stats: Arc<MediaStats>,
    frames: u64,
}

impl VideoEncoder for TestEncoder {
    fn encode(&mut self, _frame: &Frame<'_>) -> deskcast::Result<Option<EncodedUnit>> {
        self.frames += 1;
        self.stats.units_encoded.fetch_add(1, Ordering::SeqCst);
        Ok(Some(EncodedUnit {
            data: Bytes::from_static(b"test-access-unit"),
            keyframe: self.frames == 1,
        }))
    }
}

struct TestAudioSource {
    stats: Arc<MediaStats>,
}

#[async_trait]
impl deskcast::audio::AudioCapturer for TestAudioSource {
    async fn run(self: Box<Self>, packets: mpsc::Sender<OpusPacket>, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(20));
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let pkt = OpusPacket {
                        data: Bytes::from_static(b"opus"),
                        duration: std::time::Duration::from_millis(20),
                    };
                    if packets.try_send(pkt).is_ok() {
                        self.stats.audio_packets_sent.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }
    }
}

/// How the test registry's audio factory behaves.
#[allow(dead_code)]
pub enum AudioMode {
    None,
    Failing,
    Working,
}

pub fn test_engine(stats: &Arc<MediaStats>, audio: AudioMode) -> PipelineEngine {
    let cfg = PipelineConfig {
        codec: VideoCodec::H264,
        fps: 100,
        bitrate_kbps: 1000,
        keyframe_interval: 0,
        gpu: 0,
        stats: false,
    };

    let cap_stats = stats.clone();
    let enc_stats = stats.clone();
    let audio_factory: Option<deskcast::audio::AudioCapturerFactory> = match audio {
        AudioMode::None => None,
        AudioMode::Failing => Some(Arc::new(|| Err(anyhow::anyhow!("no audio device")))),
        AudioMode::Working => {
            let stats = stats.clone();
            Some(Arc::new(move || {
                Ok(Box::new(TestAudioSource {
                    stats: stats.clone(),
                }) as Box<dyn deskcast::audio::AudioCapturer>)
            }))
        }
    };

    PipelineEngine::new(
        cfg,
        MediaFactories {
            capturer: Arc::new(move || {
                cap_stats.capturers_built.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(TestCapturer {
                    stats: cap_stats.clone(),
                    buf: vec![0u8; 16 * 16 * 4],
                }) as Box<dyn FrameCapturer>)
            }),
            encoder: Arc::new(move |_settings: &EncoderSettings| {
                Ok(Box::new(TestEncoder {
                    stats: enc_stats.clone(),
                    frames: 0,
                }) as Box<dyn VideoEncoder>)
            }),
            audio: audio_factory,
        },
    )
}

pub fn test_registry(stats: &Arc<MediaStats>, audio: AudioMode) -> Arc<SessionRegistry> {
    SessionRegistry::new(test_engine(stats, audio), None, None)
}

/// Build a browser-like WHEP client offer: recvonly video+audio, and for
/// controllers the `input`/`clipboard` data channels.
pub async fn client_offer(with_channels: bool) -> (Arc<RTCPeerConnection>, String) {
    let mut media = MediaEngine::default();
    media.register_default_codecs().unwrap();
    let api = APIBuilder::new().with_media_engine(media).build();
    let pc = Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap(),
    );

    for kind in [RTPCodecType::Video, RTPCodecType::Audio] {
        let recvonly = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        };
        pc.add_transceiver_from_kind(kind, Some(recvonly))
            .await
            .unwrap();
    }

    if with_channels {
        pc.create_data_channel("input", None).await.unwrap();
        pc.create_data_channel("clipboard", None).await.unwrap();
    }

    let offer = pc.create_offer(None).await.unwrap();
    let sdp = offer.sdp.clone();
    pc.set_local_description(offer).await.unwrap();
    (pc, sdp)
}
