//! Shared media tracks
//!
//! H.264 and Opus ride `TrackLocalStaticSample`, which packetizes access
//! units internally. H.265 has no built-in payloader, so it rides
//! `TrackLocalStaticRTP` with the crate's RFC 7798 payloader and manual
//! sequence/timestamp state; the track layer rewrites payload type and SSRC
//! per binding.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::debug;
use webrtc::rtp;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};

use super::h265::H265Payloader;
use crate::video::VideoCodec;

/// Conservative RTP payload size, leaving headroom under typical MTUs.
pub const RTP_MTU: usize = 1200;

const STREAM_ID: &str = "deskcast";

/// The broadcast sink pair for one pipeline run. Cheap to clone; all clones
/// refer to the same tracks.
#[derive(Clone)]
pub struct SharedTracks {
    video: Arc<SharedVideoTrack>,
    audio: Arc<SharedAudioTrack>,
}

impl SharedTracks {
    pub fn new(codec: VideoCodec) -> Self {
        Self {
            video: Arc::new(SharedVideoTrack::new(codec)),
            audio: Arc::new(SharedAudioTrack::new()),
        }
    }

    /// Broadcast one encoded video access unit. Write failures are absorbed.
    pub async fn write_video(&self, data: Bytes, duration: Duration) {
        self.video.write(data, duration).await;
    }

    /// Broadcast one Opus packet. Write failures are absorbed.
    pub async fn write_audio(&self, data: Bytes, duration: Duration) {
        self.audio.write(data, duration).await;
    }

    /// Video track handle for `add_track`.
    pub fn video_local(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.video.local()
    }

    /// Audio track handle for `add_track`.
    pub fn audio_local(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.audio.local()
    }

    pub fn codec(&self) -> VideoCodec {
        self.video.codec
    }
}

enum VideoSink {
    /// Built-in payloader (H.264)
    Sample(Arc<TrackLocalStaticSample>),
    /// Manual packetization (H.265)
    Rtp {
        track: Arc<TrackLocalStaticRTP>,
        state: Mutex<RtpState>,
    },
}

struct RtpState {
    payloader: H265Payloader,
    sequence: u16,
    timestamp: u32,
}

struct SharedVideoTrack {
    codec: VideoCodec,
    sink: VideoSink,
}

impl SharedVideoTrack {
    fn new(codec: VideoCodec) -> Self {
        let capability = RTCRtpCodecCapability {
            mime_type: codec.mime_type().to_owned(),
            clock_rate: codec.clock_rate(),
            channels: 0,
            sdp_fmtp_line: codec.sdp_fmtp().to_owned(),
            rtcp_feedback: vec![],
        };

        let sink = match codec {
            VideoCodec::H264 => VideoSink::Sample(Arc::new(TrackLocalStaticSample::new(
                capability,
                "video".to_owned(),
                STREAM_ID.to_owned(),
            ))),
            VideoCodec::H265 => VideoSink::Rtp {
                track: Arc::new(TrackLocalStaticRTP::new(
                    capability,
                    "video".to_owned(),
                    STREAM_ID.to_owned(),
                )),
                state: Mutex::new(RtpState {
                    payloader: H265Payloader::new(),
                    sequence: rand::random::<u16>(),
                    timestamp: rand::random::<u32>(),
                }),
            },
        };

        Self { codec, sink }
    }

    fn local(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        match &self.sink {
            VideoSink::Sample(t) => t.clone(),
            VideoSink::Rtp { track, .. } => track.clone(),
        }
    }

    async fn write(&self, data: Bytes, duration: Duration) {
        match &self.sink {
            VideoSink::Sample(track) => {
                let sample = Sample {
                    data,
                    duration,
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    debug!("video write_sample: {e}");
                }
            }
            VideoSink::Rtp { track, state } => {
                let ticks = (duration.as_secs_f64() * self.codec.clock_rate() as f64) as u32;
                let (payloads, timestamp, seq_start) = {
                    let mut state = state.lock().await;
                    let payloads = state.payloader.payload(RTP_MTU, &data);
                    if payloads.is_empty() {
                        return;
                    }
                    let timestamp = state.timestamp;
                    let seq_start = state.sequence;
                    state.sequence = state.sequence.wrapping_add(payloads.len() as u16);
                    state.timestamp = state.timestamp.wrapping_add(ticks);
                    (payloads, timestamp, seq_start)
                };

                let count = payloads.len();
                for (i, payload) in payloads.into_iter().enumerate() {
                    let packet = rtp::packet::Packet {
                        header: rtp::header::Header {
                            version: 2,
                            marker: i == count - 1,
                            payload_type: self.codec.payload_type(),
                            sequence_number: seq_start.wrapping_add(i as u16),
                            timestamp,
                            ..Default::default()
                        },
                        payload,
                    };
                    if let Err(e) = track.write_rtp(&packet).await {
                        debug!("video write_rtp: {e}");
                    }
                }
            }
        }
    }
}

struct SharedAudioTrack {
    track: Arc<TrackLocalStaticSample>,
}

impl SharedAudioTrack {
    fn new() -> Self {
        Self {
            track: Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_owned(),
                    clock_rate: crate::audio::OPUS_SAMPLE_RATE,
                    channels: 2,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                "audio".to_owned(),
                STREAM_ID.to_owned(),
            )),
        }
    }

    fn local(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.track.clone()
    }

    async fn write(&self, data: Bytes, duration: Duration) {
        let sample = Sample {
            data,
            duration,
            ..Default::default()
        };
        if let Err(e) = self.track.write_sample(&sample).await {
            debug!("audio write_sample: {e}");
        }
    }
}
