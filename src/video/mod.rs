//! Video capture and encoding contracts
//!
//! The pipeline owns one capturer and one encoder; both are reached through
//! the traits here so platform backends (NvFBC/CUDA, ScreenCaptureKit,
//! VideoToolbox, ...) stay out of the core. Zero-copy backends advertise a
//! device context the encoder can consume.

pub mod capture;
pub mod encoder;
pub mod frame;
pub mod synthetic;

pub use capture::{CapturerFactory, FrameCapturer};
pub use encoder::{EncodedUnit, EncoderFactory, EncoderSettings, VideoEncoder};
pub use frame::{DeviceContext, Frame, FrameData, PixelFormat};

/// Video codec selection for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    H265,
}

impl VideoCodec {
    /// MIME type for SDP
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/H264",
            VideoCodec::H265 => "video/H265",
        }
    }

    /// RTP clock rate (90 kHz for both)
    pub fn clock_rate(&self) -> u32 {
        90000
    }

    /// SDP fmtp parameters
    pub fn sdp_fmtp(&self) -> &'static str {
        match self {
            VideoCodec::H264 => {
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f"
            }
            VideoCodec::H265 => "profile-id=1",
        }
    }

    /// RTP payload type registered in the media engine
    pub fn payload_type(&self) -> u8 {
        match self {
            VideoCodec::H264 => 96,
            VideoCodec::H265 => 97,
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCodec::H264 => write!(f, "h264"),
            VideoCodec::H265 => write!(f, "h265"),
        }
    }
}
