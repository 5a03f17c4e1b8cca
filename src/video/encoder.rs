//! Video encoder contract

use std::sync::Arc;

use bytes::Bytes;

use super::frame::{DeviceContext, Frame};
use super::VideoCodec;

/// Encoder construction parameters, derived from the server configuration
/// and the capturer's natural dimensions.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    /// Keyframe interval in frames (already defaulted; never zero)
    pub keyframe_interval: u32,
    pub codec: VideoCodec,
    pub gpu: u32,
    /// Present when the capturer produces device-memory frames
    pub device: Option<DeviceContext>,
}

/// One compressed access unit.
#[derive(Debug, Clone)]
pub struct EncodedUnit {
    pub data: Bytes,
    pub keyframe: bool,
}

/// A video encoder consuming frames from the paired capturer.
///
/// `Ok(None)` means the codec is still buffering and produced no output for
/// this input; the caller skips the frame without treating it as a failure.
pub trait VideoEncoder: Send {
    fn encode(&mut self, frame: &Frame<'_>) -> crate::Result<Option<EncodedUnit>>;
}

/// Creates an encoder for the given settings. Selected once at startup.
pub type EncoderFactory =
    Arc<dyn Fn(&EncoderSettings) -> anyhow::Result<Box<dyn VideoEncoder>> + Send + Sync>;
