//! Screen capturer contract

use std::sync::Arc;

use super::frame::{DeviceContext, Frame};

/// A platform screen capturer.
///
/// `grab` returns a handle valid until the next `grab`; implementations may
/// hand out a pointer into their own buffer without copying. The capturer is
/// owned exclusively by the pipeline loop.
pub trait FrameCapturer: Send {
    /// Natural capture width in pixels
    fn width(&self) -> u32;

    /// Natural capture height in pixels
    fn height(&self) -> u32;

    /// Fetch the next frame. Failures are per-frame and recoverable.
    fn grab(&mut self) -> crate::Result<Frame<'_>>;

    /// Device-memory capturers expose their device context so the encoder
    /// can be parameterized for zero-copy input.
    fn device_context(&self) -> Option<DeviceContext> {
        None
    }
}

/// Creates a capturer. Selected once at startup.
pub type CapturerFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn FrameCapturer>> + Send + Sync>;
