//! Synthetic media backend
//!
//! Stand-in for a platform capture/encode stack: a moving-gradient BGRA
//! source and an encoder that wraps frames into opaque access units. Used
//! when no hardware backend is compiled in, and by the test suite. The
//! stub's output is not decodable video; it only exercises the pipeline and
//! track plumbing.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::AppError;
use crate::video::encoder::{EncodedUnit, EncoderSettings, VideoEncoder};
use crate::video::frame::{Frame, FrameData, PixelFormat};
use crate::video::FrameCapturer;

/// Moving-gradient BGRA capturer.
pub struct SyntheticCapturer {
    width: u32,
    height: u32,
    buf: Vec<u8>,
    tick: u64,
}

impl SyntheticCapturer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buf: vec![0u8; (width * height * 4) as usize],
            tick: 0,
        }
    }

    fn render(&mut self) {
        let bar = ((self.tick * 8) % self.width as u64) as u32;
        for y in 0..self.height {
            let shade = (y * 255 / self.height.max(1)) as u8;
            for x in 0..self.width {
                let i = ((y * self.width + x) * 4) as usize;
                let lit = x.abs_diff(bar) < 16;
                self.buf[i] = shade; // B
                self.buf[i + 1] = if lit { 0xFF } else { 0x40 }; // G
                self.buf[i + 2] = (x * 255 / self.width.max(1)) as u8; // R
                self.buf[i + 3] = 0xFF;
            }
        }
    }
}

impl FrameCapturer for SyntheticCapturer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn grab(&mut self) -> crate::Result<Frame<'_>> {
        self.tick += 1;
        self.render();
        Ok(Frame {
            width: self.width,
            height: self.height,
            stride: self.width * 4,
            format: PixelFormat::Bgra,
            data: FrameData::Cpu(&self.buf),
        })
    }
}

/// Encoder stand-in producing small self-describing access units.
///
/// Mimics a real codec's observable contract: the first frame is buffered
/// (`Ok(None)`), keyframes appear on the configured interval, device-memory
/// frames are rejected.
pub struct StubEncoder {
    keyframe_interval: u32,
    frame_index: u64,
}

impl StubEncoder {
    pub fn new(settings: &EncoderSettings) -> Self {
        Self {
            keyframe_interval: settings.keyframe_interval.max(1),
            frame_index: 0,
        }
    }
}

impl VideoEncoder for StubEncoder {
    fn encode(&mut self, frame: &Frame<'_>) -> crate::Result<Option<EncodedUnit>> {
        if frame.is_device() {
            return Err(AppError::Encode(
                "synthetic encoder cannot read device memory".into(),
            ));
        }

        let index = self.frame_index;
        self.frame_index += 1;
        if index == 0 {
            // Codec pipelines typically emit nothing for the priming frame.
            return Ok(None);
        }

        let keyframe = (index - 1) % self.keyframe_interval as u64 == 0;
        let mut unit = BytesMut::with_capacity(24);
        unit.put_slice(b"DCAU");
        unit.put_u64(index);
        unit.put_u32(frame.width);
        unit.put_u32(frame.height);
        unit.put_u8(u8::from(keyframe));
        Ok(Some(EncodedUnit {
            data: Bytes::from(unit),
            keyframe,
        }))
    }
}
