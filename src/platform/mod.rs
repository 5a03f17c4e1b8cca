//! Startup selection of platform backends
//!
//! Picks the capture/encode/audio factory set plus the input and clipboard
//! factories once, from the build target and the server configuration. The
//! hardware backends (NvFBC/CUDA, ScreenCaptureKit, VideoToolbox, Pulse,
//! XTest, pasteboard agents) live outside this crate; a build without them
//! falls back to the synthetic pattern source.

use std::sync::Arc;

use tracing::warn;

use crate::clipboard::ClipboardSyncFactory;
use crate::config::ServerConfig;
use crate::input::InputInjectorFactory;
use crate::pipeline::MediaFactories;
use crate::video::synthetic::{StubEncoder, SyntheticCapturer};

/// Synthetic source dimensions when no capture backend is compiled in.
const FALLBACK_WIDTH: u32 = 1280;
const FALLBACK_HEIGHT: u32 = 720;

pub struct PlatformFactories {
    pub media: MediaFactories,
    pub input: Option<InputInjectorFactory>,
    pub clipboard: Option<ClipboardSyncFactory>,
}

impl PlatformFactories {
    pub fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }
}

/// Select backends for this process. Runs once before serving starts.
pub fn select(_cfg: &ServerConfig) -> PlatformFactories {
    warn!(
        "no platform capture backend compiled in; serving a {}x{} synthetic test pattern",
        FALLBACK_WIDTH, FALLBACK_HEIGHT
    );

    let media = MediaFactories {
        capturer: Arc::new(|| {
            Ok(Box::new(SyntheticCapturer::new(
                FALLBACK_WIDTH,
                FALLBACK_HEIGHT,
            )) as Box<dyn crate::video::FrameCapturer>)
        }),
        encoder: Arc::new(|settings| {
            Ok(Box::new(StubEncoder::new(settings)) as Box<dyn crate::video::VideoEncoder>)
        }),
        audio: None,
    };

    PlatformFactories {
        media,
        input: None,
        clipboard: None,
    }
}
