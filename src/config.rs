//! Server configuration and guest capability description

use serde::Serialize;

use crate::video::VideoCodec;

/// Immutable server configuration assembled from CLI flags at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address
    pub addr: String,
    /// Bearer token required on all WHEP endpoints
    pub token: String,
    /// Capture frame rate
    pub fps: u32,
    /// Video bitrate in kbps
    pub bitrate_kbps: u32,
    /// Video codec
    pub codec: VideoCodec,
    /// Keyframe interval in frames (0 = 2x fps)
    pub gop: u32,
    /// GPU index for hardware capture/encode backends
    pub gpu: u32,
    /// Emit periodic pipeline stats
    pub stats: bool,
    /// Serve a virtual machine display instead of the local desktop
    pub vm: bool,
}

/// Guest capabilities reported on `/config`. Selected once at startup and
/// immutable for the process lifetime.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GuestInfo {
    pub os: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub cursor: bool,
    pub clipboard: bool,
}

impl GuestInfo {
    /// Derive guest capabilities from the build target and the VM flag.
    /// Desktop captures composite the cursor into the frame; a VM
    /// framebuffer does not.
    pub fn detect(vm: bool, clipboard: bool) -> Self {
        let os = if cfg!(target_os = "macos") {
            "macos"
        } else {
            "linux"
        };
        Self {
            os,
            kind: if vm { "vm" } else { "desktop" },
            cursor: !vm,
            clipboard,
        }
    }

    /// Mode string for the `/mode` endpoint.
    pub fn mode(&self) -> &'static str {
        self.kind
    }
}
