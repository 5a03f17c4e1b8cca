//! WebRTC plumbing: shared broadcast tracks and HEVC packetization
//!
//! One video and one audio track are created per pipeline run and bound to
//! every peer connection via `add_track`; a write fans out to all bound
//! peers and never fails the writer.

pub mod h265;
pub mod tracks;

pub use tracks::SharedTracks;
