//! Viewer session construction
//!
//! Media-only peers: same codec registration and track binding as the
//! controller, no data channels, no control resources.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{attach_tracks, build_peer_connection, Role, Session, SessionId};
use crate::rtc::SharedTracks;
use crate::video::VideoCodec;

pub async fn new_viewer(
    id: SessionId,
    codec: VideoCodec,
    tracks: &SharedTracks,
) -> crate::Result<Arc<Session>> {
    let pc = build_peer_connection(codec).await?;
    let stop = CancellationToken::new();
    attach_tracks(&pc, tracks, &stop).await?;
    Ok(Session::new(id, Role::Viewer, pc, stop))
}
