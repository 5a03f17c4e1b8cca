//! Peer sessions
//!
//! A session wraps one peer connection bound to the shared tracks. The
//! controller additionally carries input and clipboard channels; viewers
//! are media-only. Sessions transition `Live -> Closed` exactly once; the
//! stop token is the cooperative shutdown signal observed by the clipboard
//! loop and the registry watchdog.

pub mod controller;
pub mod registry;
pub mod viewer;

pub use registry::SessionRegistry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};

use crate::clipboard::ClipboardSync;
use crate::error::AppError;
use crate::input::InputInjector;
use crate::rtc::SharedTracks;
use crate::video::VideoCodec;

/// Process-unique session identifier (UUID in textual form).
pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Controller,
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Controller => write!(f, "controller"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

pub struct Session {
    pub id: SessionId,
    pub role: Role,
    pc: Arc<RTCPeerConnection>,
    stop: CancellationToken,
    /// Idempotence latch for close()
    closing: AtomicBool,
    /// Observable once resources are released
    closed: AtomicBool,
    injector: Mutex<Option<Arc<dyn InputInjector>>>,
    clipboard: Mutex<Option<Arc<dyn ClipboardSync>>>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        role: Role,
        pc: Arc<RTCPeerConnection>,
        stop: CancellationToken,
    ) -> Arc<Self> {
        let sess = Arc::new(Self {
            id,
            role,
            pc,
            stop,
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            injector: Mutex::new(None),
            clipboard: Mutex::new(None),
        });
        Self::install_state_observer(&sess);
        sess
    }

    /// Clone of the session's stop token.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Resolves once the stop signal fires.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Single-fire close: fire the stop signal (waking the clipboard loop
    /// and the watchdog), release control resources, close the peer
    /// connection. Safe to call any number of times.
    pub async fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop.cancel();

        let injector = self.injector.lock().take();
        if let Some(injector) = injector {
            injector.close();
        }
        let clipboard = self.clipboard.lock().take();
        if let Some(clipboard) = clipboard {
            clipboard.close();
        }

        if let Err(e) = self.pc.close().await {
            debug!(id = %self.id, "peer connection close: {e}");
        }
        self.closed.store(true, Ordering::SeqCst);
        info!(id = %self.id, role = %self.role, "session closed");
    }

    /// Drive the WHEP SDP exchange: apply the offer, produce an answer and
    /// wait for ICE gathering to finish (no trickle from the server side)
    /// before returning the full local description.
    pub async fn negotiate(&self, offer_sdp: String, deadline: Duration) -> crate::Result<String> {
        let offer = RTCSessionDescription::offer(offer_sdp)
            .map_err(|e| AppError::BadOffer(e.to_string()))?;
        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| AppError::BadOffer(e.to_string()))?;

        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| AppError::Internal(format!("create answer: {e}")))?;

        let mut gather_complete = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| AppError::Internal(format!("set local description: {e}")))?;

        if tokio::time::timeout(deadline, gather_complete.recv())
            .await
            .is_err()
        {
            return Err(AppError::IceGatherTimeout);
        }

        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| AppError::Internal("no local description".into()))?;
        Ok(local.sdp)
    }

    /// Best-effort trickle candidate add. The candidate string is the SDP
    /// attribute value without the `a=` prefix.
    pub async fn add_remote_candidate(&self, candidate: &str) -> crate::Result<()> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.to_owned(),
                ..Default::default()
            })
            .await
            .map_err(|e| AppError::Internal(format!("add ice candidate: {e}")))
    }

    pub(crate) fn set_injector(&self, injector: Arc<dyn InputInjector>) {
        *self.injector.lock() = Some(injector);
    }

    pub(crate) fn set_clipboard(&self, clipboard: Arc<dyn ClipboardSync>) {
        *self.clipboard.lock() = Some(clipboard);
    }

    pub(crate) fn clipboard(&self) -> Option<Arc<dyn ClipboardSync>> {
        self.clipboard.lock().clone()
    }

    /// Failed, disconnected and closed converge on the same path as an
    /// explicit DELETE: the session closes itself and the watchdog cleans
    /// up registry state.
    fn install_state_observer(sess: &Arc<Self>) {
        let weak = Arc::downgrade(sess);
        sess.pc
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let weak = weak.clone();
                Box::pin(async move {
                    let Some(sess) = weak.upgrade() else { return };
                    info!(id = %sess.id, "peer connection state: {state}");
                    if matches!(
                        state,
                        RTCPeerConnectionState::Failed
                            | RTCPeerConnectionState::Disconnected
                            | RTCPeerConnectionState::Closed
                    ) {
                        sess.close().await;
                    }
                })
            }));
    }
}

/// Build a peer connection whose media engine registers exactly the
/// selected video codec plus Opus, with the fixed payload types.
pub(crate) async fn build_peer_connection(
    codec: VideoCodec,
) -> crate::Result<Arc<RTCPeerConnection>> {
    let mut media = MediaEngine::default();

    media
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: codec.mime_type().to_owned(),
                    clock_rate: codec.clock_rate(),
                    channels: 0,
                    sdp_fmtp_line: codec.sdp_fmtp().to_owned(),
                    rtcp_feedback: vec![],
                },
                payload_type: codec.payload_type(),
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| AppError::Internal(format!("register video codec: {e}")))?;

    media
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_owned(),
                    clock_rate: crate::audio::OPUS_SAMPLE_RATE,
                    channels: 2,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                payload_type: 111,
                ..Default::default()
            },
            RTPCodecType::Audio,
        )
        .map_err(|e| AppError::Internal(format!("register Opus: {e}")))?;

    let api = APIBuilder::new().with_media_engine(media).build();
    let pc = api
        .new_peer_connection(RTCConfiguration::default())
        .await
        .map_err(|e| AppError::Internal(format!("create peer connection: {e}")))?;
    Ok(Arc::new(pc))
}

/// Add both shared tracks as outbound media and drain their RTCP streams
/// until the session stops.
pub(crate) async fn attach_tracks(
    pc: &Arc<RTCPeerConnection>,
    tracks: &SharedTracks,
    stop: &CancellationToken,
) -> crate::Result<()> {
    for track in [tracks.video_local(), tracks.audio_local()] {
        let sender = pc
            .add_track(track)
            .await
            .map_err(|e| AppError::TrackInit(e.to_string()))?;
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    res = sender.read(&mut buf) => {
                        if res.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
    Ok(())
}
