//! Controller session construction
//!
//! The single privileged peer: shared media out, `input` and `clipboard`
//! data channels in. Channels are created by the client; only those two
//! labels are recognized.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

use super::{attach_tracks, build_peer_connection, Role, Session, SessionId};
use crate::clipboard::{ClipboardSendFn, ClipboardSyncFactory};
use crate::input::{InputInjectorFactory, InputRouter};
use crate::rtc::SharedTracks;
use crate::video::VideoCodec;

/// Build a controller session against the current shared tracks.
///
/// The injector comes from its factory here, at session creation, not per
/// message; the clipboard synchronizer is built later, when its channel
/// opens. Missing or failing factories degrade the session to media-only.
pub async fn new_controller(
    id: SessionId,
    codec: VideoCodec,
    tracks: &SharedTracks,
    input_factory: Option<InputInjectorFactory>,
    clipboard_factory: Option<ClipboardSyncFactory>,
) -> crate::Result<Arc<Session>> {
    let pc = build_peer_connection(codec).await?;
    let stop = CancellationToken::new();
    attach_tracks(&pc, tracks, &stop).await?;

    let sess = Session::new(id, Role::Controller, pc.clone(), stop);

    let router = match input_factory {
        Some(factory) => match factory() {
            Ok(injector) => {
                sess.set_injector(injector.clone());
                Some(Arc::new(InputRouter::new(injector)))
            }
            Err(e) => {
                warn!("input injector init failed: {e}");
                None
            }
        },
        None => None,
    };

    let weak = Arc::downgrade(&sess);
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let weak = weak.clone();
        let router = router.clone();
        let clipboard_factory = clipboard_factory.clone();
        Box::pin(async move {
            match dc.label() {
                "input" => wire_input_channel(&dc, router),
                "clipboard" => {
                    if let Some(factory) = clipboard_factory {
                        wire_clipboard_channel(&dc, weak, factory);
                    }
                }
                other => debug!("ignoring data channel {other:?}"),
            }
        })
    }));

    Ok(sess)
}

fn wire_input_channel(dc: &Arc<RTCDataChannel>, router: Option<Arc<InputRouter>>) {
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        if let Some(router) = &router {
            router.handle_message(&msg.data);
        }
        Box::pin(async {})
    }));
}

fn wire_clipboard_channel(
    dc: &Arc<RTCDataChannel>,
    weak: std::sync::Weak<Session>,
    factory: ClipboardSyncFactory,
) {
    // The synchronizer exists only while the channel does; build it on open
    // with a send-back that writes when the channel is open and drops
    // otherwise.
    let open_dc = dc.clone();
    let open_weak = weak.clone();
    dc.on_open(Box::new(move || {
        let dc = open_dc.clone();
        let weak = open_weak.clone();
        let factory = factory.clone();
        Box::pin(async move {
            let Some(sess) = weak.upgrade() else { return };

            let send_dc = dc.clone();
            let send: ClipboardSendFn = Arc::new(move |text: String| {
                let dc = send_dc.clone();
                tokio::spawn(async move {
                    if dc.ready_state() == RTCDataChannelState::Open {
                        if let Err(e) = dc.send_text(text).await {
                            debug!("clipboard send: {e}");
                        }
                    }
                });
            });

            let sync = match factory(send) {
                Ok(sync) => sync,
                Err(e) => {
                    warn!("clipboard sync init failed: {e}");
                    return;
                }
            };
            sess.set_clipboard(sync.clone());

            let stop = sess.stop_token();
            tokio::spawn(async move {
                sync.run(stop).await;
                debug!("clipboard loop exited");
            });
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let weak = weak.clone();
        Box::pin(async move {
            let Some(sess) = weak.upgrade() else { return };
            if let Some(sync) = sess.clipboard() {
                sync.set_from_client(String::from_utf8_lossy(&msg.data).into_owned());
            }
        })
    }));
}
