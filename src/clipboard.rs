//! Clipboard synchronization contract
//!
//! A synchronizer bridges the guest clipboard and the controller's
//! `clipboard` data channel. Both directions carry plain UTF-8 text with no
//! framing. Implementations poll the guest side at [`POLL_INTERVAL`] and
//! must suppress echo: a value just written from the client, or one already
//! delivered to it, is not reported again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Guest clipboard poll cadence.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Callback delivering guest clipboard changes back to the client. The
/// session wires this to the data channel; sends while the channel is not
/// open are dropped.
pub type ClipboardSendFn = Arc<dyn Fn(String) + Send + Sync>;

/// Bidirectional clipboard synchronizer owned by a controller session.
#[async_trait]
pub trait ClipboardSync: Send + Sync {
    /// Take ownership of the guest clipboard with text received from the
    /// client, so guest applications observe it.
    fn set_from_client(&self, text: String);

    /// Poll loop: watch the guest clipboard and deliver changes through the
    /// send-back callback until the stop token fires.
    async fn run(&self, stop: CancellationToken);

    /// Release platform clipboard resources.
    fn close(&self);
}

/// Creates a synchronizer bound to a send-back callback. Invoked when the
/// controller's clipboard channel opens.
pub type ClipboardSyncFactory =
    Arc<dyn Fn(ClipboardSendFn) -> anyhow::Result<Arc<dyn ClipboardSync>> + Send + Sync>;
