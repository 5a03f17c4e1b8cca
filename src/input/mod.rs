//! Input event routing
//!
//! Events arrive as JSON over the controller's `input` data channel, get
//! parsed and validated by the [`InputRouter`], and are dispatched to the
//! platform injector. The keymap and scroll helpers implement the lowering
//! that X11-style injector backends share.

pub mod event;
pub mod keymap;
pub mod router;
pub mod scroll;

pub use event::{InputEvent, InputEventKind};
pub use router::InputRouter;

use std::sync::Arc;

/// Platform input injector. Implementations translate web-convention events
/// into native pointer and key synthesis; see [`router::web_button_to_x11`],
/// [`keymap::resolve`] and [`scroll::ScrollAccumulator`] for the shared
/// mapping rules.
pub trait InputInjector: Send + Sync {
    fn inject(&self, event: &InputEvent);

    /// Release the platform connection. Called once at session close.
    fn close(&self);
}

/// Creates an injector for a controller session. Invoked at session
/// creation, not per message.
pub type InputInjectorFactory =
    Arc<dyn Fn() -> anyhow::Result<Arc<dyn InputInjector>> + Send + Sync>;
