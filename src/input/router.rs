//! Data-channel message routing

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::event::{InputEvent, InputEventKind};
use super::{keymap, InputInjector};

/// Parses inbound `input` channel messages and dispatches well-formed events
/// to the injector. Malformed messages are dropped without logging; unmapped
/// keys are logged once per code and dropped.
pub struct InputRouter {
    injector: Arc<dyn InputInjector>,
    unmapped_logged: Mutex<HashSet<String>>,
}

impl InputRouter {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self {
            injector,
            unmapped_logged: Mutex::new(HashSet::new()),
        }
    }

    /// Handle one raw data-channel message.
    pub fn handle_message(&self, data: &[u8]) {
        let Ok(event) = serde_json::from_slice::<InputEvent>(data) else {
            return;
        };
        self.dispatch(&event);
    }

    /// Dispatch a parsed event.
    pub fn dispatch(&self, event: &InputEvent) {
        if matches!(event.kind, InputEventKind::KeyDown | InputEventKind::KeyUp)
            && keymap::resolve(&event.code, &event.key).is_none()
        {
            let mut logged = self.unmapped_logged.lock();
            if logged.insert(event.code.clone()) {
                warn!(code = %event.code, key = %event.key, "unmapped key");
            }
            return;
        }
        self.injector.inject(event);
    }
}

/// Remap a web button index to the X11 pointer button convention.
pub fn web_button_to_x11(button: i32) -> u8 {
    match button {
        0 => 1, // left
        1 => 2, // middle
        2 => 3, // right
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingInjector {
        injected: AtomicUsize,
    }

    impl InputInjector for CountingInjector {
        fn inject(&self, _event: &InputEvent) {
            self.injected.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self) {}
    }

    fn router() -> (Arc<CountingInjector>, InputRouter) {
        let injector = Arc::new(CountingInjector {
            injected: AtomicUsize::new(0),
        });
        (injector.clone(), InputRouter::new(injector))
    }

    #[test]
    fn test_well_formed_event_dispatched() {
        let (injector, router) = router();
        router.handle_message(br#"{"type":"mousedown","x":10,"y":20,"button":0}"#);
        assert_eq!(injector.injected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_dropped_silently() {
        let (injector, router) = router();
        router.handle_message(b"not json");
        router.handle_message(br#"{"type":"teleport"}"#);
        router.handle_message(b"");
        assert_eq!(injector.injected.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unmapped_key_dropped() {
        let (injector, router) = router();
        router.handle_message(br#"{"type":"keydown","code":"MediaPlayPause"}"#);
        router.handle_message(br#"{"type":"keydown","code":"MediaPlayPause"}"#);
        assert_eq!(injector.injected.load(Ordering::SeqCst), 0);
        assert_eq!(router.unmapped_logged.lock().len(), 1);
    }

    #[test]
    fn test_mapped_key_dispatched() {
        let (injector, router) = router();
        router.handle_message(br#"{"type":"keydown","code":"KeyA","key":"a"}"#);
        router.handle_message(br#"{"type":"keyup","code":"KeyA","key":"a"}"#);
        assert_eq!(injector.injected.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_button_remap() {
        assert_eq!(web_button_to_x11(0), 1);
        assert_eq!(web_button_to_x11(1), 2);
        assert_eq!(web_button_to_x11(2), 3);
        assert_eq!(web_button_to_x11(9), 1);
    }
}
