//! Shared application state

use std::sync::Arc;

use crate::config::GuestInfo;
use crate::session::SessionRegistry;

/// State handed to every HTTP handler.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    /// Bearer token compared on every WHEP request
    pub token: String,
    pub guest: GuestInfo,
}
