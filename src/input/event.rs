//! Wire schema for input events

use serde::Deserialize;

/// Event kind tag. Unknown tags fail deserialization and the message is
/// dropped by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputEventKind {
    MouseMove,
    MouseDown,
    MouseUp,
    Wheel,
    KeyDown,
    KeyUp,
}

/// One input event as sent by the browser client.
///
/// Coordinates are absolute unless `relative` is set, in which case `dx`/`dy`
/// carry integer deltas. `button` uses the web convention (0 left, 1 middle,
/// 2 right). `code` is the physical key (e.g. `KeyA`, `ShiftLeft`); `key` is
/// the textual fallback used when the code is unknown.
#[derive(Debug, Clone, Deserialize)]
pub struct InputEvent {
    #[serde(rename = "type")]
    pub kind: InputEventKind,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    #[serde(default)]
    pub button: i32,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub relative: bool,
}
