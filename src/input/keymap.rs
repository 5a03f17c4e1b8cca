//! Web physical key codes to X11 keysyms
//!
//! The `code` field (physical key position) is the primary mapping; when it
//! is unknown, a single printable `key` character maps to its own keysym,
//! and a few textual key names are accepted as a last resort.

// X11 keysym constants (X11/keysymdef.h)
pub const XK_BACKSPACE: u32 = 0xFF08;
pub const XK_TAB: u32 = 0xFF09;
pub const XK_RETURN: u32 = 0xFF0D;
pub const XK_ESCAPE: u32 = 0xFF1B;
pub const XK_DELETE: u32 = 0xFFFF;
pub const XK_HOME: u32 = 0xFF50;
pub const XK_LEFT: u32 = 0xFF51;
pub const XK_UP: u32 = 0xFF52;
pub const XK_RIGHT: u32 = 0xFF53;
pub const XK_DOWN: u32 = 0xFF54;
pub const XK_PAGE_UP: u32 = 0xFF55;
pub const XK_PAGE_DOWN: u32 = 0xFF56;
pub const XK_END: u32 = 0xFF57;
pub const XK_INSERT: u32 = 0xFF63;
pub const XK_SHIFT_L: u32 = 0xFFE1;
pub const XK_SHIFT_R: u32 = 0xFFE2;
pub const XK_CONTROL_L: u32 = 0xFFE3;
pub const XK_CONTROL_R: u32 = 0xFFE4;
pub const XK_CAPS_LOCK: u32 = 0xFFE5;
pub const XK_ALT_L: u32 = 0xFFE9;
pub const XK_ALT_R: u32 = 0xFFEA;
pub const XK_SUPER_L: u32 = 0xFFEB;
pub const XK_SUPER_R: u32 = 0xFFEC;
pub const XK_SPACE: u32 = 0x0020;
pub const XK_PRINT: u32 = 0xFF61;
pub const XK_SCROLL_LOCK: u32 = 0xFF14;
pub const XK_PAUSE: u32 = 0xFF13;
pub const XK_NUM_LOCK: u32 = 0xFF7F;
pub const XK_MENU: u32 = 0xFF67;
pub const XK_F1: u32 = 0xFFBE;

/// Resolve a web physical key `code` (with `key` as textual fallback) to an
/// X11 keysym. Returns `None` for unmapped keys.
pub fn resolve(code: &str, key: &str) -> Option<u32> {
    if let Some(sym) = code_to_keysym(code) {
        return Some(sym);
    }

    // Single printable character: the keysym is the codepoint itself.
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if ('\x20'..='\x7E').contains(&c) {
            return Some(c as u32);
        }
    }

    key_name_to_keysym(key)
}

fn code_to_keysym(code: &str) -> Option<u32> {
    // Letter, digit and function keys follow a regular scheme.
    if let Some(letter) = code.strip_prefix("Key") {
        let mut chars = letter.chars();
        if let (Some(c @ 'A'..='Z'), None) = (chars.next(), chars.next()) {
            return Some(c.to_ascii_lowercase() as u32);
        }
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        let mut chars = digit.chars();
        if let (Some(c @ '0'..='9'), None) = (chars.next(), chars.next()) {
            return Some(c as u32);
        }
    }
    if let Some(n) = code.strip_prefix('F') {
        if let Ok(n @ 1..=12) = n.parse::<u32>() {
            return Some(XK_F1 + n - 1);
        }
    }

    let sym = match code {
        "Backspace" => XK_BACKSPACE,
        "Tab" => XK_TAB,
        "Enter" | "NumpadEnter" => XK_RETURN,
        "Escape" => XK_ESCAPE,
        "Delete" => XK_DELETE,
        "Home" => XK_HOME,
        "End" => XK_END,
        "PageUp" => XK_PAGE_UP,
        "PageDown" => XK_PAGE_DOWN,
        "ArrowLeft" => XK_LEFT,
        "ArrowUp" => XK_UP,
        "ArrowRight" => XK_RIGHT,
        "ArrowDown" => XK_DOWN,
        "Insert" => XK_INSERT,
        "ShiftLeft" => XK_SHIFT_L,
        "ShiftRight" => XK_SHIFT_R,
        "ControlLeft" => XK_CONTROL_L,
        "ControlRight" => XK_CONTROL_R,
        "CapsLock" => XK_CAPS_LOCK,
        "AltLeft" => XK_ALT_L,
        "AltRight" => XK_ALT_R,
        "MetaLeft" => XK_SUPER_L,
        "MetaRight" => XK_SUPER_R,
        "Space" => XK_SPACE,
        "PrintScreen" => XK_PRINT,
        "ScrollLock" => XK_SCROLL_LOCK,
        "Pause" => XK_PAUSE,
        "NumLock" => XK_NUM_LOCK,
        "ContextMenu" => XK_MENU,
        "Minus" => '-' as u32,
        "Equal" => '=' as u32,
        "BracketLeft" => '[' as u32,
        "BracketRight" => ']' as u32,
        "Backslash" => '\\' as u32,
        "Semicolon" => ';' as u32,
        "Quote" => '\'' as u32,
        "Backquote" => '`' as u32,
        "Comma" => ',' as u32,
        "Period" => '.' as u32,
        "Slash" => '/' as u32,
        _ => return None,
    };
    Some(sym)
}

fn key_name_to_keysym(key: &str) -> Option<u32> {
    let sym = match key.to_ascii_lowercase().as_str() {
        "backspace" => XK_BACKSPACE,
        "tab" => XK_TAB,
        "enter" => XK_RETURN,
        "escape" => XK_ESCAPE,
        "delete" => XK_DELETE,
        "home" => XK_HOME,
        "end" => XK_END,
        "pageup" => XK_PAGE_UP,
        "pagedown" => XK_PAGE_DOWN,
        "arrowleft" => XK_LEFT,
        "arrowup" => XK_UP,
        "arrowright" => XK_RIGHT,
        "arrowdown" => XK_DOWN,
        "insert" => XK_INSERT,
        "shift" => XK_SHIFT_L,
        "control" => XK_CONTROL_L,
        "alt" => XK_ALT_L,
        "meta" => XK_SUPER_L,
        " " => XK_SPACE,
        _ => return None,
    };
    Some(sym)
}
