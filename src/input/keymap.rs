//! Physical key translation for the web engine.
//!
//! The engine consumes Windows virtual-key codes regardless of host OS, plus
//! an OS-native code (macOS virtual keys on macOS, VK pass-through
//! elsewhere). Printable ASCII characters whose codepoints collide with VK
//! codes for *different* keys (`,` `-` `.` and friends) are remapped to
//! their OEM equivalents.

use winit::keyboard::KeyCode;

/// Windows virtual-key constants the engine expects.
pub mod vk {
    pub const BACK: i32 = 0x08;
    pub const TAB: i32 = 0x09;
    pub const RETURN: i32 = 0x0D;
    pub const SHIFT: i32 = 0x10;
    pub const CONTROL: i32 = 0x11;
    pub const MENU: i32 = 0x12;
    pub const PAUSE: i32 = 0x13;
    pub const CAPITAL: i32 = 0x14;
    pub const ESCAPE: i32 = 0x1B;
    pub const SPACE: i32 = 0x20;
    pub const PRIOR: i32 = 0x21;
    pub const NEXT: i32 = 0x22;
    pub const END: i32 = 0x23;
    pub const HOME: i32 = 0x24;
    pub const LEFT: i32 = 0x25;
    pub const UP: i32 = 0x26;
    pub const RIGHT: i32 = 0x27;
    pub const DOWN: i32 = 0x28;
    pub const SNAPSHOT: i32 = 0x2C;
    pub const INSERT: i32 = 0x2D;
    pub const DELETE: i32 = 0x2E;
    pub const LWIN: i32 = 0x5B;
    pub const NUMPAD0: i32 = 0x60;
    pub const MULTIPLY: i32 = 0x6A;
    pub const ADD: i32 = 0x6B;
    pub const SUBTRACT: i32 = 0x6D;
    pub const DECIMAL: i32 = 0x6E;
    pub const DIVIDE: i32 = 0x6F;
    pub const F1: i32 = 0x70;
    pub const NUMLOCK: i32 = 0x90;
    pub const SCROLL: i32 = 0x91;
    pub const VOLUME_MUTE: i32 = 0xAD;
    pub const VOLUME_DOWN: i32 = 0xAE;
    pub const VOLUME_UP: i32 = 0xAF;
    pub const MEDIA_NEXT_TRACK: i32 = 0xB0;
    pub const MEDIA_PREV_TRACK: i32 = 0xB1;
    pub const MEDIA_STOP: i32 = 0xB2;
    pub const MEDIA_PLAY_PAUSE: i32 = 0xB3;
    pub const OEM_1: i32 = 0xBA; // ;:
    pub const OEM_PLUS: i32 = 0xBB; // =+
    pub const OEM_COMMA: i32 = 0xBC; // ,<
    pub const OEM_MINUS: i32 = 0xBD; // -_
    pub const OEM_PERIOD: i32 = 0xBE; // .>
    pub const OEM_2: i32 = 0xBF; // /?
    pub const OEM_3: i32 = 0xC0; // `~
    pub const OEM_4: i32 = 0xDB; // [{
    pub const OEM_5: i32 = 0xDC; // \|
    pub const OEM_6: i32 = 0xDD; // ]}
    pub const OEM_7: i32 = 0xDE; // '"
}

/// A key event's code pair as delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTranslation {
    /// Platform-neutral Windows virtual-key code.
    pub vk: i32,
    /// OS-native code the engine also wants.
    pub native: i32,
}

/// Translate a physical key into the engine's code pair. Returns `None` for
/// keys the engine has no representation for.
pub fn translate(code: KeyCode) -> Option<KeyTranslation> {
    let vk = vk_code(code)?;
    Some(KeyTranslation {
        vk,
        native: native_code(code, vk),
    })
}

fn vk_code(code: KeyCode) -> Option<i32> {
    use KeyCode as K;
    Some(match code {
        K::KeyA => 0x41,
        K::KeyB => 0x42,
        K::KeyC => 0x43,
        K::KeyD => 0x44,
        K::KeyE => 0x45,
        K::KeyF => 0x46,
        K::KeyG => 0x47,
        K::KeyH => 0x48,
        K::KeyI => 0x49,
        K::KeyJ => 0x4A,
        K::KeyK => 0x4B,
        K::KeyL => 0x4C,
        K::KeyM => 0x4D,
        K::KeyN => 0x4E,
        K::KeyO => 0x4F,
        K::KeyP => 0x50,
        K::KeyQ => 0x51,
        K::KeyR => 0x52,
        K::KeyS => 0x53,
        K::KeyT => 0x54,
        K::KeyU => 0x55,
        K::KeyV => 0x56,
        K::KeyW => 0x57,
        K::KeyX => 0x58,
        K::KeyY => 0x59,
        K::KeyZ => 0x5A,
        K::Digit0 => 0x30,
        K::Digit1 => 0x31,
        K::Digit2 => 0x32,
        K::Digit3 => 0x33,
        K::Digit4 => 0x34,
        K::Digit5 => 0x35,
        K::Digit6 => 0x36,
        K::Digit7 => 0x37,
        K::Digit8 => 0x38,
        K::Digit9 => 0x39,
        K::Backspace => vk::BACK,
        K::Tab => vk::TAB,
        K::Enter | K::NumpadEnter => vk::RETURN,
        K::ShiftLeft | K::ShiftRight => vk::SHIFT,
        K::ControlLeft | K::ControlRight => vk::CONTROL,
        K::AltLeft | K::AltRight => vk::MENU,
        K::Pause => vk::PAUSE,
        K::CapsLock => vk::CAPITAL,
        K::Escape => vk::ESCAPE,
        K::Space => vk::SPACE,
        K::PageUp => vk::PRIOR,
        K::PageDown => vk::NEXT,
        K::End => vk::END,
        K::Home => vk::HOME,
        K::ArrowLeft => vk::LEFT,
        K::ArrowUp => vk::UP,
        K::ArrowRight => vk::RIGHT,
        K::ArrowDown => vk::DOWN,
        K::PrintScreen => vk::SNAPSHOT,
        K::Insert => vk::INSERT,
        K::Delete => vk::DELETE,
        K::SuperLeft | K::SuperRight => vk::LWIN,
        K::Numpad0 => vk::NUMPAD0,
        K::Numpad1 => vk::NUMPAD0 + 1,
        K::Numpad2 => vk::NUMPAD0 + 2,
        K::Numpad3 => vk::NUMPAD0 + 3,
        K::Numpad4 => vk::NUMPAD0 + 4,
        K::Numpad5 => vk::NUMPAD0 + 5,
        K::Numpad6 => vk::NUMPAD0 + 6,
        K::Numpad7 => vk::NUMPAD0 + 7,
        K::Numpad8 => vk::NUMPAD0 + 8,
        K::Numpad9 => vk::NUMPAD0 + 9,
        K::NumpadMultiply => vk::MULTIPLY,
        K::NumpadAdd => vk::ADD,
        K::NumpadSubtract => vk::SUBTRACT,
        K::NumpadDecimal => vk::DECIMAL,
        K::NumpadDivide => vk::DIVIDE,
        K::F1 => vk::F1,
        K::F2 => vk::F1 + 1,
        K::F3 => vk::F1 + 2,
        K::F4 => vk::F1 + 3,
        K::F5 => vk::F1 + 4,
        K::F6 => vk::F1 + 5,
        K::F7 => vk::F1 + 6,
        K::F8 => vk::F1 + 7,
        K::F9 => vk::F1 + 8,
        K::F10 => vk::F1 + 9,
        K::F11 => vk::F1 + 10,
        K::F12 => vk::F1 + 11,
        K::NumLock => vk::NUMLOCK,
        K::ScrollLock => vk::SCROLL,
        K::AudioVolumeMute => vk::VOLUME_MUTE,
        K::AudioVolumeDown => vk::VOLUME_DOWN,
        K::AudioVolumeUp => vk::VOLUME_UP,
        K::MediaTrackNext => vk::MEDIA_NEXT_TRACK,
        K::MediaTrackPrevious => vk::MEDIA_PREV_TRACK,
        K::MediaStop => vk::MEDIA_STOP,
        K::MediaPlayPause => vk::MEDIA_PLAY_PAUSE,
        // Punctuation: ASCII codepoints for , - . collide with VK codes of
        // other keys, so the OEM codes are mandatory here.
        K::Semicolon => vk::OEM_1,
        K::Equal => vk::OEM_PLUS,
        K::Comma => vk::OEM_COMMA,
        K::Minus => vk::OEM_MINUS,
        K::Period => vk::OEM_PERIOD,
        K::Slash => vk::OEM_2,
        K::Backquote => vk::OEM_3,
        K::BracketLeft => vk::OEM_4,
        K::Backslash => vk::OEM_5,
        K::BracketRight => vk::OEM_6,
        K::Quote => vk::OEM_7,
        _ => return None,
    })
}

/// macOS virtual-key codes for the keys the engine asks a native code for.
#[cfg(target_os = "macos")]
fn native_code(code: KeyCode, vk: i32) -> i32 {
    use KeyCode as K;
    match code {
        K::KeyA => 0x00,
        K::KeyS => 0x01,
        K::KeyD => 0x02,
        K::KeyF => 0x03,
        K::KeyH => 0x04,
        K::KeyG => 0x05,
        K::KeyZ => 0x06,
        K::KeyX => 0x07,
        K::KeyC => 0x08,
        K::KeyV => 0x09,
        K::KeyB => 0x0B,
        K::KeyQ => 0x0C,
        K::KeyW => 0x0D,
        K::KeyE => 0x0E,
        K::KeyR => 0x0F,
        K::KeyY => 0x10,
        K::KeyT => 0x11,
        K::Digit1 => 0x12,
        K::Digit2 => 0x13,
        K::Digit3 => 0x14,
        K::Digit4 => 0x15,
        K::Digit6 => 0x16,
        K::Digit5 => 0x17,
        K::Equal => 0x18,
        K::Digit9 => 0x19,
        K::Digit7 => 0x1A,
        K::Minus => 0x1B,
        K::Digit8 => 0x1C,
        K::Digit0 => 0x1D,
        K::BracketRight => 0x1E,
        K::KeyO => 0x1F,
        K::KeyU => 0x20,
        K::BracketLeft => 0x21,
        K::KeyI => 0x22,
        K::KeyP => 0x23,
        K::Enter => 0x24,
        K::KeyL => 0x25,
        K::KeyJ => 0x26,
        K::Quote => 0x27,
        K::KeyK => 0x28,
        K::Semicolon => 0x29,
        K::Backslash => 0x2A,
        K::Comma => 0x2B,
        K::Slash => 0x2C,
        K::KeyN => 0x2D,
        K::KeyM => 0x2E,
        K::Period => 0x2F,
        K::Tab => 0x30,
        K::Space => 0x31,
        K::Backquote => 0x32,
        K::Backspace => 0x33,
        K::Escape => 0x35,
        K::ArrowLeft => 0x7B,
        K::ArrowRight => 0x7C,
        K::ArrowDown => 0x7D,
        K::ArrowUp => 0x7E,
        _ => vk,
    }
}

#[cfg(not(target_os = "macos"))]
fn native_code(_code: KeyCode, vk: i32) -> i32 {
    vk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_map_to_ascii_vk() {
        assert_eq!(translate(KeyCode::KeyA).unwrap().vk, 0x41);
        assert_eq!(translate(KeyCode::KeyZ).unwrap().vk, 0x5A);
        assert_eq!(translate(KeyCode::Digit0).unwrap().vk, 0x30);
        assert_eq!(translate(KeyCode::Digit9).unwrap().vk, 0x39);
    }

    #[test]
    fn colliding_punctuation_uses_oem_codes() {
        // ',' is 0x2C = VK_SNAPSHOT, '-' is 0x2D = VK_INSERT,
        // '.' is 0x2E = VK_DELETE. All three must take the OEM code instead.
        assert_eq!(translate(KeyCode::Comma).unwrap().vk, vk::OEM_COMMA);
        assert_eq!(translate(KeyCode::Minus).unwrap().vk, vk::OEM_MINUS);
        assert_eq!(translate(KeyCode::Period).unwrap().vk, vk::OEM_PERIOD);
        assert_ne!(translate(KeyCode::Comma).unwrap().vk, ',' as i32);
    }

    #[test]
    fn media_keys_translate() {
        assert_eq!(
            translate(KeyCode::MediaPlayPause).unwrap().vk,
            vk::MEDIA_PLAY_PAUSE
        );
        assert_eq!(translate(KeyCode::MediaStop).unwrap().vk, vk::MEDIA_STOP);
    }

    #[test]
    fn function_keys_are_contiguous() {
        assert_eq!(translate(KeyCode::F1).unwrap().vk, 0x70);
        assert_eq!(translate(KeyCode::F12).unwrap().vk, 0x7B);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn native_code_passes_vk_through() {
        let t = translate(KeyCode::KeyA).unwrap();
        assert_eq!(t.native, t.vk);
    }
}
