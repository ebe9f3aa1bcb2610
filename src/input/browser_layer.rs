//! The browser input layer: forwards pointer, keyboard, text, and touch
//! events to a web view, deriving multi-click counts and intercepting the
//! platform edit shortcuts.

use std::time::Instant;

use super::clipboard::{self, ClipboardProvider};
use super::{InputEvent, Modifiers, PointerButton};
use crate::webengine::view::WebView;

/// Two clicks within this window…
pub const MULTI_CLICK_TIME_MS: u128 = 500;
/// …and this distance (px) count as a double/triple click.
pub const MULTI_CLICK_DISTANCE: f64 = 4.0;

/// Per-view input state: click counting and the cursor position wheel
/// events are anchored to.
pub struct BrowserLayer {
    window_size: (u32, u32),
    mouse_x: f64,
    mouse_y: f64,
    last_click_time: Option<Instant>,
    last_click_pos: (f64, f64),
    last_click_button: Option<PointerButton>,
    click_count: u8,
}

impl BrowserLayer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            window_size: (width, height),
            mouse_x: 0.0,
            mouse_y: 0.0,
            last_click_time: None,
            last_click_pos: (0.0, 0.0),
            last_click_button: None,
            click_count: 1,
        }
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    /// Route one event into the view. Returns true when consumed — the
    /// browser layer consumes everything it understands.
    pub fn handle_input(
        &mut self,
        event: &InputEvent,
        view: &WebView,
        clipboard: &mut dyn ClipboardProvider,
    ) -> bool {
        match event {
            InputEvent::MouseMove { x, y, mods } => {
                self.mouse_x = *x;
                self.mouse_y = *y;
                view.send_mouse_move(*x as i32, *y as i32, *mods);
                true
            }
            InputEvent::MouseButton {
                x,
                y,
                button,
                down,
                mods,
            } => {
                if *down {
                    self.update_click_count(*x, *y, *button, Instant::now());
                    view.set_focus(true);
                }
                view.send_mouse_click(
                    *x as i32,
                    *y as i32,
                    *button,
                    *down,
                    self.click_count,
                    *mods,
                );
                true
            }
            InputEvent::MouseWheel { dx, dy, mods } => {
                view.send_mouse_wheel(self.mouse_x as i32, self.mouse_y as i32, *dx, *dy, *mods);
                true
            }
            InputEvent::Key { key, down, mods } => {
                if *down && mods.action_modifier() && self.handle_edit_shortcut(
                    key.vk,
                    mods.contains(Modifiers::SHIFT),
                    view,
                    clipboard,
                ) {
                    return true;
                }
                view.send_key(*key, *down, *mods);
                true
            }
            InputEvent::Text { text, mods } => {
                for ch in text.chars() {
                    view.send_char(ch, *mods);
                }
                true
            }
            InputEvent::Touch {
                id,
                nx,
                ny,
                pressure,
                kind,
                mods,
            } => {
                // Normalised coordinates to window pixels.
                let x = (nx * f64::from(self.window_size.0)) as f32;
                let y = (ny * f64::from(self.window_size.1)) as f32;
                view.send_touch((*id & 0xFFFF) as u32, x, y, *pressure, *kind, *mods);
                true
            }
        }
    }

    fn handle_edit_shortcut(
        &self,
        key: i32,
        shift: bool,
        view: &WebView,
        clipboard: &mut dyn ClipboardProvider,
    ) -> bool {
        const V: i32 = 'V' as i32;
        const C: i32 = 'C' as i32;
        const X: i32 = 'X' as i32;
        const A: i32 = 'A' as i32;
        const Z: i32 = 'Z' as i32;
        const Y: i32 = 'Y' as i32;
        match key {
            V => {
                if let Some(content) = clipboard::read_preferred(clipboard) {
                    view.paste(content);
                }
                true
            }
            C => {
                view.copy();
                true
            }
            X => {
                view.cut();
                true
            }
            A => {
                view.select_all();
                true
            }
            Z => {
                if shift {
                    view.redo();
                } else {
                    view.undo();
                }
                true
            }
            Y => {
                view.redo();
                true
            }
            _ => false,
        }
    }

    /// Multi-click count: rolls 1 → 2 → 3 → 1 while clicks stay on the same
    /// button, close in space, and close in time.
    fn update_click_count(&mut self, x: f64, y: f64, button: PointerButton, now: Instant) {
        let dx = x - self.last_click_pos.0;
        let dy = y - self.last_click_pos.1;
        let same_spot = dx * dx + dy * dy <= MULTI_CLICK_DISTANCE * MULTI_CLICK_DISTANCE;
        let same_button = self.last_click_button == Some(button);
        let in_time = self
            .last_click_time
            .is_some_and(|t| now.duration_since(t).as_millis() <= MULTI_CLICK_TIME_MS);

        self.click_count = if same_spot && same_button && in_time {
            self.click_count % 3 + 1
        } else {
            1
        };
        self.last_click_time = Some(now);
        self.last_click_pos = (x, y);
        self.last_click_button = Some(button);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TouchKind;
    use crate::input::clipboard::PasteContent;
    use crate::webengine::view::{ViewCommand, WebView};
    use std::time::Duration;

    struct NoClipboard;
    impl ClipboardProvider for NoClipboard {
        fn image(&mut self) -> Option<(u32, u32, Vec<u8>)> {
            None
        }
        fn html(&mut self) -> Option<String> {
            None
        }
        fn text(&mut self) -> Option<String> {
            None
        }
    }

    struct TextClipboard(String);
    impl ClipboardProvider for TextClipboard {
        fn image(&mut self) -> Option<(u32, u32, Vec<u8>)> {
            None
        }
        fn html(&mut self) -> Option<String> {
            None
        }
        fn text(&mut self) -> Option<String> {
            Some(self.0.clone())
        }
    }

    fn action_mods() -> Modifiers {
        if cfg!(target_os = "macos") {
            Modifiers::COMMAND
        } else {
            Modifiers::CONTROL
        }
    }

    #[test]
    fn double_click_within_thresholds() {
        let mut layer = BrowserLayer::new(800, 600);
        let start = Instant::now();
        let b = PointerButton::Left;
        layer.update_click_count(100.0, 100.0, b, start);
        assert_eq!(layer.click_count, 1);
        // 3px away, 200ms later: still a double click.
        layer.update_click_count(103.0, 100.0, b, start + Duration::from_millis(200));
        assert_eq!(layer.click_count, 2);
        layer.update_click_count(103.0, 100.0, b, start + Duration::from_millis(400));
        assert_eq!(layer.click_count, 3);
        // Count rolls back to 1.
        layer.update_click_count(103.0, 100.0, b, start + Duration::from_millis(600));
        assert_eq!(layer.click_count, 1);
    }

    #[test]
    fn distant_or_late_clicks_reset() {
        let mut layer = BrowserLayer::new(800, 600);
        let start = Instant::now();
        let b = PointerButton::Left;
        layer.update_click_count(100.0, 100.0, b, start);
        layer.update_click_count(110.0, 100.0, b, start + Duration::from_millis(100));
        assert_eq!(layer.click_count, 1);

        layer.update_click_count(110.0, 100.0, b, start + Duration::from_millis(700));
        assert_eq!(layer.click_count, 1);

        // Different button resets too.
        layer.update_click_count(110.0, 100.0, b, start + Duration::from_millis(800));
        layer.update_click_count(
            110.0,
            100.0,
            PointerButton::Right,
            start + Duration::from_millis(900),
        );
        assert_eq!(layer.click_count, 1);
    }

    #[test]
    fn paste_shortcut_reads_clipboard() {
        let mut layer = BrowserLayer::new(800, 600);
        let (view, driver) = WebView::new("test", 800, 600);
        let mut clipboard = TextClipboard("hello".into());

        let event = InputEvent::Key {
            key: crate::input::keymap::KeyTranslation {
                vk: 'V' as i32,
                native: 'V' as i32,
            },
            down: true,
            mods: action_mods(),
        };
        assert!(layer.handle_input(&event, &view, &mut clipboard));
        assert!(matches!(
            driver.commands.try_recv(),
            Ok(ViewCommand::Paste(PasteContent::Text(text))) if text == "hello"
        ));
    }

    #[test]
    fn undo_redo_shortcuts() {
        let mut layer = BrowserLayer::new(800, 600);
        let (view, driver) = WebView::new("test", 800, 600);
        let mut clipboard = NoClipboard;

        let key = crate::input::keymap::KeyTranslation {
            vk: 'Z' as i32,
            native: 'Z' as i32,
        };
        layer.handle_input(
            &InputEvent::Key {
                key,
                down: true,
                mods: action_mods(),
            },
            &view,
            &mut clipboard,
        );
        assert!(matches!(driver.commands.try_recv(), Ok(ViewCommand::Undo)));

        layer.handle_input(
            &InputEvent::Key {
                key,
                down: true,
                mods: action_mods() | Modifiers::SHIFT,
            },
            &view,
            &mut clipboard,
        );
        assert!(matches!(driver.commands.try_recv(), Ok(ViewCommand::Redo)));
    }

    #[test]
    fn plain_keys_reach_the_view() {
        let mut layer = BrowserLayer::new(800, 600);
        let (view, driver) = WebView::new("test", 800, 600);
        let mut clipboard = NoClipboard;
        let key = crate::input::keymap::KeyTranslation {
            vk: 0x41,
            native: 0x41,
        };
        layer.handle_input(
            &InputEvent::Key {
                key,
                down: true,
                mods: Modifiers::empty(),
            },
            &view,
            &mut clipboard,
        );
        assert!(matches!(
            driver.commands.try_recv(),
            Ok(ViewCommand::Key { down: true, .. })
        ));
    }

    #[test]
    fn touch_coordinates_scale_to_window() {
        let mut layer = BrowserLayer::new(1000, 500);
        let (view, driver) = WebView::new("test", 1000, 500);
        let mut clipboard = NoClipboard;
        layer.handle_input(
            &InputEvent::Touch {
                id: 70000,
                nx: 0.5,
                ny: 0.2,
                pressure: 1.0,
                kind: TouchKind::Down,
                mods: Modifiers::empty(),
            },
            &view,
            &mut clipboard,
        );
        match driver.commands.try_recv() {
            Ok(ViewCommand::Touch { id, x, y, .. }) => {
                assert_eq!(id, 70000 & 0xFFFF);
                assert!((x - 500.0).abs() < f32::EPSILON);
                assert!((y - 100.0).abs() < f32::EPSILON);
            }
            other => panic!("expected touch, got {other:?}"),
        }
    }

    #[test]
    fn text_fans_out_per_character() {
        let mut layer = BrowserLayer::new(100, 100);
        let (view, driver) = WebView::new("test", 100, 100);
        let mut clipboard = NoClipboard;
        layer.handle_input(
            &InputEvent::Text {
                text: "ab".into(),
                mods: Modifiers::empty(),
            },
            &view,
            &mut clipboard,
        );
        assert!(matches!(
            driver.commands.try_recv(),
            Ok(ViewCommand::Char { ch: 'a', .. })
        ));
        assert!(matches!(
            driver.commands.try_recv(),
            Ok(ViewCommand::Char { ch: 'b', .. })
        ));
    }
}
