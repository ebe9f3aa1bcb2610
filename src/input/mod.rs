//! Input routing: platform-neutral events, the layer stack, and window-state
//! subscriptions.
//!
//! Layers are a closed set (menu, overlay web view, main web view, video)
//! rather than trait objects; the stack holds layer ids and the application
//! dispatches to the owning component, top of stack first. A layer consumes
//! an event by returning `true`; unconsumed events fall through to the next
//! layer down.

pub mod browser_layer;
pub mod clipboard;
pub mod keymap;
pub mod video_layer;

use bitflags::bitflags;

use crate::log;

bitflags! {
    /// Platform-neutral modifier state delivered with every input event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 1;
        const CONTROL = 1 << 2;
        const ALT = 1 << 3;
        const LEFT_BUTTON = 1 << 4;
        const MIDDLE_BUTTON = 1 << 5;
        const RIGHT_BUTTON = 1 << 6;
        const COMMAND = 1 << 7;
    }
}

impl Modifiers {
    /// The platform's primary edit-shortcut modifier: Cmd on macOS, Ctrl
    /// elsewhere.
    pub fn action_modifier(self) -> bool {
        if cfg!(target_os = "macos") {
            self.contains(Self::COMMAND)
        } else {
            self.contains(Self::CONTROL)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
    Down,
    Up,
    Move,
}

/// Platform-neutral input event, built from the OS event in the frame loop.
#[derive(Debug, Clone)]
pub enum InputEvent {
    MouseMove {
        x: f64,
        y: f64,
        mods: Modifiers,
    },
    MouseButton {
        x: f64,
        y: f64,
        button: PointerButton,
        down: bool,
        mods: Modifiers,
    },
    MouseWheel {
        dx: f32,
        dy: f32,
        mods: Modifiers,
    },
    Key {
        key: keymap::KeyTranslation,
        down: bool,
        mods: Modifiers,
    },
    /// Committed text (one event per string; the browser layer fans it out
    /// into per-character events for the engine).
    Text {
        text: String,
        mods: Modifiers,
    },
    /// Touch point in normalised coordinates (0..1 of the window).
    Touch {
        id: u64,
        nx: f64,
        ny: f64,
        pressure: f64,
        kind: TouchKind,
        mods: Modifiers,
    },
}

/// The closed set of input layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerId {
    /// Context menu — pushed while open, always topmost.
    Menu,
    /// Onboarding overlay web view.
    OverlayBrowser,
    /// Main UI web view.
    MainBrowser,
    /// Video engine hotkeys (media transport keys only).
    Video,
}

/// Ordered list of input layers; the last pushed is consulted first.
#[derive(Debug, Default)]
pub struct InputStack {
    layers: Vec<LayerId>,
}

impl InputStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: LayerId) {
        if !self.layers.contains(&layer) {
            self.layers.push(layer);
        }
    }

    pub fn remove(&mut self, layer: LayerId) {
        self.layers.retain(|l| *l != layer);
    }

    pub fn contains(&self, layer: LayerId) -> bool {
        self.layers.contains(&layer)
    }

    /// Layers in routing order, top of stack first.
    pub fn routing_order(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers.iter().rev().copied()
    }
}

/// Window-state notifications delivered to subscribers, separate from the
/// input routing stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStateEvent {
    FocusGained,
    FocusLost,
    Minimized,
    Restored,
}

/// Subscription list for window-state events.
#[derive(Debug, Default)]
pub struct WindowStateNotifier {
    listeners: Vec<LayerId>,
}

impl WindowStateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: LayerId) {
        if !self.listeners.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    pub fn remove(&mut self, listener: LayerId) {
        self.listeners.retain(|l| *l != listener);
    }

    /// Snapshot of subscribers, in subscription order.
    pub fn notify(&self, event: WindowStateEvent) -> Vec<(LayerId, WindowStateEvent)> {
        log(&format!("window_state: {event:?} -> {:?}", self.listeners));
        self.listeners.iter().map(|l| (*l, event)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_of_stack_routes_first() {
        let mut stack = InputStack::new();
        stack.push(LayerId::Video);
        stack.push(LayerId::MainBrowser);
        stack.push(LayerId::Menu);

        let order: Vec<_> = stack.routing_order().collect();
        assert_eq!(
            order,
            vec![LayerId::Menu, LayerId::MainBrowser, LayerId::Video]
        );
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut stack = InputStack::new();
        stack.push(LayerId::Video);
        stack.push(LayerId::OverlayBrowser);
        stack.remove(LayerId::OverlayBrowser);
        stack.push(LayerId::MainBrowser);

        let order: Vec<_> = stack.routing_order().collect();
        assert_eq!(order, vec![LayerId::MainBrowser, LayerId::Video]);
    }

    #[test]
    fn duplicate_push_is_ignored() {
        let mut stack = InputStack::new();
        stack.push(LayerId::Menu);
        stack.push(LayerId::Menu);
        assert_eq!(stack.routing_order().count(), 1);
    }

    #[test]
    fn action_modifier_is_platform_dependent() {
        let ctrl = Modifiers::CONTROL;
        let cmd = Modifiers::COMMAND;
        if cfg!(target_os = "macos") {
            assert!(cmd.action_modifier());
            assert!(!ctrl.action_modifier());
        } else {
            assert!(ctrl.action_modifier());
            assert!(!cmd.action_modifier());
        }
    }
}
