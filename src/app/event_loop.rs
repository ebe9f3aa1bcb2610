//! winit event loop — `ApplicationHandler` impl, input translation, and
//! layer routing.

use std::time::{Duration, Instant};

use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{Key, ModifiersState, NamedKey, PhysicalKey};
use winit::window::Fullscreen;

use crate::input::{
    InputEvent, LayerId, Modifiers, PointerButton, TouchKind, WindowStateEvent, keymap,
    video_layer,
};
use crate::log;
use crate::webengine::view::WebView;

use super::fullscreen::WebSync;
use super::{App, UserEvent};

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_graphics(event_loop) {
            log(&format!("fatal: {e}"));
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            // A producer thread has work for us; the next about_to_wait
            // tick picks it up.
            UserEvent::EngineWake => {}
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                self.render_window();
            }

            WindowEvent::Resized(size) => {
                self.handle_resize(size.width, size.height);
                self.sync_wm_fullscreen();
                self.needs_render = true;
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.handle_scale_factor_changed(scale_factor);
            }

            WindowEvent::ModifiersChanged(mods) => {
                self.modifiers = mods.state();
            }

            WindowEvent::Focused(focused) => {
                if !focused && self.menu.is_open() {
                    self.menu.close();
                    self.input_stack.remove(LayerId::Menu);
                }
                self.dispatch_window_state(if focused {
                    WindowStateEvent::FocusGained
                } else {
                    WindowStateEvent::FocusLost
                });
                if focused {
                    // The window manager may have flipped fullscreen while
                    // we were unfocused; re-sync the engine to reality.
                    self.apply_web_sync(self.fullscreen.focus_gained(self.window_is_fullscreen));
                }
            }

            WindowEvent::Occluded(occluded) => {
                self.dispatch_window_state(if occluded {
                    WindowStateEvent::Minimized
                } else {
                    WindowStateEvent::Restored
                });
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_pos = position;
                self.activity = true;
                let mods = self.build_modifiers();
                self.route_input(InputEvent::MouseMove {
                    x: position.x,
                    y: position.y,
                    mods,
                });
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = map_button(button) else {
                    return;
                };
                self.activity = true;
                let mods = self.build_modifiers();
                self.route_input(InputEvent::MouseButton {
                    x: self.cursor_pos.x,
                    y: self.cursor_pos.y,
                    button,
                    down: state == ElementState::Pressed,
                    mods,
                });
            }

            WindowEvent::MouseWheel { delta, .. } => {
                self.activity = true;
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x * 40.0, y * 40.0),
                    MouseScrollDelta::PixelDelta(pos) => (pos.x as f32, pos.y as f32),
                };
                let mods = self.build_modifiers();
                self.route_input(InputEvent::MouseWheel { dx, dy, mods });
            }

            WindowEvent::KeyboardInput { event, .. } => {
                self.activity = true;
                let down = event.state == ElementState::Pressed;

                // ESC exits the application — unless a menu is open, in
                // which case the menu layer consumes it below.
                if down
                    && matches!(event.logical_key, Key::Named(NamedKey::Escape))
                    && !self.menu.is_open()
                {
                    event_loop.exit();
                    return;
                }

                #[cfg(target_os = "macos")]
                if down
                    && self.modifiers.super_key()
                    && matches!(&event.logical_key, Key::Character(c) if c == "q")
                {
                    event_loop.exit();
                    return;
                }

                if down && matches!(event.logical_key, Key::Named(NamedKey::F11)) {
                    self.toggle_wm_fullscreen();
                    return;
                }

                let mods = self.build_modifiers();
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(key) = keymap::translate(code) {
                        self.route_input(InputEvent::Key { key, down, mods });
                    }
                }

                // Committed text follows the key event, CEF-style, except
                // under the action modifier (shortcuts are not typing).
                if down && !mods.action_modifier() {
                    if let Some(text) = &event.text {
                        if text.chars().all(|c| !c.is_control()) {
                            self.route_input(InputEvent::Text {
                                text: text.to_string(),
                                mods,
                            });
                        }
                    }
                }
            }

            WindowEvent::Touch(touch) => {
                self.activity = true;
                let kind = match touch.phase {
                    TouchPhase::Started => TouchKind::Down,
                    TouchPhase::Ended | TouchPhase::Cancelled => TouchKind::Up,
                    TouchPhase::Moved => TouchKind::Move,
                };
                let mods = self.build_modifiers();
                self.route_input(InputEvent::Touch {
                    id: touch.id,
                    nx: touch.location.x / f64::from(self.size.width.max(1)),
                    ny: touch.location.y / f64::from(self.size.height.max(1)),
                    pressure: 1.0,
                    kind,
                    mods,
                });
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.tick();

        if self.needs_render {
            self.request_redraw();
            event_loop.set_control_flow(ControlFlow::Poll);
        } else {
            // Idle: short wait keeps the engine pump responsive without
            // busy-spinning.
            event_loop
                .set_control_flow(ControlFlow::WaitUntil(Instant::now() + Duration::from_millis(1)));
        }
    }
}

fn map_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Left),
        MouseButton::Middle => Some(PointerButton::Middle),
        MouseButton::Right => Some(PointerButton::Right),
        _ => None,
    }
}

impl App {
    pub(super) fn build_modifiers(&self) -> Modifiers {
        build_modifiers(self.modifiers)
    }

    /// Route an event down the layer stack, stopping at the first consumer.
    pub(super) fn route_input(&mut self, event: InputEvent) {
        let order: Vec<LayerId> = self.input_stack.routing_order().collect();
        for layer in order {
            let consumed = match layer {
                LayerId::Menu => self.route_to_menu(&event),
                LayerId::OverlayBrowser => self.overlay_layer.handle_input(
                    &event,
                    &self.host.overlay,
                    &mut self.clipboard,
                ),
                LayerId::MainBrowser => {
                    self.main_layer
                        .handle_input(&event, &self.host.main, &mut self.clipboard)
                }
                LayerId::Video => video_layer::handle_input(&event, &self.commands),
            };
            if consumed {
                break;
            }
        }
        // The menu may have closed itself while handling the event.
        if !self.menu.is_open() && self.input_stack.contains(LayerId::Menu) {
            self.input_stack.remove(LayerId::Menu);
        }
    }

    fn route_to_menu(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::MouseMove { x, y, .. } => {
                self.menu.handle_mouse_move(*x as i32, *y as i32)
            }
            InputEvent::MouseButton { x, y, down, .. } => {
                self.menu.handle_mouse_click(*x as i32, *y as i32, *down)
            }
            InputEvent::Key {
                key, down: true, ..
            } => self.menu.handle_key_down(key.vk),
            _ => false,
        }
    }

    /// Deliver a window-state event to every subscriber.
    pub(super) fn dispatch_window_state(&mut self, event: WindowStateEvent) {
        for (layer, event) in self.window_state.notify(event) {
            let view: Option<&WebView> = match layer {
                LayerId::OverlayBrowser => Some(&self.host.overlay),
                LayerId::MainBrowser => Some(&self.host.main),
                LayerId::Menu | LayerId::Video => None,
            };
            if let Some(view) = view {
                match event {
                    WindowStateEvent::FocusGained => view.set_focus(true),
                    WindowStateEvent::FocusLost => view.set_focus(false),
                    WindowStateEvent::Minimized | WindowStateEvent::Restored => {}
                }
            }
        }
    }

    /// User-initiated fullscreen toggle (F11 / titlebar path).
    pub(super) fn toggle_wm_fullscreen(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if self.window_is_fullscreen {
            window.set_fullscreen(None);
            self.window_is_fullscreen = false;
            let sync = self.fullscreen.wm_left();
            log(&format!("fullscreen: wm leave, source={:?}", self.fullscreen.source()));
            self.apply_web_sync(sync);
        } else {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            self.window_is_fullscreen = true;
            let sync = self.fullscreen.wm_entered();
            log(&format!("fullscreen: wm enter, source={:?}", self.fullscreen.source()));
            self.apply_web_sync(sync);
        }
    }

    /// Detect window-manager fullscreen changes we did not initiate.
    pub(super) fn sync_wm_fullscreen(&mut self) {
        let Some(window) = &self.window else { return };
        let actual = window.fullscreen().is_some();
        if actual == self.window_is_fullscreen {
            return;
        }
        self.window_is_fullscreen = actual;
        let sync = if actual {
            self.fullscreen.wm_entered()
        } else {
            self.fullscreen.wm_left()
        };
        log(&format!(
            "fullscreen: external change to {actual}, source={:?}",
            self.fullscreen.source()
        ));
        self.apply_web_sync(sync);
    }

    /// Engine-side fullscreen request (JS Fullscreen API).
    pub(super) fn handle_web_fullscreen_request(&mut self, enter: bool) {
        log(&format!(
            "fullscreen: web requests {}, source={:?}",
            if enter { "enter" } else { "exit" },
            self.fullscreen.source()
        ));
        if let Some(target) = self.fullscreen.web_request(enter) {
            if let Some(window) = &self.window {
                window.set_fullscreen(target.then(|| Fullscreen::Borderless(None)));
            }
            self.window_is_fullscreen = target;
        }
    }

    /// Push the window's fullscreen reality into the main web view.
    pub(super) fn apply_web_sync(&self, sync: WebSync) {
        match sync {
            WebSync::RequestFullscreen => {
                self.host.main.execute_js(
                    "document.documentElement.requestFullscreen().catch(()=>{});",
                );
            }
            WebSync::ExitFullscreen => self.host.main.exit_fullscreen(),
        }
    }
}

pub(super) fn build_modifiers(state: ModifiersState) -> Modifiers {
    let mut mods = Modifiers::empty();
    if state.shift_key() {
        mods |= Modifiers::SHIFT;
    }
    if state.control_key() {
        mods |= Modifiers::CONTROL;
    }
    if state.alt_key() {
        mods |= Modifiers::ALT;
    }
    if state.super_key() {
        mods |= Modifiers::COMMAND;
    }
    mods
}
