//! Per-frame drains: engine events, view delegate events, the player
//! command queue, and media-session actions.

use std::time::Instant;

use crate::cursor;
use crate::input::LayerId;
use crate::log;
use crate::player::media_session::MediaSessionAction;
use crate::player::{PlaybackChange, PlayerCommand};
use crate::webengine::ipc::{self, IpcArg, IpcMessage};
use crate::webengine::view::ViewEvent;

use super::App;

impl App {
    /// Drain video-engine events and dispatch through the bridge.
    pub(super) fn drain_engine_events(&mut self) {
        for event in self.mpv.process_events() {
            if let Some(change) =
                self.bridge
                    .handle_event(event, &self.host.main, &mut self.session)
            {
                self.apply_playback_change(change);
            }
        }
    }

    pub(super) fn apply_playback_change(&mut self, change: PlaybackChange) {
        match change {
            PlaybackChange::Started => {
                self.has_video = true;
                self.video_needs_rerender = true;
                self.video_ctl.set_active(true);
                if let Some(gpu) = &self.gpu {
                    if gpu.caps.hdr_surface {
                        self.video_ctl.request_colorspace(true);
                    }
                }
                if let Some(plane) = self.video_plane.as_mut() {
                    plane.set_visible(true);
                }
            }
            PlaybackChange::Finished | PlaybackChange::Canceled | PlaybackChange::Errored => {
                self.hide_video();
            }
        }
    }

    pub(super) fn hide_video(&mut self) {
        self.has_video = false;
        self.video_ctl.set_active(false);
        if let Some(plane) = self.video_plane.as_mut() {
            plane.set_visible(false);
        }
    }

    /// Drain delegate events from both web views.
    pub(super) fn drain_view_events(&mut self) {
        let main_events = self.host.main.drain_events();
        for event in main_events {
            self.handle_view_event(false, event);
        }
        let overlay_events = self.host.overlay.drain_events();
        for event in overlay_events {
            self.handle_view_event(true, event);
        }
    }

    fn handle_view_event(&mut self, from_overlay: bool, event: ViewEvent) {
        match event {
            ViewEvent::Ipc(envelope) => {
                if let Some(message) = IpcMessage::parse(&envelope) {
                    self.route_ipc(from_overlay, message);
                }
            }
            ViewEvent::CursorChanged(cursor_type) => {
                let icon = cursor::to_cursor_icon(cursor_type);
                if icon != self.current_cursor {
                    self.current_cursor = icon;
                    if let Some(window) = &self.window {
                        window.set_cursor(icon);
                    }
                }
            }
            ViewEvent::FullscreenRequested(enter) => {
                self.handle_web_fullscreen_request(enter);
            }
            ViewEvent::Console {
                message,
                source,
                line,
            } => {
                let label = if from_overlay { "overlay" } else { "main" };
                log(&format!("[web:{label}] {source}:{line}: {message}"));
            }
            ViewEvent::ContextMenu {
                x,
                y,
                items,
                continuation,
            } => {
                self.menu.open(x, y, items, continuation);
                if self.menu.is_open() {
                    self.input_stack.push(LayerId::Menu);
                }
            }
            ViewEvent::ProbeResult {
                original_url,
                success,
                final_url,
            } => {
                self.deliver_connectivity_result(&original_url, success, &final_url);
            }
        }
    }

    fn route_ipc(&mut self, from_overlay: bool, message: IpcMessage) {
        if let Some(command) = PlayerCommand::from_ipc(&message) {
            self.commands.push(command);
            return;
        }
        match message {
            IpcMessage::SaveServerUrl { url } => {
                self.settings.server_url = url;
                if let Err(e) = self.settings.save() {
                    log(&format!("settings: save failed: {e}"));
                }
            }
            IpcMessage::SetFullscreen { fullscreen } => {
                self.handle_web_fullscreen_request(fullscreen);
            }
            IpcMessage::LoadServer { url } => {
                if from_overlay {
                    self.handle_load_server(url);
                }
            }
            IpcMessage::CheckServerConnectivity { url } => {
                // The probe runs on the engine's network stack; the result
                // comes back as a ProbeResult delegate event.
                self.host
                    .overlay
                    .probe_server(&format!("{url}/System/Info/Public"));
            }
            _ => {}
        }
    }

    /// The onboarding overlay delivered a server URL.
    fn handle_load_server(&mut self, url: String) {
        if !self.overlay.server_submitted(Instant::now()) {
            log("overlay: ignoring loadServer, onboarding already finished");
            return;
        }
        log(&format!("overlay: loading server {url}"));
        self.settings.server_url = url.clone();
        if let Err(e) = self.settings.save() {
            log(&format!("settings: save failed: {e}"));
        }
        self.host.main.load_url(&url);
    }

    /// Browser → renderer: connectivity probe outcome, resolved URL with the
    /// probe suffix stripped.
    fn deliver_connectivity_result(&self, original_url: &str, success: bool, final_url: &str) {
        let envelope = ipc::connectivity_result(original_url, success, final_url);
        let arg = |index: usize| match envelope.args.get(index) {
            Some(IpcArg::Str(s)) => js_string(s),
            Some(IpcArg::Bool(b)) => b.to_string(),
            _ => "null".to_owned(),
        };
        self.host.overlay.execute_js(&format!(
            "if(window.serverConnectivityResult) window.serverConnectivityResult({}, {}, {});",
            arg(0),
            arg(1),
            arg(2),
        ));
    }

    /// Drain the player command queue, in enqueue order.
    pub(super) fn drain_player_commands(&mut self) {
        for command in self.commands.drain() {
            // A stop hides video immediately; the `canceled` signal follows
            // from the engine's end-file event.
            if command == PlayerCommand::Stop {
                self.hide_video();
            }
            if let Some(change) =
                self.bridge
                    .process_command(command, &self.mpv, &self.host.main, &mut self.session)
            {
                self.apply_playback_change(change);
            }
        }
    }

    /// Drain media-session transport actions into the web playback manager.
    pub(super) fn drain_session_actions(&mut self) {
        for action in self.session.take_actions() {
            match action {
                MediaSessionAction::Play => {
                    self.commands.push(PlayerCommand::HostInput("play".into()));
                }
                MediaSessionAction::Pause => {
                    self.commands.push(PlayerCommand::HostInput("pause".into()));
                }
                MediaSessionAction::PlayPause => {
                    self.commands
                        .push(PlayerCommand::HostInput("play_pause".into()));
                }
                MediaSessionAction::Stop => {
                    self.commands.push(PlayerCommand::HostInput("stop".into()));
                }
                MediaSessionAction::Next => {
                    self.commands.push(PlayerCommand::HostInput("next".into()));
                }
                MediaSessionAction::Previous => {
                    self.commands
                        .push(PlayerCommand::HostInput("previous".into()));
                }
                MediaSessionAction::Seek(position_us) => {
                    self.commands
                        .push(PlayerCommand::HostSeek(position_us / 1000));
                }
                MediaSessionAction::SetRate(rate) => {
                    self.commands.push(PlayerCommand::HostRate(rate));
                }
                MediaSessionAction::Raise => {
                    if let Some(window) = &self.window {
                        window.focus_window();
                    }
                }
            }
        }
        self.session.update();
    }
}

/// Quote a string for embedding in injected JavaScript.
fn js_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{escaped}'")
}
