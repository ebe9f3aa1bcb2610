//! Player bridge: translates web-UI commands into video-engine calls and
//! engine events into UI callbacks plus media-session updates.

pub mod ffi;
pub mod media_session;
pub mod mpv;

use std::sync::Arc;

use parking_lot::Mutex;

use self::media_session::{MediaMetadata, MediaSession, PlaybackState};
use self::mpv::{EndReason, PlayerEvent};

use crate::error::Error;
use crate::log;
use crate::webengine::ipc::IpcMessage;
use crate::webengine::view::WebView;

/// Position changes smaller than this are jitter and not reported.
pub const POSITION_FILTER_MS: f64 = 15.0;

/// Typed commands drained on the main thread once per frame, in enqueue
/// order. Producers are IPC callbacks and media-session backends on
/// arbitrary threads.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load {
        url: String,
        start_ms: i64,
        audio_idx: i32,
        sub_idx: i32,
        metadata_json: String,
    },
    Stop,
    Pause,
    Play,
    PlayPause,
    Seek {
        ms: i64,
    },
    SetVolume(i32),
    SetMuted(bool),
    SetSpeed(f64),
    SetAudioDelay(f64),
    SetSubtitleTrack(i32),
    SetAudioTrack(i32),
    /// `notifyMetadata`: session metadata straight from the web UI.
    SessionMetadata(String),
    /// `notifyPosition` (ms).
    SessionPosition(i64),
    /// `notifySeek` (ms): JS-detected seek, emits the Seeked signal.
    SessionSeeked(i64),
    /// `notifyPlaybackState`: "Playing" / "Paused" / anything else stops.
    SessionState(String),
    /// `notifyArtwork`: base64 data URI.
    SessionArtwork(String),
    /// `notifyQueueChange` capability bits.
    SessionQueue {
        can_next: bool,
        can_previous: bool,
    },
    /// `notifyRateChange`: the user picked a playback rate in the UI.
    SessionRate(f64),
    /// Media-session transport command routed to the web playback manager.
    HostInput(String),
    /// Media-session seek routed to the web playback manager (ms).
    HostSeek(i64),
    /// Media-session rate change routed to the web player.
    HostRate(f64),
}

impl PlayerCommand {
    /// Map a renderer IPC message onto a player command. Messages outside
    /// the player's concern (settings, fullscreen, onboarding) return None.
    pub fn from_ipc(msg: &IpcMessage) -> Option<Self> {
        Some(match msg {
            IpcMessage::PlayerLoad {
                url,
                start_ms,
                audio_idx,
                sub_idx,
                metadata_json,
            } => Self::Load {
                url: url.clone(),
                start_ms: *start_ms,
                audio_idx: *audio_idx,
                sub_idx: *sub_idx,
                metadata_json: metadata_json.clone(),
            },
            IpcMessage::PlayerStop => Self::Stop,
            IpcMessage::PlayerPause => Self::Pause,
            IpcMessage::PlayerPlay => Self::Play,
            IpcMessage::PlayerPlayPause => Self::PlayPause,
            IpcMessage::PlayerSeek { ms } => Self::Seek { ms: *ms },
            IpcMessage::PlayerSetVolume { volume } => Self::SetVolume(*volume),
            IpcMessage::PlayerSetMuted { muted } => Self::SetMuted(*muted),
            IpcMessage::PlayerSetSpeed { speed } => Self::SetSpeed(*speed),
            IpcMessage::PlayerSetAudioDelay { seconds } => Self::SetAudioDelay(*seconds),
            IpcMessage::PlayerSetSubtitle { id } => Self::SetSubtitleTrack(*id),
            IpcMessage::PlayerSetAudio { id } => Self::SetAudioTrack(*id),
            IpcMessage::NotifyMetadata { json } => Self::SessionMetadata(json.clone()),
            IpcMessage::NotifyPosition { ms } => Self::SessionPosition(*ms),
            IpcMessage::NotifySeek { ms } => Self::SessionSeeked(*ms),
            IpcMessage::NotifyPlaybackState { state } => Self::SessionState(state.clone()),
            IpcMessage::NotifyArtwork { data_uri } => Self::SessionArtwork(data_uri.clone()),
            IpcMessage::NotifyQueueChange {
                can_next,
                can_previous,
            } => Self::SessionQueue {
                can_next: *can_next,
                can_previous: *can_previous,
            },
            IpcMessage::NotifyRateChange { rate } => Self::SessionRate(*rate),
            _ => return None,
        })
    }
}

/// Queue shared between IPC/media-session producers and the frame loop.
#[derive(Clone, Default)]
pub struct CommandQueue(Arc<Mutex<Vec<PlayerCommand>>>);

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: PlayerCommand) {
        self.0.lock().push(command);
    }

    /// Drain under one lock acquisition, preserving enqueue order.
    pub fn drain(&self) -> Vec<PlayerCommand> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// The engine operations the bridge drives, as a seam for tests.
pub trait EngineControl {
    fn load_file(&self, url: &str, start_seconds: f64) -> Result<(), Error>;
    fn stop(&self);
    fn pause(&self);
    fn play(&self);
    fn seek_absolute(&self, seconds: f64);
    fn set_volume(&self, volume: i32);
    fn set_muted(&self, muted: bool);
    fn set_speed(&self, speed: f64);
    fn set_audio_delay(&self, seconds: f64);
    fn set_subtitle_track(&self, id: i32);
    fn set_audio_track(&self, id: i32);
    fn set_normalization_gain(&self, gain_db: f64);
    fn is_paused(&self) -> bool;
}

impl EngineControl for mpv::Mpv {
    fn load_file(&self, url: &str, start_seconds: f64) -> Result<(), Error> {
        Self::load_file(self, url, start_seconds)
    }
    fn stop(&self) {
        Self::stop(self);
    }
    fn pause(&self) {
        Self::pause(self);
    }
    fn play(&self) {
        Self::play(self);
    }
    fn seek_absolute(&self, seconds: f64) {
        Self::seek_absolute(self, seconds);
    }
    fn set_volume(&self, volume: i32) {
        Self::set_volume(self, volume);
    }
    fn set_muted(&self, muted: bool) {
        Self::set_muted(self, muted);
    }
    fn set_speed(&self, speed: f64) {
        Self::set_speed(self, speed);
    }
    fn set_audio_delay(&self, seconds: f64) {
        Self::set_audio_delay(self, seconds);
    }
    fn set_subtitle_track(&self, id: i32) {
        Self::set_subtitle_track(self, id);
    }
    fn set_audio_track(&self, id: i32) {
        Self::set_audio_track(self, id);
    }
    fn set_normalization_gain(&self, gain_db: f64) {
        Self::set_normalization_gain(self, gain_db);
    }
    fn is_paused(&self) -> bool {
        Self::is_paused(self)
    }
}

/// Track lifecycle outcomes the frame loop reacts to (video visibility).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackChange {
    Started,
    Finished,
    Canceled,
    Errored,
}

pub struct PlayerBridge {
    /// Last user-set playback rate; what the session reports outside
    /// buffering.
    current_playback_rate: f64,
    last_position_ms: f64,
    /// Engine is inside a seek; state changes are held until it clears.
    seeking: bool,
    pending_pause: Option<bool>,
    /// A track is active (between load and end-of-file/stop/error).
    playing: bool,
}

impl PlayerBridge {
    pub fn new() -> Self {
        Self {
            current_playback_rate: 1.0,
            last_position_ms: 0.0,
            seeking: false,
            pending_pause: None,
            playing: false,
        }
    }

    pub fn current_playback_rate(&self) -> f64 {
        self.current_playback_rate
    }

    /// Apply one drained command.
    pub fn process_command(
        &mut self,
        command: PlayerCommand,
        engine: &dyn EngineControl,
        ui: &WebView,
        session: &mut MediaSession,
    ) -> Option<PlaybackChange> {
        match command {
            PlayerCommand::Load {
                url,
                start_ms,
                audio_idx,
                sub_idx,
                metadata_json,
            } => {
                let start_seconds = start_ms as f64 / 1000.0;
                log(&format!("player: load {url} start={start_seconds}s"));
                if metadata_json.is_empty() || metadata_json == "{}" {
                    engine.set_normalization_gain(0.0);
                } else {
                    let meta = MediaMetadata::from_item_json(&metadata_json);
                    log(&format!(
                        "player: metadata title='{}' artist='{}'",
                        meta.title, meta.artist
                    ));
                    session.set_metadata(&meta);
                    let gain = MediaMetadata::normalization_gain_db(&metadata_json).unwrap_or(0.0);
                    engine.set_normalization_gain(gain);
                }
                match engine.load_file(&url, start_seconds) {
                    Ok(()) => {
                        self.playing = true;
                        self.seeking = false;
                        self.pending_pause = None;
                        if sub_idx >= 0 {
                            engine.set_subtitle_track(sub_idx);
                        }
                        if audio_idx >= 0 {
                            engine.set_audio_track(audio_idx);
                        }
                        Some(PlaybackChange::Started)
                    }
                    Err(e) => {
                        log(&format!("player: load failed: {e}"));
                        emit_signal_arg(ui, "error", "Failed to load video");
                        session.set_playback_state(PlaybackState::Stopped);
                        None
                    }
                }
            }
            PlayerCommand::Stop => {
                engine.stop();
                // The engine's end-file event emits `canceled` to the UI.
                None
            }
            PlayerCommand::Pause => {
                engine.pause();
                None
            }
            PlayerCommand::Play => {
                engine.play();
                None
            }
            PlayerCommand::PlayPause => {
                if engine.is_paused() {
                    engine.play();
                } else {
                    engine.pause();
                }
                None
            }
            PlayerCommand::Seek { ms } => {
                engine.seek_absolute(ms as f64 / 1000.0);
                None
            }
            PlayerCommand::SetVolume(volume) => {
                engine.set_volume(volume);
                None
            }
            PlayerCommand::SetMuted(muted) => {
                engine.set_muted(muted);
                None
            }
            PlayerCommand::SetSpeed(speed) => {
                engine.set_speed(speed);
                None
            }
            PlayerCommand::SetAudioDelay(seconds) => {
                engine.set_audio_delay(seconds);
                None
            }
            PlayerCommand::SetSubtitleTrack(id) => {
                engine.set_subtitle_track(id);
                None
            }
            PlayerCommand::SetAudioTrack(id) => {
                engine.set_audio_track(id);
                None
            }
            PlayerCommand::SessionMetadata(json) => {
                session.set_metadata(&MediaMetadata::from_item_json(&json));
                None
            }
            PlayerCommand::SessionPosition(ms) => {
                session.set_position(ms * 1000);
                None
            }
            PlayerCommand::SessionSeeked(ms) => {
                session.emit_seeked(ms * 1000);
                None
            }
            PlayerCommand::SessionState(state) => {
                session.set_playback_state(match state.as_str() {
                    "Playing" => PlaybackState::Playing,
                    "Paused" => PlaybackState::Paused,
                    _ => PlaybackState::Stopped,
                });
                None
            }
            PlayerCommand::SessionArtwork(data_uri) => {
                session.set_artwork(&data_uri);
                None
            }
            PlayerCommand::SessionQueue {
                can_next,
                can_previous,
            } => {
                session.set_can_go_next(can_next);
                session.set_can_go_previous(can_previous);
                None
            }
            PlayerCommand::SessionRate(rate) => {
                self.current_playback_rate = rate;
                session.set_rate(rate);
                None
            }
            PlayerCommand::HostInput(action) => {
                ui.execute_js(&format!(
                    "if(window._nativeHostInput) window._nativeHostInput(['{action}']);"
                ));
                None
            }
            PlayerCommand::HostSeek(ms) => {
                ui.execute_js(&format!("if(window._nativeSeek) window._nativeSeek({ms});"));
                None
            }
            PlayerCommand::HostRate(rate) => {
                ui.execute_js(&format!(
                    "if(window._nativeSetRate) window._nativeSetRate({rate});"
                ));
                None
            }
        }
    }

    /// Apply one engine event.
    pub fn handle_event(
        &mut self,
        event: PlayerEvent,
        ui: &WebView,
        session: &mut MediaSession,
    ) -> Option<PlaybackChange> {
        match event {
            PlayerEvent::Position(ms) => {
                // Jitter filter: sub-15 ms movements are noise.
                if (ms - self.last_position_ms).abs() > POSITION_FILTER_MS {
                    self.last_position_ms = ms;
                    session.set_position((ms * 1000.0) as i64);
                }
                None
            }
            PlayerEvent::Duration(ms) => {
                ui.execute_js(&format!(
                    "if(window._nativeUpdateDuration) window._nativeUpdateDuration({ms});"
                ));
                None
            }
            PlayerEvent::Pause(paused) => {
                if !self.playing {
                    return None;
                }
                if self.seeking {
                    // Held until the seek settles.
                    self.pending_pause = Some(paused);
                    return None;
                }
                self.apply_pause_state(paused, ui, session);
                None
            }
            PlayerEvent::Seeking(active) => {
                if self.seeking && !active {
                    self.seeking = false;
                    let position_us = (self.last_position_ms * 1000.0) as i64;
                    ui.execute_js(&format!(
                        "if(window._nativeUpdatePosition) window._nativeUpdatePosition({});",
                        self.last_position_ms
                    ));
                    session.set_position(position_us);
                    session.set_rate(self.current_playback_rate);
                    session.emit_seeked(position_us);
                    if let Some(paused) = self.pending_pause.take() {
                        self.apply_pause_state(paused, ui, session);
                    }
                } else if active {
                    self.seeking = true;
                }
                None
            }
            PlayerEvent::PausedForCache(buffering) => {
                session.set_position((self.last_position_ms * 1000.0) as i64);
                // Rate 0 while buffering; the last user-set rate comes back
                // unconditionally on clear. No UI pause signal either way.
                if buffering {
                    session.set_rate(0.0);
                } else {
                    session.set_rate(self.current_playback_rate);
                }
                None
            }
            PlayerEvent::CoreIdle(_) => {
                session.set_position((self.last_position_ms * 1000.0) as i64);
                None
            }
            PlayerEvent::EofReached(eof) => {
                if eof && self.playing {
                    self.playing = false;
                    log("player: track finished (eof)");
                    emit_signal(ui, "finished");
                    session.set_playback_state(PlaybackState::Stopped);
                    return Some(PlaybackChange::Finished);
                }
                None
            }
            PlayerEvent::FileStarted => {
                self.playing = true;
                None
            }
            PlayerEvent::FileLoaded => {
                emit_signal(ui, "playing");
                session.set_playback_state(PlaybackState::Playing);
                None
            }
            PlayerEvent::EndFile(reason) => match reason {
                EndReason::Stop => {
                    self.playing = false;
                    log("player: track canceled (user stop)");
                    emit_signal(ui, "canceled");
                    session.set_playback_state(PlaybackState::Stopped);
                    Some(PlaybackChange::Canceled)
                }
                EndReason::Error(message) => {
                    self.playing = false;
                    log(&format!("player: playback error: {message}"));
                    emit_signal_arg(ui, "error", &message);
                    session.set_playback_state(PlaybackState::Stopped);
                    Some(PlaybackChange::Errored)
                }
                EndReason::Eof => {
                    if self.playing {
                        self.playing = false;
                        emit_signal(ui, "finished");
                        session.set_playback_state(PlaybackState::Stopped);
                        Some(PlaybackChange::Finished)
                    } else {
                        None
                    }
                }
                EndReason::Quit | EndReason::Other => None,
            },
            PlayerEvent::BufferedRanges(ranges) => {
                let mut json = String::from("[");
                for (i, range) in ranges.iter().enumerate() {
                    if i > 0 {
                        json.push(',');
                    }
                    json.push_str(&format!(
                        "{{\"start\":{},\"end\":{}}}",
                        range.start, range.end
                    ));
                }
                json.push(']');
                ui.execute_js(&format!(
                    "if(window._nativeUpdateBufferedRanges) window._nativeUpdateBufferedRanges({json});"
                ));
                None
            }
            PlayerEvent::Log { prefix, text } => {
                log(&format!("[mpv/{prefix}] {text}"));
                None
            }
        }
    }

    fn apply_pause_state(&self, paused: bool, ui: &WebView, session: &mut MediaSession) {
        if paused {
            emit_signal(ui, "paused");
            session.set_playback_state(PlaybackState::Paused);
        } else {
            emit_signal(ui, "playing");
            session.set_playback_state(PlaybackState::Playing);
        }
    }
}

impl Default for PlayerBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_signal(ui: &WebView, name: &str) {
    ui.execute_js(&format!(
        "if(window._nativeEmit) window._nativeEmit('{name}');"
    ));
}

fn emit_signal_arg(ui: &WebView, name: &str, arg: &str) {
    let escaped = arg.replace('\\', "\\\\").replace('\'', "\\'");
    ui.execute_js(&format!(
        "if(window._nativeEmit) window._nativeEmit('{name}', '{escaped}');"
    ));
}

#[cfg(test)]
mod tests {
    use super::media_session::test_support::{BackendCall, RecordingBackend};
    use super::*;
    use crate::webengine::view::{ViewCommand, ViewDriver};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeEngine {
        fail_load: bool,
        paused: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEngine {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }
    }

    impl EngineControl for FakeEngine {
        fn load_file(&self, url: &str, start_seconds: f64) -> Result<(), Error> {
            self.record(format!("load {url} @{start_seconds}"));
            if self.fail_load {
                Err(Error::Player("nope".into()))
            } else {
                Ok(())
            }
        }
        fn stop(&self) {
            self.record("stop");
        }
        fn pause(&self) {
            self.record("pause");
        }
        fn play(&self) {
            self.record("play");
        }
        fn seek_absolute(&self, seconds: f64) {
            self.record(format!("seek {seconds}"));
        }
        fn set_volume(&self, volume: i32) {
            self.record(format!("volume {volume}"));
        }
        fn set_muted(&self, muted: bool) {
            self.record(format!("muted {muted}"));
        }
        fn set_speed(&self, speed: f64) {
            self.record(format!("speed {speed}"));
        }
        fn set_audio_delay(&self, seconds: f64) {
            self.record(format!("audio_delay {seconds}"));
        }
        fn set_subtitle_track(&self, id: i32) {
            self.record(format!("sid {id}"));
        }
        fn set_audio_track(&self, id: i32) {
            self.record(format!("aid {id}"));
        }
        fn set_normalization_gain(&self, gain_db: f64) {
            self.record(format!("gain {gain_db}"));
        }
        fn is_paused(&self) -> bool {
            self.paused.load(Ordering::Relaxed)
        }
    }

    fn fixture() -> (
        PlayerBridge,
        crate::webengine::view::WebView,
        ViewDriver,
        MediaSession,
        Arc<Mutex<Vec<BackendCall>>>,
    ) {
        let bridge = PlayerBridge::new();
        let (view, driver) = crate::webengine::view::WebView::new("main", 1280, 720);
        let (backend, calls) = RecordingBackend::new();
        let session = MediaSession::new(Some(backend));
        (bridge, view, driver, session, calls)
    }

    fn drain_js(driver: &ViewDriver) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(command) = driver.commands.try_recv() {
            if let ViewCommand::ExecuteJs(js) = command {
                out.push(js);
            }
        }
        out
    }

    #[test]
    fn load_applies_metadata_gain_and_tracks() {
        let (mut bridge, view, _driver, mut session, calls) = fixture();
        let engine = FakeEngine::default();
        let change = bridge.process_command(
            PlayerCommand::Load {
                url: "https://jf/v.mkv".into(),
                start_ms: 30_000,
                audio_idx: 1,
                sub_idx: -1,
                metadata_json:
                    r#"{"Name":"Foo","RunTimeTicks":36000000000,"NormalizationGain":-3.0}"#.into(),
            },
            &engine,
            &view,
            &mut session,
        );
        assert_eq!(change, Some(PlaybackChange::Started));

        let engine_calls = engine.calls.lock();
        assert!(engine_calls.contains(&"gain -3".to_owned()));
        assert!(engine_calls.contains(&"load https://jf/v.mkv @30".to_owned()));
        assert!(engine_calls.contains(&"aid 1".to_owned()));
        assert!(!engine_calls.iter().any(|c| c.starts_with("sid")));

        // Duration reached the session through metadata.
        let meta = calls
            .lock()
            .iter()
            .find_map(|c| match c {
                BackendCall::Metadata(m) => Some(m.clone()),
                _ => None,
            })
            .expect("metadata published");
        assert_eq!(meta.duration_us, 3_600_000_000);
    }

    #[test]
    fn failed_load_emits_error_and_stops_session() {
        let (mut bridge, view, driver, mut session, calls) = fixture();
        let engine = FakeEngine {
            fail_load: true,
            ..FakeEngine::default()
        };
        let change = bridge.process_command(
            PlayerCommand::Load {
                url: "bad://".into(),
                start_ms: 0,
                audio_idx: -1,
                sub_idx: -1,
                metadata_json: "{}".into(),
            },
            &engine,
            &view,
            &mut session,
        );
        assert_eq!(change, None);
        assert!(drain_js(&driver).iter().any(|js| js.contains("'error'")));
        assert!(
            calls
                .lock()
                .contains(&BackendCall::State(PlaybackState::Stopped))
        );
    }

    #[test]
    fn seek_latch_emits_exactly_one_seeked() {
        let (mut bridge, view, driver, mut session, calls) = fixture();
        bridge.playing = true;

        bridge.handle_event(PlayerEvent::Seeking(true), &view, &mut session);
        // Position settles at 60s during the seek.
        bridge.handle_event(PlayerEvent::Position(60_000.0), &view, &mut session);
        // A pause toggle mid-seek is held.
        bridge.handle_event(PlayerEvent::Pause(false), &view, &mut session);
        assert!(drain_js(&driver).is_empty());

        bridge.handle_event(PlayerEvent::Seeking(false), &view, &mut session);

        let seeked: Vec<_> = calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::Seeked(_)))
            .cloned()
            .collect();
        assert_eq!(seeked, vec![BackendCall::Seeked(60_000_000)]);

        // The held state change surfaced after the seek.
        assert!(drain_js(&driver).iter().any(|js| js.contains("'playing'")));

        // Another position poll emits no further Seeked.
        bridge.handle_event(PlayerEvent::Position(61_000.0), &view, &mut session);
        let seeked_count = calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::Seeked(_)))
            .count();
        assert_eq!(seeked_count, 1);
    }

    #[test]
    fn buffering_zeroes_rate_and_restores_user_rate() {
        let (mut bridge, view, driver, mut session, calls) = fixture();
        bridge.playing = true;
        // User set 1.5x in the UI.
        bridge.process_command(
            PlayerCommand::SessionRate(1.5),
            &FakeEngine::default(),
            &view,
            &mut session,
        );

        bridge.handle_event(
            PlayerEvent::PausedForCache(true),
            &view,
            &mut session,
        );
        bridge.handle_event(
            PlayerEvent::PausedForCache(false),
            &view,
            &mut session,
        );

        let rates: Vec<_> = calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Rate(r) => Some(*r),
                _ => None,
            })
            .collect();
        assert_eq!(rates, vec![1.5, 0.0, 1.5]);
        // Buffering produced no UI pause/play signals.
        assert!(drain_js(&driver).is_empty());
    }

    #[test]
    fn position_filter_drops_jitter() {
        let (mut bridge, view, _driver, mut session, calls) = fixture();
        bridge.handle_event(PlayerEvent::Position(1000.0), &view, &mut session);
        bridge.handle_event(PlayerEvent::Position(1010.0), &view, &mut session);
        bridge.handle_event(PlayerEvent::Position(1100.0), &view, &mut session);

        let positions: Vec<_> = calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Position(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![1_000_000, 1_100_000]);
    }

    #[test]
    fn natural_end_vs_stop_vs_error() {
        let (mut bridge, view, driver, mut session, _calls) = fixture();

        bridge.playing = true;
        assert_eq!(
            bridge.handle_event(PlayerEvent::EofReached(true), &view, &mut session),
            Some(PlaybackChange::Finished)
        );
        assert!(drain_js(&driver).iter().any(|js| js.contains("'finished'")));

        bridge.playing = true;
        assert_eq!(
            bridge.handle_event(PlayerEvent::EndFile(EndReason::Stop), &view, &mut session),
            Some(PlaybackChange::Canceled)
        );
        assert!(drain_js(&driver).iter().any(|js| js.contains("'canceled'")));

        bridge.playing = true;
        assert_eq!(
            bridge.handle_event(
                PlayerEvent::EndFile(EndReason::Error("demux failed".into())),
                &view,
                &mut session,
            ),
            Some(PlaybackChange::Errored)
        );
        assert!(drain_js(&driver).iter().any(|js| js.contains("demux failed")));
    }

    #[test]
    fn stop_then_end_file_emits_canceled_once() {
        let (mut bridge, view, driver, mut session, _calls) = fixture();
        let engine = FakeEngine::default();
        bridge.playing = true;

        bridge.process_command(PlayerCommand::Stop, &engine, &view, &mut session);
        assert!(engine.calls.lock().contains(&"stop".to_owned()));

        // Engine acknowledges with the stop end-file; eof never fires.
        let change =
            bridge.handle_event(PlayerEvent::EndFile(EndReason::Stop), &view, &mut session);
        assert_eq!(change, Some(PlaybackChange::Canceled));
        let js = drain_js(&driver);
        assert_eq!(
            js.iter().filter(|s| s.contains("'canceled'")).count(),
            1
        );
        assert!(!js.iter().any(|s| s.contains("'finished'")));

        // Stray eof afterwards is ignored.
        assert_eq!(
            bridge.handle_event(PlayerEvent::EofReached(true), &view, &mut session),
            None
        );
    }

    #[test]
    fn buffered_ranges_reach_the_ui_as_json() {
        let (mut bridge, view, driver, mut session, _calls) = fixture();
        bridge.handle_event(
            PlayerEvent::BufferedRanges(vec![
                mpv::BufferedRange {
                    start: 0,
                    end: 300_000_000,
                },
                mpv::BufferedRange {
                    start: 600_000_000,
                    end: 900_000_000,
                },
            ]),
            &view,
            &mut session,
        );
        let js = drain_js(&driver);
        assert_eq!(js.len(), 1);
        assert!(js[0].contains("_nativeUpdateBufferedRanges"));
        assert!(
            js[0].contains(r#"[{"start":0,"end":300000000},{"start":600000000,"end":900000000}]"#)
        );
    }

    #[test]
    fn playpause_consults_engine_state() {
        let (mut bridge, view, _driver, mut session, _calls) = fixture();
        let engine = FakeEngine::default();
        engine.paused.store(true, Ordering::Relaxed);
        bridge.process_command(PlayerCommand::PlayPause, &engine, &view, &mut session);
        assert!(engine.calls.lock().contains(&"play".to_owned()));

        engine.paused.store(false, Ordering::Relaxed);
        bridge.process_command(PlayerCommand::PlayPause, &engine, &view, &mut session);
        assert!(engine.calls.lock().contains(&"pause".to_owned()));
    }
}
