//! OS media-session surface: now-playing metadata, playback state, and the
//! transport controls the desktop shell exposes.
//!
//! The wire protocols (MPRIS, SMTC, MediaRemote) live in platform backends
//! behind [`MediaSessionBackend`]; this module owns the state they publish
//! and the action queue their callbacks feed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::log;

/// What kind of media is loaded, steering the session's art/metadata shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaType {
    Audio,
    Video,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track_number: i32,
    pub duration_us: i64,
    /// Server artwork URL.
    pub art_url: String,
    /// Base64 data URI once the artwork has been fetched.
    pub art_data_uri: String,
    pub media_type: MediaType,
}

impl MediaMetadata {
    /// Parse a Jellyfin item JSON blob. Absent fields default to empty.
    pub fn from_item_json(json: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
            return Self::default();
        };
        let text = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        // Episodes carry series/season names; audio items carry artist and
        // album fields.
        let mut artist = text("SeriesName");
        if artist.is_empty() {
            artist = value
                .get("Artists")
                .and_then(|a| a.get(0))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned();
        }
        let mut album = text("SeasonName");
        if album.is_empty() {
            album = text("Album");
        }

        let media_type = match value.get("Type").and_then(serde_json::Value::as_str) {
            Some("Audio") => MediaType::Audio,
            Some("Movie" | "Episode" | "Video" | "MusicVideo") => MediaType::Video,
            _ => MediaType::None,
        };

        Self {
            title: text("Name"),
            artist,
            album,
            track_number: value
                .get("IndexNumber")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0) as i32,
            // RunTimeTicks is in 100 ns units.
            duration_us: value
                .get("RunTimeTicks")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0)
                / 10,
            art_url: text("ImageUrl"),
            art_data_uri: String::new(),
            media_type,
        }
    }

    /// The item's ReplayGain, when the server provides one.
    pub fn normalization_gain_db(json: &str) -> Option<f64> {
        serde_json::from_str::<serde_json::Value>(json)
            .ok()?
            .get("NormalizationGain")?
            .as_f64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Transport actions arriving from the desktop shell, drained by the frame
/// loop.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSessionAction {
    Play,
    Pause,
    PlayPause,
    Stop,
    /// Absolute seek, microseconds.
    Seek(i64),
    Next,
    Previous,
    Raise,
    SetRate(f64),
}

/// Shared queue backends push actions into from their IPC threads.
pub type ActionQueue = Arc<Mutex<Vec<MediaSessionAction>>>;

pub trait MediaSessionBackend: Send {
    fn set_metadata(&mut self, meta: &MediaMetadata);
    fn set_artwork(&mut self, data_uri: &str);
    fn set_playback_state(&mut self, state: PlaybackState);
    fn set_position(&mut self, position_us: i64);
    fn set_rate(&mut self, rate: f64);
    fn set_can_go_next(&mut self, can: bool);
    fn set_can_go_previous(&mut self, can: bool);
    /// Explicit Seeked signal (meaningful on MPRIS).
    fn emit_seeked(&mut self, position_us: i64);
    /// Service the backend's own IPC from the event loop.
    fn update(&mut self);
}

/// Backend used when the platform has none: publishes nothing.
struct NullBackend;

impl MediaSessionBackend for NullBackend {
    fn set_metadata(&mut self, _meta: &MediaMetadata) {}
    fn set_artwork(&mut self, _data_uri: &str) {}
    fn set_playback_state(&mut self, _state: PlaybackState) {}
    fn set_position(&mut self, _position_us: i64) {}
    fn set_rate(&mut self, _rate: f64) {}
    fn set_can_go_next(&mut self, _can: bool) {}
    fn set_can_go_previous(&mut self, _can: bool) {}
    fn emit_seeked(&mut self, _position_us: i64) {}
    fn update(&mut self) {}
}

pub struct MediaSession {
    backend: Box<dyn MediaSessionBackend>,
    actions: ActionQueue,
    state: PlaybackState,
}

impl MediaSession {
    /// Session with the platform backend, or a silent one when the platform
    /// provides none.
    pub fn new(backend: Option<Box<dyn MediaSessionBackend>>) -> Self {
        if backend.is_none() {
            log("media_session: no platform backend, controls disabled");
        }
        Self {
            backend: backend.unwrap_or_else(|| Box::new(NullBackend)),
            actions: Arc::new(Mutex::new(Vec::new())),
            state: PlaybackState::Stopped,
        }
    }

    /// Queue handed to backends so shell callbacks can post actions.
    pub fn action_queue(&self) -> ActionQueue {
        self.actions.clone()
    }

    /// Drain pending transport actions, in arrival order.
    pub fn take_actions(&self) -> Vec<MediaSessionAction> {
        self.actions.lock().drain(..).collect()
    }

    pub fn set_metadata(&mut self, meta: &MediaMetadata) {
        self.backend.set_metadata(meta);
    }

    pub fn set_artwork(&mut self, data_uri: &str) {
        self.backend.set_artwork(data_uri);
    }

    pub fn set_playback_state(&mut self, state: PlaybackState) {
        if state != self.state {
            self.state = state;
            self.backend.set_playback_state(state);
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state
    }

    pub fn set_position(&mut self, position_us: i64) {
        self.backend.set_position(position_us);
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.backend.set_rate(rate);
    }

    pub fn set_can_go_next(&mut self, can: bool) {
        self.backend.set_can_go_next(can);
    }

    pub fn set_can_go_previous(&mut self, can: bool) {
        self.backend.set_can_go_previous(can);
    }

    pub fn emit_seeked(&mut self, position_us: i64) {
        self.backend.emit_seeked(position_us);
    }

    pub fn update(&mut self) {
        self.backend.update();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Records every backend call for assertions.
    #[derive(Debug, Clone, PartialEq)]
    pub enum BackendCall {
        Metadata(MediaMetadata),
        Artwork(String),
        State(PlaybackState),
        Position(i64),
        Rate(f64),
        CanNext(bool),
        CanPrevious(bool),
        Seeked(i64),
    }

    pub struct RecordingBackend {
        pub calls: Arc<Mutex<Vec<BackendCall>>>,
    }

    impl RecordingBackend {
        pub fn new() -> (Box<dyn MediaSessionBackend>, Arc<Mutex<Vec<BackendCall>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Box::new(Self {
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    impl MediaSessionBackend for RecordingBackend {
        fn set_metadata(&mut self, meta: &MediaMetadata) {
            self.calls.lock().push(BackendCall::Metadata(meta.clone()));
        }
        fn set_artwork(&mut self, data_uri: &str) {
            self.calls
                .lock()
                .push(BackendCall::Artwork(data_uri.to_owned()));
        }
        fn set_playback_state(&mut self, state: PlaybackState) {
            self.calls.lock().push(BackendCall::State(state));
        }
        fn set_position(&mut self, position_us: i64) {
            self.calls.lock().push(BackendCall::Position(position_us));
        }
        fn set_rate(&mut self, rate: f64) {
            self.calls.lock().push(BackendCall::Rate(rate));
        }
        fn set_can_go_next(&mut self, can: bool) {
            self.calls.lock().push(BackendCall::CanNext(can));
        }
        fn set_can_go_previous(&mut self, can: bool) {
            self.calls.lock().push(BackendCall::CanPrevious(can));
        }
        fn emit_seeked(&mut self, position_us: i64) {
            self.calls.lock().push(BackendCall::Seeked(position_us));
        }
        fn update(&mut self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{BackendCall, RecordingBackend};
    use super::*;

    #[test]
    fn episode_metadata_uses_series_fields() {
        let meta = MediaMetadata::from_item_json(
            r#"{
                "Name": "Pilot",
                "Type": "Episode",
                "SeriesName": "Some Show",
                "SeasonName": "Season 1",
                "IndexNumber": 3,
                "RunTimeTicks": 36000000000
            }"#,
        );
        assert_eq!(meta.title, "Pilot");
        assert_eq!(meta.artist, "Some Show");
        assert_eq!(meta.album, "Season 1");
        assert_eq!(meta.track_number, 3);
        assert_eq!(meta.duration_us, 3_600_000_000);
        assert_eq!(meta.media_type, MediaType::Video);
    }

    #[test]
    fn audio_metadata_uses_artist_and_album() {
        let meta = MediaMetadata::from_item_json(
            r#"{
                "Name": "Track",
                "Type": "Audio",
                "Artists": ["First Artist", "Second"],
                "Album": "The Album"
            }"#,
        );
        assert_eq!(meta.artist, "First Artist");
        assert_eq!(meta.album, "The Album");
        assert_eq!(meta.media_type, MediaType::Audio);
    }

    #[test]
    fn absent_fields_default() {
        let meta = MediaMetadata::from_item_json("{}");
        assert_eq!(meta, MediaMetadata::default());
        // Malformed input behaves the same.
        assert_eq!(MediaMetadata::from_item_json("not json"), MediaMetadata::default());
    }

    #[test]
    fn normalization_gain_is_optional() {
        assert_eq!(
            MediaMetadata::normalization_gain_db(r#"{"NormalizationGain": -6.5}"#),
            Some(-6.5)
        );
        assert_eq!(MediaMetadata::normalization_gain_db("{}"), None);
    }

    #[test]
    fn duplicate_playback_state_is_not_republished() {
        let (backend, calls) = RecordingBackend::new();
        let mut session = MediaSession::new(Some(backend));
        session.set_playback_state(PlaybackState::Playing);
        session.set_playback_state(PlaybackState::Playing);
        session.set_playback_state(PlaybackState::Paused);
        assert_eq!(
            calls.lock().as_slice(),
            &[
                BackendCall::State(PlaybackState::Playing),
                BackendCall::State(PlaybackState::Paused),
            ]
        );
    }

    #[test]
    fn actions_drain_in_order() {
        let session = MediaSession::new(None);
        let queue = session.action_queue();
        queue.lock().push(MediaSessionAction::Play);
        queue.lock().push(MediaSessionAction::Seek(5_000_000));
        assert_eq!(
            session.take_actions(),
            vec![MediaSessionAction::Play, MediaSessionAction::Seek(5_000_000)]
        );
        assert!(session.take_actions().is_empty());
    }
}
