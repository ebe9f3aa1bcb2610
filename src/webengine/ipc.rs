//! Renderer → browser IPC: named messages with positional typed arguments.
//!
//! The renderer-side bindings marshal JavaScript calls into `(name, args)`
//! envelopes; this module parses them into typed messages on the browser
//! side. Unknown names are logged and ignored.

use crate::log;

/// A positional IPC argument. The wire format supports exactly these types.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcArg {
    Str(String),
    Int(i64),
    Bool(bool),
    Double(f64),
}

impl IpcArg {
    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Double(v) => Some(*v as i64),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// A named message with positional arguments, as it crosses the process
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcEnvelope {
    pub name: String,
    pub args: Vec<IpcArg>,
}

/// Typed messages the browser process consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcMessage {
    PlayerLoad {
        url: String,
        start_ms: i64,
        audio_idx: i32,
        sub_idx: i32,
        metadata_json: String,
    },
    PlayerStop,
    PlayerPause,
    PlayerPlay,
    PlayerPlayPause,
    PlayerSeek {
        ms: i64,
    },
    PlayerSetVolume {
        volume: i32,
    },
    PlayerSetMuted {
        muted: bool,
    },
    PlayerSetSpeed {
        speed: f64,
    },
    PlayerSetAudioDelay {
        seconds: f64,
    },
    PlayerSetSubtitle {
        id: i32,
    },
    PlayerSetAudio {
        id: i32,
    },
    SaveServerUrl {
        url: String,
    },
    SetFullscreen {
        fullscreen: bool,
    },
    /// Overlay view only: onboarding form submitted a server URL.
    LoadServer {
        url: String,
    },
    /// Overlay view only: probe `<url>/System/Info/Public` reachability.
    CheckServerConnectivity {
        url: String,
    },
    NotifyMetadata {
        json: String,
    },
    NotifyPosition {
        ms: i64,
    },
    NotifySeek {
        ms: i64,
    },
    NotifyPlaybackState {
        state: String,
    },
    NotifyArtwork {
        data_uri: String,
    },
    NotifyQueueChange {
        can_next: bool,
        can_previous: bool,
    },
    NotifyRateChange {
        rate: f64,
    },
}

impl IpcMessage {
    /// Parse an envelope. `None` means unknown name or malformed arguments;
    /// both are logged and dropped per the error policy.
    pub fn parse(envelope: &IpcEnvelope) -> Option<Self> {
        let args = &envelope.args;
        let parsed = match envelope.name.as_str() {
            "playerLoad" => Self::PlayerLoad {
                url: args.first()?.as_str()?.to_owned(),
                start_ms: args.get(1)?.as_int()?,
                audio_idx: args.get(2)?.as_int()? as i32,
                sub_idx: args.get(3)?.as_int()? as i32,
                metadata_json: args.get(4)?.as_str()?.to_owned(),
            },
            "playerStop" => Self::PlayerStop,
            "playerPause" => Self::PlayerPause,
            "playerPlay" => Self::PlayerPlay,
            "playerPlayPause" => Self::PlayerPlayPause,
            "playerSeek" => Self::PlayerSeek {
                ms: args.first()?.as_int()?,
            },
            "playerSetVolume" => Self::PlayerSetVolume {
                volume: args.first()?.as_int()? as i32,
            },
            "playerSetMuted" => Self::PlayerSetMuted {
                muted: args.first()?.as_bool()?,
            },
            "playerSetSpeed" => Self::PlayerSetSpeed {
                speed: args.first()?.as_double()?,
            },
            "playerSetAudioDelay" => Self::PlayerSetAudioDelay {
                seconds: args.first()?.as_double()?,
            },
            "playerSetSubtitle" => Self::PlayerSetSubtitle {
                id: args.first()?.as_int()? as i32,
            },
            "playerSetAudio" => Self::PlayerSetAudio {
                id: args.first()?.as_int()? as i32,
            },
            "saveServerUrl" => Self::SaveServerUrl {
                url: args.first()?.as_str()?.to_owned(),
            },
            "setFullscreen" => Self::SetFullscreen {
                fullscreen: args.first()?.as_bool()?,
            },
            "loadServer" => Self::LoadServer {
                url: args.first()?.as_str()?.to_owned(),
            },
            "checkServerConnectivity" => Self::CheckServerConnectivity {
                url: args.first()?.as_str()?.to_owned(),
            },
            "notifyMetadata" => Self::NotifyMetadata {
                json: args.first()?.as_str()?.to_owned(),
            },
            "notifyPosition" => Self::NotifyPosition {
                ms: args.first()?.as_int()?,
            },
            "notifySeek" => Self::NotifySeek {
                ms: args.first()?.as_int()?,
            },
            "notifyPlaybackState" => Self::NotifyPlaybackState {
                state: args.first()?.as_str()?.to_owned(),
            },
            "notifyArtwork" => Self::NotifyArtwork {
                data_uri: args.first()?.as_str()?.to_owned(),
            },
            "notifyQueueChange" => {
                let flags = args.first()?.as_int()?;
                Self::NotifyQueueChange {
                    can_next: flags & 1 != 0,
                    can_previous: flags & 2 != 0,
                }
            }
            "notifyRateChange" => Self::NotifyRateChange {
                // Rate crosses the boundary scaled by 1e6 to stay integral.
                rate: args.first()?.as_int()? as f64 / 1_000_000.0,
            },
            other => {
                log(&format!("ipc: unknown message '{other}', ignoring"));
                return None;
            }
        };
        Some(parsed)
    }
}

/// Browser → renderer connectivity probe result. The resolved URL is the
/// post-redirect URL with a trailing `/System/Info/Public` stripped.
pub fn connectivity_result(original_url: &str, success: bool, final_url: &str) -> IpcEnvelope {
    const PROBE_SUFFIX: &str = "/System/Info/Public";
    let resolved = final_url.strip_suffix(PROBE_SUFFIX).unwrap_or(final_url);
    IpcEnvelope {
        name: "serverConnectivityResult".to_owned(),
        args: vec![
            IpcArg::Str(original_url.to_owned()),
            IpcArg::Bool(success),
            IpcArg::Str(resolved.to_owned()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(name: &str, args: Vec<IpcArg>) -> IpcEnvelope {
        IpcEnvelope {
            name: name.to_owned(),
            args,
        }
    }

    #[test]
    fn player_load_parses_all_arguments() {
        let msg = IpcMessage::parse(&envelope(
            "playerLoad",
            vec![
                IpcArg::Str("https://jf/stream.mkv".into()),
                IpcArg::Int(30_000),
                IpcArg::Int(-1),
                IpcArg::Int(2),
                IpcArg::Str("{}".into()),
            ],
        ));
        assert_eq!(
            msg,
            Some(IpcMessage::PlayerLoad {
                url: "https://jf/stream.mkv".into(),
                start_ms: 30_000,
                audio_idx: -1,
                sub_idx: 2,
                metadata_json: "{}".into(),
            })
        );
    }

    #[test]
    fn unknown_name_is_dropped() {
        assert_eq!(IpcMessage::parse(&envelope("playerExplode", vec![])), None);
    }

    #[test]
    fn malformed_arguments_are_dropped() {
        assert_eq!(
            IpcMessage::parse(&envelope("playerSeek", vec![IpcArg::Str("oops".into())])),
            None
        );
        assert_eq!(IpcMessage::parse(&envelope("playerSeek", vec![])), None);
    }

    #[test]
    fn queue_change_decodes_capability_bits() {
        let msg = IpcMessage::parse(&envelope("notifyQueueChange", vec![IpcArg::Int(3)]));
        assert_eq!(
            msg,
            Some(IpcMessage::NotifyQueueChange {
                can_next: true,
                can_previous: true,
            })
        );
    }

    #[test]
    fn rate_change_unscales() {
        let msg = IpcMessage::parse(&envelope("notifyRateChange", vec![IpcArg::Int(1_500_000)]));
        assert_eq!(msg, Some(IpcMessage::NotifyRateChange { rate: 1.5 }));
    }

    #[test]
    fn connectivity_result_strips_probe_suffix() {
        let result = connectivity_result(
            "http://host:8096",
            true,
            "https://host.example/jellyfin/System/Info/Public",
        );
        assert_eq!(result.name, "serverConnectivityResult");
        assert_eq!(
            result.args[2],
            IpcArg::Str("https://host.example/jellyfin".into())
        );
    }

    #[test]
    fn connectivity_result_passes_other_urls_through() {
        let result = connectivity_result("http://host", false, "http://host");
        assert_eq!(result.args[1], IpcArg::Bool(false));
        assert_eq!(result.args[2], IpcArg::Str("http://host".into()));
    }
}
