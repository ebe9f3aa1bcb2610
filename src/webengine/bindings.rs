//! Renderer-process native bindings: the `window.jmpNative` function table
//! and the startup script injection.
//!
//! Each binding marshals its JavaScript arguments into an IPC envelope sent
//! to the browser process. The table here is the single source of truth for
//! binding names and argument signatures; the browser-side parser
//! (`ipc::IpcMessage::parse`) accepts exactly what these produce.

use super::ipc::{IpcArg, IpcEnvelope};
use super::scheme;

/// Argument kinds a binding accepts, in positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Str,
    Int,
    Bool,
    Double,
}

/// One `window.jmpNative` entry.
pub struct Binding {
    pub name: &'static str,
    pub signature: &'static [ArgKind],
}

/// Every native function attached to `window.jmpNative`.
pub const BINDINGS: &[Binding] = &[
    Binding {
        name: "playerLoad",
        signature: &[
            ArgKind::Str,
            ArgKind::Int,
            ArgKind::Int,
            ArgKind::Int,
            ArgKind::Str,
        ],
    },
    Binding {
        name: "playerStop",
        signature: &[],
    },
    Binding {
        name: "playerPause",
        signature: &[],
    },
    Binding {
        name: "playerPlay",
        signature: &[],
    },
    Binding {
        name: "playerPlayPause",
        signature: &[],
    },
    Binding {
        name: "playerSeek",
        signature: &[ArgKind::Int],
    },
    Binding {
        name: "playerSetVolume",
        signature: &[ArgKind::Int],
    },
    Binding {
        name: "playerSetMuted",
        signature: &[ArgKind::Bool],
    },
    Binding {
        name: "playerSetSpeed",
        signature: &[ArgKind::Double],
    },
    Binding {
        name: "playerSetAudioDelay",
        signature: &[ArgKind::Double],
    },
    Binding {
        name: "playerSetSubtitle",
        signature: &[ArgKind::Int],
    },
    Binding {
        name: "playerSetAudio",
        signature: &[ArgKind::Int],
    },
    Binding {
        name: "saveServerUrl",
        signature: &[ArgKind::Str],
    },
    Binding {
        name: "setFullscreen",
        signature: &[ArgKind::Bool],
    },
    Binding {
        name: "loadServer",
        signature: &[ArgKind::Str],
    },
    Binding {
        name: "checkServerConnectivity",
        signature: &[ArgKind::Str],
    },
    Binding {
        name: "notifyMetadata",
        signature: &[ArgKind::Str],
    },
    Binding {
        name: "notifyPosition",
        signature: &[ArgKind::Int],
    },
    Binding {
        name: "notifySeek",
        signature: &[ArgKind::Int],
    },
    Binding {
        name: "notifyPlaybackState",
        signature: &[ArgKind::Str],
    },
    Binding {
        name: "notifyArtwork",
        signature: &[ArgKind::Str],
    },
    Binding {
        name: "notifyQueueChange",
        signature: &[ArgKind::Int],
    },
    Binding {
        name: "notifyRateChange",
        signature: &[ArgKind::Int],
    },
];

fn binding(name: &str) -> Option<&'static Binding> {
    BINDINGS.iter().find(|b| b.name == name)
}

fn kind_of(arg: &IpcArg) -> ArgKind {
    match arg {
        IpcArg::Str(_) => ArgKind::Str,
        IpcArg::Int(_) => ArgKind::Int,
        IpcArg::Bool(_) => ArgKind::Bool,
        IpcArg::Double(_) => ArgKind::Double,
    }
}

fn coerce(arg: IpcArg, want: ArgKind) -> Option<IpcArg> {
    if kind_of(&arg) == want {
        return Some(arg);
    }
    // JS numbers arrive as doubles; integral signatures truncate them.
    match (arg, want) {
        (IpcArg::Double(v), ArgKind::Int) => Some(IpcArg::Int(v as i64)),
        (IpcArg::Int(v), ArgKind::Double) => Some(IpcArg::Double(v as f64)),
        (IpcArg::Int(v), ArgKind::Bool) => Some(IpcArg::Bool(v != 0)),
        _ => None,
    }
}

/// Validate and marshal a native-function call into the process message the
/// browser side consumes. `None` on unknown name or signature mismatch.
pub fn marshal(name: &str, args: Vec<IpcArg>) -> Option<IpcEnvelope> {
    let binding = binding(name)?;
    if args.len() != binding.signature.len() {
        return None;
    }
    let args = args
        .into_iter()
        .zip(binding.signature)
        .map(|(arg, want)| coerce(arg, *want))
        .collect::<Option<Vec<_>>>()?;
    Some(IpcEnvelope {
        name: name.to_owned(),
        args,
    })
}

/// Build the startup scripts injected on context creation: the native shim
/// with the persisted server URL substituted, then the player plugins.
pub fn startup_scripts(server_url: &str) -> Vec<String> {
    scheme::INJECTED_SCRIPTS
        .iter()
        .filter_map(|name| {
            let source = scheme::script_source(name)?;
            if *name == "native-shim.js" {
                Some(source.replace("__SERVER_URL__", server_url))
            } else {
                Some(source)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webengine::ipc::IpcMessage;

    #[test]
    fn every_binding_marshals_and_parses() {
        for binding in BINDINGS {
            let args: Vec<IpcArg> = binding
                .signature
                .iter()
                .map(|kind| match kind {
                    ArgKind::Str => IpcArg::Str("x".into()),
                    ArgKind::Int => IpcArg::Int(1),
                    ArgKind::Bool => IpcArg::Bool(true),
                    ArgKind::Double => IpcArg::Double(1.0),
                })
                .collect();
            let envelope = marshal(binding.name, args).expect(binding.name);
            assert!(
                IpcMessage::parse(&envelope).is_some(),
                "browser side rejects {}",
                binding.name
            );
        }
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        assert!(marshal("playerSeek", vec![]).is_none());
        assert!(marshal("playerStop", vec![IpcArg::Int(1)]).is_none());
    }

    #[test]
    fn js_numbers_coerce_to_integral_signatures() {
        let envelope = marshal("playerSeek", vec![IpcArg::Double(1500.0)]).unwrap();
        assert_eq!(envelope.args[0], IpcArg::Int(1500));
    }

    #[test]
    fn unknown_binding_is_rejected() {
        assert!(marshal("playerSelfDestruct", vec![]).is_none());
    }

    #[test]
    fn shim_substitutes_server_url() {
        let scripts = startup_scripts("https://jf.example");
        assert_eq!(scripts.len(), scheme::INJECTED_SCRIPTS.len());
        assert!(scripts[0].contains("https://jf.example"));
        assert!(!scripts[0].contains("__SERVER_URL__"));
    }
}
