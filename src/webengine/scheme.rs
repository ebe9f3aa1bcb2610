//! The `app://` custom scheme: a fixed table of embedded resources keyed by
//! the path after the scheme, served with their recorded MIME types.

use std::borrow::Cow;

use rust_embed::RustEmbed;

/// Scheme name the engine registers.
pub const SCHEME: &str = "app";

/// Registration flags for the custom scheme, consumed by the engine before
/// initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeFlags {
    pub standard: bool,
    pub secure: bool,
    pub local: bool,
    pub cors_enabled: bool,
}

/// `app://` is standard + secure + local + CORS-enabled.
pub const SCHEME_FLAGS: SchemeFlags = SchemeFlags {
    standard: true,
    secure: true,
    local: true,
    cors_enabled: true,
};

/// Resources compiled into the binary.
#[derive(RustEmbed)]
#[folder = "resources/"]
struct Assets;

/// A resolved scheme response: always status 200 with the recorded MIME
/// type. Absent paths return `None` and the engine serves its default
/// not-found response.
pub struct Resource {
    pub data: Cow<'static, [u8]>,
    pub mime: String,
}

/// Resolve a full `app://` URL.
pub fn resolve_url(url: &str) -> Option<Resource> {
    let rest = url.strip_prefix("app://")?;
    // Drop any query/fragment; the table is keyed by plain paths.
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    resolve_path(rest)
}

/// Resolve a path after the scheme, e.g. `resources/index.html`.
pub fn resolve_path(path: &str) -> Option<Resource> {
    let key = path
        .trim_start_matches('/')
        .strip_prefix("resources/")
        .unwrap_or(path.trim_start_matches('/'));
    let asset = Assets::get(key)?;
    let mime = mime_guess::from_path(key)
        .first_or_octet_stream()
        .to_string();
    Some(Resource {
        data: asset.data,
        mime,
    })
}

/// JS sources injected into the main view on context creation, in order.
/// The first is the shim that gets the `__SERVER_URL__` substitution.
pub const INJECTED_SCRIPTS: &[&str] = &[
    "native-shim.js",
    "mpv-player-core.js",
    "mpv-video-player.js",
    "mpv-audio-player.js",
    "input-plugin.js",
];

/// Embedded script source by name.
pub fn script_source(name: &str) -> Option<String> {
    let asset = Assets::get(name)?;
    String::from_utf8(asset.data.into_owned()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_entry_point_resolves() {
        let resource = resolve_url("app://resources/index.html").expect("index.html");
        assert_eq!(resource.mime, "text/html");
        assert!(!resource.data.is_empty());
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(resolve_path("resources/style.css").unwrap().mime, "text/css");
        let js = resolve_path("resources/onboarding.js").unwrap().mime;
        assert!(js.contains("javascript"), "got {js}");
    }

    #[test]
    fn absent_path_is_none() {
        assert!(resolve_url("app://resources/missing.bin").is_none());
        assert!(resolve_url("https://example.com/index.html").is_none());
    }

    #[test]
    fn query_strings_are_ignored() {
        assert!(resolve_url("app://resources/index.html?v=2").is_some());
    }

    #[test]
    fn every_injected_script_is_embedded() {
        for name in INJECTED_SCRIPTS {
            assert!(script_source(name).is_some(), "missing {name}");
        }
    }
}
