//! Thin wrapper over the system clipboard for the edit-shortcut path.
//!
//! Paste prefers richer clipboard representations over plain text; the
//! preference walk lives in the browser layer so it can be tested against a
//! fake provider.

use crate::log;

/// Clipboard content delivered to the web engine, ordered by preference:
/// raster image, then HTML, then plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteContent {
    /// Decoded raster image, tightly packed RGBA8.
    Image {
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    Html(String),
    Text(String),
}

/// Source of clipboard representations. The production implementation is
/// backed by the OS clipboard; tests substitute a canned one.
pub trait ClipboardProvider {
    fn image(&mut self) -> Option<(u32, u32, Vec<u8>)>;
    fn html(&mut self) -> Option<String>;
    fn text(&mut self) -> Option<String>;
}

/// System clipboard via arboard. Construction failure (e.g. no display)
/// degrades to an empty clipboard.
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        let inner = match arboard::Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                log(&format!("clipboard: unavailable: {e}"));
                None
            }
        };
        Self { inner }
    }

    /// Write plain text (used by the copy path's fallback mirror).
    pub fn set_text(&mut self, text: &str) {
        if let Some(clipboard) = &mut self.inner {
            let _ = clipboard.set_text(text.to_owned());
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardProvider for SystemClipboard {
    fn image(&mut self) -> Option<(u32, u32, Vec<u8>)> {
        let clipboard = self.inner.as_mut()?;
        let image = clipboard.get_image().ok()?;
        Some((
            image.width as u32,
            image.height as u32,
            image.bytes.into_owned(),
        ))
    }

    fn html(&mut self) -> Option<String> {
        // arboard exposes no portable HTML read; the preference walk falls
        // through to plain text.
        None
    }

    fn text(&mut self) -> Option<String> {
        self.inner.as_mut()?.get_text().ok()
    }
}

/// Walk the preference order and return the first representation the
/// clipboard can satisfy.
pub fn read_preferred(provider: &mut dyn ClipboardProvider) -> Option<PasteContent> {
    if let Some((width, height, rgba)) = provider.image() {
        return Some(PasteContent::Image {
            width,
            height,
            rgba,
        });
    }
    if let Some(html) = provider.html() {
        return Some(PasteContent::Html(html));
    }
    provider.text().map(PasteContent::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        image: Option<(u32, u32, Vec<u8>)>,
        html: Option<String>,
        text: Option<String>,
    }

    impl ClipboardProvider for Fake {
        fn image(&mut self) -> Option<(u32, u32, Vec<u8>)> {
            self.image.clone()
        }
        fn html(&mut self) -> Option<String> {
            self.html.clone()
        }
        fn text(&mut self) -> Option<String> {
            self.text.clone()
        }
    }

    #[test]
    fn image_wins_over_text() {
        let mut fake = Fake {
            image: Some((1, 1, vec![0, 0, 0, 255])),
            html: None,
            text: Some("plain".into()),
        };
        assert!(matches!(
            read_preferred(&mut fake),
            Some(PasteContent::Image { width: 1, .. })
        ));
    }

    #[test]
    fn html_wins_over_text() {
        let mut fake = Fake {
            image: None,
            html: Some("<b>rich</b>".into()),
            text: Some("plain".into()),
        };
        assert_eq!(
            read_preferred(&mut fake),
            Some(PasteContent::Html("<b>rich</b>".into()))
        );
    }

    #[test]
    fn stops_at_first_available() {
        let mut fake = Fake {
            image: None,
            html: None,
            text: Some("plain".into()),
        };
        assert_eq!(
            read_preferred(&mut fake),
            Some(PasteContent::Text("plain".into()))
        );

        let mut empty = Fake {
            image: None,
            html: None,
            text: None,
        };
        assert_eq!(read_preferred(&mut empty), None);
    }
}
