//! Fullscreen ownership tracking.
//!
//! The window manager and the web content can each put the window into
//! fullscreen; recording who entered prevents an exit request from the
//! other side from yanking the window out from under the one in charge.

/// Who last entered fullscreen. Cleared only when fullscreen exits through
/// the same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullscreenSource {
    #[default]
    None,
    WindowManager,
    Web,
}

/// What the caller should tell the web engine after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSync {
    /// Synthesize `document.documentElement.requestFullscreen()`.
    RequestFullscreen,
    /// Tell the engine to drop its fullscreen state.
    ExitFullscreen,
}

#[derive(Debug, Default)]
pub struct FullscreenTracker {
    source: FullscreenSource,
}

impl FullscreenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self) -> FullscreenSource {
        self.source
    }

    /// Web content requested a fullscreen change. Returns the window state
    /// to apply, or `None` when the request is not honoured (an exit while
    /// the window manager owns fullscreen).
    pub fn web_request(&mut self, enter: bool) -> Option<bool> {
        if enter {
            if self.source == FullscreenSource::None {
                self.source = FullscreenSource::Web;
            }
            Some(true)
        } else if self.source == FullscreenSource::Web {
            self.source = FullscreenSource::None;
            Some(false)
        } else {
            None
        }
    }

    /// The window manager put the window into fullscreen (F11, titlebar,
    /// etc.). The web engine is told to match.
    pub fn wm_entered(&mut self) -> WebSync {
        if self.source == FullscreenSource::None {
            self.source = FullscreenSource::WindowManager;
        }
        WebSync::RequestFullscreen
    }

    /// The window manager took the window out of fullscreen. The web engine
    /// always syncs; the source only clears if the window manager owned it.
    pub fn wm_left(&mut self) -> WebSync {
        if self.source == FullscreenSource::WindowManager {
            self.source = FullscreenSource::None;
        }
        WebSync::ExitFullscreen
    }

    /// On focus gain the engine's fullscreen state is re-synced to whatever
    /// the window actually is.
    pub fn focus_gained(&self, window_is_fullscreen: bool) -> WebSync {
        if window_is_fullscreen {
            WebSync::RequestFullscreen
        } else {
            WebSync::ExitFullscreen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_enter_then_web_exit() {
        let mut fs = FullscreenTracker::new();
        assert_eq!(fs.web_request(true), Some(true));
        assert_eq!(fs.source(), FullscreenSource::Web);
        assert_eq!(fs.web_request(false), Some(false));
        assert_eq!(fs.source(), FullscreenSource::None);
    }

    #[test]
    fn wm_fullscreen_ignores_web_exit() {
        let mut fs = FullscreenTracker::new();
        // F11: window manager enters, web gets a synthetic request.
        assert_eq!(fs.wm_entered(), WebSync::RequestFullscreen);
        assert_eq!(fs.source(), FullscreenSource::WindowManager);

        // Web calls document.exitFullscreen(): not honoured, window stays.
        assert_eq!(fs.web_request(false), None);
        assert_eq!(fs.source(), FullscreenSource::WindowManager);

        // The window manager leaving clears the source.
        assert_eq!(fs.wm_left(), WebSync::ExitFullscreen);
        assert_eq!(fs.source(), FullscreenSource::None);
    }

    #[test]
    fn wm_exit_does_not_clear_web_source() {
        let mut fs = FullscreenTracker::new();
        fs.web_request(true);
        // A WM-side leave still syncs the engine but the web source stays
        // until the web side exits itself.
        assert_eq!(fs.wm_left(), WebSync::ExitFullscreen);
        assert_eq!(fs.source(), FullscreenSource::Web);
    }

    #[test]
    fn focus_gain_syncs_to_window_state() {
        let fs = FullscreenTracker::new();
        assert_eq!(fs.focus_gained(true), WebSync::RequestFullscreen);
        assert_eq!(fs.focus_gained(false), WebSync::ExitFullscreen);
    }

    #[test]
    fn web_enter_while_wm_owns_keeps_wm_source() {
        let mut fs = FullscreenTracker::new();
        fs.wm_entered();
        assert_eq!(fs.web_request(true), Some(true));
        assert_eq!(fs.source(), FullscreenSource::WindowManager);
        // Subsequent web exit is still ignored.
        assert_eq!(fs.web_request(false), None);
    }
}
