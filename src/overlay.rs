//! Onboarding overlay lifecycle — the Showing/Waiting/Fading/Hidden state
//! machine that governs the second web view's visibility and input focus.

use std::time::{Duration, Instant};

/// Delay between the main UI starting to load and the fade beginning.
pub const FADE_DELAY: Duration = Duration::from_secs(1);
/// Length of the linear alpha ramp from 1 to 0.
pub const FADE_DURATION: Duration = Duration::from_millis(250);

/// Window clear colour while the overlay owns the screen (#101010).
pub const OVERLAY_CLEAR: [f64; 3] = [16.0 / 255.0, 16.0 / 255.0, 16.0 / 255.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// Onboarding form is up; no server URL known yet.
    Showing,
    /// Main UI is loading; overlay stays opaque until `FADE_DELAY` elapses.
    Waiting,
    /// Linear alpha ramp 1 → 0 over `FADE_DURATION`.
    Fading,
    /// Overlay compositor is invisible; no further transitions.
    Hidden,
}

/// What `advance` observed this frame. `FocusToMain` fires exactly once, on
/// the Waiting → Fading crossing, so the caller can swap input layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTransition {
    None,
    FocusToMain,
    BecameHidden,
}

pub struct OverlayLifecycle {
    state: OverlayState,
    fade_start: Instant,
    alpha: f32,
}

impl OverlayLifecycle {
    /// `have_server` selects the initial state: a persisted server URL means
    /// the main UI is already loading and the overlay starts in `Waiting`.
    pub fn new(have_server: bool, now: Instant) -> Self {
        Self {
            state: if have_server {
                OverlayState::Waiting
            } else {
                OverlayState::Showing
            },
            fade_start: now,
            alpha: 1.0,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// Current overlay alpha. Non-increasing while fading or hidden.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// True while the overlay should be composited at all.
    pub fn visible(&self) -> bool {
        self.state != OverlayState::Hidden && self.alpha > 0.01
    }

    /// True while the overlay owns input focus and the clear colour.
    pub fn owns_focus(&self) -> bool {
        matches!(self.state, OverlayState::Showing | OverlayState::Waiting)
    }

    /// Clear colour RGB for the current state: `#101010` until the fade
    /// begins, black afterwards.
    pub fn clear_color(&self) -> [f64; 3] {
        if self.owns_focus() {
            OVERLAY_CLEAR
        } else {
            [0.0, 0.0, 0.0]
        }
    }

    /// The overlay view reported a server URL; the main UI starts loading.
    /// Only honoured in `Showing` — a stale submission after a saved-server
    /// start is ignored.
    pub fn server_submitted(&mut self, now: Instant) -> bool {
        if self.state != OverlayState::Showing {
            return false;
        }
        self.state = OverlayState::Waiting;
        self.fade_start = now;
        true
    }

    /// Advance the machine. Call once per frame.
    pub fn advance(&mut self, now: Instant) -> OverlayTransition {
        match self.state {
            OverlayState::Showing | OverlayState::Hidden => OverlayTransition::None,
            OverlayState::Waiting => {
                if now.duration_since(self.fade_start) >= FADE_DELAY {
                    self.state = OverlayState::Fading;
                    self.fade_start = now;
                    OverlayTransition::FocusToMain
                } else {
                    OverlayTransition::None
                }
            }
            OverlayState::Fading => {
                self.alpha = fade_alpha(self.fade_start, now);
                if self.alpha <= 0.0 {
                    self.state = OverlayState::Hidden;
                    OverlayTransition::BecameHidden
                } else {
                    OverlayTransition::None
                }
            }
        }
    }

    /// True while an animation is in flight and frames must keep rendering.
    pub fn animating(&self) -> bool {
        matches!(self.state, OverlayState::Fading)
    }
}

/// Pure fade curve: `clamp01(1 − (t − fade_start) / FADE_DURATION)`.
pub fn fade_alpha(fade_start: Instant, now: Instant) -> f32 {
    let elapsed = now.duration_since(fade_start).as_secs_f32();
    (1.0 - elapsed / FADE_DURATION.as_secs_f32()).clamp(0.0, 1.0)
}
