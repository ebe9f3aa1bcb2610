//! Web-engine host: lifecycle and configuration of the two off-screen
//! views, the custom scheme, the renderer bindings, and the message pump.
//!
//! The engine itself runs out of process; everything it consumes from us is
//! plain data (the configuration record, the scheme table, the binding
//! signatures) and everything it produces arrives through the per-view
//! sinks in [`view`].

pub mod bindings;
pub mod ipc;
pub mod pump;
pub mod scheme;
pub mod view;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use self::pump::MessagePump;
use self::view::{ViewDriver, WebView};

use crate::log;
use crate::settings;

/// URL the onboarding overlay view loads.
pub const OVERLAY_URL: &str = "app://resources/index.html";

/// Command-line switches handed to the engine before initialization. The
/// ecosystem features have no place in a media client.
pub const ENGINE_SWITCHES: &[(&str, Option<&str>)] = &[
    ("disable-background-networking", None),
    ("disable-client-side-phishing-detection", None),
    ("disable-default-apps", None),
    ("disable-extensions", None),
    ("disable-component-update", None),
    ("disable-sync", None),
    ("disable-translate", None),
    ("disable-domain-reliability", None),
    ("disable-breakpad", None),
    ("disable-notifications", None),
    ("disable-spell-checking", None),
    ("no-pings", None),
    ("bwsi", None),
    ("google-api-key", Some("")),
    ("google-default-client-id", Some("")),
    ("google-default-client-secret", Some("")),
];

/// Switches added when the shared-texture path is off: the engine rasterises
/// in software and paints through system memory.
pub const SOFTWARE_SWITCHES: &[(&str, Option<&str>)] = &[
    ("disable-gpu", None),
    ("disable-gpu-compositing", None),
];

/// Everything the engine needs to know before initialization.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Off-screen rendering is mandatory; the engine never owns a window.
    pub windowless: bool,
    /// The host drives the engine's message loop through [`pump`].
    pub external_message_pump: bool,
    /// Engine cache directory (sibling to the config dir; engine-owned).
    pub cache_path: PathBuf,
    /// Paint rate, matched to the display refresh rate.
    pub windowless_frame_rate: u32,
    /// Transparent background so video can show through.
    pub transparent_background: bool,
    /// Export frames as shared GPU buffers instead of software paints.
    pub shared_textures: bool,
    /// Command-line switch set.
    pub switches: Vec<(&'static str, Option<&'static str>)>,
    /// Custom scheme registration.
    pub scheme: (&'static str, scheme::SchemeFlags),
    /// Reported to the engine regardless of the real display scale; the
    /// host does its own logical↔physical mapping so the engine paints at
    /// native resolution.
    pub device_scale_factor: f32,
}

/// Build the engine configuration. `use_gpu_overlay` selects the
/// shared-texture fast path; without it the engine's GPU is disabled
/// entirely.
pub fn engine_config(use_gpu_overlay: bool, refresh_rate: u32) -> EngineConfig {
    let mut switches: Vec<(&'static str, Option<&'static str>)> = ENGINE_SWITCHES.to_vec();
    if !use_gpu_overlay {
        switches.extend_from_slice(SOFTWARE_SWITCHES);
    }
    EngineConfig {
        windowless: true,
        external_message_pump: true,
        cache_path: settings::cache_dir(),
        windowless_frame_rate: if refresh_rate > 0 { refresh_rate } else { 60 },
        transparent_background: true,
        shared_textures: use_gpu_overlay,
        switches,
        scheme: (scheme::SCHEME, scheme::SCHEME_FLAGS),
        device_scale_factor: 1.0,
    }
}

/// The two engine views and the pump that services the engine's scheduled
/// work.
pub struct Host {
    pub main: WebView,
    pub overlay: WebView,
    pub pump: Arc<MessagePump>,
    pub config: EngineConfig,
    drivers: Option<(ViewDriver, ViewDriver)>,
    /// Runs the engine's message-loop entry; installed by the glue that
    /// links the real engine.
    pump_work: Option<Box<dyn FnMut()>>,
}

impl Host {
    /// Create both views at the window's physical size. The main view loads
    /// the saved server immediately, or sits on about:blank until the
    /// overlay delivers one.
    pub fn new(
        config: EngineConfig,
        width: u32,
        height: u32,
        saved_url: Option<&str>,
    ) -> Self {
        let refresh_interval =
            Duration::from_secs_f64(1.0 / f64::from(config.windowless_frame_rate));
        let pump = Arc::new(MessagePump::new(refresh_interval));

        let (main, main_driver) = WebView::new("main", width, height);
        let (overlay, overlay_driver) = WebView::new("overlay", width, height);

        overlay.load_url(OVERLAY_URL);
        match saved_url {
            Some(url) => {
                log(&format!("webengine: loading saved server {url}"));
                main.load_url(url);
            }
            None => {
                log("webengine: no saved server, waiting for overlay");
                main.load_url("about:blank");
            }
        }

        Self {
            main,
            overlay,
            pump,
            config,
            drivers: Some((main_driver, overlay_driver)),
            pump_work: None,
        }
    }

    /// Engine-side endpoints for (main, overlay), taken once by the
    /// platform glue that drives the real engine (tests drive them
    /// directly).
    pub fn take_drivers(&mut self) -> Option<(ViewDriver, ViewDriver)> {
        self.drivers.take()
    }

    /// Install the engine's message-loop entry point.
    pub fn set_pump_work(&mut self, work: Box<dyn FnMut()>) {
        self.pump_work = Some(work);
    }

    /// Service the external message pump: run the engine's message-loop
    /// entry when a request is due or the refresh floor elapsed.
    pub fn service_pump(&mut self, now: std::time::Instant) -> bool {
        if !self.pump.should_pump(now) {
            return false;
        }
        self.pump.mark_pumped(now);
        if let Some(work) = &mut self.pump_work {
            work();
        }
        true
    }

    /// Shut both views down; the engine itself is shut down by its glue
    /// after the command queues drain.
    pub fn shutdown(&self) {
        self.main.close();
        self.overlay.close();
    }
}

#[cfg(test)]
mod tests {
    use super::view::ViewCommand;
    use super::*;

    #[test]
    fn saved_server_loads_immediately() {
        let mut host = Host::new(
            engine_config(false, 60),
            1280,
            720,
            Some("https://jf.example"),
        );
        let (main_driver, overlay_driver) = host.take_drivers().unwrap();
        assert!(matches!(
            main_driver.commands.try_recv(),
            Ok(ViewCommand::LoadUrl(url)) if url == "https://jf.example"
        ));
        assert!(matches!(
            overlay_driver.commands.try_recv(),
            Ok(ViewCommand::LoadUrl(url)) if url == OVERLAY_URL
        ));
    }

    #[test]
    fn no_saved_server_loads_blank() {
        let mut host = Host::new(engine_config(false, 60), 1280, 720, None);
        let (main_driver, _) = host.take_drivers().unwrap();
        assert!(matches!(
            main_driver.commands.try_recv(),
            Ok(ViewCommand::LoadUrl(url)) if url == "about:blank"
        ));
    }

    #[test]
    fn software_config_disables_engine_gpu() {
        let config = engine_config(false, 144);
        assert!(!config.shared_textures);
        assert!(config.switches.iter().any(|(name, _)| *name == "disable-gpu"));
        assert_eq!(config.windowless_frame_rate, 144);

        let gpu = engine_config(true, 0);
        assert!(gpu.shared_textures);
        assert!(!gpu.switches.iter().any(|(name, _)| *name == "disable-gpu"));
        assert_eq!(gpu.windowless_frame_rate, 60);
    }

    #[test]
    fn scale_factor_is_always_one() {
        assert_eq!(engine_config(true, 60).device_scale_factor, 1.0);
    }
}
