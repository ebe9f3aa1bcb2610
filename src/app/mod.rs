//! Application state and startup: one window, two web views, one video
//! engine, composited by the frame loop in [`frame`].

mod commands;
mod event_loop;
mod frame;
pub mod fullscreen;

use std::sync::Arc;
use std::time::Instant;

use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event_loop::EventLoop;
use winit::keyboard::ModifiersState;
use winit::window::{CursorIcon, Window};

use crate::error::Error;
use crate::gpu::video::VideoFrameSource;
use crate::gpu::{GpuState, UiCompositor, VideoPlane, VideoRenderController};
use crate::input::browser_layer::BrowserLayer;
use crate::input::clipboard::SystemClipboard;
use crate::input::{InputStack, LayerId, WindowStateNotifier};
use crate::log;
use crate::menu::MenuOverlay;
use crate::overlay::OverlayLifecycle;
use crate::player::media_session::MediaSession;
use crate::player::mpv::{Mpv, RenderContext};
use crate::player::{CommandQueue, PlayerBridge};
use crate::settings::Settings;
use crate::webengine::{self, Host};
use self::fullscreen::FullscreenTracker;

/// Initial window size, logical pixels.
const INITIAL_WIDTH: u32 = 1280;
const INITIAL_HEIGHT: u32 = 720;

/// Parsed command line.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// `--video <path>`: load a file directly on startup.
    pub test_video: Option<String>,
    /// `--gpu-overlay`: enable the shared-texture fast path.
    pub gpu_overlay: bool,
}

/// Wake-ups posted from engine threads (video frames, engine events) so the
/// idle wait ends early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    EngineWake,
}

pub struct App {
    pub(super) options: Options,
    pub(super) settings: Settings,

    // Window + GPU, created on `resumed`.
    pub(super) window: Option<Arc<Window>>,
    pub(super) surface: Option<wgpu::Surface<'static>>,
    pub(super) surface_config: Option<wgpu::SurfaceConfiguration>,
    pub(super) gpu: Option<GpuState>,
    pub(super) pipeline: Option<wgpu::RenderPipeline>,
    pub(super) compositor: Option<UiCompositor>,
    pub(super) overlay_compositor: Option<UiCompositor>,
    pub(super) video_plane: Option<VideoPlane>,

    // Video engine.
    pub(super) mpv: Mpv,
    pub(super) video_ctl: VideoRenderController,
    pub(super) pending_video_source: Option<Box<dyn VideoFrameSource>>,
    pub(super) has_video: bool,
    pub(super) video_needs_rerender: bool,

    // Web engine host + player bridge.
    pub(super) host: Host,
    pub(super) bridge: PlayerBridge,
    pub(super) commands: CommandQueue,
    pub(super) session: MediaSession,

    // UI chrome.
    pub(super) overlay: OverlayLifecycle,
    pub(super) menu: MenuOverlay,

    // Input.
    pub(super) input_stack: InputStack,
    pub(super) window_state: WindowStateNotifier,
    pub(super) main_layer: BrowserLayer,
    pub(super) overlay_layer: BrowserLayer,
    pub(super) clipboard: SystemClipboard,
    pub(super) fullscreen: FullscreenTracker,
    pub(super) window_is_fullscreen: bool,

    // Per-frame state.
    pub(super) fatal: Option<Error>,
    pub(super) modifiers: ModifiersState,
    pub(super) cursor_pos: PhysicalPosition<f64>,
    pub(super) current_cursor: CursorIcon,
    pub(super) scale_factor: f64,
    pub(super) size: PhysicalSize<u32>,
    pub(super) activity: bool,
    pub(super) needs_render: bool,
    pub(super) focus_sent: bool,
}

impl App {
    pub fn run(options: Options) -> Result<(), Box<dyn std::error::Error>> {
        std::panic::set_hook(Box::new(|info| {
            let _ = std::fs::write("jellyfin_desktop_panic.log", format!("{info}"));
        }));
        let _ = std::fs::remove_file(crate::log_path());
        let startup = Instant::now();
        log("starting");

        let settings = Settings::load();
        log(&format!(
            "settings: serverUrl={:?} ({:?})",
            settings.server_url,
            crate::settings::settings_path()
        ));

        let menu = MenuOverlay::new();

        let event_loop = EventLoop::<UserEvent>::with_user_event()
            .build()
            .map_err(|e| Error::EventLoop(e.to_string()))?;
        let proxy = event_loop.create_proxy();

        // Video engine first: init failure is fatal before any window shows.
        let mpv = Mpv::new()?;
        {
            let proxy = proxy.clone();
            mpv.set_waker(move || {
                let _ = proxy.send_event(UserEvent::EngineWake);
            });
        }

        let video_ctl = VideoRenderController::new();
        let render_ctx = {
            let wake_worker = video_ctl.frame_waker();
            let proxy = proxy.clone();
            RenderContext::new(&mpv, move || {
                wake_worker();
                let _ = proxy.send_event(UserEvent::EngineWake);
            })?
        };

        let saved_url = (!settings.server_url.is_empty()).then(|| settings.server_url.clone());
        let host = Host::new(
            webengine::engine_config(options.gpu_overlay, 60),
            INITIAL_WIDTH,
            INITIAL_HEIGHT,
            saved_url.as_deref(),
        );
        let overlay = OverlayLifecycle::new(saved_url.is_some(), Instant::now());

        // Input: video hotkeys at the bottom, the overlay view on top of it.
        // The menu layer joins while open; focus moves to the main view when
        // the overlay starts fading.
        let mut input_stack = InputStack::new();
        input_stack.push(LayerId::Video);
        input_stack.push(LayerId::OverlayBrowser);
        let mut window_state = WindowStateNotifier::new();
        window_state.add(LayerId::OverlayBrowser);
        window_state.add(LayerId::Video);

        // Platform media-session backends (MPRIS/SMTC/MediaRemote) attach
        // through the packaging glue; without one the session is silent.
        let session = MediaSession::new(None);

        let commands = CommandQueue::new();
        if let Some(path) = &options.test_video {
            log(&format!("test: loading video {path}"));
            commands.push(crate::player::PlayerCommand::Load {
                url: path.clone(),
                start_ms: 0,
                audio_idx: -1,
                sub_idx: -1,
                metadata_json: String::new(),
            });
        }

        log(&format!(
            "pre-event-loop total: {:.1}ms",
            startup.elapsed().as_secs_f64() * 1000.0
        ));

        let mut app = Self {
            options,
            settings,
            window: None,
            surface: None,
            surface_config: None,
            gpu: None,
            pipeline: None,
            compositor: None,
            overlay_compositor: None,
            video_plane: None,
            mpv,
            video_ctl,
            pending_video_source: Some(Box::new(render_ctx)),
            has_video: false,
            video_needs_rerender: false,
            host,
            bridge: PlayerBridge::new(),
            commands,
            session,
            overlay,
            menu,
            input_stack,
            window_state,
            main_layer: BrowserLayer::new(INITIAL_WIDTH, INITIAL_HEIGHT),
            overlay_layer: BrowserLayer::new(INITIAL_WIDTH, INITIAL_HEIGHT),
            clipboard: SystemClipboard::new(),
            fullscreen: FullscreenTracker::new(),
            window_is_fullscreen: false,
            fatal: None,
            modifiers: ModifiersState::empty(),
            cursor_pos: PhysicalPosition::new(0.0, 0.0),
            current_cursor: CursorIcon::Default,
            scale_factor: 1.0,
            size: PhysicalSize::new(INITIAL_WIDTH, INITIAL_HEIGHT),
            activity: false,
            needs_render: true,
            focus_sent: false,
        };

        event_loop.run_app(&mut app)?;

        app.shutdown();
        if let Some(e) = app.fatal.take() {
            return Err(e.into());
        }
        Ok(())
    }

    /// Create the window, the GPU state, and everything sized from them.
    pub(super) fn init_graphics(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
    ) -> Result<(), Error> {
        let attributes = Window::default_attributes()
            .with_title("Jellyfin Desktop")
            .with_inner_size(LogicalSize::new(
                f64::from(INITIAL_WIDTH),
                f64::from(INITIAL_HEIGHT),
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| Error::Gpu(format!("create_window: {e}")))?,
        );

        self.scale_factor = window.scale_factor();
        self.size = window.inner_size();
        log(&format!(
            "window: {}x{} physical, scale {}",
            self.size.width, self.size.height, self.scale_factor
        ));

        let (gpu, surface, config) = GpuState::new(&window)?;
        let bind_layout = crate::gpu::pipeline::create_composite_bind_group_layout(&gpu.device);
        let pipeline =
            crate::gpu::pipeline::create_composite_pipeline(&gpu.device, gpu.render_format, &bind_layout);

        let (pw, ph) = (self.size.width, self.size.height);
        let compositor = UiCompositor::new(
            &gpu,
            &bind_layout,
            "main_ui",
            pw,
            ph,
            self.options.gpu_overlay,
            None,
        );
        let overlay_compositor =
            UiCompositor::new(&gpu, &bind_layout, "overlay_ui", pw, ph, false, None);
        let video_plane = VideoPlane::new(&gpu, &bind_layout, pw, ph);

        // Wire the accelerated-paint queue into the main view's sink.
        self.host
            .main
            .paint_sink()
            .set_shared_queue(compositor.shared_queue());

        // The engine believes scale is 1.0, so it is sized in physical
        // pixels and paints at native resolution.
        self.host.main.resize(pw, ph);
        self.host.overlay.resize(pw, ph);
        self.main_layer.set_window_size(pw, ph);
        self.overlay_layer.set_window_size(pw, ph);

        // Match the engine's paint rate to the display.
        if let Some(monitor) = window.current_monitor() {
            if let Some(mhz) = monitor.refresh_rate_millihertz() {
                self.host.config.windowless_frame_rate = (mhz / 1000).max(30);
                log(&format!(
                    "engine frame rate: {} Hz",
                    self.host.config.windowless_frame_rate
                ));
            }
        }

        // The render-thread decision comes from the platform caps.
        if let Some(source) = self.pending_video_source.take() {
            if gpu.caps.video_render_thread {
                self.video_ctl.start_threaded(source);
            } else {
                self.video_ctl.start_sync(source);
            }
            self.video_ctl.request_resize(pw, ph);
        }

        self.window = Some(window);
        self.surface = Some(surface);
        self.surface_config = Some(config);
        self.gpu = Some(gpu);
        self.pipeline = Some(pipeline);
        self.compositor = Some(compositor);
        self.overlay_compositor = Some(overlay_compositor);
        self.video_plane = Some(video_plane);
        Ok(())
    }

    /// Window resize: surface, compositors, video, engine views. Everything
    /// GPU-facing is physical pixels.
    pub(super) fn handle_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let resize_start = Instant::now();
        self.size = PhysicalSize::new(width, height);

        if let (Some(gpu), Some(surface), Some(config)) = (
            self.gpu.as_ref(),
            self.surface.as_ref(),
            self.surface_config.as_mut(),
        ) {
            gpu.resize_surface(surface, config, width, height);
        }
        if let (Some(gpu), Some(compositor)) = (self.gpu.as_ref(), self.compositor.as_mut()) {
            compositor.resize(gpu, width, height);
        }
        if let (Some(gpu), Some(overlay)) = (self.gpu.as_ref(), self.overlay_compositor.as_mut())
        {
            overlay.resize(gpu, width, height);
        }
        if let (Some(gpu), Some(plane)) = (self.gpu.as_ref(), self.video_plane.as_mut()) {
            plane.resize(gpu, width, height);
        }
        self.video_ctl.request_resize(width, height);
        self.video_needs_rerender = true;

        self.host.main.resize(width, height);
        self.host.overlay.resize(width, height);
        self.main_layer.set_window_size(width, height);
        self.overlay_layer.set_window_size(width, height);

        log(&format!(
            "resize: {width}x{height} ({:.1}ms)",
            resize_start.elapsed().as_secs_f64() * 1000.0
        ));
    }

    /// Display scale change: compositors re-size on the following Resized
    /// event; the engine just re-queries its screen info.
    pub(super) fn handle_scale_factor_changed(&mut self, scale_factor: f64) {
        log(&format!(
            "hidpi: scale {} -> {scale_factor}",
            self.scale_factor
        ));
        self.scale_factor = scale_factor;
        self.host.main.was_resized();
        self.host.overlay.was_resized();
    }

    /// The browser layer currently receiving input.
    pub(super) fn active_browser(&self) -> LayerId {
        if self.input_stack.contains(LayerId::MainBrowser) {
            LayerId::MainBrowser
        } else {
            LayerId::OverlayBrowser
        }
    }

    pub(super) fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn shutdown(&mut self) {
        log("shutdown");
        self.video_ctl.stop();
        self.mpv.stop();
        self.host.shutdown();
    }
}
