//! Safe wrapper over the video engine's C API: option setup, commands,
//! property observation, and the event drain.
//!
//! The engine invokes its wakeup and redraw callbacks from internal
//! threads; both only flip atomics and poke a waker. All state lives with
//! the caller, which drains [`process_events`](Mpv::process_events) on the
//! main thread once per frame.

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::ffi;
use crate::error::Error;
use crate::gpu::video::VideoFrameSource;
use crate::log;

/// One buffered seekable range, in 100 ns ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferedRange {
    pub start: i64,
    pub end: i64,
}

/// Why playback of the current file ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Eof,
    Stop,
    Quit,
    Error(String),
    Other,
}

/// Raw engine events, one enum value per observed property or event.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// `playback-time`, in milliseconds. Unfiltered.
    Position(f64),
    /// `duration`, in milliseconds.
    Duration(f64),
    /// `pause` property.
    Pause(bool),
    /// `seeking` property.
    Seeking(bool),
    /// `paused-for-cache` property.
    PausedForCache(bool),
    /// `core-idle` property.
    CoreIdle(bool),
    /// `eof-reached` property.
    EofReached(bool),
    /// Playback of a new file has begun (demuxer opened).
    FileStarted,
    /// First frames are decodable; playback is running.
    FileLoaded,
    /// The current file ended.
    EndFile(EndReason),
    /// Buffered seekable ranges from the demuxer cache.
    BufferedRanges(Vec<BufferedRange>),
    Log {
        prefix: String,
        text: String,
    },
}

struct WakeState {
    has_events: AtomicBool,
    waker: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

unsafe extern "C" fn on_wakeup(ctx: *mut c_void) {
    let state = unsafe { &*ctx.cast::<WakeState>() };
    state.has_events.store(true, Ordering::Release);
    if let Some(waker) = state.waker.lock().as_ref() {
        waker();
    }
}

pub struct Mpv {
    handle: *mut ffi::mpv_handle,
    wake: Arc<WakeState>,
}

// The engine's client API is thread-safe; the handle may be used from the
// render thread for property access while the main thread drains events.
unsafe impl Send for Mpv {}

fn cstr(s: &str) -> CString {
    CString::new(s).unwrap_or_default()
}

impl Mpv {
    pub fn new() -> Result<Self, Error> {
        let handle = unsafe { ffi::mpv_create() };
        if handle.is_null() {
            return Err(Error::Player("mpv_create failed".into()));
        }

        let mpv = Self {
            handle,
            wake: Arc::new(WakeState {
                has_events: AtomicBool::new(false),
                waker: Mutex::new(None),
            }),
        };

        mpv.set_option("vo", "libmpv");
        mpv.set_option("hwdec", "auto-safe");
        mpv.set_option("keep-open", "yes");
        mpv.set_option("terminal", "no");
        mpv.set_option("video-sync", "audio");
        mpv.set_option("interpolation", "no");
        mpv.set_option("audio-client-name", "jellyfin-desktop");

        let rc = unsafe { ffi::mpv_initialize(mpv.handle) };
        if rc < 0 {
            return Err(Error::Player(format!(
                "mpv_initialize failed: {}",
                error_string(rc)
            )));
        }

        for (name, format) in [
            ("playback-time", ffi::MPV_FORMAT_DOUBLE),
            ("duration", ffi::MPV_FORMAT_DOUBLE),
            ("pause", ffi::MPV_FORMAT_FLAG),
            ("seeking", ffi::MPV_FORMAT_FLAG),
            ("paused-for-cache", ffi::MPV_FORMAT_FLAG),
            ("core-idle", ffi::MPV_FORMAT_FLAG),
            ("eof-reached", ffi::MPV_FORMAT_FLAG),
            ("demuxer-cache-state", ffi::MPV_FORMAT_NODE),
        ] {
            let name = cstr(name);
            unsafe {
                ffi::mpv_observe_property(mpv.handle, 0, name.as_ptr(), format);
            }
        }
        unsafe {
            let level = cstr("warn");
            ffi::mpv_request_log_messages(mpv.handle, level.as_ptr());
            ffi::mpv_set_wakeup_callback(
                mpv.handle,
                Some(on_wakeup),
                Arc::as_ptr(&mpv.wake) as *mut c_void,
            );
        }

        log("mpv: initialized");
        Ok(mpv)
    }

    /// Install the waker the wakeup callback pokes (used to rouse the frame
    /// loop from its idle wait).
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.wake.waker.lock() = Some(Box::new(waker));
    }

    fn set_option(&self, name: &str, value: &str) {
        let name = cstr(name);
        let value = cstr(value);
        unsafe {
            ffi::mpv_set_option_string(self.handle, name.as_ptr(), value.as_ptr());
        }
    }

    fn set_property_flag(&self, name: &str, value: bool) {
        let name = cstr(name);
        let mut flag: c_int = i32::from(value);
        unsafe {
            ffi::mpv_set_property(
                self.handle,
                name.as_ptr(),
                ffi::MPV_FORMAT_FLAG,
                (&raw mut flag).cast(),
            );
        }
    }

    fn set_property_double(&self, name: &str, value: f64) {
        let name = cstr(name);
        let mut v = value;
        unsafe {
            ffi::mpv_set_property(
                self.handle,
                name.as_ptr(),
                ffi::MPV_FORMAT_DOUBLE,
                (&raw mut v).cast(),
            );
        }
    }

    fn set_property_int(&self, name: &str, value: i64) {
        let name = cstr(name);
        let mut v = value;
        unsafe {
            ffi::mpv_set_property(
                self.handle,
                name.as_ptr(),
                ffi::MPV_FORMAT_INT64,
                (&raw mut v).cast(),
            );
        }
    }

    fn set_property_str(&self, name: &str, value: &str) {
        let name = cstr(name);
        let value = cstr(value);
        unsafe {
            ffi::mpv_set_property_string(self.handle, name.as_ptr(), value.as_ptr());
        }
    }

    fn command(&self, args: &[&str]) -> Result<(), Error> {
        let owned: Vec<CString> = args.iter().map(|a| cstr(a)).collect();
        let mut ptrs: Vec<*const c_char> = owned.iter().map(|c| c.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        let rc = unsafe { ffi::mpv_command(self.handle, ptrs.as_mut_ptr()) };
        if rc < 0 {
            return Err(Error::Player(format!(
                "mpv {:?}: {}",
                args.first().copied().unwrap_or(""),
                error_string(rc)
            )));
        }
        Ok(())
    }

    /// Load a URL, optionally starting at an offset. Asynchronous; outcome
    /// arrives through events.
    pub fn load_file(&self, url: &str, start_seconds: f64) -> Result<(), Error> {
        if start_seconds > 0.0 {
            self.set_option("start", &format!("{start_seconds}"));
        } else {
            self.set_option("start", "0");
        }
        self.command(&["loadfile", url])
    }

    pub fn stop(&self) {
        let _ = self.command(&["stop"]);
    }

    pub fn pause(&self) {
        self.set_property_flag("pause", true);
    }

    pub fn play(&self) {
        self.set_property_flag("pause", false);
    }

    pub fn seek_absolute(&self, seconds: f64) {
        let _ = self.command(&["seek", &format!("{seconds}"), "absolute"]);
    }

    pub fn set_volume(&self, volume: i32) {
        self.set_property_double("volume", f64::from(volume));
    }

    pub fn set_muted(&self, muted: bool) {
        self.set_property_flag("mute", muted);
    }

    pub fn set_speed(&self, speed: f64) {
        self.set_property_double("speed", speed);
    }

    pub fn set_audio_delay(&self, seconds: f64) {
        self.set_property_double("audio-delay", seconds);
    }

    /// Select a subtitle track; negative disables.
    pub fn set_subtitle_track(&self, id: i32) {
        if id < 0 {
            self.set_property_str("sid", "no");
        } else {
            self.set_property_int("sid", i64::from(id));
        }
    }

    /// Select an audio track; negative disables.
    pub fn set_audio_track(&self, id: i32) {
        if id < 0 {
            self.set_property_str("aid", "no");
        } else {
            self.set_property_int("aid", i64::from(id));
        }
    }

    /// ReplayGain-style normalisation through an audio filter; 0 dB clears.
    pub fn set_normalization_gain(&self, gain_db: f64) {
        if gain_db.abs() < f64::EPSILON {
            self.set_property_str("af", "");
        } else {
            self.set_property_str("af", &format!("lavfi=[volume={gain_db:.2}dB]"));
        }
    }

    pub fn is_paused(&self) -> bool {
        let name = cstr("pause");
        let mut flag: c_int = 0;
        unsafe {
            ffi::mpv_get_property(
                self.handle,
                name.as_ptr(),
                ffi::MPV_FORMAT_FLAG,
                (&raw mut flag).cast(),
            );
        }
        flag != 0
    }

    /// Drain pending engine events. Cheap no-op when the wakeup flag is
    /// clear.
    pub fn process_events(&self) -> Vec<PlayerEvent> {
        if !self.wake.has_events.swap(false, Ordering::AcqRel) {
            return Vec::new();
        }
        let mut events = Vec::new();
        loop {
            let event = unsafe { ffi::mpv_wait_event(self.handle, 0.0) };
            let id = unsafe { (*event).event_id };
            if id == ffi::MPV_EVENT_NONE {
                break;
            }
            if let Some(parsed) = unsafe { translate_event(&*event) } {
                events.push(parsed);
            }
        }
        events
    }

    pub(super) fn raw_handle(&self) -> *mut ffi::mpv_handle {
        self.handle
    }
}

impl Drop for Mpv {
    fn drop(&mut self) {
        unsafe {
            // Detach the callback before the wake state can go away.
            ffi::mpv_set_wakeup_callback(self.handle, None, std::ptr::null_mut());
            ffi::mpv_terminate_destroy(self.handle);
        }
    }
}

fn error_string(rc: c_int) -> String {
    unsafe {
        let ptr = ffi::mpv_error_string(rc);
        if ptr.is_null() {
            format!("error {rc}")
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }
}

unsafe fn c_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

unsafe fn translate_event(event: &ffi::mpv_event) -> Option<PlayerEvent> {
    match event.event_id {
        ffi::MPV_EVENT_PROPERTY_CHANGE => {
            let prop = unsafe { &*event.data.cast::<ffi::mpv_event_property>() };
            let name = unsafe { c_to_string(prop.name) };
            translate_property(&name, prop)
        }
        ffi::MPV_EVENT_START_FILE => Some(PlayerEvent::FileStarted),
        ffi::MPV_EVENT_FILE_LOADED => Some(PlayerEvent::FileLoaded),
        ffi::MPV_EVENT_END_FILE => {
            let end = unsafe { &*event.data.cast::<ffi::mpv_event_end_file>() };
            let reason = match end.reason {
                ffi::MPV_END_FILE_REASON_EOF => EndReason::Eof,
                ffi::MPV_END_FILE_REASON_STOP => EndReason::Stop,
                ffi::MPV_END_FILE_REASON_QUIT => EndReason::Quit,
                ffi::MPV_END_FILE_REASON_ERROR => EndReason::Error(error_string(end.error)),
                _ => EndReason::Other,
            };
            Some(PlayerEvent::EndFile(reason))
        }
        ffi::MPV_EVENT_LOG_MESSAGE => {
            let msg = unsafe { &*event.data.cast::<ffi::mpv_event_log_message>() };
            let mut text = unsafe { c_to_string(msg.text) };
            while text.ends_with('\n') {
                text.pop();
            }
            Some(PlayerEvent::Log {
                prefix: unsafe { c_to_string(msg.prefix) },
                text,
            })
        }
        _ => None,
    }
}

fn translate_property(name: &str, prop: &ffi::mpv_event_property) -> Option<PlayerEvent> {
    unsafe {
        match (name, prop.format) {
            ("playback-time", ffi::MPV_FORMAT_DOUBLE) => Some(PlayerEvent::Position(
                *prop.data.cast::<f64>() * 1000.0,
            )),
            ("duration", ffi::MPV_FORMAT_DOUBLE) => {
                Some(PlayerEvent::Duration(*prop.data.cast::<f64>() * 1000.0))
            }
            ("pause", ffi::MPV_FORMAT_FLAG) => {
                Some(PlayerEvent::Pause(*prop.data.cast::<c_int>() != 0))
            }
            ("seeking", ffi::MPV_FORMAT_FLAG) => {
                Some(PlayerEvent::Seeking(*prop.data.cast::<c_int>() != 0))
            }
            ("paused-for-cache", ffi::MPV_FORMAT_FLAG) => Some(PlayerEvent::PausedForCache(
                *prop.data.cast::<c_int>() != 0,
            )),
            ("core-idle", ffi::MPV_FORMAT_FLAG) => {
                Some(PlayerEvent::CoreIdle(*prop.data.cast::<c_int>() != 0))
            }
            ("eof-reached", ffi::MPV_FORMAT_FLAG) => {
                Some(PlayerEvent::EofReached(*prop.data.cast::<c_int>() != 0))
            }
            ("demuxer-cache-state", ffi::MPV_FORMAT_NODE) => {
                let node = prop.data.cast::<ffi::mpv_node>();
                Some(PlayerEvent::BufferedRanges(parse_seekable_ranges(node)))
            }
            _ => None,
        }
    }
}

/// Walk `demuxer-cache-state` for `seekable-ranges: [{start, end}, …]`,
/// converting seconds to 100 ns ticks.
unsafe fn parse_seekable_ranges(node: *const ffi::mpv_node) -> Vec<BufferedRange> {
    let mut ranges = Vec::new();
    unsafe {
        if node.is_null() || (*node).format != ffi::MPV_FORMAT_NODE_MAP {
            return ranges;
        }
        let map = (*node).u.list;
        for i in 0..(*map).num as isize {
            let key = c_to_string(*(*map).keys.offset(i));
            if key != "seekable-ranges" {
                continue;
            }
            let arr = (*map).values.offset(i);
            if (*arr).format != ffi::MPV_FORMAT_NODE_ARRAY {
                break;
            }
            let list = (*arr).u.list;
            for j in 0..(*list).num as isize {
                let range = (*list).values.offset(j);
                if (*range).format != ffi::MPV_FORMAT_NODE_MAP {
                    continue;
                }
                let fields = (*range).u.list;
                let (mut start, mut end) = (0.0f64, 0.0f64);
                for k in 0..(*fields).num as isize {
                    let field = c_to_string(*(*fields).keys.offset(k));
                    let value = (*fields).values.offset(k);
                    if (*value).format == ffi::MPV_FORMAT_DOUBLE {
                        match field.as_str() {
                            "start" => start = (*value).u.double_,
                            "end" => end = (*value).u.double_,
                            _ => {}
                        }
                    }
                }
                ranges.push(BufferedRange {
                    start: (start * 10_000_000.0) as i64,
                    end: (end * 10_000_000.0) as i64,
                });
            }
            break;
        }
    }
    ranges
}

struct RedrawState {
    waker: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

unsafe extern "C" fn on_redraw(ctx: *mut c_void) {
    let state = unsafe { &*ctx.cast::<RedrawState>() };
    if let Some(waker) = state.waker.lock().as_ref() {
        waker();
    }
}

/// The engine's render context, driving frames through the software render
/// API into CPU memory for upload.
pub struct RenderContext {
    ctx: *mut ffi::mpv_render_context,
    handle: *mut ffi::mpv_handle,
    redraw: Arc<RedrawState>,
}

unsafe impl Send for RenderContext {}

impl RenderContext {
    pub fn new(mpv: &Mpv, frame_waker: impl Fn() + Send + Sync + 'static) -> Result<Self, Error> {
        let mut advanced: c_int = 1;
        let mut params = [
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_API_TYPE,
                data: ffi::MPV_RENDER_API_TYPE_SW.as_ptr() as *mut c_void,
            },
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_ADVANCED_CONTROL,
                data: (&raw mut advanced).cast(),
            },
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_INVALID,
                data: std::ptr::null_mut(),
            },
        ];

        let mut ctx: *mut ffi::mpv_render_context = std::ptr::null_mut();
        let rc = unsafe {
            ffi::mpv_render_context_create(&raw mut ctx, mpv.raw_handle(), params.as_mut_ptr())
        };
        if rc < 0 {
            return Err(Error::Player(format!(
                "mpv_render_context_create failed: {}",
                error_string(rc)
            )));
        }

        let redraw = Arc::new(RedrawState {
            waker: Mutex::new(Some(Box::new(frame_waker) as Box<dyn Fn() + Send + Sync>)),
        });
        unsafe {
            ffi::mpv_render_context_set_update_callback(
                ctx,
                Some(on_redraw),
                Arc::as_ptr(&redraw) as *mut c_void,
            );
        }

        log("mpv: software render context created");
        Ok(Self {
            ctx,
            handle: mpv.raw_handle(),
            redraw,
        })
    }
}

impl VideoFrameSource for RenderContext {
    fn has_frame(&mut self) -> bool {
        let flags = unsafe { ffi::mpv_render_context_update(self.ctx) };
        flags & ffi::MPV_RENDER_UPDATE_FRAME != 0
    }

    fn render(&mut self, width: u32, height: u32, out: &mut Vec<u8>) -> bool {
        out.resize((width * height * 4) as usize, 0);
        let mut size: [c_int; 2] = [width as c_int, height as c_int];
        let format = b"bgr0\0";
        let mut stride: usize = (width * 4) as usize;
        let mut params = [
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_SW_SIZE,
                data: size.as_mut_ptr().cast(),
            },
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_SW_FORMAT,
                data: format.as_ptr() as *mut c_void,
            },
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_SW_STRIDE,
                data: (&raw mut stride).cast(),
            },
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_SW_POINTER,
                data: out.as_mut_ptr().cast(),
            },
            ffi::mpv_render_param {
                type_: ffi::MPV_RENDER_PARAM_INVALID,
                data: std::ptr::null_mut(),
            },
        ];
        unsafe { ffi::mpv_render_context_render(self.ctx, params.as_mut_ptr()) >= 0 }
    }

    fn set_colorspace(&mut self, hdr: bool) {
        // Output targets for HDR passthrough; the engine tone-maps when the
        // surface is SDR.
        let set = |name: &str, value: &str| {
            let name = cstr(name);
            let value = cstr(value);
            unsafe {
                ffi::mpv_set_property_string(self.handle, name.as_ptr(), value.as_ptr());
            }
        };
        if hdr {
            set("target-prim", "bt.2020");
            set("target-trc", "pq");
            set("target-colorspace-hint", "yes");
            set("tone-mapping", "clip");
            let name = cstr("target-peak");
            let mut peak: f64 = 1000.0;
            unsafe {
                ffi::mpv_set_property(
                    self.handle,
                    name.as_ptr(),
                    ffi::MPV_FORMAT_DOUBLE,
                    (&raw mut peak).cast(),
                );
            }
            log("mpv: HDR output enabled (bt.2020/pq, 1000 nits)");
        } else {
            set("target-prim", "auto");
            set("target-trc", "auto");
            set("target-colorspace-hint", "no");
        }
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        *self.redraw.waker.lock() = None;
        unsafe {
            ffi::mpv_render_context_set_update_callback(self.ctx, None, std::ptr::null_mut());
            ffi::mpv_render_context_free(self.ctx);
        }
    }
}
