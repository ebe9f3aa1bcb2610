//! One off-screen web view: the command channel into the engine, the paint
//! double buffer its render threads write, and the delegate events the host
//! drains.
//!
//! Engine callbacks never call back into host state; they write pixels or
//! push values and the main thread picks both up on its next iteration.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};

use parking_lot::Mutex;

use super::ipc::IpcEnvelope;
use crate::cursor::CursorType;
use crate::gpu::shared_texture::{SharedTextureHandle, SharedTextureQueue};
use crate::input::Modifiers;
use crate::input::clipboard::PasteContent;
use crate::input::keymap::KeyTranslation;
use crate::menu::{MenuContinuation, MenuItem};

/// Commands posted into the engine. The engine's process model is
/// message-driven; every call into it is asynchronous.
#[derive(Debug)]
pub enum ViewCommand {
    LoadUrl(String),
    ExecuteJs(String),
    /// Resize the view. Sizes are in the engine's logical pixels, which the
    /// host keeps equal to physical pixels by reporting scale 1.0.
    Resize(u32, u32),
    /// Re-query screen info (scale change).
    WasResized,
    SetFocus(bool),
    MouseMove {
        x: i32,
        y: i32,
        mods: Modifiers,
    },
    MouseClick {
        x: i32,
        y: i32,
        button: crate::input::PointerButton,
        down: bool,
        click_count: u8,
        mods: Modifiers,
    },
    MouseWheel {
        x: i32,
        y: i32,
        dx: f32,
        dy: f32,
        mods: Modifiers,
    },
    Key {
        key: KeyTranslation,
        down: bool,
        mods: Modifiers,
    },
    Char {
        ch: char,
        mods: Modifiers,
    },
    Touch {
        id: u32,
        x: f32,
        y: f32,
        pressure: f64,
        kind: crate::input::TouchKind,
        mods: Modifiers,
    },
    Paste(PasteContent),
    Copy,
    Cut,
    SelectAll,
    Undo,
    Redo,
    /// Tell web content to leave fullscreen.
    ExitFullscreen,
    /// Probe `<url>/System/Info/Public` through the engine's network stack.
    ProbeServer(String),
    Close,
}

/// Events the engine raises towards the host.
#[derive(Debug)]
pub enum ViewEvent {
    Ipc(IpcEnvelope),
    CursorChanged(CursorType),
    /// Web content requested entering (true) or leaving fullscreen.
    FullscreenRequested(bool),
    Console {
        message: String,
        source: String,
        line: i32,
    },
    ContextMenu {
        x: i32,
        y: i32,
        items: Vec<MenuItem>,
        continuation: MenuContinuation,
    },
    /// Outcome of a [`ViewCommand::ProbeServer`] request. `final_url` is the
    /// post-redirect URL the probe ended on.
    ProbeResult {
        original_url: String,
        success: bool,
        final_url: String,
    },
}

struct PaintBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    dirty: bool,
}

impl PaintBuffer {
    fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            dirty: false,
        }
    }
}

#[derive(Default)]
struct PopupState {
    visible: bool,
    rect: (i32, i32, u32, u32),
    pixels: Vec<u8>,
}

/// Double-buffered paint target written by the engine's paint callbacks.
///
/// The writer fills the buffer at `write_idx` (holding only that buffer's
/// lock), marks it dirty, and flips the index; the reader drains the other
/// buffer. A popup (dropdown) paint is stored separately and alpha-blended
/// over the view frame before delivery, so the compositor only ever sees
/// one buffer.
pub struct PaintSink {
    buffers: [Mutex<PaintBuffer>; 2],
    write_idx: AtomicUsize,
    /// Last raw view frame, kept for popup recomposition.
    view_frame: Mutex<PaintBuffer>,
    popup: Mutex<PopupState>,
    shared_queue: Mutex<Option<Arc<SharedTextureQueue>>>,
}

impl PaintSink {
    pub fn new() -> Self {
        Self {
            buffers: [
                Mutex::new(PaintBuffer::empty()),
                Mutex::new(PaintBuffer::empty()),
            ],
            write_idx: AtomicUsize::new(0),
            view_frame: Mutex::new(PaintBuffer::empty()),
            popup: Mutex::new(PopupState::default()),
            shared_queue: Mutex::new(None),
        }
    }

    /// Wire the compositor's shared-texture queue for the accelerated path.
    pub fn set_shared_queue(&self, queue: Arc<SharedTextureQueue>) {
        *self.shared_queue.lock() = Some(queue);
    }

    /// Engine paint callback: a BGRA frame for the view. Any thread.
    pub fn paint(&self, buffer: &[u8], width: u32, height: u32) {
        {
            let mut view = self.view_frame.lock();
            copy_frame(&mut view, buffer, width, height);
        }
        self.deliver();
    }

    /// Engine popup paint: the dropdown's own little buffer.
    pub fn popup_paint(&self, buffer: &[u8], width: u32, height: u32) {
        let size = (width * height * 4) as usize;
        if buffer.len() < size {
            return;
        }
        {
            let mut popup = self.popup.lock();
            popup.rect.2 = width;
            popup.rect.3 = height;
            popup.pixels.clear();
            popup.pixels.extend_from_slice(&buffer[..size]);
        }
        // Recomposite the stored view frame under the new popup pixels.
        self.deliver();
    }

    pub fn popup_show(&self, visible: bool) {
        {
            let mut popup = self.popup.lock();
            popup.visible = visible;
            if !visible {
                popup.pixels.clear();
            }
        }
        self.deliver();
    }

    pub fn popup_rect(&self, x: i32, y: i32, width: u32, height: u32) {
        self.popup.lock().rect = (x, y, width, height);
    }

    /// Engine accelerated-paint callback: a duplicated DMA-BUF handle.
    pub fn accelerated_paint(&self, handle: SharedTextureHandle) {
        if let Some(queue) = self.shared_queue.lock().as_ref() {
            queue.push(handle);
        }
        // No queue wired: the handle drops here and its fd closes.
    }

    /// Compose view (+ popup) into the current write buffer and flip.
    fn deliver(&self) {
        let view = self.view_frame.lock();
        if view.width == 0 || view.height == 0 {
            return;
        }
        let write = self.write_idx.load(Ordering::Relaxed);
        {
            let mut buf = self.buffers[write].lock();
            copy_frame(&mut buf, &view.data, view.width, view.height);

            let popup = self.popup.lock();
            // Fast path: no popup, the frame passes through untouched.
            if popup.visible && !popup.pixels.is_empty() {
                blend_popup(&mut buf, &popup);
            }
            buf.dirty = true;
        }
        self.write_idx.store(1 - write, Ordering::Release);
    }

    /// Main thread: hand the most recent dirty frame to `f`. Size-gated by
    /// the caller (the compositor drops stale dimensions).
    pub fn flush(&self, mut f: impl FnMut(&[u8], u32, u32)) -> bool {
        let read = 1 - self.write_idx.load(Ordering::Acquire);
        let mut buf = self.buffers[read].lock();
        if !buf.dirty || buf.data.is_empty() {
            return false;
        }
        f(&buf.data, buf.width, buf.height);
        buf.dirty = false;
        true
    }

    /// Re-deliver the last view frame (e.g. after the menu closed so the
    /// compositor can refresh without waiting for the engine).
    pub fn redeliver(&self) {
        self.deliver();
    }

    /// True when a delivered frame awaits `flush`.
    pub fn has_pending(&self) -> bool {
        let read = 1 - self.write_idx.load(Ordering::Acquire);
        self.buffers[read].lock().dirty
    }
}

impl Default for PaintSink {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_frame(buf: &mut PaintBuffer, data: &[u8], width: u32, height: u32) {
    let size = (width * height * 4) as usize;
    if data.len() < size {
        return;
    }
    buf.data.clear();
    buf.data.extend_from_slice(&data[..size]);
    buf.width = width;
    buf.height = height;
}

fn blend_popup(buf: &mut PaintBuffer, popup: &PopupState) {
    let (px, py, pw, ph) = popup.rect;
    let (bw, bh) = (buf.width as i32, buf.height as i32);
    for y in 0..ph as i32 {
        let dy = py + y;
        if dy < 0 || dy >= bh {
            continue;
        }
        for x in 0..pw as i32 {
            let dx = px + x;
            if dx < 0 || dx >= bw {
                continue;
            }
            let src = ((y * pw as i32 + x) * 4) as usize;
            if src + 3 >= popup.pixels.len() {
                continue;
            }
            let dst = ((dy * bw + dx) * 4) as usize;
            let alpha = popup.pixels[src + 3] as u32;
            if alpha == 255 {
                buf.data[dst..dst + 4].copy_from_slice(&popup.pixels[src..src + 4]);
            } else if alpha > 0 {
                let inv = 255 - alpha;
                for c in 0..3 {
                    buf.data[dst + c] = ((popup.pixels[src + c] as u32 * alpha
                        + buf.data[dst + c] as u32 * inv)
                        / 255) as u8;
                }
            }
        }
    }
}

/// Queue of delegate events pushed from engine threads.
#[derive(Default)]
pub struct ViewEventQueue {
    events: Mutex<VecDeque<ViewEvent>>,
}

impl ViewEventQueue {
    pub fn push(&self, event: ViewEvent) {
        self.events.lock().push_back(event);
    }

    pub fn drain(&self) -> Vec<ViewEvent> {
        self.events.lock().drain(..).collect()
    }
}

/// Host-side handle to one engine view.
pub struct WebView {
    label: &'static str,
    commands: Sender<ViewCommand>,
    paint: Arc<PaintSink>,
    events: Arc<ViewEventQueue>,
    size: Mutex<(u32, u32)>,
}

/// Engine-side endpoints for the same view, handed to the platform glue (or
/// to tests).
pub struct ViewDriver {
    pub commands: Receiver<ViewCommand>,
    pub paint: Arc<PaintSink>,
    pub events: Arc<ViewEventQueue>,
}

impl WebView {
    pub fn new(label: &'static str, width: u32, height: u32) -> (Self, ViewDriver) {
        let (tx, rx) = channel();
        let paint = Arc::new(PaintSink::new());
        let events = Arc::new(ViewEventQueue::default());
        let view = Self {
            label,
            commands: tx,
            paint: paint.clone(),
            events: events.clone(),
            size: Mutex::new((width, height)),
        };
        let driver = ViewDriver {
            commands: rx,
            paint,
            events,
        };
        (view, driver)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn paint_sink(&self) -> &Arc<PaintSink> {
        &self.paint
    }

    /// Drain pending delegate events.
    pub fn drain_events(&self) -> Vec<ViewEvent> {
        self.events.drain()
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    fn send(&self, command: ViewCommand) {
        // A disconnected receiver means the engine is gone; commands are
        // dropped during shutdown.
        let _ = self.commands.send(command);
    }

    pub fn load_url(&self, url: &str) {
        self.send(ViewCommand::LoadUrl(url.to_owned()));
    }

    pub fn execute_js(&self, code: &str) {
        self.send(ViewCommand::ExecuteJs(code.to_owned()));
    }

    pub fn resize(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
        self.send(ViewCommand::Resize(width, height));
    }

    pub fn was_resized(&self) {
        self.send(ViewCommand::WasResized);
    }

    pub fn set_focus(&self, focused: bool) {
        self.send(ViewCommand::SetFocus(focused));
    }

    pub fn exit_fullscreen(&self) {
        self.send(ViewCommand::ExitFullscreen);
    }

    pub fn probe_server(&self, url: &str) {
        self.send(ViewCommand::ProbeServer(url.to_owned()));
    }

    pub fn close(&self) {
        self.send(ViewCommand::Close);
    }

    pub fn send_mouse_move(&self, x: i32, y: i32, mods: Modifiers) {
        self.send(ViewCommand::MouseMove { x, y, mods });
    }

    pub fn send_mouse_click(
        &self,
        x: i32,
        y: i32,
        button: crate::input::PointerButton,
        down: bool,
        click_count: u8,
        mods: Modifiers,
    ) {
        self.send(ViewCommand::MouseClick {
            x,
            y,
            button,
            down,
            click_count,
            mods,
        });
    }

    pub fn send_mouse_wheel(&self, x: i32, y: i32, dx: f32, dy: f32, mods: Modifiers) {
        self.send(ViewCommand::MouseWheel { x, y, dx, dy, mods });
    }

    pub fn send_key(&self, key: KeyTranslation, down: bool, mods: Modifiers) {
        self.send(ViewCommand::Key { key, down, mods });
    }

    pub fn send_char(&self, ch: char, mods: Modifiers) {
        self.send(ViewCommand::Char { ch, mods });
    }

    pub fn send_touch(
        &self,
        id: u32,
        x: f32,
        y: f32,
        pressure: f64,
        kind: crate::input::TouchKind,
        mods: Modifiers,
    ) {
        self.send(ViewCommand::Touch {
            id,
            x,
            y,
            pressure,
            kind,
            mods,
        });
    }

    pub fn paste(&self, content: PasteContent) {
        self.send(ViewCommand::Paste(content));
    }

    pub fn copy(&self) {
        self.send(ViewCommand::Copy);
    }

    pub fn cut(&self) {
        self.send(ViewCommand::Cut);
    }

    pub fn select_all(&self) {
        self.send(ViewCommand::SelectAll);
    }

    pub fn undo(&self) {
        self.send(ViewCommand::Undo);
    }

    pub fn redo(&self) {
        self.send(ViewCommand::Redo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, value: u8) -> Vec<u8> {
        vec![value; (w * h * 4) as usize]
    }

    #[test]
    fn paint_flip_makes_frame_readable() {
        let sink = PaintSink::new();
        sink.paint(&solid(4, 4, 7), 4, 4);

        let mut seen = None;
        assert!(sink.flush(|data, w, h| {
            seen = Some((data[0], w, h));
        }));
        assert_eq!(seen, Some((7, 4, 4)));
        // Second flush without a new paint delivers nothing.
        assert!(!sink.flush(|_, _, _| panic!("no frame expected")));
    }

    #[test]
    fn newer_frame_wins() {
        let sink = PaintSink::new();
        sink.paint(&solid(2, 2, 1), 2, 2);
        sink.paint(&solid(2, 2, 9), 2, 2);
        let mut value = 0;
        while sink.flush(|data, _, _| value = data[0]) {}
        assert_eq!(value, 9);
    }

    #[test]
    fn popup_blends_over_view() {
        let sink = PaintSink::new();
        sink.popup_rect(1, 1, 1, 1);
        sink.popup_show(true);
        // Opaque red popup pixel (BGRA).
        sink.popup_paint(&[0, 0, 255, 255], 1, 1);
        sink.paint(&solid(4, 4, 0), 4, 4);

        let mut frame = Vec::new();
        let mut dims = (0, 0);
        sink.flush(|data, w, h| {
            frame = data.to_vec();
            dims = (w, h);
        });
        assert_eq!(dims, (4, 4));
        // Pixel (1,1) of the 4-wide frame.
        let idx = (4 + 1) * 4;
        assert_eq!(&frame[idx..idx + 4], &[0, 0, 255, 255]);
        // A pixel outside the popup is untouched.
        assert_eq!(&frame[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn popup_hide_restores_clean_frames() {
        let sink = PaintSink::new();
        sink.paint(&solid(2, 2, 3), 2, 2);
        sink.popup_rect(0, 0, 1, 1);
        sink.popup_show(true);
        sink.popup_paint(&[9, 9, 9, 255], 1, 1);
        sink.popup_show(false);

        let mut first = 0;
        while sink.flush(|data, _, _| first = data[0]) {}
        assert_eq!(first, 3);
    }

    #[test]
    fn view_commands_arrive_in_order() {
        let (view, driver) = WebView::new("test", 100, 100);
        view.load_url("about:blank");
        view.set_focus(true);
        view.close();

        assert!(matches!(
            driver.commands.try_recv(),
            Ok(ViewCommand::LoadUrl(url)) if url == "about:blank"
        ));
        assert!(matches!(
            driver.commands.try_recv(),
            Ok(ViewCommand::SetFocus(true))
        ));
        assert!(matches!(driver.commands.try_recv(), Ok(ViewCommand::Close)));
    }

    #[test]
    fn delegate_events_drain_fifo() {
        let (view, driver) = WebView::new("test", 10, 10);
        driver.events.push(ViewEvent::CursorChanged(
            crate::cursor::CursorType::Hand,
        ));
        driver.events.push(ViewEvent::FullscreenRequested(true));
        let events = view.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ViewEvent::CursorChanged(_)));
        assert!(matches!(events[1], ViewEvent::FullscreenRequested(true)));
    }
}
