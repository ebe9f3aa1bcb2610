//! Video presentation: the plane the video engine's frames land on and the
//! render controller that produces them.
//!
//! Where the platform configuration allows it, a dedicated render thread
//! waits on a condition variable for frame-ready notifications from the
//! engine and renders into a CPU frame the main thread uploads. Platforms
//! without shareable contexts run the same step synchronously inside the
//! frame loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::pipeline::UNIFORM_SIZE;
use super::state::GpuState;
use crate::log;

/// Source of rendered video frames — the engine's render context.
pub trait VideoFrameSource: Send {
    /// True when the engine has a new frame to render.
    fn has_frame(&mut self) -> bool;
    /// Render the current frame at the given size into `out` (BGRA, tightly
    /// packed). Returns false when the engine produced nothing.
    fn render(&mut self, width: u32, height: u32, out: &mut Vec<u8>) -> bool;
    /// Apply output colourspace targets (BT.2020/PQ when `hdr`).
    fn set_colorspace(&mut self, hdr: bool);
}

/// Latest rendered frame, published by the render step.
#[derive(Default)]
struct VideoFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    dirty: bool,
}

struct ControllerShared {
    running: AtomicBool,
    active: AtomicBool,
    width: AtomicU32,
    height: AtomicU32,
    frame_notified: AtomicBool,
    resize_pending: AtomicBool,
    colorspace_pending: AtomicBool,
    colorspace_hdr: AtomicBool,
    /// Latches true once the first frame rendered; cleared on stop.
    video_ready: AtomicBool,
    frame: Mutex<VideoFrame>,
    cv: Condvar,
    cv_mutex: Mutex<()>,
}

/// Drives the engine's render context, threaded or synchronously.
pub struct VideoRenderController {
    shared: Arc<ControllerShared>,
    thread: Option<JoinHandle<()>>,
    /// Render source in sync mode; the thread owns it in threaded mode.
    sync_source: Option<Box<dyn VideoFrameSource>>,
}

impl VideoRenderController {
    /// Create an idle controller. The frame waker can be wired into the
    /// engine's redraw callback before a source is attached with
    /// [`start_threaded`](Self::start_threaded) or
    /// [`start_sync`](Self::start_sync).
    pub fn new() -> Self {
        let shared = Arc::new(ControllerShared {
            running: AtomicBool::new(true),
            active: AtomicBool::new(false),
            width: AtomicU32::new(0),
            height: AtomicU32::new(0),
            frame_notified: AtomicBool::new(false),
            resize_pending: AtomicBool::new(false),
            colorspace_pending: AtomicBool::new(false),
            colorspace_hdr: AtomicBool::new(false),
            video_ready: AtomicBool::new(false),
            frame: Mutex::new(VideoFrame::default()),
            cv: Condvar::new(),
            cv_mutex: Mutex::new(()),
        });
        Self {
            shared,
            thread: None,
            sync_source: None,
        }
    }

    /// Threaded mode: a worker renders whenever the engine signals a frame.
    pub fn start_threaded(&mut self, mut source: Box<dyn VideoFrameSource>) {
        let worker = self.shared.clone();
        let thread = std::thread::Builder::new()
            .name("video-render".into())
            .spawn(move || {
                while worker.running.load(Ordering::Acquire) {
                    if worker.colorspace_pending.swap(false, Ordering::AcqRel) {
                        source.set_colorspace(worker.colorspace_hdr.load(Ordering::Acquire));
                    }
                    worker.resize_pending.store(false, Ordering::Release);
                    worker.frame_notified.store(false, Ordering::Release);

                    if worker.active.load(Ordering::Acquire) {
                        let w = worker.width.load(Ordering::Acquire);
                        let h = worker.height.load(Ordering::Acquire);
                        if w > 0 && h > 0 && source.has_frame() {
                            render_into(&worker, source.as_mut(), w, h);
                        }
                    }

                    // Wait for work: frame ready, resize, colourspace, or
                    // shutdown. Timeout as a shutdown backstop.
                    let mut guard = worker.cv_mutex.lock();
                    if !(worker.frame_notified.load(Ordering::Acquire)
                        || worker.resize_pending.load(Ordering::Acquire)
                        || worker.colorspace_pending.load(Ordering::Acquire)
                        || !worker.running.load(Ordering::Acquire))
                    {
                        let _ = worker
                            .cv
                            .wait_for(&mut guard, Duration::from_millis(100));
                    }
                }
            })
            .expect("spawn video render thread");
        self.thread = Some(thread);
        log("video: render thread started (threaded mode)");
    }

    /// Sync mode: rendering happens on the caller's thread inside `render`.
    pub fn start_sync(&mut self, source: Box<dyn VideoFrameSource>) {
        self.sync_source = Some(source);
        log("video: render controller started (sync mode)");
    }

    /// Engine redraw callback target; wakes the worker. Any thread.
    pub fn notify_frame(&self) {
        self.shared.frame_notified.store(true, Ordering::Release);
        self.shared.cv.notify_one();
    }

    /// A handle the engine wrapper can keep for its redraw callback.
    pub fn frame_waker(&self) -> impl Fn() + Send + Sync + 'static {
        let shared = self.shared.clone();
        move || {
            shared.frame_notified.store(true, Ordering::Release);
            shared.cv.notify_one();
        }
    }

    /// Whether a video is currently expected to produce frames.
    pub fn set_active(&self, active: bool) {
        self.shared.active.store(active, Ordering::Release);
        if !active {
            self.shared.video_ready.store(false, Ordering::Release);
        }
        self.shared.cv.notify_one();
    }

    /// Latches true once the first frame has rendered since activation.
    pub fn video_ready(&self) -> bool {
        self.shared.video_ready.load(Ordering::Acquire)
    }

    /// Per-frame render request at the target size.
    pub fn render(&mut self, width: u32, height: u32) {
        self.shared.width.store(width, Ordering::Release);
        self.shared.height.store(height, Ordering::Release);
        if let Some(source) = &mut self.sync_source {
            if self.shared.active.load(Ordering::Acquire)
                && width > 0
                && height > 0
                && (source.has_frame() || self.shared.frame_notified.swap(false, Ordering::AcqRel))
            {
                render_into(&self.shared, source.as_mut(), width, height);
            }
        } else {
            self.shared.cv.notify_one();
        }
    }

    pub fn request_resize(&self, width: u32, height: u32) {
        self.shared.width.store(width, Ordering::Release);
        self.shared.height.store(height, Ordering::Release);
        self.shared.resize_pending.store(true, Ordering::Release);
        self.shared.cv.notify_one();
    }

    pub fn request_colorspace(&mut self, hdr: bool) {
        if let Some(source) = &mut self.sync_source {
            source.set_colorspace(hdr);
            return;
        }
        self.shared.colorspace_hdr.store(hdr, Ordering::Release);
        self.shared.colorspace_pending.store(true, Ordering::Release);
        self.shared.cv.notify_one();
    }

    /// Hand the latest frame to `upload` if one is pending.
    pub fn take_frame(&self, mut upload: impl FnMut(&[u8], u32, u32)) -> bool {
        let mut frame = self.shared.frame.lock();
        if !frame.dirty {
            return false;
        }
        upload(&frame.data, frame.width, frame.height);
        frame.dirty = false;
        true
    }

    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.cv.notify_one();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        log("video: render controller stopped");
    }
}

impl Drop for VideoRenderController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Default for VideoRenderController {
    fn default() -> Self {
        Self::new()
    }
}

fn render_into(shared: &ControllerShared, source: &mut dyn VideoFrameSource, w: u32, h: u32) {
    // Reuse the previous frame's allocation.
    let mut scratch = {
        let mut frame = shared.frame.lock();
        std::mem::take(&mut frame.data)
    };
    if source.render(w, h, &mut scratch) {
        let mut frame = shared.frame.lock();
        frame.data = scratch;
        frame.width = w;
        frame.height = h;
        frame.dirty = true;
        shared.video_ready.store(true, Ordering::Release);
    } else {
        let mut frame = shared.frame.lock();
        frame.data = scratch;
    }
}

/// The texture video frames are uploaded to, drawn beneath the UI
/// compositors at full opacity.
pub struct VideoPlane {
    size: (u32, u32),
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    uniform: wgpu::Buffer,
    sampler: wgpu::Sampler,
    bind_layout: wgpu::BindGroupLayout,
    has_frame: bool,
    visible: bool,
}

impl VideoPlane {
    pub fn new(
        gpu: &GpuState,
        bind_layout: &wgpu::BindGroupLayout,
        width: u32,
        height: u32,
    ) -> Self {
        let device = &gpu.device;
        let sampler = super::pipeline::create_composite_sampler(device);
        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("video_uniform"),
            size: UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let texture = create_video_texture(device, width, height);
        let bind_group = bind(device, bind_layout, &texture, &sampler, &uniform);
        Self {
            size: (width, height),
            texture,
            bind_group,
            uniform,
            sampler,
            bind_layout: bind_layout.clone(),
            has_frame: false,
            visible: false,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.has_frame = false;
        }
    }

    /// Upload a rendered BGRA frame. Frames at a stale size are dropped.
    pub fn upload(&mut self, queue: &wgpu::Queue, data: &[u8], width: u32, height: u32) {
        if (width, height) != self.size || data.len() < (width * height * 4) as usize {
            return;
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.has_frame = true;
    }

    pub fn composite(&self, queue: &wgpu::Queue, pass: &mut wgpu::RenderPass<'_>) {
        if !self.visible || !self.has_frame {
            return;
        }
        let mut uniform_data = [0u8; UNIFORM_SIZE as usize];
        uniform_data[..4].copy_from_slice(&1.0f32.to_le_bytes());
        queue.write_buffer(&self.uniform, 0, &uniform_data);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    pub fn resize(&mut self, gpu: &GpuState, width: u32, height: u32) {
        if (width, height) == self.size || width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.texture = create_video_texture(&gpu.device, width, height);
        self.bind_group = bind(
            &gpu.device,
            &self.bind_layout,
            &self.texture,
            &self.sampler,
            &self.uniform,
        );
        self.has_frame = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32 as TestCounter;

    struct FakeSource {
        frames: Arc<TestCounter>,
    }

    impl VideoFrameSource for FakeSource {
        fn has_frame(&mut self) -> bool {
            true
        }
        fn render(&mut self, width: u32, height: u32, out: &mut Vec<u8>) -> bool {
            out.clear();
            out.resize((width * height * 4) as usize, 0xAB);
            self.frames.fetch_add(1, Ordering::SeqCst);
            true
        }
        fn set_colorspace(&mut self, _hdr: bool) {}
    }

    #[test]
    fn threaded_controller_publishes_frames() {
        let frames = Arc::new(TestCounter::new(0));
        let mut controller = VideoRenderController::new();
        controller.start_threaded(Box::new(FakeSource {
            frames: frames.clone(),
        }));
        controller.set_active(true);
        controller.render(64, 32);
        controller.notify_frame();

        // Wait for the worker to publish.
        let mut delivered = None;
        for _ in 0..100 {
            if controller.take_frame(|data, w, h| {
                delivered = Some((data[0], w, h));
            }) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(delivered, Some((0xAB, 64, 32)));
        assert!(controller.video_ready());
        // A frame is handed over exactly once.
        assert!(!controller.take_frame(|_, _, _| panic!("already taken")));
        controller.stop();
        assert!(frames.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn sync_controller_renders_inline() {
        let frames = Arc::new(TestCounter::new(0));
        let mut controller = VideoRenderController::new();
        controller.start_sync(Box::new(FakeSource {
            frames: frames.clone(),
        }));
        controller.set_active(true);
        controller.render(16, 16);
        assert!(controller.take_frame(|_, w, h| assert_eq!((w, h), (16, 16))));
        assert_eq!(frames.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inactive_controller_renders_nothing() {
        let frames = Arc::new(TestCounter::new(0));
        let mut controller = VideoRenderController::new();
        controller.start_sync(Box::new(FakeSource {
            frames: frames.clone(),
        }));
        controller.render(16, 16);
        assert!(!controller.take_frame(|_, _, _| {}));
        assert_eq!(frames.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn deactivation_clears_video_ready() {
        let mut controller = VideoRenderController::new();
        controller.start_sync(Box::new(FakeSource {
            frames: Arc::new(TestCounter::new(0)),
        }));
        controller.set_active(true);
        controller.render(8, 8);
        assert!(controller.video_ready());
        controller.set_active(false);
        assert!(!controller.video_ready());
    }
}

fn create_video_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("video_plane"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Bgra8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn bind(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::Texture,
    sampler: &wgpu::Sampler,
    uniform: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("video_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(
                    &texture.create_view(&wgpu::TextureViewDescriptor::default()),
                ),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform.as_entire_binding(),
            },
        ],
    })
}
