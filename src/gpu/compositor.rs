//! Per-view UI compositor: owns one texture of the compositor's current
//! size and blends it onto the window with a uniform alpha.
//!
//! Two paths feed the texture. The software path copies the engine's paint
//! buffer into a staging buffer and uploads it; the shared-texture path
//! imports engine-exported GPU buffers through the ring in
//! [`shared_texture`]. Incoming frames whose dimensions differ from the
//! compositor's current size are silently dropped: they were produced
//! before a resize.

use std::sync::Arc;
use std::time::Instant;

use super::pipeline::UNIFORM_SIZE;
use super::shared_texture::{ImportOutcome, ImportRing, SharedTextureQueue};
use super::state::GpuState;
use crate::log;
use crate::menu::MenuOverlay;

/// GPU-side import service for the shared-texture path. Platform glue
/// provides one where the driver supports external-memory import; without
/// it the first import attempts fail and the session degrades to the
/// software path.
pub trait ImportBackend: Send {
    fn import_dmabuf(
        &mut self,
        device: &wgpu::Device,
        handle: &super::shared_texture::SharedTextureHandle,
    ) -> Result<wgpu::TextureView, String>;
}

pub struct UiCompositor {
    label: &'static str,
    size: (u32, u32),
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    uniform: wgpu::Buffer,
    sampler: wgpu::Sampler,
    bind_layout: wgpu::BindGroupLayout,

    staging: Vec<u8>,
    staging_pending: bool,
    /// True after the first successful upload or import; cleared on resize.
    has_content: bool,
    visible: bool,

    shared_queue: Arc<SharedTextureQueue>,
    ring: ImportRing<wgpu::BindGroup>,
    import_backend: Option<Box<dyn ImportBackend>>,
    last_resize: Instant,
}

impl UiCompositor {
    pub fn new(
        gpu: &GpuState,
        bind_layout: &wgpu::BindGroupLayout,
        label: &'static str,
        width: u32,
        height: u32,
        shared_textures: bool,
        import_backend: Option<Box<dyn ImportBackend>>,
    ) -> Self {
        let device = &gpu.device;
        let sampler = super::pipeline::create_composite_sampler(device);
        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("composite_uniform"),
            size: UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let texture = create_overlay_texture(device, label, width, height);
        let bind_group = create_bind_group(
            device,
            bind_layout,
            &texture.create_view(&wgpu::TextureViewDescriptor::default()),
            &sampler,
            &uniform,
        );

        Self {
            label,
            size: (width, height),
            texture,
            bind_group,
            uniform,
            sampler,
            bind_layout: bind_layout.clone(),
            staging: vec![0; (width * height * 4) as usize],
            staging_pending: false,
            has_content: false,
            visible: true,
            shared_queue: Arc::new(SharedTextureQueue::new()),
            ring: ImportRing::new(shared_textures),
            import_backend,
            last_resize: Instant::now(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Queue the engine's accelerated-paint callbacks push into. Shared with
    /// the view's paint sink.
    pub fn shared_queue(&self) -> Arc<SharedTextureQueue> {
        self.shared_queue.clone()
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Writable staging pointer for a frame of the given size, or `None`
    /// when the dimensions predate the current size.
    pub fn get_staging_buffer(&mut self, width: u32, height: u32) -> Option<&mut [u8]> {
        if (width, height) != self.size {
            return None;
        }
        Some(&mut self.staging)
    }

    pub fn mark_staging_dirty(&mut self) {
        self.staging_pending = true;
    }

    /// Software path: copy a BGRA frame into staging. Size-mismatched
    /// frames are dropped silently.
    pub fn update_overlay(&mut self, buffer: &[u8], width: u32, height: u32) {
        let expected = (width * height * 4) as usize;
        if buffer.len() < expected {
            return;
        }
        if let Some(staging) = self.get_staging_buffer(width, height) {
            staging.copy_from_slice(&buffer[..expected]);
            self.staging_pending = true;
        }
    }

    /// CPU-blend the open context menu onto the staged frame. RGBA menu
    /// pixels over BGRA staging, straight alpha.
    pub fn blend_menu(&mut self, menu: &MenuOverlay) {
        let Some(raster) = menu.raster() else { return };
        let (fw, fh) = (self.size.0 as i32, self.size.1 as i32);
        for y in 0..raster.height as i32 {
            let dy = raster.y + y;
            if dy < 0 || dy >= fh {
                continue;
            }
            for x in 0..raster.width as i32 {
                let dx = raster.x + x;
                if dx < 0 || dx >= fw {
                    continue;
                }
                let src = ((y * raster.width as i32 + x) * 4) as usize;
                let dst = ((dy * fw + dx) * 4) as usize;
                let (sr, sg, sb, sa) = (
                    raster.pixels[src],
                    raster.pixels[src + 1],
                    raster.pixels[src + 2],
                    raster.pixels[src + 3],
                );
                if sa == 0 {
                    continue;
                }
                if sa == 255 {
                    self.staging[dst] = sb;
                    self.staging[dst + 1] = sg;
                    self.staging[dst + 2] = sr;
                    self.staging[dst + 3] = 255;
                } else {
                    let inv = 255 - sa as u32;
                    let blend = |s: u8, d: u8| -> u8 {
                        ((s as u32 * sa as u32 + d as u32 * inv) / 255) as u8
                    };
                    self.staging[dst] = blend(sb, self.staging[dst]);
                    self.staging[dst + 1] = blend(sg, self.staging[dst + 1]);
                    self.staging[dst + 2] = blend(sr, self.staging[dst + 2]);
                    self.staging[dst + 3] = 255;
                }
            }
        }
        self.staging_pending = true;
    }

    /// Upload pending staging data to the texture.
    pub fn flush_overlay(&mut self, queue: &wgpu::Queue) {
        if !self.staging_pending {
            return;
        }
        let (width, height) = self.size;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.staging,
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
        self.staging_pending = false;
        self.has_content = true;
    }

    /// Import queued shared-texture handles into the ring. Runs on the
    /// render step; every handle that does not import is closed here.
    pub fn import_queued(&mut self, device: &wgpu::Device) {
        while let Some(handle) = self.shared_queue.pop() {
            let backend = &mut self.import_backend;
            let layout = &self.bind_layout;
            let sampler = &self.sampler;
            let uniform = &self.uniform;
            let outcome = self.ring.import_queued(
                handle,
                self.size,
                self.last_resize,
                Instant::now(),
                |h| {
                    let backend = backend
                        .as_mut()
                        .ok_or_else(|| "no import backend on this platform".to_owned())?;
                    let view = backend.import_dmabuf(device, h)?;
                    Ok(create_bind_group(device, layout, &view, sampler, uniform))
                },
            );
            match outcome {
                ImportOutcome::Imported | ImportOutcome::Reused => {
                    self.has_content = true;
                }
                ImportOutcome::Discarded
                | ImportOutcome::Failed
                | ImportOutcome::Disabled => {}
            }
        }
    }

    /// True when the shared-texture queue has frames awaiting import.
    pub fn has_pending_import(&self) -> bool {
        !self.shared_queue.is_empty()
    }

    /// True when staged software content awaits upload.
    pub fn has_pending_content(&self) -> bool {
        self.staging_pending
    }

    /// True once the texture holds a frame of the current size.
    pub fn has_valid_overlay(&self) -> bool {
        self.has_content
    }

    /// Draw the compositor over the current target. Skips when faded out,
    /// invisible, or empty.
    pub fn composite(&self, queue: &wgpu::Queue, pass: &mut wgpu::RenderPass<'_>, alpha: f32) {
        if !self.visible || alpha < 0.01 || !self.has_content {
            return;
        }
        let mut uniform_data = [0u8; UNIFORM_SIZE as usize];
        uniform_data[..4].copy_from_slice(&alpha.to_le_bytes());
        queue.write_buffer(&self.uniform, 0, &uniform_data);
        let bind_group = self.ring.current().unwrap_or(&self.bind_group);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Resize: idle the device, release every import and the backing
    /// texture, reallocate at the new size, and start the import cooldown.
    pub fn resize(&mut self, gpu: &GpuState, width: u32, height: u32) {
        if (width, height) == self.size || width == 0 || height == 0 {
            return;
        }
        let _ = gpu.device.poll(wgpu::PollType::wait_indefinitely());
        self.shared_queue.clear();
        self.ring.drain();

        self.size = (width, height);
        self.texture = create_overlay_texture(&gpu.device, self.label, width, height);
        self.bind_group = create_bind_group(
            &gpu.device,
            &self.bind_layout,
            &self
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
            &self.sampler,
            &self.uniform,
        );
        self.staging = vec![0; (width * height * 4) as usize];
        self.staging_pending = false;
        self.has_content = false;
        self.last_resize = Instant::now();
        log(&format!(
            "compositor[{}]: resized to {width}x{height}",
            self.label
        ));
    }
}

fn create_overlay_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
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

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    uniform: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("composite_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
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