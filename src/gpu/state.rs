//! wgpu device and surface state for the application window.

use std::sync::Arc;

use winit::window::Window;

use crate::error::Error;
use crate::log;

/// Capabilities of the selected platform configuration. The frame loop
/// branches on these flags instead of on the platform itself.
#[derive(Debug, Clone, Copy)]
pub struct PlatformCaps {
    /// Whether video frames may be produced on a dedicated render thread.
    pub video_render_thread: bool,
    /// Whether the window clear may go transparent once video is present
    /// (only meaningful when the video layer sits behind a real subsurface).
    pub clear_transparent_with_video: bool,
    /// Whether the surface carries an HDR-capable format.
    pub hdr_surface: bool,
}

pub struct GpuState {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
    pub render_format: wgpu::TextureFormat,
    pub caps: PlatformCaps,
}

impl GpuState {
    /// Initialize the GPU device against the application window and return
    /// the configured presentation surface. Failure here is fatal.
    pub fn new(
        window: &Arc<Window>,
    ) -> Result<(Self, wgpu::Surface<'static>, wgpu::SurfaceConfiguration), Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| Error::Gpu(format!("create_surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        }))
        .map_err(|e| Error::Gpu(format!("no suitable adapter: {e}")))?;

        let info = adapter.get_info();
        log(&format!(
            "gpu: adapter='{}' backend={:?} type={:?}",
            info.name, info.backend, info.device_type
        ));

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| Error::Gpu(format!("request_device: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let (render_format, hdr) = select_surface_format(&surface_caps.formats);
        log(&format!(
            "gpu: surface format {render_format:?} (hdr={hdr}), alpha modes {:?}",
            surface_caps.alpha_modes
        ));

        let alpha_mode = if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps.alpha_modes[0]
        };

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: render_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let caps = PlatformCaps {
            video_render_thread: true,
            clear_transparent_with_video: alpha_mode == wgpu::CompositeAlphaMode::PreMultiplied,
            hdr_surface: hdr,
        };

        Ok((
            Self {
                device,
                queue,
                adapter,
                render_format,
                caps,
            },
            surface,
            config,
        ))
    }

    /// Reconfigure the surface at a new size. Serialised against in-flight
    /// work by wgpu; zero dimensions are clamped away.
    pub fn resize_surface(
        &self,
        surface: &wgpu::Surface<'_>,
        config: &mut wgpu::SurfaceConfiguration,
        width: u32,
        height: u32,
    ) {
        if width == 0 || height == 0 {
            return;
        }
        config.width = width;
        config.height = height;
        surface.configure(&self.device, config);
    }
}

/// Prefer an HDR-capable format: 16-bit float first, then 10-bit, then the
/// first sRGB 8-bit format the surface offers.
fn select_surface_format(formats: &[wgpu::TextureFormat]) -> (wgpu::TextureFormat, bool) {
    if formats.contains(&wgpu::TextureFormat::Rgba16Float) {
        return (wgpu::TextureFormat::Rgba16Float, true);
    }
    if formats.contains(&wgpu::TextureFormat::Rgb10a2Unorm) {
        return (wgpu::TextureFormat::Rgb10a2Unorm, true);
    }
    let srgb = formats.iter().copied().find(wgpu::TextureFormat::is_srgb);
    (srgb.unwrap_or(formats[0]), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selection_prefers_wide_gamut() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba16Float,
        ];
        assert_eq!(
            select_surface_format(&formats),
            (wgpu::TextureFormat::Rgba16Float, true)
        );

        let formats = [
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgb10a2Unorm,
        ];
        assert_eq!(
            select_surface_format(&formats),
            (wgpu::TextureFormat::Rgb10a2Unorm, true)
        );
    }

    #[test]
    fn format_selection_falls_back_to_srgb() {
        let formats = [
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ];
        assert_eq!(
            select_surface_format(&formats),
            (wgpu::TextureFormat::Bgra8UnormSrgb, false)
        );
    }
}
