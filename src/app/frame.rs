//! The per-frame pipeline: the tick that drains every producer and decides
//! whether to render, and the render step that composites video under the
//! main UI under the fading overlay.

use std::time::Instant;

use crate::input::LayerId;
use crate::log;
use crate::overlay::OverlayTransition;

use super::App;

impl App {
    /// One cooperative iteration: drain producers, service the engine pump,
    /// advance the fade machine, decide whether this frame renders.
    pub(super) fn tick(&mut self) {
        let now = Instant::now();

        self.drain_engine_events();
        self.host.service_pump(now);
        self.drain_view_events();
        self.drain_player_commands();
        self.drain_session_actions();

        if !self.focus_sent {
            self.dispatch_window_state(crate::input::WindowStateEvent::FocusGained);
            self.focus_sent = true;
        }

        match self.overlay.advance(now) {
            OverlayTransition::FocusToMain => {
                // The main UI takes over input while the overlay fades out.
                self.window_state.remove(LayerId::OverlayBrowser);
                self.host.overlay.set_focus(false);
                self.input_stack.remove(LayerId::OverlayBrowser);
                self.input_stack.push(LayerId::MainBrowser);
                self.window_state.add(LayerId::MainBrowser);
                self.host.main.set_focus(true);
                log("overlay: waiting -> fading, focus to main");
            }
            OverlayTransition::BecameHidden => {
                if let Some(compositor) = self.overlay_compositor.as_mut() {
                    compositor.set_visible(false);
                }
                log("overlay: fading -> hidden");
            }
            OverlayTransition::None => {}
        }

        // A menu raster change re-delivers the view frame so the blend in
        // the render step starts from clean pixels.
        if self.menu.take_redraw() {
            let sink = match self.active_browser() {
                LayerId::OverlayBrowser => self.host.overlay.paint_sink(),
                _ => self.host.main.paint_sink(),
            };
            sink.redeliver();
        }

        let compositor_pending = self.compositor.as_ref().is_some_and(|c| {
            c.has_pending_content() || c.has_pending_import()
        }) || self
            .overlay_compositor
            .as_ref()
            .is_some_and(|c| c.has_pending_content());
        let paints_pending = self.host.main.paint_sink().has_pending()
            || self.host.overlay.paint_sink().has_pending();

        self.needs_render = self.activity
            || self.has_video
            || compositor_pending
            || paints_pending
            || self.video_needs_rerender
            || self.overlay.animating();
        self.activity = false;
    }

    /// Render one frame: video plane, then the main UI at full opacity,
    /// then the overlay at its fade alpha.
    pub(super) fn render_window(&mut self) {
        let Some(gpu) = self.gpu.as_ref() else { return };
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        let Some(pipeline) = self.pipeline.as_ref() else {
            return;
        };

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                // Recreate at the current size and skip this frame.
                if let Some(config) = self.surface_config.as_mut() {
                    config.width = self.size.width.max(1);
                    config.height = self.size.height.max(1);
                    surface.configure(&gpu.device, config);
                }
                self.needs_render = true;
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => return,
            Err(e) => {
                log(&format!("render: surface error: {e}"));
                return;
            }
        };

        let (width, height) = (self.size.width, self.size.height);

        // Video first: pick up the latest engine frame.
        self.video_ctl.render(width, height);
        if let Some(plane) = self.video_plane.as_mut() {
            let queue = &gpu.queue;
            self.video_ctl.take_frame(|data, w, h| {
                plane.upload(queue, data, w, h);
            });
        }
        self.video_needs_rerender = false;

        // Flush engine paints into the compositors (frames at stale sizes
        // are dropped inside update_overlay).
        if let Some(compositor) = self.compositor.as_mut() {
            self.host.main.paint_sink().flush(|data, w, h| {
                compositor.update_overlay(data, w, h);
            });
            compositor.import_queued(&gpu.device);
        }
        if let Some(compositor) = self.overlay_compositor.as_mut() {
            self.host.overlay.paint_sink().flush(|data, w, h| {
                compositor.update_overlay(data, w, h);
            });
        }

        // Blend the open context menu over the active view's staged frame.
        if self.menu.is_open() {
            let target = match self.active_browser() {
                LayerId::OverlayBrowser => self.overlay_compositor.as_mut(),
                _ => self.compositor.as_mut(),
            };
            if let Some(compositor) = target {
                compositor.blend_menu(&self.menu);
            }
        }

        if let Some(compositor) = self.compositor.as_mut() {
            compositor.flush_overlay(&gpu.queue);
        }
        if let Some(compositor) = self.overlay_compositor.as_mut() {
            compositor.flush_overlay(&gpu.queue);
        }

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        {
            let clear = self.overlay.clear_color();
            // Platforms where the video sits behind a real subsurface clear
            // transparent once frames are flowing so it shows through.
            let clear_alpha = if gpu.caps.clear_transparent_with_video
                && self.has_video
                && self.video_ctl.video_ready()
            {
                0.0
            } else {
                1.0
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0],
                            g: clear[1],
                            b: clear[2],
                            a: clear_alpha,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(pipeline);

            if self.has_video {
                if let Some(plane) = self.video_plane.as_ref() {
                    plane.composite(&gpu.queue, &mut pass);
                }
            }

            // Main UI above the video; skipped while a test video plays so
            // the blank page never covers it.
            if self.options.test_video.is_none() {
                if let Some(compositor) = self.compositor.as_ref() {
                    compositor.composite(&gpu.queue, &mut pass, 1.0);
                }
            }

            // Onboarding overlay on top, fading.
            if self.overlay.visible() {
                if let Some(compositor) = self.overlay_compositor.as_ref() {
                    compositor.composite(&gpu.queue, &mut pass, self.overlay.alpha());
                }
            }
        }

        gpu.queue.submit(Some(encoder.finish()));
        frame.present();
    }
}
