use egui::epaint::Shadow;

/// Numbers shown by the F3 panel.
#[derive(Debug, Clone, Default)]
pub struct DebugStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub active_entities: usize,
    pub free_slots: usize,
    pub capacity: usize,
    pub draw_calls: usize,
    pub overlap_tests: usize,
    pub collisions: usize,
    pub resolution: (u32, u32),
}

/// Rolling frame timer feeding `DebugStats`. Publishes once per second.
#[derive(Debug, Default)]
pub struct FrameTimer {
    elapsed: f32,
    frames: u32,
    sum_ms: f32,
    min_ms: f32,
    max_ms: f32,
    fps: u32,
    avg_ms: f32,
    last_min_ms: f32,
    last_max_ms: f32,
}

impl FrameTimer {
    pub fn tick(&mut self, dt_seconds: f32) {
        let ms = dt_seconds * 1000.0;
        if self.frames == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        }
        self.frames += 1;
        self.sum_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
        self.elapsed += dt_seconds;

        if self.elapsed >= 1.0 {
            self.fps = self.frames;
            self.avg_ms = self.sum_ms / self.frames as f32;
            self.last_min_ms = self.min_ms;
            self.last_max_ms = self.max_ms;
            log::trace!("FPS: {} ({:.2} ms avg)", self.fps, self.avg_ms);
            *self = Self {
                fps: self.fps,
                avg_ms: self.avg_ms,
                last_min_ms: self.last_min_ms,
                last_max_ms: self.last_max_ms,
                ..Self::default()
            };
        }
    }

    /// Copy the last published second into `stats`.
    pub fn fill(&self, stats: &mut DebugStats) {
        stats.fps = self.fps;
        stats.frame_time_avg_ms = self.avg_ms;
        stats.frame_time_min_ms = self.last_min_ms;
        stats.frame_time_max_ms = self.last_max_ms;
    }
}

/// Score as shown on the HUD: eight digits, zero padded.
pub fn score_text(score: u32) -> String {
    format!("SCORE {:08}", score.min(99_999_999))
}

pub struct DebugOverlay {
    pub visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        // Style: dark, semi-transparent, small monospace white font
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(13.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // no depth
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            visible: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::debug!("Stats panel {}", if self.visible { "shown" } else { "hidden" });
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Render one egui frame: the score line, plus the stats panel when
    /// `stats` is `Some`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        score: u32,
        stats: Option<&DebugStats>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            // ── HUD: score, top right ──────────────────────────────────────
            egui::Area::new(egui::Id::new("score"))
                .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 10.0))
                .show(ctx, |ui| {
                    ui.label(
                        egui::RichText::new(score_text(score))
                            .font(egui::FontId::monospace(20.0))
                            .color(egui::Color32::from_rgb(255, 220, 120)),
                    );
                });

            // ── F3: stats panel ────────────────────────────────────────────
            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("debug_overlay"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                            .inner_margin(egui::Margin::same(8.0))
                            .rounding(4.0)
                            .show(ui, |ui: &mut egui::Ui| {
                                ui.label(format!("FPS: {}", stats.fps));
                                ui.label(format!(
                                    "Frame: {:.2} ms (min: {:.1} | max: {:.1})",
                                    stats.frame_time_avg_ms,
                                    stats.frame_time_min_ms,
                                    stats.frame_time_max_ms
                                ));
                                ui.label(format!(
                                    "Entities: {} active, {} free / {}",
                                    stats.active_entities, stats.free_slots, stats.capacity
                                ));
                                ui.label(format!("Draw calls: {}", stats.draw_calls));
                                ui.label(format!(
                                    "Overlap tests: {}  Collisions: {}",
                                    stats.overlap_tests, stats.collisions
                                ));
                                ui.label(format!(
                                    "Resolution: {} x {}",
                                    stats.resolution.0, stats.resolution.1
                                ));
                            });
                    });
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_eight_digits() {
        assert_eq!(score_text(0), "SCORE 00000000");
        assert_eq!(score_text(1200), "SCORE 00001200");
        assert_eq!(score_text(u32::MAX), "SCORE 99999999");
    }

    #[test]
    fn frame_timer_publishes_each_second() {
        let mut timer = FrameTimer::default();
        let mut stats = DebugStats::default();
        for _ in 0..59 {
            timer.tick(1.0 / 60.0);
        }
        timer.fill(&mut stats);
        assert_eq!(stats.fps, 0);

        timer.tick(1.0 / 60.0 + 1e-4);
        timer.fill(&mut stats);
        assert_eq!(stats.fps, 60);
        assert!((stats.frame_time_avg_ms - 16.67).abs() < 0.1);
    }
}
