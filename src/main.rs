// Toroid Blaster - frame driver
// Each frame: game logic → pool update (behaviors, upload, collisions) → draw → HUD

use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use toroid_blaster::engine::debug_overlay::{DebugOverlay, DebugStats, FrameTimer};
use toroid_blaster::engine::mesh::MeshBuffer;
use toroid_blaster::engine::renderer::{Gpu, Renderer};
use toroid_blaster::engine::{
    Camera, EngineConfig, EngineError, EntityBuffer, EntityUniforms, FrameStats, InputState,
};
use toroid_blaster::game::{GameAssets, Shooter, assets};

// ============================================================================
// STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    renderer: Renderer,
    overlay: DebugOverlay,
    meshes: MeshBuffer,
    pool: EntityBuffer<Shooter>,
    game: Shooter,
    camera: Camera,
    input: InputState,
    timer: FrameTimer,
    max_delta: f64,
    last_frame: Instant,
    last_stats: FrameStats,
    last_draws: usize,
}

impl State {
    async fn new(window: Arc<Window>, config: &EngineConfig) -> Result<Self, EngineError> {
        let gpu = Gpu::new(window.clone()).await?;

        let entities = &config.entities;
        let (mut pool, entity_blocks) = EntityBuffer::create(
            &gpu.device,
            gpu.queue.clone(),
            entities.max_entity_count,
            EntityUniforms::SIZE,
            entities.binding,
            &entities.block_name,
        )?;
        Shooter::install(&mut pool);

        let camera = Camera::from_config(&config.camera);
        let (meshes, mesh_set) = assets::build_meshes();
        let mut renderer = Renderer::new(
            gpu,
            entity_blocks,
            entities.binding,
            &meshes,
            &config.light,
            camera.position,
        );
        let game_assets = GameAssets::load(&mut renderer, mesh_set);
        let overlay = DebugOverlay::new(&window, renderer.device(), renderer.surface_format());

        Ok(Self {
            window,
            renderer,
            overlay,
            meshes,
            pool,
            game: Shooter::new(game_assets, StdRng::from_entropy()),
            camera,
            input: InputState::new(),
            timer: FrameTimer::default(),
            max_delta: config.frame.max_delta,
            last_frame: Instant::now(),
            last_stats: FrameStats::default(),
            last_draws: 0,
        })
    }

    fn update(&mut self) {
        let now = Instant::now();
        let elapsed = (now - self.last_frame).as_secs_f64();
        self.last_frame = now;
        self.timer.tick(elapsed as f32);
        let delta = elapsed.min(self.max_delta).max(0.0);

        self.game.pad = self.input.game_pad();
        self.game.frame(&mut self.pool, delta);

        let view = self.camera.view_matrix();
        let proj = self.camera.projection_matrix(self.renderer.aspect());
        match self.pool.update(&mut self.game, delta, view, proj) {
            Ok(stats) => self.last_stats = stats,
            Err(e) => log::error!("Entity upload failed: {e}"),
        }
        self.input.end_frame();
    }

    fn stats(&self) -> DebugStats {
        let size = self.renderer.size();
        let mut stats = DebugStats {
            active_entities: self.pool.len(),
            free_slots: self.pool.free_len(),
            capacity: self.pool.capacity(),
            draw_calls: self.last_draws,
            overlap_tests: self.last_stats.overlap_tests,
            collisions: self.last_stats.collisions,
            resolution: (size.width, size.height),
            ..Default::default()
        };
        self.timer.fill(&mut stats);
        stats
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.renderer.gpu.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let mut draws = 0;
        self.renderer.render_scene(&mut encoder, &view, |recorder| {
            draws = self.pool.draw(&self.meshes, recorder);
        });
        self.last_draws = draws;

        // Egui pass (score HUD, F3 stats)
        let stats = self.overlay.visible.then(|| self.stats());
        let size = self.renderer.size();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        self.overlay.render(
            self.renderer.device(),
            self.renderer.queue(),
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            self.game.score,
            stats.as_ref(),
        );

        self.renderer.queue().submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn run() -> Result<(), EngineError> {
    let config = EngineConfig::load()?;
    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title(config.window.title.as_str())
        .with_inner_size(winit::dpi::LogicalSize::new(config.window.width, config.window.height));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), &config))?;
    log::info!("Toroid Blaster ready");

    event_loop.run(move |event, control_flow| match event {
        WinitEvent::WindowEvent { ref event, window_id } if window_id == window.id() => {
            let _ = state.overlay.handle_window_event(&window, event);
            state.input.process_event(event);

            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            physical_key: PhysicalKey::Code(KeyCode::Escape),
                            ..
                        },
                    ..
                } => control_flow.exit(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            physical_key: PhysicalKey::Code(KeyCode::F3),
                            repeat: false,
                            ..
                        },
                    ..
                } => state.overlay.toggle(),
                WindowEvent::Resized(physical_size) => {
                    state.renderer.resize(*physical_size);
                }
                WindowEvent::RedrawRequested => {
                    state.update();
                    match state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            log::warn!("Surface lost, reconfiguring");
                            state.renderer.reconfigure();
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("Out of GPU memory");
                            control_flow.exit();
                        }
                        Err(e) => log::warn!("Skipping frame: {e:?}"),
                    }
                }
                _ => {}
            }
        }
        WinitEvent::AboutToWait => {
            window.request_redraw();
        }
        _ => {}
    })?;

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
