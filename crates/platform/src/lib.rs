//! Platform layer: window, event loop and the model viewer built on it.
//!
//! The viewer loads one model at startup. A load failure is fatal: it is
//! logged, the event loop exits and [`run_viewer`] returns the error.

use std::{
    path::PathBuf,
    rc::Rc,
    sync::Arc,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use asset::AutoImporter;
use corelib::{Mat4, Vec3, camera::Camera, transform::Transform};
use renderer::{
    DeviceRef, GpuState, MODEL_SHADER, MaterialUniforms, Model, ModelConfig, Program,
    RecordingDevice, device::UniformLocation,
};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

const FOV_Y_DEG: f32 = 60.0;
/// Radians per second around Y (X spins at half that).
const SPIN_SPEED: f32 = 0.8;

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub model_path: PathBuf,
    /// Directory material texture paths are resolved against.
    pub texture_dir: PathBuf,
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
}

impl ViewerConfig {
    fn model_config(&self) -> ModelConfig {
        ModelConfig {
            texture_dir: self.texture_dir.clone(),
            ..ModelConfig::default()
        }
    }
}

/// Program plus the loaded model, drawn every frame.
struct ModelScene {
    program: Program,
    mvp: Option<UniformLocation>,
    model: Model,
}

impl ModelScene {
    fn load(device: &DeviceRef, cfg: &ViewerConfig) -> Result<Self> {
        let program = Program::build(device, MODEL_SHADER, MODEL_SHADER)
            .context("Building model program")?;
        let uniforms = MaterialUniforms::resolve(&program);
        let mvp = program.uniform_location("uMVPMatrix");
        let model = Model::load(
            device,
            &AutoImporter::new(),
            &cfg.model_path,
            &cfg.model_config(),
            uniforms,
        )
        .with_context(|| format!("Loading model {}", cfg.model_path.display()))?;
        Ok(Self {
            program,
            mvp,
            model,
        })
    }

    /// Spin the model about its bounds center and frame it.
    fn mvp(&self, elapsed: f32, aspect: f32) -> Mat4 {
        let fov = FOV_Y_DEG.to_radians();
        match self.model.bounds() {
            Some(bounds) => {
                let spin = Vec3::new(0.5 * SPIN_SPEED * elapsed, SPIN_SPEED * elapsed, 0.0);
                let camera = Camera::framing(&bounds, fov, aspect);
                camera.proj_view() * Transform::spin_about(bounds.center(), spin)
            }
            None => Camera::new_perspective(
                Vec3::new(0.0, 0.0, 4.0),
                Vec3::ZERO,
                Vec3::Y,
                fov,
                0.1,
                100.0,
                aspect,
            )
            .proj_view(),
        }
    }

    fn draw(&self, device: &DeviceRef, elapsed: f32, aspect: f32) {
        self.program.use_program();
        device.uniform_matrix4(self.mvp, self.mvp(elapsed, aspect).to_cols_array());
        self.model.render();
        self.program.stop();
    }
}

struct ViewerApp {
    cfg: ViewerConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    scene: Option<ModelScene>,
    start: Instant,
    frames: u64,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(cfg: ViewerConfig) -> Self {
        Self {
            cfg,
            window: None,
            gpu: None,
            scene: None,
            start: Instant::now(),
            frames: 0,
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Svarog3D")
            .with_inner_size(PhysicalSize::new(self.cfg.width, self.cfg.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let gpu = pollster::block_on(GpuState::new(window.clone(), self.cfg.backends))?;
        let scene = ModelScene::load(&gpu.device(), &self.cfg)?;

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.scene = Some(scene);
        self.start = Instant::now();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(gpu), Some(scene)) = (self.gpu.as_mut(), self.scene.as_ref()) else {
            return;
        };
        let device = gpu.device();
        let elapsed = self.start.elapsed().as_secs_f32();
        let aspect = gpu.aspect();

        let result = gpu.render_frame(|| scene.draw(&device, elapsed, aspect));
        match result {
            Ok(()) => self.frames += 1,
            Err(e) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated: {e:?}. Recreating surface.");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout; skipping frame.");
            }
            Err(e) => {
                self.fail(event_loop, anyhow!("Render error: {e:?}"));
            }
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::info!("Resized: {}x{}", size.width, size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {scale_factor:.3}");
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open a window and spin the configured model until it is closed.
pub fn run_viewer(cfg: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(cfg);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    if let Some(err) = app.error.take() {
        return Err(err);
    }
    log::info!("Rendered {} frames", app.frames);
    Ok(())
}

/// Counters from a headless run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub meshes: usize,
    pub vertices: usize,
    pub textures: usize,
    pub draws: usize,
}

/// Load the model against a recording device and issue one frame of draws.
/// No window or GPU is needed.
pub fn run_headless(cfg: &ViewerConfig) -> Result<HeadlessStats> {
    let recorder = Rc::new(RecordingDevice::new());
    let device: DeviceRef = recorder.clone();

    let scene = ModelScene::load(&device, cfg)?;
    scene.draw(&device, 0.0, cfg.width.max(1) as f32 / cfg.height.max(1) as f32);

    let stats = HeadlessStats {
        meshes: scene.model.meshes().len(),
        vertices: scene.model.vertex_count(),
        textures: scene.model.texture_table().len(),
        draws: recorder.draws().len(),
    };
    for draw in recorder.draws() {
        log::debug!("draw first={} count={}", draw.first, draw.count);
    }
    let misuse = recorder.misuse();
    if !misuse.is_empty() {
        log::warn!("Device misuse during headless frame: {misuse:?}");
    }
    log::info!(
        "Headless frame: {} meshes, {} vertices, {} textures, {} draws",
        stats.meshes,
        stats.vertices,
        stats.textures,
        stats.draws
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(dir: &std::path::Path, model: &str) -> ViewerConfig {
        ViewerConfig {
            model_path: dir.join(model),
            texture_dir: dir.to_path_buf(),
            backends: wgpu::Backends::all(),
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn headless_draws_each_mesh() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("quad.obj"),
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        )
        .unwrap();
        let stats = run_headless(&config(dir.path(), "quad.obj")).unwrap();
        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.vertices, 6);
        assert_eq!(stats.textures, 0);
        assert_eq!(stats.draws, 1);
    }

    #[test]
    fn headless_missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_headless(&config(dir.path(), "nope.obj")).unwrap_err();
        assert!(format!("{err:#}").contains("nope.obj"));
    }
}
