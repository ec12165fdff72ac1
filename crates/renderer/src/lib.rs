//! Renderer: GL-style device abstraction, model adapter and the wgpu surface.
//! wgpu = 26.x, winit = 0.30.x

pub mod device;
pub mod model;
pub mod recording;
pub mod resources;
pub mod shader;
pub mod wgpu_device;

use std::{rc::Rc, sync::Arc};

use thiserror::Error;
use wgpu::{
    CommandEncoderDescriptor, Device, DeviceDescriptor, Extent3d, Features, Instance,
    InstanceDescriptor, Limits, PowerPreference, PresentMode, Surface, SurfaceConfiguration,
    SurfaceError, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};
use winit::{dpi::PhysicalSize, window::Window};

pub use device::{DeviceRef, GraphicsDevice};
pub use model::{MaterialUniforms, Model, ModelConfig, Vertex};
pub use recording::RecordingDevice;
pub use shader::{Program, Shader, ShaderError};
pub use wgpu_device::WgpuDevice;

/// WGSL source for the model program (both stages in one module).
pub const MODEL_SHADER: &str = include_str!("shaders/model.wgsl");

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.08,
    a: 1.0,
};

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("create_surface failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("No suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("request_device failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device wrapper; owns wgpu Device/Queue
    gpu: Rc<WgpuDevice>,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>, restricted to `backends`.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> Result<Self, GpuError> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Svarog3D Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(caps.formats[0]);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);
        let gpu = Rc::new(WgpuDevice::new(device, queue, surface_format, DEPTH_FORMAT));

        Ok(Self {
            surface,
            surface_config,
            gpu,
            depth_view,
            width,
            height,
        })
    }

    /// Device context for resource wrappers and the model adapter.
    pub fn device(&self) -> DeviceRef {
        self.gpu.clone()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(self.gpu.device(), &self.surface_config);
        self.depth_view = create_depth_view(self.gpu.device(), &self.surface_config);
    }

    /// Render one frame: `record` issues device calls (uniforms, draws),
    /// which are then replayed into a single cleared pass and presented.
    pub fn render_frame(&mut self, record: impl FnOnce()) -> Result<(), SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        record();

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });
        self.gpu
            .encode_pass(&mut encoder, &view, &self.depth_view, CLEAR_COLOR);

        self.gpu.queue().submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
