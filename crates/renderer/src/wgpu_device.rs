//! [`GraphicsDevice`] on top of wgpu.
//!
//! wgpu has no global binding state, so this device keeps it: bound vertex
//! array, texture, program and one uniform block. Every `draw_arrays`
//! snapshots that state into a draw list which [`WgpuDevice::encode_pass`]
//! turns into a render pass. Uniform locations address fields of the block
//! (`uMVPMatrix`, `uDiffuse`, `uAmbient`, `uSpecular`, `uEmissive`,
//! `uShininess`, `uTexCount`); each draw gets its own copy at a dynamic
//! offset. Shaders are WGSL with `vs_main` / `fs_main` entry points.

use std::{
    collections::HashMap,
    mem::{size_of, take},
    num::NonZeroU64,
};

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use asset::TextureData;

use crate::device::{
    BufferHandle, FilterMode, GraphicsDevice, HandleAllocator, ProgramHandle, SamplerDesc,
    ShaderHandle, ShaderStage, TextureHandle, UniformLocation, VertexArrayHandle, VertexAttrib,
    WrapMode,
};

/// Per-draw uniform block (16-byte aligned, matches `DrawUniforms` in WGSL).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DrawUniforms {
    mvp: [[f32; 4]; 4],
    diffuse: [f32; 4],
    ambient: [f32; 4],
    specular: [f32; 4],
    emissive: [f32; 4],
    shininess: f32,
    tex_count: i32,
    _pad: [f32; 2],
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            mvp: glam::Mat4::IDENTITY.to_cols_array_2d(),
            ..Zeroable::zeroed()
        }
    }
}

/// Uniform block fields addressable by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
enum Field {
    Mvp,
    Diffuse,
    Ambient,
    Specular,
    Emissive,
    Shininess,
    TexCount,
}

impl Field {
    const ALL: [(&'static str, Field); 7] = [
        ("uMVPMatrix", Field::Mvp),
        ("uDiffuse", Field::Diffuse),
        ("uAmbient", Field::Ambient),
        ("uSpecular", Field::Specular),
        ("uEmissive", Field::Emissive),
        ("uShininess", Field::Shininess),
        ("uTexCount", Field::TexCount),
    ];

    fn by_name(name: &str) -> Option<Field> {
        Self::ALL.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
    }

    fn from_location(location: UniformLocation) -> Option<Field> {
        Self::ALL.get(location.0 as usize).map(|(_, f)| *f)
    }
}

struct ShaderSlot {
    stage: ShaderStage,
    source: String,
    module: Option<wgpu::ShaderModule>,
    log: String,
}

#[derive(Default)]
struct ProgramSlot {
    vertex: Option<wgpu::ShaderModule>,
    fragment: Option<wgpu::ShaderModule>,
    sources: Vec<String>,
    linked: bool,
    log: String,
}

#[derive(Default)]
struct VertexArraySlot {
    buffer: Option<u32>,
    attribs: Vec<VertexAttrib>,
}

#[derive(Default)]
struct TextureSlot {
    view: Option<wgpu::TextureView>,
    sampler: Option<wgpu::Sampler>,
    bind_group: Option<wgpu::BindGroup>,
}

struct DrawCommand {
    program: u32,
    vao: u32,
    texture: Option<u32>,
    first: u32,
    count: u32,
    uniforms: DrawUniforms,
}

#[derive(Default)]
struct State {
    ids: HandleAllocator,
    buffers: HashMap<u32, Option<wgpu::Buffer>>,
    vertex_arrays: HashMap<u32, VertexArraySlot>,
    textures: HashMap<u32, TextureSlot>,
    shaders: HashMap<u32, ShaderSlot>,
    programs: HashMap<u32, ProgramSlot>,
    pipelines: HashMap<(u32, Vec<VertexAttrib>), Option<wgpu::RenderPipeline>>,
    bound_vao: Option<u32>,
    bound_texture: Option<u32>,
    program: Option<u32>,
    uniforms: DrawUniforms,
    draws: Vec<DrawCommand>,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    uniform_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    /// Bound when a draw has no texture.
    white: wgpu::BindGroup,
    uniform_stride: u64,
    state: Mutex<State>,
}

impl WgpuDevice {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw uniforms BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(size_of::<DrawUniforms>() as u64),
                },
                count: None,
            }],
        });
        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let white_data = TextureData::solid(1, 1, [255, 255, 255]);
        let white_view = upload_rgb8(&device, &queue, "White", &white_data);
        let white_sampler = device.create_sampler(&sampler_descriptor(SamplerDesc::REPEAT_LINEAR));
        let white = texture_bind_group(&device, &texture_bgl, &white_view, &white_sampler);

        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_stride = (size_of::<DrawUniforms>() as u64).next_multiple_of(alignment);

        Self {
            device,
            queue,
            color_format,
            depth_format,
            uniform_bgl,
            texture_bgl,
            white,
            uniform_stride,
            state: Mutex::new(State::default()),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Clear the targets and replay every recorded draw into one render pass.
    pub fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear: wgpu::Color,
    ) {
        let mut state = self.state.lock();
        let draws = take(&mut state.draws);

        for draw in &draws {
            self.ensure_pipeline(&mut state, draw);
        }

        let stride = self.uniform_stride as usize;
        let mut bytes = vec![0u8; stride * draws.len().max(1)];
        for (i, draw) in draws.iter().enumerate() {
            let block = bytemuck::bytes_of(&draw.uniforms);
            bytes[i * stride..i * stride + block.len()].copy_from_slice(block);
        }
        let ubo = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Draw uniforms"),
                contents: &bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw uniforms BG"),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &ubo,
                    offset: 0,
                    size: NonZeroU64::new(size_of::<DrawUniforms>() as u64),
                }),
            }],
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ModelPass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        for (i, draw) in draws.iter().enumerate() {
            let Some(vao) = state.vertex_arrays.get(&draw.vao) else {
                log::warn!("Draw skipped: vertex array {} was deleted", draw.vao);
                continue;
            };
            let key = (draw.program, vao.attribs.clone());
            let Some(Some(pipeline)) = state.pipelines.get(&key) else {
                continue;
            };
            let Some(Some(buffer)) = vao.buffer.and_then(|b| state.buffers.get(&b)) else {
                log::warn!("Draw skipped: vertex array {} has no buffer data", draw.vao);
                continue;
            };
            let texture_bg = draw
                .texture
                .and_then(|t| state.textures.get(&t))
                .and_then(|t| t.bind_group.as_ref())
                .unwrap_or(&self.white);

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &uniform_bg, &[(i * stride) as u32]);
            rpass.set_bind_group(1, texture_bg, &[]);
            rpass.set_vertex_buffer(0, buffer.slice(..));
            rpass.draw(draw.first..draw.first + draw.count, 0..1);
        }
    }

    /// Build (once) the pipeline for a program + vertex layout pair. Failures
    /// are cached as `None` so they are logged a single time.
    fn ensure_pipeline(&self, state: &mut State, draw: &DrawCommand) {
        let Some(attribs) = state.vertex_arrays.get(&draw.vao).map(|v| v.attribs.clone()) else {
            return;
        };
        let key = (draw.program, attribs);
        if state.pipelines.contains_key(&key) {
            return;
        }
        let pipeline = match state.programs.get(&draw.program) {
            Some(program) if program.linked => self.create_pipeline(program, &key.1),
            _ => {
                log::warn!("Draw with unlinked program {}", draw.program);
                None
            }
        };
        state.pipelines.insert(key, pipeline);
    }

    fn create_pipeline(
        &self,
        program: &ProgramSlot,
        attribs: &[VertexAttrib],
    ) -> Option<wgpu::RenderPipeline> {
        let (Some(vs), Some(fs)) = (program.vertex.as_ref(), program.fragment.as_ref()) else {
            return None;
        };
        let attributes: Vec<wgpu::VertexAttribute> = attribs
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: float_format(a.components),
                offset: u64::from(a.offset),
                shader_location: a.index,
            })
            .collect();
        let stride = attribs.first().map_or(0, |a| u64::from(a.stride));

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Model PipelineLayout"),
                bind_group_layouts: &[&self.uniform_bgl, &self.texture_bgl],
                push_constant_ranges: &[],
            });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Model Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: vs,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fs,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: self.depth_format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            None => Some(pipeline),
            Some(err) => {
                log::error!("Pipeline creation failed: {err}");
                None
            }
        }
    }

    fn write_field(&self, location: Option<UniformLocation>, write: impl FnOnce(Field, &mut DrawUniforms) -> bool) {
        let Some(field) = location.and_then(Field::from_location) else {
            return;
        };
        let mut state = self.state.lock();
        if !write(field, &mut state.uniforms) {
            log::debug!("Uniform write with mismatched type for {field:?} ignored");
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&self) -> BufferHandle {
        let mut state = self.state.lock();
        let id = state.ids.next();
        state.buffers.insert(id.get(), None);
        BufferHandle(id)
    }

    fn buffer_data(&self, buffer: BufferHandle, data: &[u8]) {
        let mut state = self.state.lock();
        let Some(slot) = state.buffers.get_mut(&buffer.id()) else {
            log::warn!("buffer_data on unknown {buffer}");
            return;
        };
        *slot = Some(
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Vertex buffer"),
                    contents: data,
                    usage: wgpu::BufferUsages::VERTEX,
                }),
        );
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        if let Some(Some(b)) = self.state.lock().buffers.remove(&buffer.id()) {
            b.destroy();
        }
    }

    fn create_vertex_array(&self) -> VertexArrayHandle {
        let mut state = self.state.lock();
        let id = state.ids.next();
        state.vertex_arrays.insert(id.get(), VertexArraySlot::default());
        VertexArrayHandle(id)
    }

    fn vertex_attrib(&self, vao: VertexArrayHandle, buffer: BufferHandle, attrib: VertexAttrib) {
        let mut state = self.state.lock();
        let Some(slot) = state.vertex_arrays.get_mut(&vao.id()) else {
            log::warn!("vertex_attrib on unknown {vao}");
            return;
        };
        if slot.buffer.is_some_and(|b| b != buffer.id()) {
            log::warn!("{vao}: attributes from several buffers are not supported");
        }
        slot.buffer = Some(buffer.id());
        slot.attribs.retain(|a| a.index != attrib.index);
        slot.attribs.push(attrib);
        slot.attribs.sort_by_key(|a| a.index);
    }

    fn bind_vertex_array(&self, vao: Option<VertexArrayHandle>) {
        self.state.lock().bound_vao = vao.map(VertexArrayHandle::id);
    }

    fn delete_vertex_array(&self, vao: VertexArrayHandle) {
        let mut state = self.state.lock();
        state.vertex_arrays.remove(&vao.id());
        if state.bound_vao == Some(vao.id()) {
            state.bound_vao = None;
        }
    }

    fn create_texture(&self) -> TextureHandle {
        let mut state = self.state.lock();
        let id = state.ids.next();
        state.textures.insert(id.get(), TextureSlot::default());
        TextureHandle(id)
    }

    fn texture_image_rgb8(&self, texture: TextureHandle, width: u32, height: u32, pixels: &[u8]) {
        if width == 0 || height == 0 || pixels.len() != (width * height * 3) as usize {
            log::warn!("{texture}: rejected {}-byte image for {width}x{height}", pixels.len());
            return;
        }
        let data = TextureData::new_rgb8(width, height, pixels.to_vec());
        let view = upload_rgb8(&self.device, &self.queue, "Model texture", &data);

        let mut state = self.state.lock();
        let Some(slot) = state.textures.get_mut(&texture.id()) else {
            log::warn!("texture_image_rgb8 on unknown {texture}");
            return;
        };
        slot.view = Some(view);
        self.rebuild_texture_bind_group(slot);
    }

    fn texture_sampling(&self, texture: TextureHandle, sampler: SamplerDesc) {
        let sampler = self.device.create_sampler(&sampler_descriptor(sampler));
        let mut state = self.state.lock();
        let Some(slot) = state.textures.get_mut(&texture.id()) else {
            log::warn!("texture_sampling on unknown {texture}");
            return;
        };
        slot.sampler = Some(sampler);
        self.rebuild_texture_bind_group(slot);
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        self.state.lock().bound_texture = texture.map(TextureHandle::id);
    }

    fn delete_texture(&self, texture: TextureHandle) {
        let mut state = self.state.lock();
        state.textures.remove(&texture.id());
        if state.bound_texture == Some(texture.id()) {
            state.bound_texture = None;
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> ShaderHandle {
        let mut state = self.state.lock();
        let id = state.ids.next();
        state.shaders.insert(
            id.get(),
            ShaderSlot {
                stage,
                source: String::new(),
                module: None,
                log: String::new(),
            },
        );
        ShaderHandle(id)
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        if let Some(slot) = self.state.lock().shaders.get_mut(&shader.id()) {
            slot.source = source.to_owned();
            slot.module = None;
        }
    }

    fn compile_shader(&self, shader: ShaderHandle) -> bool {
        let mut state = self.state.lock();
        let Some(slot) = state.shaders.get_mut(&shader.id()) else {
            return false;
        };
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match slot.stage {
                    ShaderStage::Vertex => "Vertex WGSL",
                    ShaderStage::Fragment => "Fragment WGSL",
                }),
                source: wgpu::ShaderSource::Wgsl(slot.source.as_str().into()),
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            None => {
                slot.module = Some(module);
                slot.log.clear();
                true
            }
            Some(err) => {
                slot.module = None;
                slot.log = err.to_string();
                false
            }
        }
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        self.state
            .lock()
            .shaders
            .get(&shader.id())
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        self.state.lock().shaders.remove(&shader.id());
    }

    fn create_program(&self) -> ProgramHandle {
        let mut state = self.state.lock();
        let id = state.ids.next();
        state.programs.insert(id.get(), ProgramSlot::default());
        ProgramHandle(id)
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        let mut state = self.state.lock();
        let Some(shader) = state.shaders.get(&shader.id()) else {
            log::warn!("attach_shader: unknown {shader}");
            return;
        };
        let (stage, module, source) = (shader.stage, shader.module.clone(), shader.source.clone());
        if let Some(slot) = state.programs.get_mut(&program.id()) {
            match stage {
                ShaderStage::Vertex => slot.vertex = module,
                ShaderStage::Fragment => slot.fragment = module,
            }
            slot.sources.push(source);
        }
    }

    fn link_program(&self, program: ProgramHandle) -> bool {
        let mut state = self.state.lock();
        let Some(slot) = state.programs.get_mut(&program.id()) else {
            return false;
        };
        let missing: Vec<&str> = [
            ("vertex", slot.vertex.is_none()),
            ("fragment", slot.fragment.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();
        slot.linked = missing.is_empty();
        slot.log = if slot.linked {
            String::new()
        } else {
            format!("missing compiled {} stage", missing.join(" and "))
        };
        slot.linked
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.state
            .lock()
            .programs
            .get(&program.id())
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        self.state.lock().program = program.map(ProgramHandle::id);
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state.lock();
        state.programs.remove(&program.id());
        state.pipelines.retain(|(p, _), _| *p != program.id());
        if state.program == Some(program.id()) {
            state.program = None;
        }
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let state = self.state.lock();
        let slot = state.programs.get(&program.id())?;
        let field = Field::by_name(name)?;
        slot.sources
            .iter()
            .any(|src| src.contains(name))
            .then_some(UniformLocation(field as u32))
    }

    fn uniform_4f(&self, location: Option<UniformLocation>, value: [f32; 4]) {
        self.write_field(location, |field, u| {
            let target = match field {
                Field::Diffuse => &mut u.diffuse,
                Field::Ambient => &mut u.ambient,
                Field::Specular => &mut u.specular,
                Field::Emissive => &mut u.emissive,
                _ => return false,
            };
            *target = value;
            true
        });
    }

    fn uniform_1f(&self, location: Option<UniformLocation>, value: f32) {
        self.write_field(location, |field, u| match field {
            Field::Shininess => {
                u.shininess = value;
                true
            }
            _ => false,
        });
    }

    fn uniform_1i(&self, location: Option<UniformLocation>, value: i32) {
        self.write_field(location, |field, u| match field {
            Field::TexCount => {
                u.tex_count = value;
                true
            }
            _ => false,
        });
    }

    fn uniform_matrix4(&self, location: Option<UniformLocation>, value: [f32; 16]) {
        self.write_field(location, |field, u| match field {
            Field::Mvp => {
                u.mvp = glam::Mat4::from_cols_array(&value).to_cols_array_2d();
                true
            }
            _ => false,
        });
    }

    fn draw_arrays(&self, first: u32, count: u32) {
        let mut state = self.state.lock();
        let (Some(program), Some(vao)) = (state.program, state.bound_vao) else {
            log::warn!("draw_arrays without a program and vertex array bound");
            return;
        };
        let command = DrawCommand {
            program,
            vao,
            texture: state.bound_texture,
            first,
            count,
            uniforms: state.uniforms,
        };
        state.draws.push(command);
    }
}

impl WgpuDevice {
    fn rebuild_texture_bind_group(&self, slot: &mut TextureSlot) {
        slot.bind_group = match (&slot.view, &slot.sampler) {
            (Some(view), Some(sampler)) => Some(texture_bind_group(
                &self.device,
                &self.texture_bgl,
                view,
                sampler,
            )),
            _ => None,
        };
    }
}

fn float_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn sampler_descriptor(desc: SamplerDesc) -> wgpu::SamplerDescriptor<'static> {
    let address = |w: WrapMode| match w {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    };
    let filter = |f: FilterMode| match f {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    };
    wgpu::SamplerDescriptor {
        label: Some("Model sampler"),
        address_mode_u: address(desc.wrap_s),
        address_mode_v: address(desc.wrap_t),
        mag_filter: filter(desc.mag_filter),
        min_filter: filter(desc.min_filter),
        ..Default::default()
    }
}

/// Upload RGB8 pixels as an sRGB RGBA8 texture (wgpu has no 3-channel format).
fn upload_rgb8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    data: &TextureData,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.to_rgba8(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture BG"),
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
        ],
    })
}
