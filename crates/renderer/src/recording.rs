//! Headless device that records every call.
//!
//! Backs `--headless` runs and tests: it keeps a call log, per-kind
//! create/delete counters, the set of live handles, and a list of misuse
//! reports (double frees, unknown handles). Shaders always compile unless
//! their source is empty; uniform names resolve when the source mentions them.

use std::{
    collections::{BTreeSet, HashMap},
    num::NonZeroU32,
};

use parking_lot::Mutex;

use crate::device::{
    BufferHandle, GraphicsDevice, HandleAllocator, ProgramHandle, SamplerDesc,
    ShaderHandle, ShaderStage, TextureHandle, UniformLocation, VertexArrayHandle, VertexAttrib,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Buffer,
    VertexArray,
    Texture,
    Shader,
    Program,
}

/// A recorded device call. Payloads are summarized (lengths, not bytes).
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    Create(ResourceKind, u32),
    Delete(ResourceKind, u32),
    BufferData {
        buffer: BufferHandle,
        len: usize,
    },
    VertexAttrib {
        vao: VertexArrayHandle,
        buffer: BufferHandle,
        attrib: VertexAttrib,
    },
    BindVertexArray(Option<VertexArrayHandle>),
    TextureImage {
        texture: TextureHandle,
        width: u32,
        height: u32,
    },
    TextureSampling(TextureHandle, SamplerDesc),
    BindTexture(Option<TextureHandle>),
    ShaderSource(ShaderHandle),
    CompileShader(ShaderHandle),
    AttachShader(ProgramHandle, ShaderHandle),
    LinkProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    Uniform4f(Option<UniformLocation>, [f32; 4]),
    Uniform1f(Option<UniformLocation>, f32),
    Uniform1i(Option<UniformLocation>, i32),
    UniformMatrix4(Option<UniformLocation>),
    DrawArrays {
        first: u32,
        count: u32,
    },
}

/// A draw call with the state that was bound when it was issued.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub first: u32,
    pub count: u32,
    pub vertex_array: Option<VertexArrayHandle>,
    pub texture: Option<TextureHandle>,
    pub program: Option<ProgramHandle>,
}

#[derive(Default)]
struct State {
    ids: HandleAllocator,
    calls: Vec<DeviceCall>,
    draws: Vec<DrawRecord>,
    live: HashMap<ResourceKind, BTreeSet<u32>>,
    created: HashMap<ResourceKind, usize>,
    deleted: HashMap<ResourceKind, usize>,
    misuse: Vec<String>,
    shader_sources: HashMap<u32, String>,
    program_shaders: HashMap<u32, Vec<u32>>,
    uniform_names: HashMap<(u32, String), UniformLocation>,
    bound_vao: Option<VertexArrayHandle>,
    bound_texture: Option<TextureHandle>,
    program: Option<ProgramHandle>,
}

impl State {
    fn create(&mut self, kind: ResourceKind) -> NonZeroU32 {
        let id = self.ids.next();
        self.live.entry(kind).or_default().insert(id.get());
        *self.created.entry(kind).or_default() += 1;
        self.calls.push(DeviceCall::Create(kind, id.get()));
        id
    }

    fn delete(&mut self, kind: ResourceKind, id: u32) {
        self.calls.push(DeviceCall::Delete(kind, id));
        if self.live.entry(kind).or_default().remove(&id) {
            *self.deleted.entry(kind).or_default() += 1;
        } else {
            let report = format!("delete of non-live {kind:?} {id}");
            log::warn!("RecordingDevice: {report}");
            self.misuse.push(report);
        }
    }

    fn check_live(&mut self, kind: ResourceKind, id: u32, op: &str) {
        if !self.live.get(&kind).is_some_and(|ids| ids.contains(&id)) {
            self.misuse.push(format!("{op} on non-live {kind:?} {id}"));
        }
    }
}

/// Device that performs no GPU work and remembers what it was asked to do.
#[derive(Default)]
pub struct RecordingDevice {
    state: Mutex<State>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.lock().draws.clone()
    }

    /// Forget recorded calls and draws; counters and live sets are kept.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.draws.clear();
    }

    pub fn created(&self, kind: ResourceKind) -> usize {
        self.state.lock().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn deleted(&self, kind: ResourceKind) -> usize {
        self.state.lock().deleted.get(&kind).copied().unwrap_or(0)
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        self.state.lock().live.get(&kind).map_or(0, BTreeSet::len)
    }

    /// Double frees and operations on unknown handles, in order.
    pub fn misuse(&self) -> Vec<String> {
        self.state.lock().misuse.clone()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_buffer(&self) -> BufferHandle {
        BufferHandle(self.state.lock().create(ResourceKind::Buffer))
    }

    fn buffer_data(&self, buffer: BufferHandle, data: &[u8]) {
        let mut state = self.state.lock();
        state.check_live(ResourceKind::Buffer, buffer.id(), "buffer_data");
        state.calls.push(DeviceCall::BufferData {
            buffer,
            len: data.len(),
        });
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        self.state.lock().delete(ResourceKind::Buffer, buffer.id());
    }

    fn create_vertex_array(&self) -> VertexArrayHandle {
        VertexArrayHandle(self.state.lock().create(ResourceKind::VertexArray))
    }

    fn vertex_attrib(&self, vao: VertexArrayHandle, buffer: BufferHandle, attrib: VertexAttrib) {
        let mut state = self.state.lock();
        state.check_live(ResourceKind::VertexArray, vao.id(), "vertex_attrib");
        state.check_live(ResourceKind::Buffer, buffer.id(), "vertex_attrib");
        state.calls.push(DeviceCall::VertexAttrib {
            vao,
            buffer,
            attrib,
        });
    }

    fn bind_vertex_array(&self, vao: Option<VertexArrayHandle>) {
        let mut state = self.state.lock();
        if let Some(vao) = vao {
            state.check_live(ResourceKind::VertexArray, vao.id(), "bind_vertex_array");
        }
        state.bound_vao = vao;
        state.calls.push(DeviceCall::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: VertexArrayHandle) {
        self.state.lock().delete(ResourceKind::VertexArray, vao.id());
    }

    fn create_texture(&self) -> TextureHandle {
        TextureHandle(self.state.lock().create(ResourceKind::Texture))
    }

    fn texture_image_rgb8(&self, texture: TextureHandle, width: u32, height: u32, pixels: &[u8]) {
        let mut state = self.state.lock();
        state.check_live(ResourceKind::Texture, texture.id(), "texture_image_rgb8");
        if pixels.len() != (width * height * 3) as usize {
            state
                .misuse
                .push(format!("texture {texture}: {} bytes for {width}x{height}", pixels.len()));
        }
        state.calls.push(DeviceCall::TextureImage {
            texture,
            width,
            height,
        });
    }

    fn texture_sampling(&self, texture: TextureHandle, sampler: SamplerDesc) {
        let mut state = self.state.lock();
        state.check_live(ResourceKind::Texture, texture.id(), "texture_sampling");
        state.calls.push(DeviceCall::TextureSampling(texture, sampler));
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        let mut state = self.state.lock();
        if let Some(texture) = texture {
            state.check_live(ResourceKind::Texture, texture.id(), "bind_texture");
        }
        state.bound_texture = texture;
        state.calls.push(DeviceCall::BindTexture(texture));
    }

    fn delete_texture(&self, texture: TextureHandle) {
        self.state.lock().delete(ResourceKind::Texture, texture.id());
    }

    fn create_shader(&self, _stage: ShaderStage) -> ShaderHandle {
        ShaderHandle(self.state.lock().create(ResourceKind::Shader))
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        let mut state = self.state.lock();
        state.shader_sources.insert(shader.id(), source.to_owned());
        state.calls.push(DeviceCall::ShaderSource(shader));
    }

    fn compile_shader(&self, shader: ShaderHandle) -> bool {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::CompileShader(shader));
        state
            .shader_sources
            .get(&shader.id())
            .is_some_and(|src| !src.trim().is_empty())
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        let state = self.state.lock();
        match state.shader_sources.get(&shader.id()) {
            Some(src) if !src.trim().is_empty() => String::new(),
            _ => format!("shader {shader}: empty source"),
        }
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        let mut state = self.state.lock();
        state.delete(ResourceKind::Shader, shader.id());
    }

    fn create_program(&self) -> ProgramHandle {
        ProgramHandle(self.state.lock().create(ResourceKind::Program))
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        let mut state = self.state.lock();
        state.check_live(ResourceKind::Shader, shader.id(), "attach_shader");
        state
            .program_shaders
            .entry(program.id())
            .or_default()
            .push(shader.id());
        state.calls.push(DeviceCall::AttachShader(program, shader));
    }

    fn link_program(&self, program: ProgramHandle) -> bool {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::LinkProgram(program));
        state
            .program_shaders
            .get(&program.id())
            .is_some_and(|shaders| !shaders.is_empty())
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        let state = self.state.lock();
        match state.program_shaders.get(&program.id()) {
            Some(shaders) if !shaders.is_empty() => String::new(),
            _ => format!("program {program}: no shaders attached"),
        }
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        let mut state = self.state.lock();
        state.program = program;
        state.calls.push(DeviceCall::UseProgram(program));
    }

    fn delete_program(&self, program: ProgramHandle) {
        let mut state = self.state.lock();
        state.program_shaders.remove(&program.id());
        state.delete(ResourceKind::Program, program.id());
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let mut state = self.state.lock();
        let declared = state
            .program_shaders
            .get(&program.id())?
            .iter()
            .filter_map(|s| state.shader_sources.get(s))
            .any(|src| src.contains(name));
        if !declared {
            return None;
        }
        let next = UniformLocation(state.uniform_names.len() as u32);
        Some(
            *state
                .uniform_names
                .entry((program.id(), name.to_owned()))
                .or_insert(next),
        )
    }

    fn uniform_4f(&self, location: Option<UniformLocation>, value: [f32; 4]) {
        self.state.lock().calls.push(DeviceCall::Uniform4f(location, value));
    }

    fn uniform_1f(&self, location: Option<UniformLocation>, value: f32) {
        self.state.lock().calls.push(DeviceCall::Uniform1f(location, value));
    }

    fn uniform_1i(&self, location: Option<UniformLocation>, value: i32) {
        self.state.lock().calls.push(DeviceCall::Uniform1i(location, value));
    }

    fn uniform_matrix4(&self, location: Option<UniformLocation>, _value: [f32; 16]) {
        self.state.lock().calls.push(DeviceCall::UniformMatrix4(location));
    }

    fn draw_arrays(&self, first: u32, count: u32) {
        let mut state = self.state.lock();
        let record = DrawRecord {
            first,
            count,
            vertex_array: state.bound_vao,
            texture: state.bound_texture,
            program: state.program,
        };
        state.draws.push(record);
        state.calls.push(DeviceCall::DrawArrays { first, count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_free_is_reported() {
        let dev = RecordingDevice::new();
        let tex = dev.create_texture();
        dev.delete_texture(tex);
        dev.delete_texture(tex);
        assert_eq!(dev.created(ResourceKind::Texture), 1);
        assert_eq!(dev.deleted(ResourceKind::Texture), 1);
        assert_eq!(dev.misuse().len(), 1);
    }

    #[test]
    fn draws_capture_bound_state() {
        let dev = RecordingDevice::new();
        let vao = dev.create_vertex_array();
        let tex = dev.create_texture();
        dev.bind_vertex_array(Some(vao));
        dev.bind_texture(Some(tex));
        dev.draw_arrays(3, 6);
        dev.bind_texture(None);
        dev.draw_arrays(9, 3);
        let draws = dev.draws();
        assert_eq!(draws[0].texture, Some(tex));
        assert_eq!(draws[0].vertex_array, Some(vao));
        assert_eq!((draws[0].first, draws[0].count), (3, 6));
        assert_eq!(draws[1].texture, None);
    }

    #[test]
    fn uniforms_resolve_only_when_declared() {
        let dev = RecordingDevice::new();
        let vs = dev.create_shader(ShaderStage::Vertex);
        dev.shader_source(vs, "uniform vec4 uDiffuse;");
        let program = dev.create_program();
        dev.attach_shader(program, vs);
        assert!(dev.link_program(program));
        let diffuse = dev.uniform_location(program, "uDiffuse");
        assert!(diffuse.is_some());
        assert_eq!(dev.uniform_location(program, "uDiffuse"), diffuse);
        assert_eq!(dev.uniform_location(program, "uMissing"), None);
    }

    #[test]
    fn empty_shader_fails_to_compile() {
        let dev = RecordingDevice::new();
        let fs = dev.create_shader(ShaderStage::Fragment);
        dev.shader_source(fs, "   ");
        assert!(!dev.compile_shader(fs));
        assert!(dev.shader_info_log(fs).contains("empty source"));
    }
}
