//! GL-style graphics device API with explicit context.
//!
//! Resources are referenced by opaque integer handles. A device is shared as
//! [`DeviceRef`] and driven from one thread; implementations use interior
//! mutability behind `&self`.

use std::{fmt, num::NonZeroU32, rc::Rc};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            #[inline]
            pub fn id(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Vertex/uniform buffer object.
    BufferHandle
);
handle!(
    /// Vertex array: attribute layout bound to a buffer.
    VertexArrayHandle
);
handle!(
    /// 2D texture plus its sampling state.
    TextureHandle
);
handle!(
    /// Single shader stage.
    ShaderHandle
);
handle!(
    /// Linked program (all stages).
    ProgramHandle
);

/// Resolved uniform slot inside a program. Lookups that fail return `None`;
/// writes to `None` are ignored by every device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// One float vertex attribute sourced from a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttrib {
    pub index: u32,
    /// Number of f32 components (1..=4).
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerDesc {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
}

impl SamplerDesc {
    /// Repeat on both axes, linear magnify/minify.
    pub const REPEAT_LINEAR: Self = Self {
        wrap_s: WrapMode::Repeat,
        wrap_t: WrapMode::Repeat,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
    };
}

/// The device operations the model adapter and renderer need.
pub trait GraphicsDevice {
    fn create_buffer(&self) -> BufferHandle;
    /// Upload immutable vertex data (static draw).
    fn buffer_data(&self, buffer: BufferHandle, data: &[u8]);
    fn delete_buffer(&self, buffer: BufferHandle);

    fn create_vertex_array(&self) -> VertexArrayHandle;
    /// Enable `attrib` on `vao`, sourced from `buffer`.
    fn vertex_attrib(&self, vao: VertexArrayHandle, buffer: BufferHandle, attrib: VertexAttrib);
    fn bind_vertex_array(&self, vao: Option<VertexArrayHandle>);
    fn delete_vertex_array(&self, vao: VertexArrayHandle);

    fn create_texture(&self) -> TextureHandle;
    /// Upload an immutable 2D RGB8 image.
    fn texture_image_rgb8(&self, texture: TextureHandle, width: u32, height: u32, pixels: &[u8]);
    fn texture_sampling(&self, texture: TextureHandle, sampler: SamplerDesc);
    /// `None` unbinds the texture unit.
    fn bind_texture(&self, texture: Option<TextureHandle>);
    fn delete_texture(&self, texture: TextureHandle);

    fn create_shader(&self, stage: ShaderStage) -> ShaderHandle;
    fn shader_source(&self, shader: ShaderHandle, source: &str);
    fn compile_shader(&self, shader: ShaderHandle) -> bool;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&self, shader: ShaderHandle);

    fn create_program(&self) -> ProgramHandle;
    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle);
    fn link_program(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn use_program(&self, program: Option<ProgramHandle>);
    fn delete_program(&self, program: ProgramHandle);

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn uniform_4f(&self, location: Option<UniformLocation>, value: [f32; 4]);
    fn uniform_1f(&self, location: Option<UniformLocation>, value: f32);
    fn uniform_1i(&self, location: Option<UniformLocation>, value: i32);
    /// Column-major 4x4 matrix.
    fn uniform_matrix4(&self, location: Option<UniformLocation>, value: [f32; 16]);

    /// Non-indexed triangle list draw from the bound vertex array.
    fn draw_arrays(&self, first: u32, count: u32);
}

/// Shared device context.
pub type DeviceRef = Rc<dyn GraphicsDevice>;

/// Sequential id source for device handles; ids start at 1.
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    last: u32,
}

impl HandleAllocator {
    pub(crate) fn next(&mut self) -> NonZeroU32 {
        self.last = self.last.checked_add(1).expect("device handle ids exhausted");
        NonZeroU32::new(self.last).expect("handle ids start at 1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_starts_at_one_and_increments() {
        let mut ids = HandleAllocator::default();
        assert_eq!(ids.next().get(), 1);
        assert_eq!(ids.next().get(), 2);
    }

    #[test]
    fn handle_display_names_kind() {
        let h = TextureHandle(NonZeroU32::new(7).unwrap());
        assert_eq!(h.to_string(), "TextureHandle(7)");
        assert_eq!(h.id(), 7);
    }
}
