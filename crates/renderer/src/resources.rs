//! Owning wrappers for device buffers, vertex arrays and textures.
//!
//! Each wrapper creates its handle on construction and deletes it on drop.
//! None of them are `Clone`: a handle has exactly one owner.

use crate::device::{
    BufferHandle, DeviceRef, SamplerDesc, TextureHandle, VertexArrayHandle,
    VertexAttrib,
};

pub struct VertexBuffer {
    device: DeviceRef,
    handle: BufferHandle,
}

impl VertexBuffer {
    pub fn new(device: &DeviceRef) -> Self {
        let handle = device.create_buffer();
        Self {
            device: device.clone(),
            handle,
        }
    }

    /// Create a buffer and upload `data` once as static vertex data.
    pub fn with_data(device: &DeviceRef, data: &[u8]) -> Self {
        let buffer = Self::new(device);
        buffer.upload(data);
        buffer
    }

    pub fn upload(&self, data: &[u8]) {
        self.device.buffer_data(self.handle, data);
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        self.device.delete_buffer(self.handle);
    }
}

pub struct VertexArray {
    device: DeviceRef,
    handle: VertexArrayHandle,
}

impl VertexArray {
    pub fn new(device: &DeviceRef) -> Self {
        let handle = device.create_vertex_array();
        Self {
            device: device.clone(),
            handle,
        }
    }

    /// Enable every attribute in `layout`, all sourced from `buffer`.
    pub fn configure(&self, buffer: &VertexBuffer, layout: &[VertexAttrib]) {
        for attrib in layout {
            self.device
                .vertex_attrib(self.handle, buffer.handle(), *attrib);
        }
    }

    pub fn bind(&self) {
        self.device.bind_vertex_array(Some(self.handle));
    }

    pub fn unbind(&self) {
        self.device.bind_vertex_array(None);
    }

    #[inline]
    pub fn handle(&self) -> VertexArrayHandle {
        self.handle
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        self.device.delete_vertex_array(self.handle);
    }
}

pub struct Texture {
    device: DeviceRef,
    handle: TextureHandle,
}

impl Texture {
    pub fn new(device: &DeviceRef) -> Self {
        let handle = device.create_texture();
        Self {
            device: device.clone(),
            handle,
        }
    }

    /// Create a texture from RGB8 pixels with the given sampling state.
    pub fn from_rgb8(
        device: &DeviceRef,
        width: u32,
        height: u32,
        pixels: &[u8],
        sampler: SamplerDesc,
    ) -> Self {
        let texture = Self::new(device);
        device.texture_image_rgb8(texture.handle, width, height, pixels);
        device.texture_sampling(texture.handle, sampler);
        texture
    }

    #[inline]
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.device.delete_texture(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceCall, RecordingDevice, ResourceKind};
    use std::rc::Rc;

    #[test]
    fn wrappers_release_exactly_once() {
        let rec = Rc::new(RecordingDevice::new());
        let device: DeviceRef = rec.clone();
        {
            let vbo = VertexBuffer::with_data(&device, &[1, 2, 3, 4]);
            let vao = VertexArray::new(&device);
            vao.configure(
                &vbo,
                &[VertexAttrib {
                    index: 0,
                    components: 1,
                    stride: 4,
                    offset: 0,
                }],
            );
            let _tex = Texture::from_rgb8(&device, 1, 1, &[0, 0, 0], SamplerDesc::REPEAT_LINEAR);
            assert_eq!(rec.live(ResourceKind::Buffer), 1);
            assert_eq!(rec.live(ResourceKind::VertexArray), 1);
            assert_eq!(rec.live(ResourceKind::Texture), 1);
        }
        for kind in [
            ResourceKind::Buffer,
            ResourceKind::VertexArray,
            ResourceKind::Texture,
        ] {
            assert_eq!(rec.created(kind), 1);
            assert_eq!(rec.deleted(kind), 1);
            assert_eq!(rec.live(kind), 0);
        }
        assert!(rec.misuse().is_empty());
    }

    #[test]
    fn static_upload_is_recorded() {
        let rec = Rc::new(RecordingDevice::new());
        let device: DeviceRef = rec.clone();
        let vbo = VertexBuffer::with_data(&device, &[0u8; 64]);
        assert!(rec.calls().contains(&DeviceCall::BufferData {
            buffer: vbo.handle(),
            len: 64,
        }));
    }
}
