//! Texture decoding into CPU-side RGB8 pixel buffers.

use std::path::Path;

use crate::error::{LoadError, LoadResult};

/// 8-bit RGB pixels, row-major, before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    /// Create a new texture with given dimensions and RGB8 format.
    pub fn new_rgb8(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 3) as usize,
            "Data size doesn't match RGB8 format"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Decode any format the `image` crate was built with, converted to 8-bit
    /// RGB. A decode failure is reported, never papered over.
    pub fn load<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let img = image::open(path).map_err(|source| LoadError::TextureLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let data = rgb.into_raw();

        log::debug!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Ok(Self::new_rgb8(width, height, data))
    }

    /// Single-color texture, e.g. a 1x1 white stand-in for "no texture".
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb.repeat((width * height) as usize);
        Self::new_rgb8(width, height, data)
    }

    /// Expand to RGBA8 with opaque alpha, for APIs without a 3-channel format.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([255, 0, 0, 128]));
        img.save(&path).unwrap();

        let tex = TextureData::load(&path).unwrap();
        assert_eq!((tex.width, tex.height), (2, 3));
        assert_eq!(tex.data.len(), 2 * 3 * 3);
        assert_eq!(&tex.data[..3], &[255, 0, 0]);
    }

    #[test]
    fn undecodable_file_is_texture_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"not a png").unwrap();
        match TextureData::load(&path) {
            Err(LoadError::TextureLoad { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected TextureLoad, got {other:?}"),
        }
    }

    #[test]
    fn solid_expands_to_rgba() {
        let tex = TextureData::solid(1, 2, [10, 20, 30]);
        assert_eq!(tex.data, vec![10, 20, 30, 10, 20, 30]);
        assert_eq!(tex.to_rgba8(), vec![10, 20, 30, 255, 10, 20, 30, 255]);
    }
}
