use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};

/// Errors raised while turning an image file into a [`Texture`].
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("unsupported image format for '{0}' (expected PNG or JPEG)")]
    UnsupportedFormat(String),

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("image '{0}' has no pixels")]
    Empty(String),
}

/// CPU-side RGBA8 image ready for upload.
///
/// Pixels are row-major, four bytes per pixel in R, G, B, A order, so
/// `data().len() == width * height * 4`. The pixel data is immutable once
/// constructed; only the name can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    name: String,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Texture {
    /// Packs every pixel of a decoded image into a contiguous RGBA8 buffer.
    pub fn from_image(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        log::debug!(target: "texture", "creating texture from {width}x{height} {:?} image", image.color());

        let mut data = vec![0u8; width as usize * height as usize * 4];
        for (x, y, pixel) in image.pixels() {
            let i = (y as usize * width as usize + x as usize) * 4;
            data[i..i + 4].copy_from_slice(&pixel.0);
        }

        log::debug!(target: "texture", "texture size: {} bytes", data.len());
        Self {
            name: String::new(),
            width,
            height,
            data,
        }
    }

    /// Decodes a PNG or JPEG file and names the texture after the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let format = ImageFormat::from_path(path)
            .ok()
            .filter(|f| matches!(f, ImageFormat::Png | ImageFormat::Jpeg))
            .ok_or_else(|| TextureError::UnsupportedFormat(display.clone()))?;

        log::info!(target: "texture", "loading texture '{display}'");
        let image = image::ImageReader::open(path)
            .map_err(|e| TextureError::Decode {
                path: display.clone(),
                source: image::ImageError::IoError(e),
            })
            .and_then(|mut reader| {
                reader.set_format(format);
                reader.decode().map_err(|source| TextureError::Decode {
                    path: display.clone(),
                    source,
                })
            })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(TextureError::Empty(display));
        }

        let mut texture = Self::from_image(&image);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(display);
        texture.set_name(name);
        Ok(texture)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        let largest = self.width.max(self.height).max(1);
        u32::BITS - largest.leading_zeros()
    }

    /// The full-resolution image followed by each downsampled mip level.
    ///
    /// Level `n` is `max(1, W >> n)` by `max(1, H >> n)`.
    pub fn mip_chain(&self) -> Vec<MipLevel> {
        let mut levels = Vec::with_capacity(self.mip_level_count() as usize);
        levels.push(MipLevel {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        });

        let Some(base) = RgbaImage::from_raw(self.width, self.height, self.data.clone()) else {
            return levels;
        };

        for level in 1..self.mip_level_count() {
            let w = (self.width >> level).max(1);
            let h = (self.height >> level).max(1);
            let resized = image::imageops::resize(&base, w, h, image::imageops::FilterType::Triangle);
            levels.push(MipLevel {
                width: w,
                height: h,
                data: resized.into_raw(),
            });
        }

        levels
    }
}

/// One level of a texture's mip chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}
