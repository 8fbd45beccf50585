use anyhow::{Result, anyhow};
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;

/// JPEG quality used for both derivatives
const JPEG_QUALITY: u8 = 85;

/// Resized copies produced for every uploaded image
#[derive(Debug)]
pub struct Derivatives {
    pub full: Vec<u8>,
    pub thumbnail: Vec<u8>,
    /// Dimensions of the oriented original
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageService {
    full_size: u32,
    thumbnail_size: u32,
}

impl ImageService {
    pub fn new(full_size: u32, thumbnail_size: u32) -> Self {
        Self {
            full_size,
            thumbnail_size,
        }
    }

    /// Decode, orient and resize off the async executor
    pub async fn generate(&self, data: Vec<u8>) -> Result<Derivatives> {
        let service = *self;
        tokio::task::spawn_blocking(move || service.generate_blocking(&data))
            .await
            .map_err(|e| anyhow!("Image task panicked: {}", e))?
    }

    pub fn generate_blocking(&self, data: &[u8]) -> Result<Derivatives> {
        let img =
            image::load_from_memory(data).map_err(|e| anyhow!("Failed to load image: {}", e))?;
        let img = apply_orientation(img, exif_orientation(data));
        let (width, height) = img.dimensions();

        let full = bound(&img, self.full_size);
        let thumbnail = img.thumbnail(self.thumbnail_size, self.thumbnail_size);

        Ok(Derivatives {
            full: encode_jpeg(&full)?,
            thumbnail: encode_jpeg(&thumbnail)?,
            width,
            height,
        })
    }
}

/// Shrink so the longest edge fits `max`, never enlarging
fn bound(img: &DynamicImage, max: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= max && h <= max {
        img.clone()
    } else {
        img.resize(max, max, image::imageops::FilterType::Lanczos3)
    }
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    // JPEG has no alpha channel and only 8-bit samples
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| anyhow!("Failed to encode JPEG: {}", e))?;
    Ok(out)
}

/// EXIF orientation tag (1..=8), 1 when absent or unreadable
fn exif_orientation(data: &[u8]) -> u32 {
    let reader = exif::Reader::new();
    reader
        .read_from_container(&mut Cursor::new(data))
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|f| f.value.get_uint(0))
        })
        .unwrap_or(1)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
