use std::{fmt::Display, io::BufWriter, io::Cursor, str::FromStr};

use fast_image_resize::{IntoImageView as _, Resizer, images::Image};
use image::{
    DynamicImage, GenericImageView, ImageEncoder as _, ImageReader, codecs::png::PngEncoder,
};

type Result<T> = anyhow::Result<T>;

pub const VARIANT_MIME_TYPE: &str = "image/png";
pub const VARIANT_EXTENSION: &str = "png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSize {
    Thumbnail,
    Small,
    Medium,
    Large,
}

impl ImageSize {
    pub const ALL: [ImageSize; 4] = [
        ImageSize::Thumbnail,
        ImageSize::Small,
        ImageSize::Medium,
        ImageSize::Large,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ImageSize::Thumbnail => "thumbnail",
            ImageSize::Small => "small",
            ImageSize::Medium => "medium",
            ImageSize::Large => "large",
        }
    }

    /// Bounding box side in pixels
    pub fn max_dimension(&self) -> u32 {
        match self {
            ImageSize::Thumbnail => 150,
            ImageSize::Small => 480,
            ImageSize::Medium => 960,
            ImageSize::Large => 1600,
        }
    }
}

impl Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ImageSize::ALL
            .into_iter()
            .find(|size| size.name() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown image size: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}

#[derive(Debug)]
pub struct Variant {
    pub size: ImageSize,
    pub width: u32,
    pub height: u32,
    /// PNG encoded
    pub data: Vec<u8>,
}

fn calculate_dimensions(required: (u32, u32), actual: (u32, u32)) -> (u32, u32) {
    let scale = f32::min(
        required.0 as f32 / actual.0 as f32,
        required.1 as f32 / actual.1 as f32,
    )
    .min(1.0);
    let nw = (actual.0 as f32 * scale).round() as u32;
    let nh = (actual.1 as f32 * scale).round() as u32;
    (nw.max(1), nh.max(1))
}

fn decode(data: &[u8]) -> Result<DynamicImage> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;
    Ok(img)
}

/// Dimensions and mime type of uploaded image, fails if data is not a supported image
pub fn image_info(data: &[u8]) -> Result<ImageInfo> {
    let format = image::guess_format(data)?;
    let img = decode(data)?;
    let (width, height) = img.dimensions();
    Ok(ImageInfo {
        width,
        height,
        mime_type: format.to_mime_type().to_string(),
    })
}

fn encode_png(buffer: &[u8], width: u32, height: u32, img: &DynamicImage) -> Result<Vec<u8>> {
    let data = Vec::with_capacity(1024);
    let mut writer = BufWriter::new(data);
    PngEncoder::new(&mut writer).write_image(buffer, width, height, img.color().into())?;
    Ok(writer.into_inner()?)
}

fn scale_image(img: &DynamicImage, size: ImageSize) -> Result<Variant> {
    let sz = size.max_dimension();
    let actual_dim = img.dimensions();
    let (width, height) = calculate_dimensions((sz, sz), actual_dim);
    let data = if (width, height) == actual_dim {
        encode_png(img.as_bytes(), width, height, img)?
    } else {
        let mut dst_image = Image::new(
            width,
            height,
            img.pixel_type()
                .ok_or_else(|| anyhow::anyhow!("Cannot get pixel type"))?,
        );
        let mut resizer = Resizer::new();
        resizer.resize(img, &mut dst_image, None)?;
        encode_png(dst_image.buffer(), width, height, img)?
    };
    Ok(Variant {
        size,
        width,
        height,
        data,
    })
}

pub fn generate_variant(data: &[u8], size: ImageSize) -> Result<Variant> {
    let img = decode(data)?;
    scale_image(&img, size)
}

/// All sizes from one decode, failed size is returned as error in its slot
pub fn generate_variants(data: &[u8]) -> Result<Vec<(ImageSize, Result<Variant>)>> {
    let img = decode(data)?;
    Ok(ImageSize::ALL
        .into_iter()
        .map(|size| (size, scale_image(&img, size)))
        .collect())
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut data = Cursor::new(Vec::new());
        img.write_to(&mut data, ImageFormat::Png).unwrap();
        data.into_inner()
    }

    #[test]
    fn test_calculate_dimensions() {
        assert_eq!(calculate_dimensions((100, 100), (1000, 1000)), (100, 100));
        assert_eq!(calculate_dimensions((100, 100), (500, 1000)), (50, 100));
        // never upscale
        assert_eq!(calculate_dimensions((1000, 1000), (100, 50)), (100, 50));
    }

    #[test]
    fn test_sizes() {
        assert_eq!("medium".parse::<ImageSize>().unwrap(), ImageSize::Medium);
        assert!("huge".parse::<ImageSize>().is_err());
        assert_eq!(ImageSize::Large.max_dimension(), 1600);
        assert_eq!(ImageSize::Thumbnail.to_string(), "thumbnail");
    }

    #[test]
    fn test_image_info() {
        let info = image_info(&sample_png(300, 200)).unwrap();
        assert_eq!(
            info,
            ImageInfo {
                width: 300,
                height: 200,
                mime_type: "image/png".into()
            }
        );
        assert!(image_info(b"definitely not an image").is_err());
    }

    #[test]
    fn test_generate_variants() {
        let data = sample_png(600, 300);
        let thumb = generate_variant(&data, ImageSize::Thumbnail).unwrap();
        assert_eq!((thumb.width, thumb.height), (150, 75));
        let decoded = ImageReader::with_format(Cursor::new(&thumb.data), ImageFormat::Png)
            .decode()
            .unwrap();
        assert_eq!(decoded.dimensions(), (150, 75));

        let all = generate_variants(&data).unwrap();
        assert_eq!(all.len(), 4);
        let large = all
            .into_iter()
            .find(|(size, _)| *size == ImageSize::Large)
            .unwrap()
            .1
            .unwrap();
        assert_eq!((large.width, large.height), (600, 300));
    }
}
