//! # 编码模块
//!
//! ## 设计思路
//!
//! 所有产出（缩放、压缩、拼图、格式转换）都经由同一组编码器，
//! 质量系数统一使用 `0~1` 浮点表示，在这里换算为各编码器的参数：
//!
//! - JPEG：`round(q * 100)`，带透明通道的图像先铺白底再编码
//! - PNG：始终无损，质量只影响压缩力度
//! - WebP：纯 Rust 无损编码器；`q < 1` 时先对 RGB 做量化以换取体积
//! - GIF / TIFF：交给 `image` 默认编码器

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, Rgb, RgbImage};

use super::ImageError;
use super::source::SourceFormat;

/// PNG 质量低于该值时使用最高压缩力度。
const PNG_BEST_COMPRESSION_BELOW: f32 = 0.8;

/// 产出编码格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Tiff,
}

impl OutputFormat {
    pub fn label(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WebP",
            Self::Gif => "GIF",
            Self::Tiff => "TIFF",
        }
    }

    /// 文件扩展名（`jpeg` 统一为 `jpg`）。
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Tiff => "image/tiff",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    /// 以源格式重新编码时的目标格式。
    ///
    /// 只有 JPEG / PNG / WebP 支持原格式输出，其余回退为 PNG。
    pub fn same_as_source(format: SourceFormat) -> Self {
        match format {
            SourceFormat::Jpeg => Self::Jpeg,
            SourceFormat::WebP => Self::WebP,
            SourceFormat::Png | SourceFormat::Other(_) => Self::Png,
        }
    }
}

/// 将图像按目标格式与质量编码为字节。
pub fn encode(image: &DynamicImage, format: OutputFormat, quality: f32) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = flatten_on_white(image);
            let (width, height) = rgb.dimensions();
            JpegEncoder::new_with_quality(Cursor::new(&mut buffer), jpeg_quality(quality))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| ImageError::Encode(format!("JPEG 编码失败：{}", e)))?;
        }
        OutputFormat::Png => {
            let compression = if quality < PNG_BEST_COMPRESSION_BELOW {
                CompressionType::Best
            } else {
                CompressionType::Default
            };
            let rgba = image.to_rgba8();
            let (width, height) = rgba.dimensions();
            PngEncoder::new_with_quality(Cursor::new(&mut buffer), compression, PngFilterType::Adaptive)
                .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| ImageError::Encode(format!("PNG 编码失败：{}", e)))?;
        }
        OutputFormat::WebP => {
            let mut rgba = image.to_rgba8();
            if quality < 1.0 {
                quantize_rgb(&mut rgba, quality);
            }
            let (width, height) = rgba.dimensions();
            WebPEncoder::new_lossless(Cursor::new(&mut buffer))
                .encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| ImageError::Encode(format!("WebP 编码失败：{}", e)))?;
        }
        OutputFormat::Gif | OutputFormat::Tiff => {
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut Cursor::new(&mut buffer), format.image_format())
                .map_err(|e| ImageError::Encode(format!("{} 编码失败：{}", format.label(), e)))?;
        }
    }
    Ok(buffer)
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// 将透明像素合成到白色背景上。
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// 按质量系数把 RGB 通道量化到更少的色阶，alpha 保持不变。
fn quantize_rgb(data: &mut [u8], quality: f32) {
    let levels = webp_levels(quality);
    if levels >= 256 {
        return;
    }
    let step = 255.0 / (levels as f32 - 1.0);
    for pixel in data.chunks_exact_mut(4) {
        for channel in pixel.iter_mut().take(3) {
            let bucket = (f32::from(*channel) / step).round();
            *channel = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// 高质量时保留更细的色阶，低质量时激进合并。
fn webp_levels(quality: f32) -> u16 {
    if quality >= 1.0 {
        return 256;
    }
    let q = quality.clamp(0.01, 1.0);
    (2.0 + q * q * 254.0).round().clamp(2.0, 256.0) as u16
}
