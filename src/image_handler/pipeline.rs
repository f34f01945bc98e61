//! # 解码与缩放流水线
//!
//! 字节进入这里之前已经过体积与签名检查（见 `loader`）。解码分两步：
//! 先只读图片头拿到宽高并对照解码预算，通过后才做完整解码，
//! 超大图片不会真正分配像素缓冲。
//!
//! 所有缩放都经过 [`scale_exact`]：`fast_image_resize` 卷积为主路径，
//! 出错时退回 `image::imageops`。

use std::io::Cursor;

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageReader, Rgba};

use super::source::{RawImageData, SourceFormat, SourceImage};
use super::{ImageConfig, ImageError, ImageHandler};

/// 按 RGBA8 估算，每像素 4 字节。
const RGBA_BYTES: u64 = 4;

/// 对照像素数与内存两条上限检查给定尺寸。
///
/// 解码前的图片头尺寸、缩放目标和拼图画布都走这一道检查。
pub(crate) fn check_pixel_budget(config: &ImageConfig, width: u32, height: u32) -> Result<(), ImageError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > config.max_decoded_pixels {
        return Err(ImageError::ResourceLimit(format!(
            "{}x{} 共 {} 像素，超过上限 {}",
            width, height, pixels, config.max_decoded_pixels
        )));
    }

    let bytes = pixels
        .checked_mul(RGBA_BYTES)
        .ok_or_else(|| ImageError::ResourceLimit(format!("{}x{} 的解码内存无法估算", width, height)))?;
    if bytes > config.max_decoded_bytes {
        return Err(ImageError::ResourceLimit(format!(
            "{}x{} 约需 {} MB 像素内存，超过上限 {} MB",
            width,
            height,
            bytes / (1024 * 1024),
            config.max_decoded_bytes / (1024 * 1024)
        )));
    }

    Ok(())
}

impl ImageHandler {
    /// 将原始字节解码为 [`SourceImage`] 并登记资源句柄。
    pub(crate) fn decode_source(
        &self,
        raw: RawImageData,
        config: &ImageConfig,
    ) -> Result<SourceImage, ImageError> {
        let reader = ImageReader::new(Cursor::new(raw.bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| ImageError::InvalidFormat(format!("读取图片头失败：{}", e)))?;
        let format = reader
            .format()
            .ok_or_else(|| ImageError::InvalidFormat(format!("{} 的格式无法识别", raw.file_name)))?;

        let (header_width, header_height) = reader
            .into_dimensions()
            .map_err(|e| ImageError::InvalidFormat(format!("图片头中没有有效尺寸：{}", e)))?;
        check_pixel_budget(config, header_width, header_height)?;

        let decoded = image::load_from_memory_with_format(&raw.bytes, format)
            .map_err(|e| ImageError::Decode(format!("{} 解码失败：{}", raw.file_name, e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::Decode(format!("{} 的尺寸为 0", raw.file_name)));
        }
        if (width, height) != (header_width, header_height) {
            check_pixel_budget(config, width, height)?;
        }

        log::info!(
            "✅ 解码完成 - [{}] {} {:?} {}x{}",
            raw.source_hint,
            raw.file_name,
            format,
            width,
            height
        );

        Ok(SourceImage::new(
            decoded,
            SourceFormat::from(format),
            raw.bytes.len() as u64,
            raw.file_name,
            &self.registry,
        ))
    }
}

/// 将图像缩放到精确尺寸（不保持比例，调用方负责算好目标尺寸）。
pub(crate) fn scale_exact(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<DynamicImage, ImageError> {
    if target_width == 0 || target_height == 0 {
        return Err(ImageError::Surface(format!(
            "无法创建 {}x{} 的绘制缓冲",
            target_width, target_height
        )));
    }

    if image.dimensions() == (target_width, target_height) {
        return Ok(image.clone());
    }

    Ok(convolve(image, target_width, target_height, filter).unwrap_or_else(|err| {
        log::warn!("⚠️ 卷积缩放失败，改用 imageops：{}", err);
        image.resize_exact(target_width, target_height, filter)
    }))
}

fn convolve(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> Result<DynamicImage, ImageError> {
    let rgba = image.to_rgba8();
    let (src_width, src_height) = rgba.dimensions();
    let src = fr::images::Image::from_vec_u8(src_width, src_height, rgba.into_raw(), fr::PixelType::U8x4)
        .map_err(|e| ImageError::Surface(format!("源缓冲不可用：{}", e)))?;
    let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));
    fr::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| ImageError::Surface(format!("卷积缩放出错：{}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, dst.into_vec())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ImageError::Surface("缩放结果长度与尺寸不符".to_string()))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
