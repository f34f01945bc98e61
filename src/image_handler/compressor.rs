//! # 质量压缩
//!
//! ## 设计思路
//!
//! 输出格式由源格式与透明度共同决定：
//!
//! | 源格式 | 条件 | 输出 | 质量 |
//! |--------|------|------|------|
//! | JPEG | - | JPEG | `q` |
//! | WebP | - | WebP | `q` |
//! | PNG | 存在 alpha < 255 的像素 | PNG | `q × 衰减系数` |
//! | PNG | 完全不透明 | JPEG | `q` |
//! | 其他 | - | JPEG | `q` |
//!
//! 不透明 PNG 转为 JPEG 是有意为之：PNG 没有有损质量参数，
//! 换格式才能真正减小体积。`CompressionPlan::format_changed` 会标出这种情况。
//!
//! 透明度检测需要读回全部像素，是单张图片里最耗时的一步，
//! 批处理时由调用方放到阻塞线程池执行。

use image::DynamicImage;

use super::ImageError;
use super::encoder::{self, OutputFormat};
use super::naming;
use super::source::{OutputArtifact, SourceFormat, SourceImage, validate_quality};

/// 压缩计划：目标格式与实际质量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionPlan {
    pub format: OutputFormat,
    pub quality: f32,
    /// 输出格式是否与源格式不同。
    pub format_changed: bool,
}

/// 根据源格式与透明度选择压缩策略。
pub fn plan(source: SourceFormat, transparent: bool, quality: f32, png_alpha_damping: f32) -> CompressionPlan {
    match source {
        SourceFormat::Jpeg => CompressionPlan {
            format: OutputFormat::Jpeg,
            quality,
            format_changed: false,
        },
        SourceFormat::WebP => CompressionPlan {
            format: OutputFormat::WebP,
            quality,
            format_changed: false,
        },
        SourceFormat::Png if transparent => CompressionPlan {
            format: OutputFormat::Png,
            quality: quality * png_alpha_damping,
            format_changed: false,
        },
        SourceFormat::Png | SourceFormat::Other(_) => CompressionPlan {
            format: OutputFormat::Jpeg,
            quality,
            format_changed: true,
        },
    }
}

/// 是否存在任何非完全不透明的像素。
pub fn has_transparency(image: &DynamicImage) -> bool {
    if !image.color().has_alpha() {
        return false;
    }
    match image {
        DynamicImage::ImageRgba8(buf) => buf.pixels().any(|p| p.0[3] < u8::MAX),
        DynamicImage::ImageLumaA8(buf) => buf.pixels().any(|p| p.0[1] < u8::MAX),
        DynamicImage::ImageRgba16(buf) => buf.pixels().any(|p| p.0[3] < u16::MAX),
        DynamicImage::ImageLumaA16(buf) => buf.pixels().any(|p| p.0[1] < u16::MAX),
        DynamicImage::ImageRgba32F(buf) => buf.pixels().any(|p| p.0[3] < 1.0),
        other => other.to_rgba16().pixels().any(|p| p.0[3] < u16::MAX),
    }
}

/// 按质量系数压缩单张图片。
pub fn compress(source: &SourceImage, quality: f32, png_alpha_damping: f32) -> Result<OutputArtifact, ImageError> {
    let quality = validate_quality(quality)?;

    // 只有 PNG 的策略依赖透明度，其余格式跳过整图扫描
    let transparent = source.format() == SourceFormat::Png && has_transparency(source.image());
    let plan = plan(source.format(), transparent, quality, png_alpha_damping);

    let bytes = encoder::encode(source.image(), plan.format, plan.quality)?;

    if plan.format_changed {
        log::info!(
            "🗜️ {} 为不透明图片，改用 {} 编码压缩",
            source.file_name(),
            plan.format.label()
        );
    }
    log::debug!(
        "🗜️ 压缩完成 - {}: {} bytes -> {} bytes（{}，q={:.2}）",
        source.file_name(),
        source.byte_size(),
        bytes.len(),
        plan.format.label(),
        plan.quality
    );

    Ok(OutputArtifact::new(
        bytes,
        plan.format,
        source.dimensions(),
        Some(plan.quality),
        0,
        naming::compressed_file_name(&source.base_name(), plan.format.extension()),
        source.registry(),
    ))
}
