//! # 等比缩放（contain）
//!
//! 尺寸策略：
//! - 宽高都未指定：保持原尺寸
//! - 仅指定宽度且保持比例：`height = round(width / aspect)`
//! - 仅指定高度且保持比例：`width = round(height * aspect)`
//! - 宽高都指定且保持比例：按 `min(w / sw, h / sh)` 缩放，完整放入目标框
//! - 不保持比例：精确输出 `width × height`，缺省的一边沿用原尺寸
//!
//! 规划出的尺寸在分配像素缓冲前先对照 `ImageConfig` 的像素与内存上限，
//! 超限返回 `ResourceLimit`。缩放后以源图片的原编码格式、按调用方给定质量重新编码。

use super::{ImageConfig, ImageError};
use super::encoder::{self, OutputFormat};
use super::naming;
use super::pipeline::{check_pixel_budget, scale_exact};
use super::source::{OutputArtifact, SourceImage, TransformSpec};

/// 计算输出尺寸。
///
/// # 示例
/// ```rust
/// use image_toolkit::image_handler::resizer::plan_dimensions;
///
/// assert_eq!(plan_dimensions(1600, 900, Some(800), None, true)?, (800, 450));
/// assert_eq!(plan_dimensions(1600, 900, Some(400), Some(400), true)?, (400, 225));
/// assert_eq!(plan_dimensions(1600, 900, Some(400), Some(400), false)?, (400, 400));
/// # Ok::<(), image_toolkit::image_handler::ImageError>(())
/// ```
pub fn plan_dimensions(
    src_width: u32,
    src_height: u32,
    width: Option<u32>,
    height: Option<u32>,
    preserve_aspect: bool,
) -> Result<(u32, u32), ImageError> {
    if width == Some(0) || height == Some(0) {
        return Err(ImageError::InvalidInput("目标宽高必须大于 0".to_string()));
    }
    if src_width == 0 || src_height == 0 {
        return Err(ImageError::Decode("源图片尺寸为 0".to_string()));
    }

    let sw = src_width as f64;
    let sh = src_height as f64;
    let aspect = sw / sh;

    let (w, h) = match (width, height, preserve_aspect) {
        (None, None, _) => (src_width, src_height),
        (Some(w), None, true) => (w, round_px(w as f64 / aspect)),
        (None, Some(h), true) => (round_px(h as f64 * aspect), h),
        (Some(w), Some(h), true) => {
            let scale = (w as f64 / sw).min(h as f64 / sh);
            // 命中限制的一边直接取请求值，避免浮点误差偏离一个像素
            if w as f64 / sw <= h as f64 / sh {
                (w, round_px(sh * scale))
            } else {
                (round_px(sw * scale), h)
            }
        }
        (w, h, false) => (w.unwrap_or(src_width), h.unwrap_or(src_height)),
    };

    Ok((w.max(1), h.max(1)))
}

fn round_px(value: f64) -> u32 {
    value.round().clamp(1.0, u32::MAX as f64) as u32
}

/// 按参数缩放并以源格式重新编码，滤镜取自 `config.resize_filter`。
pub fn resize(
    source: &SourceImage,
    spec: &TransformSpec,
    config: &ImageConfig,
) -> Result<OutputArtifact, ImageError> {
    spec.validate()?;
    let (width, height) = plan_dimensions(
        source.width(),
        source.height(),
        spec.width,
        spec.height,
        spec.preserve_aspect,
    )?;
    check_pixel_budget(config, width, height)?;

    let scaled = scale_exact(source.image(), width, height, config.resize_filter)?;
    let format = OutputFormat::same_as_source(source.format());
    let bytes = encoder::encode(&scaled, format, spec.quality)?;

    log::debug!(
        "📐 缩放完成 - {}: {}x{} -> {}x{}（{}，{} bytes）",
        source.file_name(),
        source.width(),
        source.height(),
        width,
        height,
        format.label(),
        bytes.len()
    );

    Ok(OutputArtifact::new(
        bytes,
        format,
        (width, height),
        Some(spec.quality),
        0,
        naming::resize_file_name(&source.base_name(), width, height, format.extension()),
        source.registry(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_handler::session::ResourceRegistry;
    use crate::image_handler::source::SourceFormat;
    use image::{DynamicImage, Rgba, RgbaImage};
    use proptest::prelude::*;

    #[test]
    fn absent_dimensions_keep_source_size() {
        assert_eq!(plan_dimensions(640, 480, None, None, true).unwrap(), (640, 480));
        assert_eq!(plan_dimensions(640, 480, None, None, false).unwrap(), (640, 480));
    }

    #[test]
    fn single_dimension_preserves_aspect() {
        assert_eq!(plan_dimensions(640, 480, Some(320), None, true).unwrap(), (320, 240));
        assert_eq!(plan_dimensions(640, 480, None, Some(120), true).unwrap(), (160, 120));
    }

    #[test]
    fn free_resize_uses_source_for_missing_axis() {
        assert_eq!(plan_dimensions(640, 480, Some(100), None, false).unwrap(), (100, 480));
        assert_eq!(plan_dimensions(640, 480, Some(100), Some(50), false).unwrap(), (100, 50));
    }

    #[test]
    fn zero_dimension_is_invalid_input() {
        let result = plan_dimensions(640, 480, Some(0), None, true);
        assert!(matches!(result, Err(ImageError::InvalidInput(_))));
    }

    #[test]
    fn resize_reencodes_in_source_format_and_names_output() {
        let registry = ResourceRegistry::new();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 100, Rgba([9, 80, 200, 255])));
        let source = SourceImage::from_dynamic(image, SourceFormat::Jpeg, "photos/sunset.jpeg", &registry);
        let spec = TransformSpec {
            width: Some(100),
            quality: 0.7,
            ..TransformSpec::default()
        };

        let artifact = resize(&source, &spec, &ImageConfig::default()).expect("resize");

        assert_eq!((artifact.width(), artifact.height()), (100, 50));
        assert_eq!(artifact.format(), OutputFormat::Jpeg);
        assert_eq!(artifact.file_name(), "sunset_100x50.jpg");
        assert_eq!(image::guess_format(artifact.bytes()).unwrap(), image::ImageFormat::Jpeg);
        assert_eq!(registry.live(), 2);
    }

    #[test]
    fn oversized_target_is_rejected_before_allocation() {
        let registry = ResourceRegistry::new();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255])));
        let source = SourceImage::from_dynamic(image, SourceFormat::Png, "tiny.png", &registry);
        let spec = TransformSpec {
            width: Some(200_000),
            height: Some(200_000),
            preserve_aspect: false,
            ..TransformSpec::default()
        };

        let result = resize(&source, &spec, &ImageConfig::default());

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
        assert_eq!(registry.live(), 1);
    }

    #[test]
    fn tall_single_axis_upscale_is_budgeted_too() {
        let registry = ResourceRegistry::new();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 400, Rgba([1, 2, 3, 255])));
        let source = SourceImage::from_dynamic(image, SourceFormat::Png, "strip.png", &registry);
        let spec = TransformSpec {
            width: Some(50_000),
            ..TransformSpec::default()
        };

        let result = resize(&source, &spec, &ImageConfig::default());

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    proptest! {
        #[test]
        fn single_axis_keeps_aspect_within_a_pixel(
            sw in 1u32..6000, sh in 1u32..6000, target in 1u32..4000, use_width in any::<bool>()
        ) {
            let (w, h) = if use_width {
                plan_dimensions(sw, sh, Some(target), None, true).unwrap()
            } else {
                plan_dimensions(sw, sh, None, Some(target), true).unwrap()
            };
            let aspect = sw as f64 / sh as f64;
            if use_width {
                prop_assert_eq!(w, target);
                prop_assert!((h as f64 - (w as f64 / aspect)).abs() <= 1.0);
            } else {
                prop_assert_eq!(h, target);
                prop_assert!((w as f64 - (h as f64 * aspect)).abs() <= 1.0);
            }
        }

        #[test]
        fn contain_never_exceeds_box_and_touches_one_side(
            sw in 1u32..6000, sh in 1u32..6000, bw in 1u32..4000, bh in 1u32..4000
        ) {
            let (w, h) = plan_dimensions(sw, sh, Some(bw), Some(bh), true).unwrap();
            prop_assert!(w <= bw);
            prop_assert!(h <= bh);
            prop_assert!(w == bw || h == bh);
        }
    }
}
