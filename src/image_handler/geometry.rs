//! # 居中裁剪填充（cover）
//!
//! 比较源图与目标的宽高比：源图更宽时左右等量裁边，否则上下等量裁边，
//! 再把裁剪区域等比缩放到目标尺寸。输出不留白、不变形。

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use super::ImageError;
use super::pipeline::scale_exact;

/// 源图上的裁剪区域。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 计算居中裁剪区域，使其宽高比与目标一致。
///
/// 所有尺寸必须大于 0。
///
/// # 示例
/// ```rust
/// use image_toolkit::image_handler::geometry::{crop_rect, CropRect};
///
/// let rect = crop_rect(4000, 2000, 400, 800);
/// assert_eq!(rect, CropRect { x: 1500, y: 0, width: 1000, height: 2000 });
/// ```
pub fn crop_rect(src_width: u32, src_height: u32, dst_width: u32, dst_height: u32) -> CropRect {
    let src_aspect = src_width as f64 / src_height as f64;
    let dst_aspect = dst_width as f64 / dst_height as f64;

    if src_aspect > dst_aspect {
        let width = ((src_height as f64 * dst_aspect).round() as u32).clamp(1, src_width);
        CropRect {
            x: (src_width - width) / 2,
            y: 0,
            width,
            height: src_height,
        }
    } else {
        let height = ((src_width as f64 / dst_aspect).round() as u32).clamp(1, src_height);
        CropRect {
            x: 0,
            y: (src_height - height) / 2,
            width: src_width,
            height,
        }
    }
}

/// 将图像裁剪并缩放为恰好 `dst_width × dst_height`。
pub fn fit(
    image: &DynamicImage,
    dst_width: u32,
    dst_height: u32,
    filter: FilterType,
) -> Result<RgbaImage, ImageError> {
    if dst_width == 0 || dst_height == 0 {
        return Err(ImageError::Surface(format!(
            "无法创建 {}x{} 的绘制缓冲",
            dst_width, dst_height
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageError::Decode("源图片尺寸为 0".to_string()));
    }

    let rect = crop_rect(image.width(), image.height(), dst_width, dst_height);
    let cropped = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let scaled = scale_exact(&cropped, dst_width, dst_height, filter)?;

    Ok(scaled.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    #[test]
    fn wide_source_crops_left_and_right() {
        let rect = crop_rect(4000, 2000, 400, 800);
        assert_eq!(rect, CropRect { x: 1500, y: 0, width: 1000, height: 2000 });
    }

    #[test]
    fn tall_source_crops_top_and_bottom() {
        let rect = crop_rect(1000, 3000, 100, 100);
        assert_eq!(rect, CropRect { x: 0, y: 1000, width: 1000, height: 1000 });
    }

    #[test]
    fn fit_keeps_center_content() {
        // 左右两侧红色，中间蓝色：裁剪后只剩蓝色
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([255, 0, 0, 255])
            }
        }));
        let fitted = fit(&image, 50, 50, FilterType::Triangle).expect("fit");
        assert_eq!(fitted.dimensions(), (50, 50));
        assert_eq!(fitted.get_pixel(25, 25).0, [0, 0, 255, 255]);
    }

    #[test]
    fn fit_rejects_zero_target() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(10, 10));
        assert!(matches!(fit(&image, 0, 10, FilterType::Triangle), Err(ImageError::Surface(_))));
    }

    proptest! {
        #[test]
        fn crop_stays_inside_source_and_matches_target_aspect(
            sw in 1u32..5000, sh in 1u32..5000, dw in 1u32..2000, dh in 1u32..2000
        ) {
            let rect = crop_rect(sw, sh, dw, dh);
            prop_assert!(rect.width >= 1 && rect.height >= 1);
            prop_assert!(rect.x + rect.width <= sw);
            prop_assert!(rect.y + rect.height <= sh);
            prop_assert!(rect.width == sw || rect.height == sh);

            // 裁剪结果与目标比例的误差不超过一个像素的取整
            let expected_w = rect.height as f64 * dw as f64 / dh as f64;
            let expected_h = rect.width as f64 * dh as f64 / dw as f64;
            prop_assert!(
                (rect.width as f64 - expected_w).abs() <= 1.0
                    || (rect.height as f64 - expected_h).abs() <= 1.0
            );
        }

        #[test]
        fn fit_output_is_exact_target(
            sw in 1u32..64, sh in 1u32..64, dw in 1u32..48, dh in 1u32..48
        ) {
            let image = DynamicImage::ImageRgba8(RgbaImage::new(sw, sh));
            let fitted = fit(&image, dw, dh, FilterType::Triangle).expect("fit");
            prop_assert_eq!(fitted.dimensions(), (dw, dh));
        }
    }
}
