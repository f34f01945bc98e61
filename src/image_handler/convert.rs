//! # 格式转换
//!
//! 目标格式是封闭集合 `webp / png / jpg / jpeg / gif / tiff`，
//! 解析时忽略大小写与首尾空白，`jpeg` 与 `jpg` 等价。
//! 转换结果的下载名固定为 `converted.<ext>`。

use bytes::Bytes;

use super::ImageError;
use super::encoder::{self, OutputFormat};
use super::naming;
use super::source::SourceImage;

/// 可接受的目标格式名称。
pub const SUPPORTED_TARGETS: [&str; 6] = ["webp", "png", "jpg", "jpeg", "gif", "tiff"];

/// 解析目标格式。
///
/// # 示例
/// ```rust
/// use image_toolkit::image_handler::convert::parse_target_format;
/// use image_toolkit::image_handler::encoder::OutputFormat;
///
/// assert_eq!(parse_target_format(" JPEG ")?, OutputFormat::Jpeg);
/// assert!(parse_target_format("bmp").is_err());
/// # Ok::<(), image_toolkit::image_handler::ImageError>(())
/// ```
pub fn parse_target_format(format: &str) -> Result<OutputFormat, ImageError> {
    match format.trim().to_ascii_lowercase().as_str() {
        "webp" => Ok(OutputFormat::WebP),
        "png" => Ok(OutputFormat::Png),
        "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
        "gif" => Ok(OutputFormat::Gif),
        "tiff" => Ok(OutputFormat::Tiff),
        "" => Err(ImageError::InvalidInput("缺少目标格式".to_string())),
        other => Err(ImageError::InvalidFormat(format!(
            "不支持的目标格式：{}（可选：{}）",
            other,
            SUPPORTED_TARGETS.join(" / ")
        ))),
    }
}

/// 转换结果。
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl ConvertedImage {
    /// `Content-Disposition` 头的取值。
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// 把已解码的图片重新编码为目标格式。
pub fn convert_image(source: &SourceImage, target: OutputFormat, quality: f32) -> Result<ConvertedImage, ImageError> {
    let bytes = encoder::encode(source.image(), target, quality)?;
    let (width, height) = source.dimensions();

    Ok(ConvertedImage {
        bytes: Bytes::from(bytes),
        content_type: target.mime().to_string(),
        file_name: naming::converted_file_name(target.extension()),
        format: target,
        width,
        height,
    })
}
