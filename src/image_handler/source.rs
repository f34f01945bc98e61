//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义（文件选择、拖放、粘贴）
//! - `RawImageData` 表示已加载但未解码的字节
//! - `SourceImage` 表示已解码、只读的源图片
//! - `TransformSpec` 表示一次处理的用户参数快照
//! - `OutputArtifact` 表示可下载的产出

use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};

use super::ImageError;
use super::encoder::OutputFormat;
use super::naming;
use super::session::{ResourceHandle, ResourceKind, ResourceRegistry};

/// 图片输入来源。
pub enum ImageSource {
    /// 本地文件路径来源（文件选择 / 拖放）。
    FilePath(String),
    /// Base64（支持 Data URL 与纯 Base64 字符串，对应粘贴）。
    Base64(String),
    /// 已在内存中的字节（例如 HTTP 上传）。
    Bytes { bytes: Vec<u8>, file_name: String },
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 原始文件名（用于派生下载文件名）。
    pub(crate) file_name: String,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 源图片的编码格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Other(ImageFormat),
}

impl From<ImageFormat> for SourceFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::WebP => Self::WebP,
            other => Self::Other(other),
        }
    }
}

/// 已解码的源图片，加载后不可变。
#[derive(Debug)]
pub struct SourceImage {
    image: DynamicImage,
    format: SourceFormat,
    byte_size: u64,
    file_name: String,
    handle: ResourceHandle,
}

impl SourceImage {
    pub(crate) fn new(
        image: DynamicImage,
        format: SourceFormat,
        byte_size: u64,
        file_name: String,
        registry: &Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            image,
            format,
            byte_size,
            file_name,
            handle: registry.acquire(ResourceKind::Source),
        }
    }

    /// 直接由内存中的图像构造（测试与拼图预览使用）。
    pub fn from_dynamic(
        image: DynamicImage,
        format: SourceFormat,
        file_name: &str,
        registry: &Arc<ResourceRegistry>,
    ) -> Self {
        let byte_size = image.as_bytes().len() as u64;
        Self::new(image, format, byte_size, file_name.to_string(), registry)
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 去掉扩展名与目录后的文件名。
    pub fn base_name(&self) -> String {
        naming::base_name(&self.file_name)
    }

    pub(crate) fn registry(&self) -> &Arc<ResourceRegistry> {
        self.handle.registry()
    }
}

/// 拼图网格尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub columns: u32,
    pub rows: u32,
}

/// 一次处理的用户参数快照。
///
/// 宽高缺省表示“自动”。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub preserve_aspect: bool,
    pub quality: f32,
    pub grid: Option<GridSize>,
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            preserve_aspect: true,
            quality: 0.92,
            grid: None,
        }
    }
}

impl TransformSpec {
    /// 校验参数，非法输入立即拒绝。
    pub fn validate(&self) -> Result<(), ImageError> {
        validate_quality(self.quality)?;
        if self.width == Some(0) || self.height == Some(0) {
            return Err(ImageError::InvalidInput("目标宽高必须大于 0".to_string()));
        }
        if let Some(grid) = self.grid {
            if grid.columns == 0 || grid.rows == 0 {
                return Err(ImageError::InvalidInput("拼图行列数必须大于 0".to_string()));
            }
        }
        Ok(())
    }
}

/// 质量系数必须落在 `[0, 1]`。
pub fn validate_quality(quality: f32) -> Result<f32, ImageError> {
    if quality.is_nan() || !(0.0..=1.0).contains(&quality) {
        return Err(ImageError::InvalidInput(format!(
            "质量系数必须在 0~1 之间：{}",
            quality
        )));
    }
    Ok(quality)
}

/// 处理产出：编码后的字节与元数据。
#[derive(Debug)]
pub struct OutputArtifact {
    bytes: Bytes,
    format: OutputFormat,
    width: u32,
    height: u32,
    quality: Option<f32>,
    sequence: usize,
    file_name: String,
    _handle: ResourceHandle,
}

impl OutputArtifact {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        bytes: Vec<u8>,
        format: OutputFormat,
        (width, height): (u32, u32),
        quality: Option<f32>,
        sequence: usize,
        file_name: String,
        registry: &Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            bytes: Bytes::from(bytes),
            format,
            width,
            height,
            quality,
            sequence,
            file_name,
            _handle: registry.acquire(ResourceKind::Artifact),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 实际使用的质量系数（无损产出为 `None`）。
    pub fn quality(&self) -> Option<f32> {
        self.quality
    }

    /// 产出序号（拼图组号从 1 开始）。
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.format.mime()
    }
}
