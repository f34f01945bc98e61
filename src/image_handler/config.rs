//! # 配置
//!
//! | 阶段 | 字段 |
//! |------|------|
//! | 加载 | `max_file_size` |
//! | 解码 | `max_decoded_pixels` / `max_decoded_bytes` |
//! | 缩放 | `resize_filter`（由性能档位决定） |
//! | 压缩 | `default_quality` / `png_alpha_quality_damping` |
//! | 拼图 | `collage_cell_width` / `collage_cell_height` |
//! | 批处理 | `batch_concurrency` |
//! | 远程转换 | `remote_timeout_secs` / `remote_connect_timeout_secs` |
//!
//! 外部设置（`settings.rs`）覆盖字段后必须再过一遍 [`ImageConfig::validate`]。

use image::imageops::FilterType;

use super::ImageError;

/// 拼图单元格默认宽度（9:16）。
pub const DEFAULT_CELL_WIDTH: u32 = 360;
/// 拼图单元格默认高度（9:16）。
pub const DEFAULT_CELL_HEIGHT: u32 = 640;

/// 图片处理配置。
///
/// 字段覆盖了加载、解码、缩放、压缩、拼图与批处理几个阶段。
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 缩放滤镜策略。
    pub resize_filter: FilterType,
    /// 未显式指定时使用的编码质量（0~1）。
    pub default_quality: f32,
    /// 带透明通道的 PNG 压缩时对质量系数的衰减倍数。
    pub png_alpha_quality_damping: f32,
    /// 拼图单元格宽度（像素）。
    pub collage_cell_width: u32,
    /// 拼图单元格高度（像素）。
    pub collage_cell_height: u32,
    /// 批处理并发数，`1` 表示按列表顺序逐项处理。
    pub batch_concurrency: usize,
    /// 远程转换请求总超时（秒）。
    pub remote_timeout_secs: u64,
    /// 远程转换建立连接超时（秒）。
    pub remote_connect_timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            resize_filter: FilterType::CatmullRom,
            default_quality: 0.92,
            png_alpha_quality_damping: 0.9,
            collage_cell_width: DEFAULT_CELL_WIDTH,
            collage_cell_height: DEFAULT_CELL_HEIGHT,
            batch_concurrency: 1,
            remote_timeout_secs: 30,
            remote_connect_timeout_secs: 8,
        }
    }
}

/// 图片性能档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真（Lanczos3）
/// - `Balanced`：质量与性能平衡（CatmullRom）
/// - `Speed`：优先处理速度（Triangle）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl ImagePerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use image_toolkit::image_handler::ImagePerformanceProfile;
    ///
    /// let p = ImagePerformanceProfile::from_str("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), image_toolkit::image_handler::ImageError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, ImageError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(ImageError::InvalidInput(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供 CLI 展示与持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl ImageConfig {
    /// 基于当前滤镜反推性能档位。
    pub(crate) fn infer_performance_profile(&self) -> ImagePerformanceProfile {
        match self.resize_filter {
            FilterType::Lanczos3 | FilterType::Gaussian => ImagePerformanceProfile::Quality,
            FilterType::Triangle | FilterType::Nearest => ImagePerformanceProfile::Speed,
            FilterType::CatmullRom => ImagePerformanceProfile::Balanced,
        }
    }

    /// 应用指定性能档位到实际参数。
    pub(crate) fn apply_performance_profile(&mut self, profile: ImagePerformanceProfile) {
        self.resize_filter = match profile {
            ImagePerformanceProfile::Quality => FilterType::Lanczos3,
            ImagePerformanceProfile::Balanced => FilterType::CatmullRom,
            ImagePerformanceProfile::Speed => FilterType::Triangle,
        };
    }

    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.max_file_size < 1024 {
            return Err(ImageError::InvalidInput("max_file_size 不能小于 1KB".to_string()));
        }
        if self.max_decoded_pixels < 1_000_000 {
            return Err(ImageError::InvalidInput("max_decoded_pixels 不能小于 100 万".to_string()));
        }
        if self.max_decoded_bytes < 8 * 1024 * 1024 {
            return Err(ImageError::InvalidInput("max_decoded_bytes 不能小于 8MB".to_string()));
        }
        if !(0.0..=1.0).contains(&self.default_quality) {
            return Err(ImageError::InvalidInput("default_quality 必须在 0~1 之间".to_string()));
        }
        if !(self.png_alpha_quality_damping > 0.0 && self.png_alpha_quality_damping <= 1.0) {
            return Err(ImageError::InvalidInput(
                "png_alpha_quality_damping 必须在 (0, 1] 之间".to_string(),
            ));
        }
        if self.collage_cell_width == 0 || self.collage_cell_height == 0 {
            return Err(ImageError::InvalidInput("拼图单元格尺寸不能为 0".to_string()));
        }
        if !(1..=64).contains(&self.batch_concurrency) {
            return Err(ImageError::InvalidInput("batch_concurrency 必须在 1~64 之间".to_string()));
        }
        if !(1..=600).contains(&self.remote_timeout_secs) {
            return Err(ImageError::InvalidInput("remote_timeout_secs 必须在 1~600 秒之间".to_string()));
        }
        if !(1..=self.remote_timeout_secs).contains(&self.remote_connect_timeout_secs) {
            return Err(ImageError::InvalidInput(
                "remote_connect_timeout_secs 必须在 1 秒到 remote_timeout_secs 之间".to_string(),
            ));
        }
        Ok(())
    }
}
