//! 设置文件
//!
//! JSON 文件中的每个字段都是可选的，只覆盖给出的项，其余沿用 `ImageConfig::default()`。
//! 覆盖后整体校验一次，非法取值不会进入运行时配置。
//!
//! ```json
//! {
//!   "profile": "quality",
//!   "max_file_size_mb": 20,
//!   "default_quality": 0.85,
//!   "collage_cell": [360, 640],
//!   "batch_concurrency": 4
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::image_handler::{ImageConfig, ImagePerformanceProfile};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitSettings {
    pub profile: Option<String>,
    pub max_file_size_mb: Option<u64>,
    pub max_decoded_pixels: Option<u64>,
    pub max_decoded_mb: Option<u64>,
    pub default_quality: Option<f32>,
    pub png_alpha_quality_damping: Option<f32>,
    pub collage_cell: Option<(u32, u32)>,
    pub batch_concurrency: Option<usize>,
    pub remote_timeout_secs: Option<u64>,
    pub remote_connect_timeout_secs: Option<u64>,
}

impl ToolkitSettings {
    /// 在给定配置上应用覆盖项并校验。
    pub fn apply(&self, config: &mut ImageConfig) -> Result<(), AppError> {
        let mut next = config.clone();

        if let Some(profile) = &self.profile {
            next.apply_performance_profile(ImagePerformanceProfile::from_str(profile)?);
        }
        if let Some(mb) = self.max_file_size_mb {
            next.max_file_size = mb.saturating_mul(1024 * 1024);
        }
        if let Some(pixels) = self.max_decoded_pixels {
            next.max_decoded_pixels = pixels;
        }
        if let Some(mb) = self.max_decoded_mb {
            next.max_decoded_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(quality) = self.default_quality {
            next.default_quality = quality;
        }
        if let Some(damping) = self.png_alpha_quality_damping {
            next.png_alpha_quality_damping = damping;
        }
        if let Some((width, height)) = self.collage_cell {
            next.collage_cell_width = width;
            next.collage_cell_height = height;
        }
        if let Some(concurrency) = self.batch_concurrency {
            next.batch_concurrency = concurrency;
        }
        if let Some(secs) = self.remote_timeout_secs {
            next.remote_timeout_secs = secs;
        }
        if let Some(secs) = self.remote_connect_timeout_secs {
            next.remote_connect_timeout_secs = secs;
        }

        next.validate()?;
        *config = next;
        Ok(())
    }
}

/// 读取设置文件。
pub fn load_settings(path: &Path) -> Result<ToolkitSettings, AppError> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Settings(format!("读取设置文件 {} 失败: {}", path.display(), e)))?;
    let settings = serde_json::from_str::<ToolkitSettings>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;
    log::info!("⚙️ 已加载设置文件 {}", path.display());
    Ok(settings)
}

/// 由可选的设置文件构造运行时配置。
pub fn resolve_config(path: Option<&Path>) -> Result<ImageConfig, AppError> {
    let mut config = ImageConfig::default();
    if let Some(path) = path {
        load_settings(path)?.apply(&mut config)?;
    }
    Ok(config)
}
