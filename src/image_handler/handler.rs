//! # 处理器
//!
//! `ImageHandler` 持有可热更新的配置和资源登记表，对外只暴露同步方法，
//! 异步调用方（`ToolkitService`）负责把它们放进 `spawn_blocking`。
//!
//! ```text
//! load(source)
//!   ├─ snapshot 配置（本次调用全程只读这一份）
//!   ├─ loader    → RawImageData     （load 耗时）
//!   └─ pipeline  → SourceImage      （decode 耗时）
//! convert(source, target) = load + convert::convert_image（encode 耗时）
//! ```
//!
//! 配置锁中毒按 `ResourceLimit` 报告。

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use super::convert::{self, ConvertedImage};
use super::encoder::OutputFormat;
use super::session::ResourceRegistry;
use super::source::{RawImageData, SourceImage};
use super::{ImageConfig, ImageError, ImagePerformanceProfile, ImageSource};

/// 图片处理器。
///
/// 封装了配置状态与资源登记表，并编排各子模块实现完整流程。
#[derive(Clone)]
pub struct ImageHandler {
    pub(super) config: Arc<RwLock<ImageConfig>>,
    pub(super) registry: Arc<ResourceRegistry>,
}

impl ImageHandler {
    /// 根据初始配置创建处理器。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use image_toolkit::image_handler::{ImageConfig, ImageHandler};
    ///
    /// let handler = ImageHandler::new(ImageConfig::default())?;
    /// # Ok::<(), image_toolkit::image_handler::ImageError>(())
    /// ```
    pub fn new(config: ImageConfig) -> Result<Self, ImageError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            registry: ResourceRegistry::new(),
        })
    }

    fn read_config(&self) -> Result<RwLockReadGuard<'_, ImageConfig>, ImageError> {
        self.config
            .read()
            .map_err(|_| ImageError::ResourceLimit("配置读锁不可用".to_string()))
    }

    fn write_config(&self) -> Result<RwLockWriteGuard<'_, ImageConfig>, ImageError> {
        self.config
            .write()
            .map_err(|_| ImageError::ResourceLimit("配置写锁不可用".to_string()))
    }

    /// 当前配置的一份拷贝。
    pub(super) fn config_snapshot(&self) -> Result<ImageConfig, ImageError> {
        self.read_config().map(|cfg| cfg.clone())
    }

    /// 本处理器产生的全部资源都登记在这里。
    pub(super) fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn set_performance_profile(&self, profile: ImagePerformanceProfile) -> Result<(), ImageError> {
        let mut config = self.write_config()?;
        config.apply_performance_profile(profile);
        log::info!("⚙️ 性能档位 -> {:?}（缩放滤镜 {:?}）", profile, config.resize_filter);
        Ok(())
    }

    pub fn get_performance_profile(&self) -> Result<ImagePerformanceProfile, ImageError> {
        Ok(self.read_config()?.infer_performance_profile())
    }

    /// 整体替换配置，新配置必须通过校验。
    pub fn replace_config(&self, next: ImageConfig) -> Result<(), ImageError> {
        next.validate()?;
        *self.write_config()? = next;
        Ok(())
    }

    /// 在当前配置基础上修改部分字段。
    ///
    /// 修改后的配置未通过校验时保持原配置不变。
    pub fn update_config<F>(&self, update: F) -> Result<(), ImageError>
    where
        F: FnOnce(&mut ImageConfig),
    {
        let mut next = self.config_snapshot()?;
        update(&mut next);
        self.replace_config(next)
    }

    /// 从任意来源加载并解码。
    pub fn load(&self, source: ImageSource) -> Result<SourceImage, ImageError> {
        let config = self.config_snapshot()?;
        self.load_with(source, &config)
    }

    fn load_with(&self, source: ImageSource, config: &ImageConfig) -> Result<SourceImage, ImageError> {
        let started = Instant::now();
        let raw = self.load_raw(source, config)?;
        let loaded_at = started.elapsed();

        let decoded = self.decode_source(raw, config)?;
        let total = started.elapsed();

        log::info!(
            "✅ 载入 {} - load={}ms decode={}ms",
            decoded.file_name(),
            loaded_at.as_millis(),
            (total - loaded_at).as_millis()
        );
        Ok(decoded)
    }

    fn load_raw(&self, source: ImageSource, config: &ImageConfig) -> Result<RawImageData, ImageError> {
        match source {
            ImageSource::FilePath(path) => self.load_from_file(&path, config),
            ImageSource::Base64(data) => self.load_from_base64(&data, config),
            ImageSource::Bytes { bytes, file_name } => self.load_from_bytes(bytes, file_name, config),
        }
    }

    /// 加载并重新编码为目标格式（转换接口使用）。
    pub fn convert(&self, source: ImageSource, target: OutputFormat) -> Result<ConvertedImage, ImageError> {
        let config = self.config_snapshot()?;
        let decoded = self.load_with(source, &config)?;

        let encode_start = Instant::now();
        let converted = convert::convert_image(&decoded, target, config.default_quality)?;

        log::info!(
            "🔁 格式转换完成 - {} -> {}（{} bytes，encode={}ms）",
            decoded.file_name(),
            converted.file_name,
            converted.bytes.len(),
            encode_start.elapsed().as_millis()
        );

        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};
    use image::imageops::FilterType;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn checker_png(width: u32, height: u32) -> Vec<u8> {
        let tile = |x: u32, y: u32| if (x / 4 + y / 4) % 2 == 0 { 230 } else { 40 };
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_fn(width, height, |x, y| {
            let v = tile(x, y);
            Rgba([v, v, v, 255])
        })
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode fixture");
        out.into_inner()
    }

    #[test]
    fn load_base64_registers_source_handle() {
        let handler = ImageHandler::new(ImageConfig::default()).expect("handler");
        let encoded = general_purpose::STANDARD.encode(checker_png(64, 32));

        let source = handler.load(ImageSource::Base64(encoded)).expect("load");

        assert_eq!(source.dimensions(), (64, 32));
        assert_eq!(source.file_name(), "pasted.png");
        assert_eq!(handler.registry().live(), 1);
        drop(source);
        assert_eq!(handler.registry().live(), 0);
    }

    #[test]
    fn convert_produces_target_mime() {
        let handler = ImageHandler::new(ImageConfig::default()).expect("handler");

        let converted = handler
            .convert(
                ImageSource::Bytes {
                    bytes: checker_png(20, 20),
                    file_name: "icon.png".to_string(),
                },
                OutputFormat::WebP,
            )
            .expect("convert");

        assert_eq!(converted.content_type, "image/webp");
        assert_eq!(converted.file_name, "converted.webp");
        assert_eq!(image::guess_format(&converted.bytes).unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn profile_switch_updates_filter() {
        let handler = ImageHandler::new(ImageConfig::default()).expect("handler");

        handler
            .set_performance_profile(ImagePerformanceProfile::Speed)
            .expect("set profile");

        assert_eq!(
            handler.get_performance_profile().expect("get profile"),
            ImagePerformanceProfile::Speed
        );
        assert_eq!(handler.config_snapshot().unwrap().resize_filter, FilterType::Triangle);
    }

    #[test]
    fn invalid_update_keeps_previous_config() {
        let handler = ImageHandler::new(ImageConfig::default()).expect("handler");

        let result = handler.update_config(|cfg| cfg.batch_concurrency = 0);

        assert!(matches!(result, Err(ImageError::InvalidInput(_))));
        assert_eq!(handler.config_snapshot().unwrap().batch_concurrency, 1);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = ImageConfig {
            default_quality: 2.0,
            ..ImageConfig::default()
        };
        assert!(ImageHandler::new(config).is_err());
    }
}
