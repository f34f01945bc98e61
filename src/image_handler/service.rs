//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `ToolkitService` 作为 CLI 与 HTTP 接口共享的服务状态，替代全局单例函数。
//! 好处：
//! 1. 生命周期清晰（由 `main.rs` 统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. HTTP 接口可以直接以 `Arc<ToolkitService>` 作为路由状态
//!
//! ## 实现思路
//!
//! 每个功能页对应一组异步入口，页面状态由调用方持有的 `Session` 承载：
//! - `load_sources`：加载并加入会话（单张失败不影响其他文件）
//! - `resize_all` / `compress_all`：开启新一轮批处理
//! - `compose_collage`：按网格生成拼图，替换旧拼图
//! - `archive`：把已完成条目打包
//! - `convert_upload`：转换接口入口
//!
//! 解码、绘制与编码都是 CPU 密集型，统一放到 `spawn_blocking` 中执行。

use std::sync::Arc;

use tokio::task::JoinError;

use super::archive::{self, ArchiveArtifact};
use super::batch::{BatchReport, BatchRunner};
use super::collage::{self, CollageLayout};
use super::compressor;
use super::convert::{self, ConvertedImage};
use super::naming;
use super::remote::RemoteConverter;
use super::resizer;
use super::session::Session;
use super::source::{TransformSpec, validate_quality};
use super::{ImageConfig, ImageError, ImageHandler, ImagePerformanceProfile, ImageSource};

/// 加载失败的来源及原因。
#[derive(Debug)]
pub struct LoadFailure {
    pub source: String,
    pub error: ImageError,
}

/// 工具箱服务状态。
pub struct ToolkitService {
    handler: ImageHandler,
}

impl ToolkitService {
    /// 使用默认配置创建服务状态。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_toolkit::image_handler::ToolkitService;
    ///
    /// let service = ToolkitService::new()?;
    /// # Ok::<(), image_toolkit::image_handler::ImageError>(())
    /// ```
    pub fn new() -> Result<Self, ImageError> {
        Self::with_config(ImageConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_toolkit::image_handler::{ImageConfig, ToolkitService};
    ///
    /// let config = ImageConfig {
    ///     batch_concurrency: 4,
    ///     ..ImageConfig::default()
    /// };
    /// let service = ToolkitService::with_config(config)?;
    /// # Ok::<(), image_toolkit::image_handler::ImageError>(())
    /// ```
    pub fn with_config(config: ImageConfig) -> Result<Self, ImageError> {
        let handler = ImageHandler::new(config)?;
        Ok(Self { handler })
    }

    /// 切换性能档位。
    pub fn set_performance_profile(&self, profile: &str) -> Result<(), ImageError> {
        let profile = ImagePerformanceProfile::from_str(profile)?;
        self.handler.set_performance_profile(profile)
    }

    /// 读取当前档位（稳定字符串）。
    pub fn get_performance_profile(&self) -> Result<String, ImageError> {
        Ok(self.handler.get_performance_profile()?.as_str().to_string())
    }

    pub fn config(&self) -> Result<ImageConfig, ImageError> {
        self.handler.config_snapshot()
    }

    pub fn update_config<F>(&self, update: F) -> Result<(), ImageError>
    where
        F: FnOnce(&mut ImageConfig),
    {
        self.handler.update_config(update)
    }

    /// 创建一个新会话，资源登记在本服务的登记表中。
    pub fn new_session(&self) -> Session {
        Session::new(Arc::clone(self.handler.registry()))
    }

    /// 当前存活的资源句柄数量。
    pub fn live_resources(&self) -> usize {
        self.handler.registry().live()
    }

    /// 逐个加载来源并加入会话，返回加载失败的来源。
    pub async fn load_sources(&self, session: &mut Session, sources: Vec<ImageSource>) -> Vec<LoadFailure> {
        let mut failures = Vec::new();

        for source in sources {
            let label = describe(&source);
            let handler = self.handler.clone();
            let joined = tokio::task::spawn_blocking(move || handler.load(source)).await;

            match flatten_join(joined, |e| ImageError::Decode(format!("加载任务异常退出：{}", e))) {
                Ok(image) => {
                    session.add_source(Arc::new(image));
                }
                Err(error) => {
                    log::warn!("⚠️ 跳过无法加载的图片 - {}：{}", label, error);
                    failures.push(LoadFailure { source: label, error });
                }
            }
        }

        failures
    }

    /// 以新的参数批量缩放会话内全部图片。
    pub async fn resize_all(&self, session: &mut Session, spec: TransformSpec) -> Result<BatchReport, ImageError> {
        spec.validate()?;
        let config = self.handler.config_snapshot()?;
        let concurrency = config.batch_concurrency;

        let table = session.table_mut();
        table.reset_all();
        let report = BatchRunner::new(concurrency)
            .run(table, move |source| resizer::resize(source, &spec, &config))
            .await;
        Ok(report)
    }

    /// 以新的质量系数批量压缩会话内全部图片。
    pub async fn compress_all(&self, session: &mut Session, quality: f32) -> Result<BatchReport, ImageError> {
        let quality = validate_quality(quality)?;
        let config = self.handler.config_snapshot()?;
        let damping = config.png_alpha_quality_damping;

        let table = session.table_mut();
        table.reset_all();
        let report = BatchRunner::new(config.batch_concurrency)
            .run(table, move |source| compressor::compress(source, quality, damping))
            .await;
        Ok(report)
    }

    /// 生成拼图并替换会话中的旧拼图，返回生成的组数。
    pub async fn compose_collage(&self, session: &mut Session, columns: u32, rows: u32) -> Result<usize, ImageError> {
        let config = self.handler.config_snapshot()?;
        let layout = CollageLayout::new(columns, rows, config.collage_cell_width, config.collage_cell_height)?;
        layout.check_budget(&config)?;
        let filter = config.resize_filter;
        let sources = session.sources();
        let registry = Arc::clone(session.registry());
        let timestamp = naming::timestamp_millis();

        let joined = tokio::task::spawn_blocking(move || {
            collage::compose_all(&sources, &layout, filter, timestamp, &registry)
        })
        .await;
        let outputs = flatten_join(joined, |e| ImageError::Surface(format!("拼图绘制异常退出：{}", e)))?;

        let groups = outputs.len();
        session.set_collages(outputs);
        Ok(groups)
    }

    /// 打包会话中已完成的条目。
    pub fn archive(&self, session: &Session, feature: &str) -> Result<ArchiveArtifact, ImageError> {
        archive::build_archive(
            session.table().completed_artifacts(),
            feature,
            naming::timestamp_millis(),
        )
    }

    /// 转换接口入口：校验目标格式后解码并重新编码。
    pub async fn convert_upload(
        &self,
        bytes: Vec<u8>,
        file_name: String,
        format: &str,
    ) -> Result<ConvertedImage, ImageError> {
        let target = convert::parse_target_format(format)?;
        let handler = self.handler.clone();
        let joined = tokio::task::spawn_blocking(move || {
            handler.convert(ImageSource::Bytes { bytes, file_name }, target)
        })
        .await;
        flatten_join(joined, |e| ImageError::Encode(format!("转换任务异常退出：{}", e)))
    }

    /// 创建指向远程转换服务的客户端，超时取自当前配置。
    pub fn remote_converter(&self, endpoint: &str) -> Result<RemoteConverter, ImageError> {
        let config = self.handler.config_snapshot()?;
        RemoteConverter::new(endpoint, &config)
    }
}

fn describe(source: &ImageSource) -> String {
    match source {
        ImageSource::FilePath(path) => path.clone(),
        ImageSource::Base64(_) => "pasted".to_string(),
        ImageSource::Bytes { file_name, .. } => file_name.clone(),
    }
}

fn flatten_join<T, M>(joined: Result<Result<T, ImageError>, JoinError>, on_join_error: M) -> Result<T, ImageError>
where
    M: FnOnce(JoinError) -> ImageError,
{
    joined.map_err(on_join_error)?
}
