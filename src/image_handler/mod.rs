//! # 图片处理模块（image_handler）
//!
//! ## 设计思路
//!
//! 该模块将“图片来源识别 → 加载校验 → 解码 → 缩放/压缩/拼图/转换 → 打包下载”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `commands`：仅做 CLI 入参/出参适配与产出落盘（薄封装）
//! - `service`：承载可注入状态（`ToolkitService`）
//! - `handler`：编排加载流水线并管理配置
//! - `loader`：负责文件/Base64/内存字节加载与签名校验
//! - `pipeline`：负责解码、像素限制与统一缩放入口
//! - `geometry/resizer/compressor/collage/convert`：各功能页的图像变换
//! - `encoder`：所有产出共用的编码器
//! - `batch/session/archive`：批处理状态、资源释放与 ZIP 打包
//! - `remote`：远程转换服务客户端
//! - `config/error/source/naming`：配置、错误、中间数据模型与下载命名
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! CLI 子命令 / POST /convert
//!    ↓
//! commands.rs / server.rs（参数适配）
//!    ↓
//! service.rs（会话、批处理、spawn_blocking）
//!    ├─ handler.rs（统一加载 + 阶段耗时日志）
//!    │    ├─ loader.rs（来源加载 + 体积/签名校验）
//!    │    └─ pipeline.rs（解码 + 像素限制）
//!    ├─ batch.rs（状态迁移 + 逐项隔离）
//!    │    └─ resizer.rs / compressor.rs → encoder.rs
//!    ├─ collage.rs → geometry.rs → encoder.rs
//!    └─ archive.rs（ZIP）
//!    ↓
//! 返回 AppError / HTTP 状态码
//! ```
//!
//! ## 分层职责建议
//!
//! - 调用入口变更（子命令/参数）优先改 `commands.rs`
//! - 配置与策略变更优先改 `config.rs`
//! - 加载流程顺序变更优先改 `handler.rs`
//! - 单阶段行为优化分别改 `loader/pipeline/encoder`

pub mod archive;
pub mod batch;
pub mod collage;
pub mod commands;
pub mod compressor;
mod config;
pub mod convert;
pub mod encoder;
mod error;
pub mod geometry;
mod handler;
mod loader;
pub mod naming;
mod pipeline;
pub mod remote;
pub mod resizer;
mod service;
pub mod session;
mod source;

pub use config::{DEFAULT_CELL_HEIGHT, DEFAULT_CELL_WIDTH, ImageConfig, ImagePerformanceProfile};
pub use error::ImageError;
pub use service::{LoadFailure, ToolkitService};
pub use source::{GridSize, ImageSource, OutputArtifact, SourceFormat, SourceImage, TransformSpec, validate_quality};

/// 内部核心编排器，不直接暴露给命令层。
pub(crate) use handler::ImageHandler;
