//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载图片链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 错误分为四类：
//! - 输入非法（`InvalidInput` / `InvalidFormat` / `ResourceLimit`）：立即拒绝，不做任何处理
//! - 单项处理失败（`Decode` / `Encode`）：批处理中只标记该项为失败
//! - 绘制表面不可用（`Surface`）：当前操作终止并显式上报
//! - 远程转换失败（`Remote` / `Network`）：统一提示用户重试

/// 图片处理统一错误类型。
///
/// 该类型会在命令层被上转为 `AppError`，在转换接口中映射为 HTTP 状态码。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("输入错误：{0}")]
    InvalidInput(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("绘制表面不可用：{0}")]
    Surface(String),

    #[error("打包错误：{0}")]
    Archive(String),

    #[error("状态错误：{0}")]
    InvalidTransition(String),

    #[error("远程转换失败：{0}")]
    Remote(String),

    #[error("网络错误：{0}")]
    Network(String),
}

impl ImageError {
    /// 稳定的机器可读错误码，供命令层与 HTTP 接口输出。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Decode(_) => "decode_failed",
            Self::Encode(_) => "encode_failed",
            Self::FileSystem(_) => "file_system",
            Self::ResourceLimit(_) => "resource_limit",
            Self::Surface(_) => "surface_unavailable",
            Self::Archive(_) => "archive_failed",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Remote(_) => "remote_failed",
            Self::Network(_) => "network",
        }
    }

    /// 错误发生的处理阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "validate",
            Self::FileSystem(_) => "load",
            Self::Decode(_) => "decode",
            Self::Encode(_) | Self::Surface(_) => "transform",
            Self::Archive(_) => "archive",
            Self::InvalidTransition(_) => "batch",
            Self::Remote(_) | Self::Network(_) => "remote",
        }
    }

    /// 是否属于调用方输入问题（对应 HTTP 400）。
    ///
    /// 无法解码的上传内容同样算作输入问题。
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) | Self::Decode(_)
        )
    }
}

impl From<ImageError> for String {
    /// 批处理单项失败时以字符串形式记录在状态里。
    fn from(error: ImageError) -> Self {
        error.to_string()
    }
}
