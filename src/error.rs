//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)`、`expect()` 等不一致模式。
//!
//! CLI 命令层与设置加载统一返回 `Result<T, AppError>`；
//! HTTP 转换接口直接使用 `ImageError` 以便映射状态码。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageError` 与 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于以 JSON 输出命令结果。

use serde::Serialize;

use crate::image_handler::ImageError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片处理流水线错误（加载 / 解码 / 变换 / 打包 / 远程转换）
    #[error("{0}")]
    Image(#[from] ImageError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件读取或解析失败
    #[error("设置错误: {0}")]
    Settings(String),

    /// 转换服务启动或运行失败
    #[error("服务错误: {0}")]
    Server(String),
}

impl AppError {
    /// 机器可读错误码，图片错误沿用 `ImageError::code`。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Image(err) => err.code(),
            Self::Io(_) => "io",
            Self::Settings(_) => "settings",
            Self::Server(_) => "server",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_errors_keep_their_message_and_code() {
        let err = AppError::from(ImageError::Surface("画布为空".to_string()));
        assert_eq!(err.to_string(), "绘制表面不可用：画布为空");
        assert_eq!(err.code(), "surface_unavailable");
    }

    #[test]
    fn serializes_as_plain_string() {
        let err = AppError::Settings("缺少字段".to_string());
        let json = serde_json::to_string(&err).expect("serialize");
        assert_eq!(json, "\"设置错误: 缺少字段\"");
    }
}
