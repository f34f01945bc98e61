//! # 远程转换客户端
//!
//! 把图片以 multipart 表单（`image` 文件 + `format` 文本）提交给转换服务。
//! 目标格式先在本地校验，非法格式不会发出请求。
//!
//! 服务端返回非成功状态时只向调用方给出统一的“请重试”提示，
//! 响应正文仅写入日志。失败后不自动重试。
//!
//! 下载名固定为 `converted.<ext>`，不采用服务端 `Content-Disposition` 中的名字。
//! 返回内容只读图片头校验，读不出尺寸的 200 响应同样按失败处理。

use std::io::Cursor;
use std::time::Duration;

use bytes::Bytes;
use image::ImageReader;
use reqwest::multipart::{Form, Part};

use super::convert::{ConvertedImage, parse_target_format};
use super::naming;
use super::{ImageConfig, ImageError};

const RETRY_HINT: &str = "图片转换失败，请重试";

/// 转换服务客户端。
#[derive(Debug, Clone)]
pub struct RemoteConverter {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteConverter {
    /// `endpoint` 为完整的转换地址，例如 `http://127.0.0.1:8080/convert`。
    pub fn new(endpoint: impl Into<String>, config: &ImageConfig) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.remote_timeout_secs))
            .connect_timeout(Duration::from_secs(config.remote_connect_timeout_secs))
            .build()
            .map_err(|e| ImageError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 提交转换请求。
    pub async fn convert(&self, bytes: Vec<u8>, file_name: &str, format: &str) -> Result<ConvertedImage, ImageError> {
        let target = parse_target_format(format)?;
        if bytes.is_empty() {
            return Err(ImageError::InvalidInput("图片内容为空".to_string()));
        }

        let upload_size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ImageError::InvalidInput(format!("构建上传表单失败：{}", e)))?;
        let form = Form::new()
            .part("image", part)
            .text("format", target.extension().to_string());

        log::info!(
            "🌐 提交远程转换 - {} -> {}（{} bytes）",
            file_name,
            target.label(),
            upload_size
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("⚠️ 远程转换失败 - HTTP {}: {}", status.as_u16(), body);
            return Err(ImageError::Remote(RETRY_HINT.to_string()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(target.mime())
            .to_string();
        let file_name = naming::converted_file_name(target.extension());

        let payload: Bytes = response.bytes().await.map_err(|e| {
            log::warn!("⚠️ 读取远程转换结果失败：{}", e);
            ImageError::Remote(RETRY_HINT.to_string())
        })?;

        let (width, height) = Self::payload_dimensions(&payload)?;

        log::info!("✅ 远程转换完成 - {}（{} bytes）", file_name, payload.len());

        Ok(ConvertedImage {
            bytes: payload,
            content_type,
            file_name,
            format: target,
            width,
            height,
        })
    }

    fn map_reqwest_error(e: reqwest::Error) -> ImageError {
        log::warn!("⚠️ 远程转换请求失败：{}", e);
        if e.is_connect() || e.is_timeout() {
            ImageError::Network(format!("无法连接转换服务：{}", e))
        } else {
            ImageError::Remote(RETRY_HINT.to_string())
        }
    }

    /// 只解析图片头，不做完整解码。
    fn payload_dimensions(payload: &[u8]) -> Result<(u32, u32), ImageError> {
        let dimensions = ImageReader::new(Cursor::new(payload))
            .with_guessed_format()
            .map_err(|e| e.to_string())
            .and_then(|reader| reader.into_dimensions().map_err(|e| e.to_string()));

        match dimensions {
            Ok((width, height)) if width > 0 && height > 0 => Ok((width, height)),
            Ok((width, height)) => {
                log::warn!("⚠️ 远程转换结果尺寸异常：{}x{}", width, height);
                Err(ImageError::Remote(RETRY_HINT.to_string()))
            }
            Err(reason) => {
                log::warn!("⚠️ 远程转换结果不是可识别的图片：{}", reason);
                Err(ImageError::Remote(RETRY_HINT.to_string()))
            }
        }
    }
}
