//! # 加载与校验模块
//!
//! 三种来源（本地文件 / Base64 / 内存字节）都先落成 [`RawImageData`]，
//! 解码留给 `pipeline`。这里只做廉价检查，顺序固定：
//!
//! ```text
//! 路径/文本/字节 ──► 体积上限 ──► 签名(infer) ──► RawImageData
//!                    │              │
//!                    └ ResourceLimit └ InvalidFormat
//! ```
//!
//! Base64 在解码前按字符数估算上限，超限的输入不会分配解码缓冲区。

use std::io::ErrorKind;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};

use super::source::RawImageData;
use super::{ImageConfig, ImageError, ImageHandler};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 体积超限时的统一报错。
fn ensure_within(len: u64, limit: u64, what: &str) -> Result<(), ImageError> {
    if len <= limit {
        return Ok(());
    }
    Err(ImageError::ResourceLimit(format!(
        "{}超出上限：{:.2} MB > {:.2} MB",
        what,
        len as f64 / BYTES_PER_MB,
        limit as f64 / BYTES_PER_MB
    )))
}

impl ImageHandler {
    /// 粘贴内容没有文件名，按识别出的类型命名为 `pasted.<ext>`。
    pub(super) fn load_from_base64(
        &self,
        data: &str,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        let payload = data.trim();
        if payload.is_empty() {
            return Err(ImageError::InvalidInput("Base64 内容为空".to_string()));
        }
        log::info!("📝 读取粘贴的 Base64 图片 - {} 字符", payload.len());

        let bytes = Self::parse_base64_with_limit(payload, config.max_file_size)?;
        ensure_within(bytes.len() as u64, config.max_file_size, "Base64 解码结果")?;
        let extension = Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            file_name: format!("pasted.{}", extension),
            source_hint: "base64",
        })
    }

    pub(super) fn load_from_file(
        &self,
        path: &str,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        if path.trim().is_empty() {
            return Err(ImageError::InvalidInput("文件路径为空".to_string()));
        }
        log::info!("📁 读取本地图片 - {}", path);

        let file_path = Path::new(path);
        let metadata = std::fs::metadata(file_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ImageError::FileSystem(format!("找不到文件：{}", path)),
            _ => ImageError::FileSystem(format!("无法访问 {}：{}", path, e)),
        })?;
        if !metadata.is_file() {
            return Err(ImageError::FileSystem(format!("不是普通文件：{}", path)));
        }
        ensure_within(metadata.len(), config.max_file_size, "文件")?;

        let bytes = std::fs::read(file_path).map_err(|e| ImageError::FileSystem(format!("读取 {} 失败：{}", path, e)))?;
        Self::validate_image_signature(&bytes)?;

        let file_name = file_path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or_else(|| path.to_string(), str::to_string);

        Ok(RawImageData {
            bytes,
            file_name,
            source_hint: "file",
        })
    }

    /// 上传或已读入内存的字节。文件名为空时退回 `upload.<ext>`。
    pub(super) fn load_from_bytes(
        &self,
        bytes: Vec<u8>,
        file_name: String,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        log::debug!("📥 内存图片 - {} ({} bytes)", file_name, bytes.len());

        ensure_within(bytes.len() as u64, config.max_file_size, "上传内容")?;
        let extension = Self::validate_image_signature(&bytes)?;

        let file_name = match file_name.trim() {
            "" => format!("upload.{}", extension),
            _ => file_name,
        };

        Ok(RawImageData {
            bytes,
            file_name,
            source_hint: "bytes",
        })
    }

    /// 每 4 个字符至多解出 3 个字节，向上取整。
    fn estimate_base64_decoded_upper_bound_len(encoded: &str) -> Result<u64, ImageError> {
        (encoded.len() as u64)
            .div_ceil(4)
            .checked_mul(3)
            .ok_or_else(|| ImageError::ResourceLimit("Base64 长度估算溢出".to_string()))
    }

    /// 接受纯 Base64 或 `data:<mime>;base64,<payload>`。
    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, ImageError> {
        let encoded = match data.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(";base64,")
                .map(|(_, payload)| payload)
                .ok_or_else(|| ImageError::InvalidFormat("Data URL 不是 base64 编码".to_string()))?,
            None => data,
        };

        let estimated = Self::estimate_base64_decoded_upper_bound_len(encoded)?;
        ensure_within(estimated, max_file_size, "Base64 预计解码体积")?;

        general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ImageError::Decode(format!("Base64 无法解码：{}", e)))
    }

    /// 按 magic bytes 判断是否为图片，返回识别出的扩展名。
    fn validate_image_signature(bytes: &[u8]) -> Result<&'static str, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::InvalidInput("图片内容为空".to_string()));
        }

        match infer::get(bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind.extension()),
            Some(kind) => Err(ImageError::InvalidFormat(format!("不是图片文件（{}）", kind.mime_type()))),
            None => Err(ImageError::InvalidFormat("无法识别的文件类型".to_string())),
        }
    }
}
