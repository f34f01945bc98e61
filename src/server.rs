//! # 转换接口
//!
//! ## 接口约定
//!
//! `POST /convert`，multipart 表单：
//! - `image`：图片文件
//! - `format`：目标格式（`webp / png / jpg / jpeg / gif / tiff`）
//!
//! 成功返回 200，正文为重新编码后的字节，`Content-Type` 取自 MIME 表，
//! `Content-Disposition: attachment; filename="converted.<ext>"`。
//! 输入问题（缺少文件、缺少或不支持的格式、无法解码）返回 400，
//! 其余处理失败返回 500，正文均为 `{"error": "..."}`。
//!
//! `GET /health` 返回 `ok`。

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use crate::error::AppError;
use crate::image_handler::{ImageError, ToolkitService};

/// multipart 边界与表单字段本身的额外开销。
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// 构建路由。请求体上限随 `max_file_size` 变化。
pub fn router(service: Arc<ToolkitService>) -> Result<Router, AppError> {
    let max_file_size = service.config()?.max_file_size;
    let body_limit = usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD_BYTES)).unwrap_or(usize::MAX);

    Ok(Router::new()
        .route("/health", get(health))
        .route("/convert", post(convert))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service))
}

/// 绑定地址并开始服务，直到进程退出。
pub async fn serve(addr: &str, service: Arc<ToolkitService>) -> Result<(), AppError> {
    let app = router(service)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Server(format!("无法监听 {}: {}", addr, e)))?;

    let local = listener
        .local_addr()
        .map_err(|e| AppError::Server(format!("无法读取监听地址: {}", e)))?;
    log::info!("🚀 转换服务已启动 - http://{}", local);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Server(format!("服务异常退出: {}", e)))
}

async fn health() -> &'static str {
    "ok"
}

async fn convert(State(service): State<Arc<ToolkitService>>, multipart: Multipart) -> Response {
    match handle_convert(&service, multipart).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    }
}

async fn handle_convert(service: &ToolkitService, mut multipart: Multipart) -> Result<Response, ImageError> {
    let mut image: Option<(Vec<u8>, String)> = None;
    let mut format: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ImageError::InvalidInput(format!("表单解析失败：{}", e)))?
    {
        match field.name() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ImageError::InvalidInput(format!("读取上传文件失败：{}", e)))?;
                image = Some((bytes.to_vec(), file_name));
            }
            Some("format") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ImageError::InvalidInput(format!("读取目标格式失败：{}", e)))?;
                format = Some(text);
            }
            other => {
                log::debug!("忽略未知表单字段：{:?}", other);
            }
        }
    }

    let (bytes, file_name) = image
        .filter(|(bytes, _)| !bytes.is_empty())
        .ok_or_else(|| ImageError::InvalidInput("缺少图片文件".to_string()))?;
    let format = format.ok_or_else(|| ImageError::InvalidInput("缺少目标格式".to_string()))?;

    let converted = service.convert_upload(bytes, file_name, &format).await?;
    let disposition = converted.content_disposition();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, converted.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        converted.bytes,
    )
        .into_response())
}

/// 错误映射：输入问题 400，其余 500。
fn error_response(err: &ImageError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    log::warn!("⚠️ 转换请求失败 - {} [{}]：{}", status.as_u16(), err.code(), err);

    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
