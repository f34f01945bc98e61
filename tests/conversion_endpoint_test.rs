use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::http::header;
use axum::routing::post;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use image_toolkit::image_handler::commands;
use image_toolkit::image_handler::remote::RemoteConverter;
use image_toolkit::image_handler::{ImageConfig, ImageError, ToolkitService};
use image_toolkit::server;
use reqwest::multipart::{Form, Part};
use tokio::net::TcpListener;

fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 255) as u8, (y * 3 % 255) as u8, 120, 255])
    });
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("encode fixture");
    cursor.into_inner()
}

async fn spawn_server() -> SocketAddr {
    let service = Arc::new(ToolkitService::new().expect("service"));
    let app = server::router(service).expect("router");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

/// 固定返回给定响应头与正文的转换服务替身。
async fn spawn_canned_converter(disposition: &'static str, body: Vec<u8>) -> SocketAddr {
    let app = Router::new().route(
        "/convert",
        post(move |_upload: Bytes| {
            let body = body.clone();
            async move {
                (
                    [
                        (header::CONTENT_TYPE, "image/png"),
                        (header::CONTENT_DISPOSITION, disposition),
                    ],
                    body,
                )
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn post_form(addr: SocketAddr, form: Form) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(form)
        .send()
        .await
        .expect("send")
}

#[tokio::test]
async fn health_check_answers_ok() {
    let addr = spawn_server().await;
    let body = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn every_target_format_round_trips_through_endpoint() {
    let addr = spawn_server().await;
    let converter = RemoteConverter::new(format!("http://{addr}/convert"), &ImageConfig::default())
        .expect("client");

    let cases = [
        ("webp", "image/webp", "converted.webp", ImageFormat::WebP),
        ("png", "image/png", "converted.png", ImageFormat::Png),
        ("jpg", "image/jpeg", "converted.jpg", ImageFormat::Jpeg),
        ("JPEG", "image/jpeg", "converted.jpg", ImageFormat::Jpeg),
        ("gif", "image/gif", "converted.gif", ImageFormat::Gif),
        ("tiff", "image/tiff", "converted.tiff", ImageFormat::Tiff),
    ];

    for (format, mime, file_name, detected) in cases {
        let converted = converter
            .convert(png_fixture(24, 16), "sample.png", format)
            .await
            .unwrap_or_else(|e| panic!("{format}: {e}"));

        assert_eq!(converted.content_type, mime, "{format}");
        assert_eq!(converted.file_name, file_name, "{format}");
        assert_eq!(image::guess_format(&converted.bytes).expect("guess"), detected);
        assert_eq!((converted.width, converted.height), (24, 16));
    }
}

#[tokio::test]
async fn content_disposition_names_the_download() {
    let addr = spawn_server().await;
    let form = Form::new()
        .part("image", Part::bytes(png_fixture(8, 8)).file_name("a.png"))
        .text("format", "png");

    let response = post_form(addr, form).await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_DISPOSITION],
        "attachment; filename=\"converted.png\""
    );
}

#[tokio::test]
async fn missing_format_is_bad_request_with_json_error() {
    let addr = spawn_server().await;
    let form = Form::new().part("image", Part::bytes(png_fixture(8, 8)).file_name("a.png"));

    let response = post_form(addr, form).await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body = response.bytes().await.expect("body");
    let body: serde_json::Value = serde_json::from_slice(&body).expect("json body");
    assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));
}

#[tokio::test]
async fn unsupported_format_is_bad_request() {
    let addr = spawn_server().await;
    let form = Form::new()
        .part("image", Part::bytes(png_fixture(8, 8)).file_name("a.png"))
        .text("format", "bmp");

    let response = post_form(addr, form).await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_file_is_bad_request() {
    let addr = spawn_server().await;
    let response = post_form(addr, Form::new().text("format", "webp")).await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undecodable_upload_is_bad_request() {
    let addr = spawn_server().await;
    let form = Form::new()
        .part("image", Part::bytes(b"this is not an image".to_vec()).file_name("a.png"))
        .text("format", "png");

    let response = post_form(addr, form).await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn client_maps_server_rejection_to_generic_retry_error() {
    let addr = spawn_server().await;
    let converter = RemoteConverter::new(format!("http://{addr}/convert"), &ImageConfig::default())
        .expect("client");

    let result = converter
        .convert(b"still not an image".to_vec(), "broken.png", "png")
        .await;

    match result {
        Err(ImageError::Remote(message)) => assert!(message.contains("重试")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn remote_download_name_ignores_server_supplied_path() {
    let addr = spawn_canned_converter("attachment; filename=\"../escaped.png\"", png_fixture(6, 4)).await;
    let workspace = tempfile::tempdir().expect("tempdir");
    let input = workspace.path().join("photo.png");
    std::fs::write(&input, png_fixture(6, 4)).expect("write fixture");
    let out = workspace.path().join("out");

    let service = ToolkitService::new().expect("service");
    let outcome = commands::convert_image(
        &service,
        input.to_string_lossy().into_owned(),
        "png",
        &out,
        Some(&format!("http://{addr}/convert")),
    )
    .await
    .expect("convert");

    assert_eq!(outcome.outputs, vec![out.join("converted.png")]);
    assert!(out.join("converted.png").exists());
    assert!(!workspace.path().join("escaped.png").exists());
}

#[tokio::test]
async fn non_image_success_body_is_a_remote_failure() {
    let addr = spawn_canned_converter("attachment; filename=\"converted.png\"", b"<html>busy</html>".to_vec()).await;
    let converter = RemoteConverter::new(format!("http://{addr}/convert"), &ImageConfig::default())
        .expect("client");

    let result = converter.convert(png_fixture(4, 4), "a.png", "png").await;

    assert!(matches!(result, Err(ImageError::Remote(_))));
}
