use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use image_toolkit::image_handler::commands;
use image_toolkit::image_handler::{ImageConfig, ToolkitService, TransformSpec};
use zip::ZipArchive;

fn write_png(dir: &Path, name: &str, width: u32, height: u32, alpha: u8) -> String {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, 60, alpha])
    });
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("encode fixture");
    let path = dir.join(name);
    std::fs::write(&path, cursor.into_inner()).expect("write fixture");
    path.to_string_lossy().into_owned()
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn compress_archive_skips_failed_items() {
    let input = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");

    let opaque = write_png(input.path(), "opaque.png", 32, 32, 255);
    let translucent = write_png(input.path(), "glass.png", 32, 32, 128);
    let notes = input.path().join("notes.png");
    std::fs::write(&notes, b"not an image at all").expect("write");

    let service = ToolkitService::new().expect("service");
    let outcome = commands::compress_images(
        &service,
        vec![opaque, notes.to_string_lossy().into_owned(), translucent],
        0.7,
        output.path(),
        true,
    )
    .await
    .expect("compress");

    assert_eq!(outcome.completed, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.outputs.len(), 1);

    let archive_name = &file_names(&outcome.outputs)[0];
    assert!(archive_name.starts_with("compressed_") && archive_name.ends_with(".zip"));

    let mut zip = ZipArchive::new(File::open(&outcome.outputs[0]).expect("open zip")).expect("read zip");
    let mut entries: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).expect("entry").name().to_string())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["glass_compressed.png", "opaque_compressed.jpg"]);

    // 会话随命令结束，全部资源都已释放
    assert_eq!(service.live_resources(), 0);
}

#[tokio::test]
async fn resize_writes_individual_downloads() {
    let input = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    let wide = write_png(input.path(), "wide.png", 400, 200, 255);
    let tall = write_png(input.path(), "tall.png", 100, 300, 255);

    let service = ToolkitService::with_config(ImageConfig {
        batch_concurrency: 2,
        ..ImageConfig::default()
    })
    .expect("service");
    let spec = TransformSpec {
        width: Some(100),
        height: Some(100),
        ..TransformSpec::default()
    };

    let outcome = commands::resize_images(&service, vec![wide, tall], spec, output.path(), false)
        .await
        .expect("resize");

    assert_eq!(outcome.completed, 2);
    let mut names = file_names(&outcome.outputs);
    names.sort();
    assert_eq!(names, vec!["tall_33x100.png", "wide_100x50.png"]);

    let resized = image::open(output.path().join("wide_100x50.png")).expect("open output");
    assert_eq!((resized.width(), resized.height()), (100, 50));
}

#[tokio::test]
async fn collage_writes_one_png_per_group() {
    let input = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    let files: Vec<String> = (0..5)
        .map(|i| write_png(input.path(), &format!("{i}.png"), 50, 80, 255))
        .collect();

    let service = ToolkitService::new().expect("service");
    service
        .update_config(|cfg| {
            cfg.collage_cell_width = 18;
            cfg.collage_cell_height = 32;
        })
        .expect("config");

    let outcome = commands::collage_images(&service, files, 2, 2, output.path())
        .await
        .expect("collage");

    assert_eq!(outcome.completed, 2);
    let names = file_names(&outcome.outputs);
    assert!(names[0].starts_with("collage_2x2_1_"));
    assert!(names[1].starts_with("collage_2x2_2_"));

    let canvas = image::open(&outcome.outputs[1]).expect("open collage");
    assert_eq!((canvas.width(), canvas.height()), (36, 64));
}

#[tokio::test]
async fn invalid_quality_fails_the_whole_command() {
    let input = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    let file = write_png(input.path(), "a.png", 8, 8, 255);

    let service = ToolkitService::new().expect("service");
    let result = commands::compress_images(&service, vec![file], 1.5, output.path(), false).await;

    assert!(result.is_err());
    assert_eq!(std::fs::read_dir(output.path()).expect("read dir").count(), 0);
}

#[tokio::test]
async fn colliding_output_names_are_numbered_on_disk() {
    let input = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    let png = write_png(input.path(), "x.png", 16, 16, 255);
    let jpg_path = input.path().join("x.jpg");
    image::open(&png)
        .expect("reopen fixture")
        .to_rgb8()
        .save_with_format(&jpg_path, ImageFormat::Jpeg)
        .expect("write jpeg fixture");

    let service = ToolkitService::new().expect("service");
    let outcome = commands::compress_images(
        &service,
        vec![png, jpg_path.to_string_lossy().into_owned()],
        0.8,
        output.path(),
        false,
    )
    .await
    .expect("compress");

    assert_eq!(outcome.completed, 2);
    assert_eq!(file_names(&outcome.outputs), vec!["x_compressed.jpg", "x_compressed (1).jpg"]);
    assert_eq!(std::fs::read_dir(output.path()).expect("read dir").count(), 2);
}
