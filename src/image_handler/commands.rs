//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层仅做 CLI 参数接收、产出落盘与结果返回，不承载业务逻辑。
//! 所有实际处理交由 `ToolkitService`，保持命令函数薄、稳定、易测试。
//! 每条命令对应一个功能页：一次命令就是一个会话，结束时随会话释放全部资源。
//!
//! 产出只写入 `out_dir` 本身：文件名必须是不带目录的单个名字，
//! 同一命令内重名的产出按 [`UniqueNames`] 追加 ` (n)`。

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::batch::ItemStatus;
use super::naming::UniqueNames;
use super::service::{LoadFailure, ToolkitService};
use super::session::Session;
use super::source::TransformSpec;
use super::{ImageError, ImageSource};
use crate::error::AppError;

/// 一次命令的执行结果。
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CommandOutcome {
    pub completed: usize,
    pub failed: usize,
    /// 写入磁盘的文件。
    pub outputs: Vec<PathBuf>,
    /// 条目级失败说明（`文件名: 原因`）。
    pub errors: Vec<String>,
}

impl CommandOutcome {
    fn with_load_failures(failures: Vec<LoadFailure>) -> Self {
        Self {
            failed: failures.len(),
            errors: failures
                .into_iter()
                .map(|failure| format!("{}: {}", failure.source, failure.error))
                .collect(),
            ..Self::default()
        }
    }
}

/// 批量缩放。
pub async fn resize_images(
    service: &ToolkitService,
    files: Vec<String>,
    spec: TransformSpec,
    out_dir: &Path,
    archive: bool,
) -> Result<CommandOutcome, AppError> {
    spec.validate()?;
    let mut session = service.new_session();
    let mut outcome = CommandOutcome::with_load_failures(
        service.load_sources(&mut session, file_sources(files)).await,
    );

    let report = service.resize_all(&mut session, spec).await?;
    outcome.completed = report.completed;
    outcome.failed += report.failed;
    collect_item_errors(&session, &mut outcome);

    write_batch_outputs(service, &session, "resized", out_dir, archive, &mut outcome)?;
    Ok(outcome)
}

/// 批量压缩。
pub async fn compress_images(
    service: &ToolkitService,
    files: Vec<String>,
    quality: f32,
    out_dir: &Path,
    archive: bool,
) -> Result<CommandOutcome, AppError> {
    let mut session = service.new_session();
    let mut outcome = CommandOutcome::with_load_failures(
        service.load_sources(&mut session, file_sources(files)).await,
    );

    let report = service.compress_all(&mut session, quality).await?;
    outcome.completed = report.completed;
    outcome.failed += report.failed;
    collect_item_errors(&session, &mut outcome);

    write_batch_outputs(service, &session, "compressed", out_dir, archive, &mut outcome)?;
    Ok(outcome)
}

/// 网格拼图，每组写出一张 PNG。
pub async fn collage_images(
    service: &ToolkitService,
    files: Vec<String>,
    columns: u32,
    rows: u32,
    out_dir: &Path,
) -> Result<CommandOutcome, AppError> {
    let mut session = service.new_session();
    let mut outcome = CommandOutcome::with_load_failures(
        service.load_sources(&mut session, file_sources(files)).await,
    );

    outcome.completed = service.compose_collage(&mut session, columns, rows).await?;
    let mut names = UniqueNames::new();
    for collage in session.collages() {
        let file_name = names.claim(collage.file_name());
        outcome.outputs.push(write_output(out_dir, &file_name, collage.bytes())?);
    }
    Ok(outcome)
}

/// 单张格式转换；指定 `remote` 时交给远程转换服务处理。
pub async fn convert_image(
    service: &ToolkitService,
    file: String,
    format: &str,
    out_dir: &Path,
    remote: Option<&str>,
) -> Result<CommandOutcome, AppError> {
    let bytes = std::fs::read(&file)
        .map_err(|e| ImageError::FileSystem(format!("无法读取图片文件 {}：{}", file, e)))?;
    let file_name = Path::new(&file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();

    let converted = match remote {
        Some(endpoint) => {
            service
                .remote_converter(endpoint)?
                .convert(bytes, &file_name, format)
                .await?
        }
        None => service.convert_upload(bytes, file_name, format).await?,
    };

    let path = write_output(out_dir, &converted.file_name, &converted.bytes)?;
    Ok(CommandOutcome {
        completed: 1,
        outputs: vec![path],
        ..CommandOutcome::default()
    })
}

/// 切换图片处理性能档位。
pub fn set_performance_profile(service: &ToolkitService, profile: &str) -> Result<(), AppError> {
    service.set_performance_profile(profile)?;
    Ok(())
}

/// 查询当前生效性能档位。
pub fn get_performance_profile(service: &ToolkitService) -> Result<String, AppError> {
    Ok(service.get_performance_profile()?)
}

fn file_sources(files: Vec<String>) -> Vec<ImageSource> {
    files.into_iter().map(ImageSource::FilePath).collect()
}

fn collect_item_errors(session: &Session, outcome: &mut CommandOutcome) {
    for item in session.table().iter() {
        if let ItemStatus::Error(message) = item.status() {
            outcome
                .errors
                .push(format!("{}: {}", item.source().file_name(), message));
        }
    }
}

fn write_batch_outputs(
    service: &ToolkitService,
    session: &Session,
    feature: &str,
    out_dir: &Path,
    archive: bool,
    outcome: &mut CommandOutcome,
) -> Result<(), AppError> {
    if archive {
        let packed = service.archive(session, feature)?;
        outcome
            .outputs
            .push(write_output(out_dir, &packed.file_name, &packed.bytes)?);
        return Ok(());
    }

    let mut names = UniqueNames::new();
    for artifact in session.table().completed_artifacts() {
        let file_name = names.claim(artifact.file_name());
        outcome.outputs.push(write_output(out_dir, &file_name, artifact.bytes())?);
    }
    Ok(())
}

fn write_output(out_dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    if Path::new(file_name).file_name() != Some(OsStr::new(file_name)) {
        return Err(ImageError::FileSystem(format!("输出文件名不能包含路径：{}", file_name)).into());
    }
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(file_name);
    std::fs::write(&path, bytes)?;
    log::info!("💾 已写入 {}（{} bytes）", path.display(), bytes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_with_path_components_are_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");

        for name in ["../escaped.png", "nested/a.png", "..", ""] {
            assert!(write_output(&out, name, b"x").is_err(), "{name}");
        }
        assert!(!dir.path().join("escaped.png").exists());

        let written = write_output(&out, "converted.png", b"x").expect("write");
        assert_eq!(written, out.join("converted.png"));
    }

    #[test]
    fn absolute_output_name_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("abs.png");

        let result = write_output(dir.path(), target.to_str().expect("utf8 path"), b"x");

        assert!(result.is_err());
        assert!(!target.exists());
    }
}
