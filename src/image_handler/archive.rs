//! # 批量打包
//!
//! 把已完成条目的产出写入同一个 ZIP：`<feature>_<timestamp>.zip`，
//! 条目名沿用单个下载时的文件名。未完成的条目不会进入调用方传入的产出列表，
//! 同名条目追加 ` (n)` 区分，打包本身不会因为条目命名而失败。

use std::io::{Cursor, Write};

use bytes::Bytes;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ImageError;
use super::naming;
use super::source::OutputArtifact;

/// 打包产出。
#[derive(Debug, Clone)]
pub struct ArchiveArtifact {
    pub file_name: String,
    pub bytes: Bytes,
    pub entries: Vec<String>,
}

/// 将产出写入 ZIP 包。
pub fn build_archive<'a, I>(artifacts: I, feature: &str, timestamp: i64) -> Result<ArchiveArtifact, ImageError>
where
    I: IntoIterator<Item = &'a OutputArtifact>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = naming::UniqueNames::new();
    let mut entries = Vec::new();

    for artifact in artifacts {
        let entry_name = names.claim(artifact.file_name());
        writer
            .start_file(entry_name.clone(), options)
            .map_err(|e| ImageError::Archive(format!("写入条目 {} 失败：{}", entry_name, e)))?;
        writer
            .write_all(artifact.bytes())
            .map_err(|e| ImageError::Archive(format!("写入条目 {} 失败：{}", entry_name, e)))?;
        entries.push(entry_name);
    }

    let bytes = writer
        .finish()
        .map_err(|e| ImageError::Archive(format!("完成打包失败：{}", e)))?
        .into_inner();

    let file_name = naming::archive_file_name(feature, timestamp);
    log::info!(
        "📦 打包完成 - {}：{} 个条目，{:.2} KB",
        file_name,
        entries.len(),
        bytes.len() as f64 / 1024.0
    );

    Ok(ArchiveArtifact {
        file_name,
        bytes: Bytes::from(bytes),
        entries,
    })
}
