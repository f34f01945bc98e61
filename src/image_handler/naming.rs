//! 下载文件名规则。
//!
//! - 拼图：`collage_<cols>x<rows>_<group>_<timestamp>.png`
//! - 缩放：`<base>_<w>x<h>.<ext>`
//! - 压缩：`<base>_compressed.<ext>`
//! - 转换：`converted.<ext>`
//! - 打包：`<feature>_<timestamp>.zip`
//!
//! 同一批输出里重名的文件由 [`UniqueNames`] 追加 ` (n)` 区分。

use std::collections::HashSet;
use std::path::Path;

const FALLBACK_BASE_NAME: &str = "image";

/// 当前时间戳（毫秒）。
pub fn timestamp_millis() -> i64 {
    chrono::Local::now().timestamp_millis()
}

/// 提取不含目录与扩展名的文件名，空名称回退为 `image`。
pub fn base_name(original: &str) -> String {
    // 上传文件名可能带有另一平台的路径分隔符
    let last_segment = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    Path::new(last_segment)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_BASE_NAME)
        .to_string()
}

pub fn resize_file_name(base: &str, width: u32, height: u32, ext: &str) -> String {
    format!("{base}_{width}x{height}.{ext}")
}

pub fn compressed_file_name(base: &str, ext: &str) -> String {
    format!("{base}_compressed.{ext}")
}

pub fn collage_file_name(columns: u32, rows: u32, group: usize, timestamp: i64) -> String {
    format!("collage_{columns}x{rows}_{group}_{timestamp}.png")
}

pub fn converted_file_name(ext: &str) -> String {
    format!("converted.{ext}")
}

pub fn archive_file_name(feature: &str, timestamp: i64) -> String {
    format!("{feature}_{timestamp}.zip")
}

/// 同一批输出内的文件名登记表。
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回一个尚未使用的名字并登记。
    ///
    /// 重名时依次尝试 `stem (1).ext`、`stem (2).ext`……，
    /// 跳过已被原始名字占用的候选。
    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }

        let path = Path::new(name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
        let ext = path.extension().and_then(|e| e.to_str());
        let mut n = 1usize;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
