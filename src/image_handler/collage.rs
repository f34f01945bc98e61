//! # 网格拼图
//!
//! ## 设计思路
//!
//! 按 `columns × rows` 把有序图片列表切成连续分组，每组生成一张 PNG：
//! 画布 `columns·cell_w × rows·cell_h`，白色背景，
//! 每张图片经居中裁剪填充（见 [`super::geometry`]）后按行优先放入单元格。
//! 分组不足时剩余单元格保持背景色；组号从 1 开始。
//! 画布尺寸超出像素与内存上限时，在分配画布前返回 `ResourceLimit`。

use std::ops::Range;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use super::{ImageConfig, ImageError};
use super::encoder::{self, OutputFormat};
use super::geometry;
use super::naming;
use super::pipeline::check_pixel_budget;
use super::session::ResourceRegistry;
use super::source::{OutputArtifact, SourceImage};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 拼图布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollageLayout {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl CollageLayout {
    pub fn new(columns: u32, rows: u32, cell_width: u32, cell_height: u32) -> Result<Self, ImageError> {
        if columns == 0 || rows == 0 {
            return Err(ImageError::InvalidInput("拼图行列数必须大于 0".to_string()));
        }
        if cell_width == 0 || cell_height == 0 {
            return Err(ImageError::Surface("拼图单元格尺寸为 0".to_string()));
        }
        let layout = Self {
            columns,
            rows,
            cell_width,
            cell_height,
        };
        // 画布尺寸溢出时同样视为无法创建绘制表面
        layout
            .columns
            .checked_mul(layout.cell_width)
            .zip(layout.rows.checked_mul(layout.cell_height))
            .ok_or_else(|| ImageError::Surface("拼图画布尺寸溢出".to_string()))?;
        Ok(layout)
    }

    /// 画布是否在配置允许的像素与内存范围内。
    pub fn check_budget(&self, config: &ImageConfig) -> Result<(), ImageError> {
        let (width, height) = self.canvas_size();
        check_pixel_budget(config, width, height)
    }

    /// 每组可放置的图片数量。
    pub fn slots(&self) -> usize {
        (self.columns as usize) * (self.rows as usize)
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.columns * self.cell_width, self.rows * self.cell_height)
    }

    /// 第 `index` 个单元格（行优先）的左上角坐标。
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let column = (index % self.columns as usize) as u32;
        let row = (index / self.columns as usize) as u32;
        (column * self.cell_width, row * self.cell_height)
    }
}

/// 把 `count` 张图片切分为若干组，返回每组的下标范围。
pub fn group_ranges(count: usize, slots: usize) -> Vec<Range<usize>> {
    if slots == 0 {
        return Vec::new();
    }
    (0..count)
        .step_by(slots)
        .map(|start| start..(start + slots).min(count))
        .collect()
}

/// 绘制单组拼图。
pub fn compose_group(
    images: &[Arc<SourceImage>],
    layout: &CollageLayout,
    filter: FilterType,
) -> Result<RgbaImage, ImageError> {
    let (canvas_width, canvas_height) = layout.canvas_size();
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, BACKGROUND);

    for (index, source) in images.iter().take(layout.slots()).enumerate() {
        let cell = geometry::fit(source.image(), layout.cell_width, layout.cell_height, filter)?;
        let (x, y) = layout.cell_origin(index);
        imageops::overlay(&mut canvas, &cell, i64::from(x), i64::from(y));
    }

    Ok(canvas)
}

/// 生成全部分组的拼图产出。
pub fn compose_all(
    images: &[Arc<SourceImage>],
    layout: &CollageLayout,
    filter: FilterType,
    timestamp: i64,
    registry: &Arc<ResourceRegistry>,
) -> Result<Vec<OutputArtifact>, ImageError> {
    let ranges = group_ranges(images.len(), layout.slots());
    let mut outputs = Vec::with_capacity(ranges.len());

    for (group_index, range) in ranges.into_iter().enumerate() {
        let group = &images[range];
        if group.is_empty() {
            continue;
        }
        let sequence = group_index + 1;
        let canvas = compose_group(group, layout, filter)?;
        let dimensions = canvas.dimensions();
        let bytes = encoder::encode(&DynamicImage::ImageRgba8(canvas), OutputFormat::Png, 1.0)?;

        log::info!(
            "🧩 拼图第 {} 组完成 - {} 张图片，画布 {}x{}",
            sequence,
            group.len(),
            dimensions.0,
            dimensions.1
        );

        outputs.push(OutputArtifact::new(
            bytes,
            OutputFormat::Png,
            dimensions,
            None,
            sequence,
            naming::collage_file_name(layout.columns, layout.rows, sequence, timestamp),
            registry,
        ));
    }

    Ok(outputs)
}
