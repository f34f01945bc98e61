//! # 会话与资源句柄
//!
//! ## 设计思路
//!
//! 每张已解码图片和每个产出文件都持有一个 `ResourceHandle`。
//! 句柄在被替换、被移除或会话清空时释放（`Drop`），`ResourceRegistry`
//! 记录当前存活的句柄数量，便于发现遗漏释放。
//!
//! `Session` 对应一次页面会话：持有批处理表与拼图产出，
//! 会话结束（`clear`）时统一释放。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::batch::{BatchItem, BatchTable, ItemId};
use super::source::{OutputArtifact, SourceImage};

/// 句柄所代表的资源类别（用于日志）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Source,
    Artifact,
}

/// 资源登记表。
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    live: AtomicUsize,
    next_id: AtomicU64,
}

impl ResourceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 申请一个新句柄。
    pub fn acquire(self: &Arc<Self>, kind: ResourceKind) -> ResourceHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        ResourceHandle {
            id,
            kind,
            registry: Arc::clone(self),
        }
    }

    /// 当前存活句柄数量。
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// 可撤销的资源引用，离开作用域即释放。
#[derive(Debug)]
pub struct ResourceHandle {
    id: u64,
    kind: ResourceKind,
    registry: Arc<ResourceRegistry>,
}

impl ResourceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.registry.live.fetch_sub(1, Ordering::SeqCst);
        log::debug!("♻️ 已释放资源 #{}（{:?}）", self.id, self.kind);
    }
}

/// 一次会话的全部状态。
pub struct Session {
    registry: Arc<ResourceRegistry>,
    table: BatchTable,
    collages: Vec<OutputArtifact>,
}

impl Session {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self {
            registry,
            table: BatchTable::new(),
            collages: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn table(&self) -> &BatchTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut BatchTable {
        &mut self.table
    }

    /// 加入一张已加载的图片，返回其条目标识。
    pub fn add_source(&mut self, source: Arc<SourceImage>) -> ItemId {
        self.table.insert(source)
    }

    /// 移除单个条目，连同其产出一起释放。
    pub fn remove(&mut self, id: ItemId) -> Option<BatchItem> {
        self.table.remove(id)
    }

    /// 按加入顺序返回全部源图片。
    pub fn sources(&self) -> Vec<Arc<SourceImage>> {
        self.table.iter().map(|item| Arc::clone(item.source())).collect()
    }

    /// 替换拼图产出，旧产出随之释放。
    pub fn set_collages(&mut self, collages: Vec<OutputArtifact>) {
        let released = std::mem::replace(&mut self.collages, collages).len();
        if released > 0 {
            log::debug!("♻️ 替换拼图产出，释放旧产出 {} 个", released);
        }
    }

    pub fn collages(&self) -> &[OutputArtifact] {
        &self.collages
    }

    /// 清空会话：释放全部源图片与产出。
    pub fn clear(&mut self) {
        let items = self.table.len();
        let collages = self.collages.len();
        self.table.clear();
        self.collages.clear();
        log::info!("🧹 会话已清空 - 条目: {} 拼图: {}", items, collages);
    }

    pub fn live_resources(&self) -> usize {
        self.registry.live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_handler::source::{SourceFormat, SourceImage};
    use image::{DynamicImage, RgbaImage};

    fn source(registry: &Arc<ResourceRegistry>, name: &str) -> Arc<SourceImage> {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        Arc::new(SourceImage::from_dynamic(image, SourceFormat::Png, name, registry))
    }

    #[test]
    fn handles_are_released_on_drop() {
        let registry = ResourceRegistry::new();
        let first = registry.acquire(ResourceKind::Source);
        let second = registry.acquire(ResourceKind::Artifact);
        assert_eq!(registry.live(), 2);
        assert_ne!(first.id(), second.id());
        drop(first);
        assert_eq!(registry.live(), 1);
        drop(second);
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn clear_releases_every_source() {
        let registry = ResourceRegistry::new();
        let mut session = Session::new(Arc::clone(&registry));
        session.add_source(source(&registry, "a.png"));
        session.add_source(source(&registry, "b.png"));
        assert_eq!(session.live_resources(), 2);

        session.clear();
        assert_eq!(session.live_resources(), 0);
        assert!(session.table().is_empty());
    }

    #[test]
    fn remove_releases_only_that_item() {
        let registry = ResourceRegistry::new();
        let mut session = Session::new(Arc::clone(&registry));
        let a = session.add_source(source(&registry, "a.png"));
        session.add_source(source(&registry, "b.png"));

        let removed = session.remove(a);
        assert!(removed.is_some());
        drop(removed);
        assert_eq!(session.live_resources(), 1);
        assert_eq!(session.sources().len(), 1);
    }
}
