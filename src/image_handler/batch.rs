//! # 批处理编排
//!
//! ## 设计思路
//!
//! - 条目状态集中在 `BatchTable`（按 `ItemId` 索引），不在共享列表里就地修改。
//! - 状态迁移只通过纯函数 [`transition`]：`Pending → Processing → Completed | Error`，不可回退。
//! - 单项失败（返回错误或 panic）只把该项标记为 `Error`，不影响同批其他条目。
//! - 重新以新参数运行前调用 [`BatchTable::reset_all`] 开启新一轮，旧产出随之释放。
//!
//! ## 执行模型
//!
//! `BatchRunner` 默认并发为 1，按列表顺序逐项处理；并发大于 1 时用
//! `Semaphore` 限流的工作池并行处理。变换本身是 CPU 密集型，统一放到
//! `spawn_blocking` 中执行，不阻塞异步执行器。

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use super::ImageError;
use super::source::{OutputArtifact, SourceImage};

/// 条目标识，按加入顺序单调递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// 条目处理状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Error(String),
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error(_) => "error",
        }
    }
}

/// 触发状态迁移的事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Start,
    Succeed,
    Fail(String),
}

/// 纯状态迁移函数。
pub fn transition(current: &ItemStatus, event: StatusEvent) -> Result<ItemStatus, ImageError> {
    match (current, event) {
        (ItemStatus::Pending, StatusEvent::Start) => Ok(ItemStatus::Processing),
        (ItemStatus::Processing, StatusEvent::Succeed) => Ok(ItemStatus::Completed),
        (ItemStatus::Processing, StatusEvent::Fail(message)) => Ok(ItemStatus::Error(message)),
        (current, event) => Err(ImageError::InvalidTransition(format!(
            "{} 状态不能接受 {:?}",
            current.as_str(),
            event
        ))),
    }
}

/// 批处理条目。
#[derive(Debug)]
pub struct BatchItem {
    id: ItemId,
    source: Arc<SourceImage>,
    status: ItemStatus,
    artifact: Option<OutputArtifact>,
}

impl BatchItem {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &Arc<SourceImage> {
        &self.source
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    pub fn artifact(&self) -> Option<&OutputArtifact> {
        self.artifact.as_ref()
    }
}

/// 一轮运行的汇总。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
}

/// 条目表。
#[derive(Debug, Default)]
pub struct BatchTable {
    items: BTreeMap<ItemId, BatchItem>,
    next_id: u64,
}

impl BatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: Arc<SourceImage>) -> ItemId {
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.items.insert(
            id,
            BatchItem {
                id,
                source,
                status: ItemStatus::Pending,
                artifact: None,
            },
        );
        id
    }

    pub fn remove(&mut self, id: ItemId) -> Option<BatchItem> {
        self.items.remove(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&BatchItem> {
        self.items.get(&id)
    }

    /// 按加入顺序遍历。
    pub fn iter(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|item| item.status == ItemStatus::Pending)
            .map(|item| item.id)
            .collect()
    }

    /// 对单个条目应用状态事件。
    pub fn apply(&mut self, id: ItemId, event: StatusEvent) -> Result<&ItemStatus, ImageError> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| ImageError::InvalidTransition(format!("条目 #{} 不存在", id.0)))?;
        item.status = transition(&item.status, event)?;
        Ok(&item.status)
    }

    /// 标记开始处理并取出源图片。
    fn start(&mut self, id: ItemId) -> Option<Arc<SourceImage>> {
        if let Err(err) = self.apply(id, StatusEvent::Start) {
            log::warn!("⚠️ 跳过条目 #{}：{}", id.0, err);
            return None;
        }
        self.items.get(&id).map(|item| Arc::clone(&item.source))
    }

    /// 记录处理结果；成功时替换旧产出。
    fn finish(&mut self, id: ItemId, outcome: Result<OutputArtifact, String>) -> Result<(), ImageError> {
        match outcome {
            Ok(artifact) => {
                self.apply(id, StatusEvent::Succeed)?;
                if let Some(item) = self.items.get_mut(&id) {
                    item.artifact = Some(artifact);
                }
            }
            Err(message) => {
                self.apply(id, StatusEvent::Fail(message))?;
            }
        }
        Ok(())
    }

    /// 开启新一轮：全部条目回到 `Pending`，旧产出释放。
    pub fn reset_all(&mut self) {
        let mut released = 0;
        for item in self.items.values_mut() {
            if item.artifact.take().is_some() {
                released += 1;
            }
            item.status = ItemStatus::Pending;
        }
        if released > 0 {
            log::debug!("♻️ 新一轮处理开始，释放旧产出 {} 个", released);
        }
    }

    /// 已完成条目的产出（按加入顺序）。
    pub fn completed_artifacts(&self) -> impl Iterator<Item = &OutputArtifact> {
        self.items
            .values()
            .filter(|item| item.status == ItemStatus::Completed)
            .filter_map(|item| item.artifact.as_ref())
    }

    pub fn report(&self) -> BatchReport {
        self.items.values().fold(BatchReport::default(), |mut report, item| {
            match item.status {
                ItemStatus::Completed => report.completed += 1,
                ItemStatus::Error(_) => report.failed += 1,
                ItemStatus::Pending | ItemStatus::Processing => {}
            }
            report
        })
    }
}

/// 批处理执行器。
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// 处理表中全部 `Pending` 条目，逐项更新状态。
    pub async fn run<F>(&self, table: &mut BatchTable, transform: F) -> BatchReport
    where
        F: Fn(&SourceImage) -> Result<OutputArtifact, ImageError> + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        let ids = table.pending_ids();
        log::info!("🚀 批处理开始 - 条目: {} 并发: {}", ids.len(), self.concurrency);

        if self.concurrency == 1 {
            for id in ids {
                let Some(source) = table.start(id) else {
                    continue;
                };
                let transform = Arc::clone(&transform);
                let joined = tokio::task::spawn_blocking(move || transform(&source)).await;
                Self::record(table, id, flatten(joined));
            }
        } else {
            self.run_pooled(table, ids, transform).await;
        }

        let report = table.report();
        log::info!("🏁 批处理结束 - 成功: {} 失败: {}", report.completed, report.failed);
        report
    }

    async fn run_pooled<F>(&self, table: &mut BatchTable, ids: Vec<ItemId>, transform: Arc<F>)
    where
        F: Fn(&SourceImage) -> Result<OutputArtifact, ImageError> + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut started = Vec::with_capacity(ids.len());

        for id in ids {
            while let Some(done) = tasks.try_join_next() {
                Self::record_joined(table, done);
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    log::error!("❌ 工作池已关闭：{}", err);
                    break;
                }
            };
            let Some(source) = table.start(id) else {
                continue;
            };
            started.push(id);

            let transform = Arc::clone(&transform);
            tasks.spawn(async move {
                let joined = tokio::task::spawn_blocking(move || transform(&source)).await;
                drop(permit);
                (id, flatten(joined))
            });
        }

        while let Some(done) = tasks.join_next().await {
            Self::record_joined(table, done);
        }

        // 任务被意外取消时条目会停在 Processing，这里统一收尾
        for id in started {
            if table.get(id).map(|item| item.status() == &ItemStatus::Processing) == Some(true) {
                Self::record(table, id, Err("处理任务被中断".to_string()));
            }
        }
    }

    fn record_joined(table: &mut BatchTable, done: Result<(ItemId, Result<OutputArtifact, String>), JoinError>) {
        match done {
            Ok((id, outcome)) => Self::record(table, id, outcome),
            Err(err) => log::error!("❌ 批处理任务异常退出：{}", err),
        }
    }

    fn record(table: &mut BatchTable, id: ItemId, outcome: Result<OutputArtifact, String>) {
        if let Err(message) = &outcome {
            log::warn!("⚠️ 条目 #{} 处理失败：{}", id.0, message);
        }
        if let Err(err) = table.finish(id, outcome) {
            log::error!("❌ 条目 #{} 状态更新失败：{}", id.0, err);
        }
    }
}

fn flatten(joined: Result<Result<OutputArtifact, ImageError>, JoinError>) -> Result<OutputArtifact, String> {
    match joined {
        Ok(Ok(artifact)) => Ok(artifact),
        Ok(Err(err)) => Err(err.to_string()),
        Err(err) if err.is_panic() => Err("处理过程中发生异常".to_string()),
        Err(err) => Err(format!("处理任务被取消：{}", err)),
    }
}
