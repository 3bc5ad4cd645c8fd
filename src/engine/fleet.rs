// ==========================================
// 货架存储分配核心 - 货架集合 (Fleet)
// ==========================================
// 职责: 按固定顺序持有全部货架,提供跨货架的只读扫描
// 并发: 每个货架一把互斥锁;跨货架扫描逐个加锁做快照,
//       不持有全局锁
// 红线: 扫描顺序 = 货架顺序 × 格口顺序,随机抽样依赖此顺序
// ==========================================

use crate::domain::error::{StorageError, StorageResult};
use crate::domain::item::ItemBundle;
use crate::domain::layout::PodLayout;
use crate::domain::pod::Pod;
use crate::domain::types::{ItemDescriptionId, Placement, PodId};
use crate::env::events::StorageEventPublisher;
use crate::env::randomizer::SharedRandomizer;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 共享货架句柄
pub type SharedPod = Arc<Mutex<Pod>>;

/// 容量汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CapacityTotals {
    pub capacity: f64,
    pub capacity_in_use: f64,
    pub capacity_reserved: f64,
}

impl CapacityTotals {
    pub fn free(&self) -> f64 {
        (self.capacity - self.capacity_in_use - self.capacity_reserved).max(0.0)
    }
}

/// 货架集合
#[derive(Debug, Default)]
pub struct PodFleet {
    pods: Vec<SharedPod>,
    index: HashMap<PodId, usize>,
}

impl PodFleet {
    /// 由货架列表创建 (保持传入顺序)
    pub fn new(pods: Vec<Pod>) -> StorageResult<Self> {
        let mut fleet = Self::default();
        for pod in pods {
            let pod_id = pod.id();
            if fleet.index.insert(pod_id, fleet.pods.len()).is_some() {
                return Err(StorageError::Other(anyhow::anyhow!("货架标识重复: {}", pod_id)));
            }
            fleet.pods.push(Arc::new(Mutex::new(pod)));
        }
        Ok(fleet)
    }

    /// 由布局创建,所有货架共享同一随机源与事件发布者
    pub fn from_layouts(
        layouts: &[PodLayout],
        randomizer: &SharedRandomizer,
        publisher: Arc<dyn StorageEventPublisher>,
    ) -> StorageResult<Self> {
        let pods = layouts
            .iter()
            .map(|layout| Pod::from_layout(layout, randomizer.clone(), publisher.clone()))
            .collect();
        let fleet = Self::new(pods)?;
        tracing::info!(pods = fleet.len(), "货架集合已创建");
        Ok(fleet)
    }

    /// 按固定顺序列出全部货架
    pub fn list_storage_units(&self) -> &[SharedPod] {
        &self.pods
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn pod_ids(&self) -> Vec<PodId> {
        let mut ids: Vec<(usize, PodId)> = self.index.iter().map(|(id, idx)| (*idx, *id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn get(&self, pod_id: PodId) -> StorageResult<&SharedPod> {
        self.index
            .get(&pod_id)
            .map(|idx| &self.pods[*idx])
            .ok_or(StorageError::UnknownPod(pod_id))
    }

    /// 对单个货架加锁
    pub fn lock(&self, pod_id: PodId) -> StorageResult<MutexGuard<'_, Pod>> {
        lock_pod(self.get(pod_id)?)
    }

    // ==========================================
    // 跨货架扫描 (快照)
    // ==========================================

    /// 全部可预留的 (货架, 格口) 组合
    pub fn eligible_for_reservation(&self, bundle: &ItemBundle) -> StorageResult<Vec<Placement>> {
        let mut placements = Vec::new();
        for shared in &self.pods {
            let pod = lock_pod(shared)?;
            placements.extend(
                pod.compartments_eligible_for_reservation(bundle)
                    .into_iter()
                    .map(|cid| Placement::new(pod.id(), cid)),
            );
        }
        Ok(placements)
    }

    /// 指定组合当前是否仍可预留
    pub fn is_eligible(&self, placement: Placement, bundle: &ItemBundle) -> StorageResult<bool> {
        let pod = self.lock(placement.pod_id)?;
        Ok(pod
            .compartment(placement.compartment_id)
            .map(|c| c.fits_for_reservation(bundle))
            .unwrap_or(false))
    }

    pub fn is_contained(&self, item: ItemDescriptionId) -> StorageResult<bool> {
        for shared in &self.pods {
            if lock_pod(shared)?.is_contained(item) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn count_contained(&self, item: ItemDescriptionId) -> StorageResult<u32> {
        self.pods
            .iter()
            .map(|shared| lock_pod(shared).map(|pod| pod.count_contained(item)))
            .sum()
    }

    pub fn count_available(&self, item: ItemDescriptionId) -> StorageResult<u32> {
        self.pods
            .iter()
            .map(|shared| lock_pod(shared).map(|pod| pod.count_available(item)))
            .sum()
    }

    pub fn capacity_totals(&self) -> StorageResult<CapacityTotals> {
        let mut totals = CapacityTotals::default();
        for shared in &self.pods {
            let pod = lock_pod(shared)?;
            totals.capacity += pod.capacity();
            totals.capacity_in_use += pod.capacity_in_use();
            totals.capacity_reserved += pod.capacity_reserved();
        }
        Ok(totals)
    }
}

/// 加锁;中毒视为致命错误
pub(crate) fn lock_pod(shared: &SharedPod) -> StorageResult<MutexGuard<'_, Pod>> {
    shared
        .lock()
        .map_err(|e| StorageError::LockPoisoned(format!("货架锁获取失败: {}", e)))
}
