// ==========================================
// 货架存储分配核心 - 随机存储策略
// ==========================================
// 默认策略: 在全部可预留格口中均匀随机选择
// 亲和变体 (stick_to_pod_until_full):
// - 上次选中的格口对当前批次仍可预留时直接复用,不抽样
// - 否则重新抽样,并把新结果记为亲和目标
// - 亲和货架在入库站被处理后失效,避免刚补货的货架被立即召回
// ==========================================

use crate::config::AllocationConfig;
use crate::domain::error::StorageResult;
use crate::domain::item::ItemBundle;
use crate::domain::types::{Placement, PodId};
use crate::env::events::PodHandledEvent;
use crate::engine::fleet::PodFleet;
use crate::engine::policy::{pick_random_eligible, StoragePolicy};
use crate::env::randomizer::SharedRandomizer;

/// 随机存储策略
#[derive(Debug, Clone)]
pub struct RandomStoragePolicy {
    config: AllocationConfig,
    last_chosen: Option<Placement>,
}

impl RandomStoragePolicy {
    pub fn new(config: AllocationConfig) -> Self {
        Self {
            config,
            last_chosen: None,
        }
    }

    /// 当前亲和目标
    pub fn affinity(&self) -> Option<Placement> {
        self.last_chosen
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }
}

impl StoragePolicy for RandomStoragePolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn select_compartment(
        &mut self,
        fleet: &PodFleet,
        randomizer: &SharedRandomizer,
        bundle: &ItemBundle,
    ) -> StorageResult<Option<Placement>> {
        if self.config.stick_to_pod_until_full {
            if let Some(last) = self.last_chosen {
                if fleet.is_eligible(last, bundle)? {
                    tracing::debug!(bundle = %bundle.id(), placement = %last, "复用亲和格口");
                    return Ok(Some(last));
                }
            }
        }

        let chosen = pick_random_eligible(fleet, randomizer, bundle)?;
        if chosen.is_some() {
            self.last_chosen = chosen;
        }
        Ok(chosen)
    }

    fn on_pod_handled(&mut self, event: &PodHandledEvent) {
        if !event.handling_point.is_inbound() {
            return;
        }
        if self.last_chosen.map(|p| p.pod_id) == Some(event.pod_id) {
            tracing::debug!(
                pod = %event.pod_id,
                station = %event.handling_point,
                "亲和货架已在入库站处理，亲和失效"
            );
            self.last_chosen = None;
        }
    }

    // 简单策略始终就绪,忽略时间

    fn buffer_threshold(&self, pod_id: PodId) -> f64 {
        self.config.buffer_policy(pod_id).threshold
    }

    fn buffer_timeout(&self, pod_id: PodId) -> f64 {
        self.config.buffer_policy(pod_id).timeout
    }
}
