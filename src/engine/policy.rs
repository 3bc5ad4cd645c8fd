// ==========================================
// 货架存储分配核心 - 存储策略接口
// ==========================================
// 职责: 定义可插拔的格口选择策略
// 说明: 决策引擎只负责排队、预留、缓冲;"选哪里"交给策略
// 红线: 策略只读货架集合,不得直接修改账本
// 红线: 随机性只能来自注入的随机源
// ==========================================

use crate::domain::error::StorageResult;
use crate::domain::item::ItemBundle;
use crate::domain::types::{Placement, PodId};
use crate::env::events::PodHandledEvent;
use crate::engine::fleet::PodFleet;
use crate::env::randomizer::SharedRandomizer;

/// 存储策略 Trait
///
/// # 实现说明
/// - `select_compartment` 返回 `Ok(None)` 表示本周期无可用格口,批次继续等待
/// - 时间感知策略可在 `is_ready` 返回 false 以推迟决策
pub trait StoragePolicy: Send {
    /// 策略名称 (用于日志)
    fn name(&self) -> &str;

    /// 为待处理批次选择格口
    fn select_compartment(
        &mut self,
        fleet: &PodFleet,
        randomizer: &SharedRandomizer,
        bundle: &ItemBundle,
    ) -> StorageResult<Option<Placement>>;

    /// 为初始库存选择格口
    ///
    /// 默认: 全货架均匀随机,不记录亲和状态
    fn select_for_initial_inventory(
        &mut self,
        fleet: &PodFleet,
        randomizer: &SharedRandomizer,
        bundle: &ItemBundle,
    ) -> StorageResult<Option<Placement>> {
        pick_random_eligible(fleet, randomizer, bundle)
    }

    /// 货架被物理处理
    fn on_pod_handled(&mut self, _event: &PodHandledEvent) {}

    /// 当前仿真时间
    fn signal_current_time(&mut self, _current_time: f64) {}

    /// 是否可以开始新一轮决策
    fn is_ready(&self) -> bool {
        true
    }

    /// 货架缓冲阈值 (占货架总容量的比例,0 = 立即提交)
    fn buffer_threshold(&self, pod_id: PodId) -> f64;

    /// 货架缓冲超时 (仿真秒)
    fn buffer_timeout(&self, pod_id: PodId) -> f64;
}

/// 在全货架可预留组合中均匀随机取一个
///
/// 每个候选消耗一次抽样;无候选时不抽样
pub fn pick_random_eligible(
    fleet: &PodFleet,
    randomizer: &SharedRandomizer,
    bundle: &ItemBundle,
) -> StorageResult<Option<Placement>> {
    let candidates = fleet.eligible_for_reservation(bundle)?;
    Ok(randomizer.pick_uniform(candidates))
}
