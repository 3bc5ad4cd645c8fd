// ==========================================
// 货架存储分配核心 - 引擎层
// ==========================================
// 职责: 决策引擎、策略、货架集合与环境接口
// 红线: 引擎只通过 Pod 的方法修改账本
// ==========================================

pub mod fleet;
pub mod policy;
pub mod random_policy;
pub mod storage_manager;

// 重导出核心引擎
pub use crate::env::events::{
    ChannelEventPublisher, NoOpEventPublisher, PodHandledEvent, RecordingEventPublisher, StorageEvent,
    StorageEventPublisher, StorageEventType,
};
pub use fleet::{CapacityTotals, PodFleet, SharedPod};
pub use policy::{pick_random_eligible, StoragePolicy};
pub use random_policy::RandomStoragePolicy;
pub use crate::env::randomizer::{Randomizer, SeededRandomizer, SharedRandomizer};
pub use storage_manager::{BufferedBundle, DecisionOutcome, StorageManager};
