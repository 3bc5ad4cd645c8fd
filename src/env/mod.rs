// ==========================================
// 货架存储分配核心 - 环境接口层
// ==========================================
// 职责: 外部环境注入的随机源与事件通道
// 红线: 不依赖 domain 之外的任何业务层
// ==========================================

pub mod events;
pub mod randomizer;

pub use events::{
    ChannelEventPublisher, NoOpEventPublisher, PodHandledEvent, RecordingEventPublisher, StorageEvent,
    StorageEventPublisher, StorageEventType,
};
pub use randomizer::{Randomizer, SeededRandomizer, SharedRandomizer};
