// ==========================================
// 货架存储分配核心 - 存储事件发布
// ==========================================
// 职责: 定义存储事件发布 trait,实现依赖倒置
// 说明: 核心层定义 trait,外部环境实现 (统计、界面、日志等)
// 红线: 事件只用于观察,发布失败不影响账本
// ==========================================

use crate::domain::types::{BundleId, CompartmentId, HandlingPoint, ItemDescriptionId, PodId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

// ==========================================
// 存储事件类型
// ==========================================

/// 存储事件触发类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageEventType {
    /// 批次预留容量
    BundleReserved,
    /// 批次物理入库
    BundleStored,
    /// 货品被拣选预留
    ItemReserved,
    /// 拣选预留被撤销
    ItemUnreserved,
    /// 货品物理出库
    ItemRemoved,
}

impl StorageEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            StorageEventType::BundleReserved => "BundleReserved",
            StorageEventType::BundleStored => "BundleStored",
            StorageEventType::ItemReserved => "ItemReserved",
            StorageEventType::ItemUnreserved => "ItemUnreserved",
            StorageEventType::ItemRemoved => "ItemRemoved",
        }
    }
}

/// 存储事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageEvent {
    BundleReserved {
        pod_id: PodId,
        compartment_id: CompartmentId,
        bundle_id: BundleId,
        weight: f64,
    },
    BundleStored {
        pod_id: PodId,
        compartment_id: CompartmentId,
        bundle_id: BundleId,
    },
    ItemReserved {
        pod_id: PodId,
        item: ItemDescriptionId,
        request: Uuid,
    },
    ItemUnreserved {
        pod_id: PodId,
        item: ItemDescriptionId,
        request: Uuid,
    },
    ItemRemoved {
        pod_id: PodId,
        item: ItemDescriptionId,
    },
}

impl StorageEvent {
    pub fn event_type(&self) -> StorageEventType {
        match self {
            StorageEvent::BundleReserved { .. } => StorageEventType::BundleReserved,
            StorageEvent::BundleStored { .. } => StorageEventType::BundleStored,
            StorageEvent::ItemReserved { .. } => StorageEventType::ItemReserved,
            StorageEvent::ItemUnreserved { .. } => StorageEventType::ItemUnreserved,
            StorageEvent::ItemRemoved { .. } => StorageEventType::ItemRemoved,
        }
    }

    pub fn pod_id(&self) -> PodId {
        match self {
            StorageEvent::BundleReserved { pod_id, .. }
            | StorageEvent::BundleStored { pod_id, .. }
            | StorageEvent::ItemReserved { pod_id, .. }
            | StorageEvent::ItemUnreserved { pod_id, .. }
            | StorageEvent::ItemRemoved { pod_id, .. } => *pod_id,
        }
    }
}

// ==========================================
// 货架处理事件 (入站方向)
// ==========================================

/// 货架在某处理点被物理处理
///
/// 由物理处理层发送给决策引擎,用于失效"粘住货架"的亲和状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodHandledEvent {
    pub pod_id: PodId,
    pub handling_point: HandlingPoint,
}

impl PodHandledEvent {
    pub fn inbound(pod_id: PodId, station: u32) -> Self {
        Self {
            pod_id,
            handling_point: HandlingPoint::Inbound(station),
        }
    }

    pub fn outbound(pod_id: PodId, station: u32) -> Self {
        Self {
            pod_id,
            handling_point: HandlingPoint::Outbound(station),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 存储事件发布者 Trait
///
/// # 实现说明
/// - 发布是观察钩子,不得回调修改账本
/// - 返回错误只会被记录日志
pub trait StorageEventPublisher: Send + Sync {
    fn publish(&self, event: StorageEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 发布事件,失败仅告警
pub(crate) fn publish_or_warn(publisher: &dyn StorageEventPublisher, event: StorageEvent) {
    let event_type = event.event_type();
    let pod_id = event.pod_id();
    if let Err(e) = publisher.publish(event) {
        tracing::warn!(
            pod = %pod_id,
            event_type = event_type.as_str(),
            "存储事件发布失败: {}",
            e
        );
    }
}

/// 空操作事件发布者
///
/// 用于不需要事件观察的场景
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl StorageEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: StorageEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::trace!(
            "NoOpEventPublisher: 跳过事件发布 - pod={}, event_type={}",
            event.pod_id(),
            event.event_type().as_str()
        );
        Ok(())
    }
}

/// 记录型事件发布者 (内存)
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<StorageEvent>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录事件的快照
    pub fn events(&self) -> Vec<StorageEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 取出并清空已记录事件
    pub fn drain(&self) -> Vec<StorageEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// 某类事件的数量
    pub fn count(&self, event_type: StorageEventType) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl StorageEventPublisher for RecordingEventPublisher {
    fn publish(&self, event: StorageEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events
            .lock()
            .map_err(|e| format!("锁获取失败: {}", e))?
            .push(event);
        Ok(())
    }
}

/// 通道型事件发布者 (出站消息通道)
///
/// 事件通过 tokio 无界通道发出,接收端由外部环境消费
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: mpsc::UnboundedSender<StorageEvent>,
}

impl ChannelEventPublisher {
    /// 创建发布者与对应的接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StorageEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StorageEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: StorageEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sender
            .send(event)
            .map_err(|e| format!("事件通道已关闭: {:?}", e.0.event_type()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(pod: u32) -> StorageEvent {
        StorageEvent::ItemRemoved {
            pod_id: PodId(pod),
            item: ItemDescriptionId(1),
        }
    }

    #[test]
    fn test_noop_publisher() {
        let publisher = NoOpEventPublisher;
        assert!(publisher.publish(removed(1)).is_ok());
    }

    #[test]
    fn test_recording_publisher() {
        let publisher = RecordingEventPublisher::new();
        publisher.publish(removed(1)).unwrap();
        publisher.publish(removed(2)).unwrap();

        assert_eq!(publisher.count(StorageEventType::ItemRemoved), 2);
        assert_eq!(publisher.count(StorageEventType::BundleReserved), 0);
        let drained = publisher.drain();
        assert_eq!(drained[1].pod_id(), PodId(2));
        assert!(publisher.events().is_empty());
    }

    #[test]
    fn test_channel_publisher() {
        let (publisher, mut receiver) = ChannelEventPublisher::channel();
        publisher.publish(removed(3)).unwrap();
        assert_eq!(receiver.try_recv().unwrap(), removed(3));
    }

    #[test]
    fn test_channel_publisher_closed_is_error() {
        let (publisher, receiver) = ChannelEventPublisher::channel();
        drop(receiver);
        assert!(publisher.publish(removed(1)).is_err());
        // 观察钩子失败不向上传播
        publish_or_warn(&publisher, removed(1));
    }

    #[test]
    fn test_pod_handled_event_constructors() {
        let event = PodHandledEvent::inbound(PodId(4), 1);
        assert!(event.handling_point.is_inbound());
        assert!(!PodHandledEvent::outbound(PodId(4), 1).handling_point.is_inbound());
    }
}
