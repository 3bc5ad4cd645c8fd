// ==========================================
// 货架存储分配核心 - 领域模型层
// ==========================================
// 职责: 格口容量账本、货架聚合、请求生命周期
// 红线: 不含决策逻辑,不含持久化
// ==========================================

pub mod compartment;
pub mod error;
pub mod item;
pub mod layout;
pub mod pod;
pub mod request;
pub mod types;

// 重导出核心类型
pub use compartment::{Compartment, StockCount};
pub use error::{StorageError, StorageResult};
pub use item::{ItemBundle, ItemDescription};
pub use layout::{CompartmentLayout, PodLayout};
pub use pod::{PickReservation, Pod, PodStatistics};
pub use request::{ExtractRequest, InsertRequest};
pub use types::{
    BundleId, CompartmentId, HandlingPoint, ItemDescriptionId, Placement, PodId, RequestState, CAPACITY_EPSILON,
};
