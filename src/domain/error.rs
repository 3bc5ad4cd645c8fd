// ==========================================
// 货架存储分配核心 - 错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 不变量违反 (致命): 调用方绕过资格检查直接改账本
// - 生命周期/调用错误: 状态转换非法、标识不存在
// 可恢复的落位失败不走 Err,返回 Option/bool/Aborted
// ==========================================

use crate::domain::types::{BundleId, CompartmentId, ItemDescriptionId, PodId};
use thiserror::Error;
use uuid::Uuid;

/// 存储分配核心错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    // ===== 不变量违反 (致命) =====
    #[error("容量超限: compartment={compartment}, in_use={in_use}, reserved={reserved}, requested={requested}, capacity={capacity}")]
    CapacityExceeded {
        compartment: CompartmentId,
        in_use: f64,
        reserved: f64,
        requested: f64,
        capacity: f64,
    },

    #[error("库存计数将为负: compartment={compartment}, item={item}")]
    NegativeStockCount {
        compartment: CompartmentId,
        item: ItemDescriptionId,
    },

    #[error("无可用库存: compartment={compartment}, item={item}")]
    NoStockAvailable {
        compartment: CompartmentId,
        item: ItemDescriptionId,
    },

    #[error("格口无可释放的拣选预留: compartment={compartment}, item={item}")]
    NoPickReservation {
        compartment: CompartmentId,
        item: ItemDescriptionId,
    },

    #[error("货架无该货品可用库存: pod={pod}, item={item}")]
    ItemNotAvailable { pod: PodId, item: ItemDescriptionId },

    #[error("拣选预留队列不一致: pod={pod}, item={item}, request={request}")]
    PickReservationMismatch {
        pod: PodId,
        item: ItemDescriptionId,
        request: Uuid,
    },

    #[error("批次重复预留: bundle={bundle}")]
    BundleAlreadyReserved { bundle: BundleId },

    // ===== 生命周期错误 =====
    #[error("无效的状态转换: request={request}, from={from} to={to}")]
    InvalidStateTransition {
        request: Uuid,
        from: String,
        to: String,
    },

    #[error("请求已分配给其他货架: request={request}, assigned={assigned}, requested={requested}")]
    RequestAlreadyAssigned {
        request: Uuid,
        assigned: PodId,
        requested: PodId,
    },

    #[error("请求未分配给该货架: request={request}, pod={pod}")]
    RequestNotAssigned { request: Uuid, pod: PodId },

    // ===== 调用错误 =====
    #[error("货架不存在: {0}")]
    UnknownPod(PodId),

    #[error("格口不存在: pod={pod}, compartment={compartment}")]
    UnknownCompartment {
        pod: PodId,
        compartment: CompartmentId,
    },

    #[error("批次已在待分配队列或已预留: bundle={0}")]
    DuplicateBundle(BundleId),

    #[error("批次没有有效预留: bundle={0}")]
    BundleNotReserved(BundleId),

    #[error("锁获取失败: {0}")]
    LockPoisoned(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// 是否为不变量违反 (程序错误类,不可重试)
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            StorageError::CapacityExceeded { .. }
                | StorageError::NegativeStockCount { .. }
                | StorageError::NoStockAvailable { .. }
                | StorageError::NoPickReservation { .. }
                | StorageError::ItemNotAvailable { .. }
                | StorageError::PickReservationMismatch { .. }
                | StorageError::BundleAlreadyReserved { .. }
        )
    }
}

/// Result 类型别名
pub type StorageResult<T> = Result<T, StorageError>;
