// ==========================================
// 货架存储分配核心 - 领域类型定义
// ==========================================
// 职责: 标识符新类型、请求状态、容量浮点容差
// 红线: 标识符只做查找键,不承载业务状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 容量比较的浮点容差
///
/// 重量是 f64 累加/扣减的结果,取出全部库存后可能残留 1e-15 级误差,
/// 判定"格口为空"和"容量未超限"时统一使用该容差。
pub const CAPACITY_EPSILON: f64 = 1e-9;

// ==========================================
// 标识符 (Identifiers)
// ==========================================

/// 货品描述 (SKU) 标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemDescriptionId(pub u32);

/// 货品批次标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleId(pub u64);

/// 货架 (Pod) 标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodId(pub u32);

/// 格口标识 (货架内序号)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompartmentId(pub u32);

impl fmt::Display for ItemDescriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item{}", self.0)
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bundle{}", self.0)
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pod{}", self.0)
    }
}

impl fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

// ==========================================
// 落位 (Placement)
// ==========================================

/// 一次分配决策的目标位置: (货架, 格口)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub pod_id: PodId,
    pub compartment_id: CompartmentId,
}

impl Placement {
    pub fn new(pod_id: PodId, compartment_id: CompartmentId) -> Self {
        Self {
            pod_id,
            compartment_id,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pod_id, self.compartment_id)
    }
}

// ==========================================
// 请求状态 (Request State)
// ==========================================
// 状态机: Pending -> {Finished, Aborted},终态不可再变更
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Pending,  // 待处理
    Finished, // 已完成
    Aborted,  // 已中止
}

impl RequestState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestState::Pending)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Pending => write!(f, "PENDING"),
            RequestState::Finished => write!(f, "FINISHED"),
            RequestState::Aborted => write!(f, "ABORTED"),
        }
    }
}

// ==========================================
// 处理点 (Handling Point)
// ==========================================
// 货架被物理处理的位置: 入库站 / 出库站
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlingPoint {
    Inbound(u32),  // 入库站 (补货)
    Outbound(u32), // 出库站 (拣选)
}

impl HandlingPoint {
    pub fn is_inbound(&self) -> bool {
        matches!(self, HandlingPoint::Inbound(_))
    }
}

impl fmt::Display for HandlingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlingPoint::Inbound(id) => write!(f, "IStation{}", id),
            HandlingPoint::Outbound(id) => write!(f, "OStation{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_state_terminal() {
        assert!(!RequestState::Pending.is_terminal());
        assert!(RequestState::Finished.is_terminal());
        assert!(RequestState::Aborted.is_terminal());
    }

    #[test]
    fn test_display() {
        let placement = Placement::new(PodId(3), CompartmentId(1));
        assert_eq!(placement.to_string(), "Pod3/C1");
        assert_eq!(HandlingPoint::Inbound(2).to_string(), "IStation2");
        assert_eq!(RequestState::Aborted.to_string(), "ABORTED");
    }

    #[test]
    fn test_request_state_serde_format() {
        let json = serde_json::to_string(&RequestState::Finished).unwrap();
        assert_eq!(json, "\"FINISHED\"");
    }
}
