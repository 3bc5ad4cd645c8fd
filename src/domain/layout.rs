// ==========================================
// 货架存储分配核心 - 货架布局 DTO
// ==========================================
// 用途: 由外部环境 (实例文件/配置) 描述货架及其格口容量,
//       核心据此构造 Pod;本模块不负责文件读取
// ==========================================

use crate::domain::types::PodId;
use serde::{Deserialize, Serialize};

/// 格口布局
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompartmentLayout {
    pub capacity: f64,
}

/// 货架布局
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodLayout {
    pub pod_id: PodId,
    pub compartments: Vec<CompartmentLayout>,
}

impl PodLayout {
    /// 按容量列表构造
    pub fn uniform(pod_id: u32, compartment_count: usize, capacity: f64) -> Self {
        Self {
            pod_id: PodId(pod_id),
            compartments: vec![CompartmentLayout { capacity }; compartment_count],
        }
    }

    pub fn capacities(&self) -> Vec<f64> {
        self.compartments.iter().map(|c| c.capacity).collect()
    }

    pub fn total_capacity(&self) -> f64 {
        self.compartments.iter().map(|c| c.capacity).sum()
    }
}
