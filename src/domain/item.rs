// ==========================================
// 货架存储分配核心 - 货品与批次
// ==========================================
// 红线: 货品描述只做查找键,本核心不修改
// 红线: 批次创建后不可变,成功落位后即被消费
// ==========================================

use crate::domain::types::{BundleId, ItemDescriptionId};
use serde::{Deserialize, Serialize};

// ==========================================
// ItemDescription - 货品描述 (SKU)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemDescription {
    pub id: ItemDescriptionId,
    pub weight: f64, // 单件重量 (容量占用)
}

impl ItemDescription {
    pub fn new(id: u32, weight: f64) -> Self {
        Self {
            id: ItemDescriptionId(id),
            weight,
        }
    }
}

// ==========================================
// ItemBundle - 入库批次
// ==========================================
// 一个批次 = 一种货品 × 件数,总重量即容量成本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemBundle {
    id: BundleId,
    item: ItemDescription,
    item_count: u32,
    bundle_weight: f64,
}

impl ItemBundle {
    /// 按单件重量 × 件数计算批次重量
    pub fn new(id: u64, item: ItemDescription, item_count: u32) -> Self {
        Self {
            id: BundleId(id),
            item,
            item_count,
            bundle_weight: item.weight * f64::from(item_count),
        }
    }

    /// 显式指定批次总重量
    pub fn with_weight(id: u64, item: ItemDescription, item_count: u32, bundle_weight: f64) -> Self {
        Self {
            id: BundleId(id),
            item,
            item_count,
            bundle_weight,
        }
    }

    pub fn id(&self) -> BundleId {
        self.id
    }

    pub fn item(&self) -> &ItemDescription {
        &self.item
    }

    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    pub fn bundle_weight(&self) -> f64 {
        self.bundle_weight
    }
}
