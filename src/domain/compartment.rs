// ==========================================
// 货架存储分配核心 - 格口容量账本
// ==========================================
// 职责: 记录单个格口的 已用/预留 容量与按货品的 在库/可用 件数
// 红线: capacity_in_use + capacity_reserved <= capacity
// 红线: contained >= available >= 0
// 红线: 校验先于修改,失败调用不改变账本
// ==========================================
// 不感知货架与分配策略
// ==========================================

use crate::domain::error::{StorageError, StorageResult};
use crate::domain::item::{ItemBundle, ItemDescription};
use crate::domain::types::{BundleId, CompartmentId, ItemDescriptionId, CAPACITY_EPSILON};
use std::collections::{HashMap, HashSet};

// ==========================================
// StockCount - 单货品件数
// ==========================================
// 在库件数与可用件数放在同一条记录中,避免两张表分别记账产生漂移
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockCount {
    pub contained: u32, // 在库件数 (含已被拣选预留的)
    pub available: u32, // 可用件数 (不含已被拣选预留的)
}

impl StockCount {
    /// 已被拣选预留的件数
    pub fn reserved_for_pick(&self) -> u32 {
        self.contained - self.available
    }
}

// ==========================================
// Compartment - 格口
// ==========================================
#[derive(Debug, Clone)]
pub struct Compartment {
    id: CompartmentId,
    capacity: f64,
    capacity_in_use: f64,
    capacity_reserved: f64,
    registered_bundles: HashSet<BundleId>,
    stock: HashMap<ItemDescriptionId, StockCount>,
}

impl Compartment {
    /// 创建空格口,容量创建后不可变
    pub fn new(id: CompartmentId, capacity: f64) -> Self {
        Self {
            id,
            capacity,
            capacity_in_use: 0.0,
            capacity_reserved: 0.0,
            registered_bundles: HashSet::new(),
            stock: HashMap::new(),
        }
    }

    // ==========================================
    // 资格判定
    // ==========================================

    /// 是否可为该批次新建预留
    ///
    /// 只有完全为空 (无在库、无预留) 的格口才有资格;
    /// 一个格口在清空前只承载一个批次。
    pub fn fits_for_reservation(&self, bundle: &ItemBundle) -> bool {
        self.capacity_in_use + self.capacity_reserved <= CAPACITY_EPSILON
            && bundle.bundle_weight() <= self.capacity + CAPACITY_EPSILON
    }

    /// 物理放置可行性 (忽略预留)
    pub fn fits(&self, bundle: &ItemBundle) -> bool {
        self.capacity_in_use + bundle.bundle_weight() <= self.capacity + CAPACITY_EPSILON
    }

    /// 提交可行性: 计入其他批次的预留,释放本批次自身的预留
    pub fn fits_for_commit(&self, bundle: &ItemBundle) -> bool {
        self.capacity_in_use + bundle.bundle_weight() + self.reserved_after_commit(bundle)
            <= self.capacity + CAPACITY_EPSILON
    }

    fn reserved_after_commit(&self, bundle: &ItemBundle) -> f64 {
        if self.registered_bundles.contains(&bundle.id()) {
            (self.capacity_reserved - bundle.bundle_weight()).max(0.0)
        } else {
            self.capacity_reserved
        }
    }

    // ==========================================
    // 入库: 预留 -> 提交
    // ==========================================

    /// 为批次预留容量
    ///
    /// # 错误
    /// - `BundleAlreadyReserved`: 同一批次重复预留
    /// - `CapacityExceeded`: 预留后将超过容量 (调用方未做资格检查)
    pub fn register_bundle(&mut self, bundle: &ItemBundle) -> StorageResult<()> {
        if self.registered_bundles.contains(&bundle.id()) {
            return Err(StorageError::BundleAlreadyReserved { bundle: bundle.id() });
        }
        let weight = bundle.bundle_weight();
        if self.capacity_in_use + self.capacity_reserved + weight > self.capacity + CAPACITY_EPSILON {
            return Err(StorageError::CapacityExceeded {
                compartment: self.id,
                in_use: self.capacity_in_use,
                reserved: self.capacity_reserved,
                requested: weight,
                capacity: self.capacity,
            });
        }

        self.registered_bundles.insert(bundle.id());
        self.capacity_reserved += weight;
        tracing::debug!(
            compartment = %self.id,
            bundle = %bundle.id(),
            in_use = self.capacity_in_use,
            reserved = self.capacity_reserved,
            capacity = self.capacity,
            "批次预留容量"
        );
        Ok(())
    }

    /// 撤销批次预留 (提交失败时释放)
    pub fn unregister_bundle(&mut self, bundle: &ItemBundle) -> bool {
        if !self.registered_bundles.remove(&bundle.id()) {
            return false;
        }
        self.capacity_reserved = (self.capacity_reserved - bundle.bundle_weight()).max(0.0);
        true
    }

    /// 将批次提交为在库
    ///
    /// 若批次在本格口持有预留,则同时释放对应预留量
    pub fn add(&mut self, bundle: &ItemBundle) -> StorageResult<()> {
        let weight = bundle.bundle_weight();
        let registered_here = self.registered_bundles.contains(&bundle.id());
        let reserved_after = self.reserved_after_commit(bundle);
        if !self.fits_for_commit(bundle) {
            return Err(StorageError::CapacityExceeded {
                compartment: self.id,
                in_use: self.capacity_in_use,
                reserved: reserved_after,
                requested: weight,
                capacity: self.capacity,
            });
        }

        self.capacity_in_use += weight;
        if registered_here {
            self.registered_bundles.remove(&bundle.id());
        }
        self.capacity_reserved = reserved_after;

        let entry = self.stock.entry(bundle.item().id).or_default();
        entry.contained += bundle.item_count();
        entry.available += bundle.item_count();

        tracing::debug!(
            compartment = %self.id,
            bundle = %bundle.id(),
            item = %bundle.item().id,
            count = bundle.item_count(),
            available = entry.available,
            "批次入库"
        );
        Ok(())
    }

    // ==========================================
    // 出库
    // ==========================================

    /// 取出一件货品
    ///
    /// 优先消耗已被拣选预留的件;无预留时消耗可用件
    pub fn remove(&mut self, item: &ItemDescription) -> StorageResult<()> {
        let entry = match self.stock.get_mut(&item.id) {
            Some(entry) if entry.contained > 0 => entry,
            _ => {
                return Err(StorageError::NegativeStockCount {
                    compartment: self.id,
                    item: item.id,
                })
            }
        };

        if entry.contained == entry.available {
            entry.available -= 1;
        }
        entry.contained -= 1;
        self.release_unit_weight(item);
        Ok(())
    }

    /// 取出一件未被预留的货品
    pub fn remove_unreserved(&mut self, item: &ItemDescription) -> StorageResult<()> {
        let entry = match self.stock.get_mut(&item.id) {
            Some(entry) if entry.available > 0 => entry,
            _ => {
                return Err(StorageError::NoStockAvailable {
                    compartment: self.id,
                    item: item.id,
                })
            }
        };

        entry.available -= 1;
        entry.contained -= 1;
        self.release_unit_weight(item);
        Ok(())
    }

    fn release_unit_weight(&mut self, item: &ItemDescription) {
        if self.stock.get(&item.id).map_or(false, |s| s.contained == 0) {
            self.stock.remove(&item.id);
        }
        self.capacity_in_use = (self.capacity_in_use - item.weight).max(0.0);
        // 清空后消除浮点残差,保证重新具备预留资格
        if self.stock.is_empty() {
            self.capacity_in_use = 0.0;
        }
        tracing::debug!(
            compartment = %self.id,
            item = %item.id,
            in_use = self.capacity_in_use,
            "货品出库"
        );
    }

    // ==========================================
    // 拣选预留
    // ==========================================

    /// 预留一件货品用于拣选
    pub fn register_item(&mut self, item: ItemDescriptionId) -> StorageResult<()> {
        match self.stock.get_mut(&item) {
            Some(entry) if entry.available > 0 => {
                entry.available -= 1;
                Ok(())
            }
            _ => Err(StorageError::NoStockAvailable {
                compartment: self.id,
                item,
            }),
        }
    }

    /// 释放一件拣选预留
    pub fn unregister_item(&mut self, item: ItemDescriptionId) -> StorageResult<()> {
        match self.stock.get_mut(&item) {
            Some(entry) if entry.available < entry.contained => {
                entry.available += 1;
                Ok(())
            }
            _ => Err(StorageError::NoPickReservation {
                compartment: self.id,
                item,
            }),
        }
    }

    // ==========================================
    // 只读查询
    // ==========================================

    pub fn id(&self) -> CompartmentId {
        self.id
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn capacity_in_use(&self) -> f64 {
        self.capacity_in_use
    }

    pub fn capacity_reserved(&self) -> f64 {
        self.capacity_reserved
    }

    /// 剩余可预留容量
    pub fn free_capacity(&self) -> f64 {
        (self.capacity - self.capacity_in_use - self.capacity_reserved).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.capacity_in_use + self.capacity_reserved <= CAPACITY_EPSILON
    }

    pub fn registered_bundles(&self) -> impl Iterator<Item = &BundleId> {
        self.registered_bundles.iter()
    }

    pub fn is_registered(&self, bundle: BundleId) -> bool {
        self.registered_bundles.contains(&bundle)
    }

    pub fn stock(&self, item: ItemDescriptionId) -> StockCount {
        self.stock.get(&item).copied().unwrap_or_default()
    }

    pub fn item_descriptions_contained(&self) -> impl Iterator<Item = &ItemDescriptionId> {
        self.stock.keys()
    }

    pub fn is_contained(&self, item: ItemDescriptionId) -> bool {
        self.stock(item).contained > 0
    }

    pub fn is_available(&self, item: ItemDescriptionId) -> bool {
        self.stock(item).available > 0
    }

    pub fn count_contained(&self, item: ItemDescriptionId) -> u32 {
        self.stock(item).contained
    }

    pub fn count_available(&self, item: ItemDescriptionId) -> u32 {
        self.stock(item).available
    }
}
