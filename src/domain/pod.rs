// ==========================================
// 货架存储分配核心 - 货架 (Pod)
// ==========================================
// 职责:
// - 独占持有有序格口列表
// - 把批次预留、拣选预留路由到具体格口
// - 跨格口聚合只读查询
// 红线: 每种货品的拣选预留队列长度 == 各格口已预留件数之和
// ==========================================

use crate::domain::compartment::Compartment;
use crate::domain::error::{StorageError, StorageResult};
use crate::domain::item::{ItemBundle, ItemDescription};
use crate::domain::layout::PodLayout;
use crate::domain::request::{ExtractRequest, InsertRequest};
use crate::domain::types::{CompartmentId, ItemDescriptionId, PodId, RequestState};
use crate::env::events::{publish_or_warn, StorageEvent, StorageEventPublisher};
use crate::env::randomizer::SharedRandomizer;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// 一条拣选预留: 哪个格口为哪个出库请求保留了一件货
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickReservation {
    pub compartment_id: CompartmentId,
    pub request_id: Uuid,
}

/// 货架统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodStatistics {
    pub items_handled: u64,   // 交给出库站的件数
    pub bundles_handled: u64, // 从入库站接收的批次数
}

// ==========================================
// Pod - 货架
// ==========================================
pub struct Pod {
    id: PodId,
    compartments: Vec<Compartment>,
    randomizer: SharedRandomizer,
    publisher: Arc<dyn StorageEventPublisher>,
    pick_reservations: HashMap<ItemDescriptionId, VecDeque<PickReservation>>,

    // ===== 瞬态信息 (本核心不解读) =====
    carrier: Option<u32>,
    location: Option<u32>,

    // ===== 观察标志 =====
    changed: bool,
    content_changed: bool,

    statistics: PodStatistics,
}

impl Pod {
    /// 创建货架
    ///
    /// # 参数
    /// - `capacities`: 各格口容量,顺序即格口序号
    /// - `randomizer`: 共享随机源
    /// - `publisher`: 存储事件发布者
    pub fn new(
        id: PodId,
        capacities: &[f64],
        randomizer: SharedRandomizer,
        publisher: Arc<dyn StorageEventPublisher>,
    ) -> Self {
        let compartments = capacities
            .iter()
            .enumerate()
            .map(|(idx, capacity)| Compartment::new(CompartmentId(idx as u32), *capacity))
            .collect();
        Self {
            id,
            compartments,
            randomizer,
            publisher,
            pick_reservations: HashMap::new(),
            carrier: None,
            location: None,
            changed: true,
            content_changed: true,
            statistics: PodStatistics::default(),
        }
    }

    /// 由布局 DTO 创建
    pub fn from_layout(
        layout: &PodLayout,
        randomizer: SharedRandomizer,
        publisher: Arc<dyn StorageEventPublisher>,
    ) -> Self {
        Self::new(layout.pod_id, &layout.capacities(), randomizer, publisher)
    }

    pub fn id(&self) -> PodId {
        self.id
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn compartment(&self, id: CompartmentId) -> StorageResult<&Compartment> {
        self.compartments
            .get(id.0 as usize)
            .ok_or(StorageError::UnknownCompartment {
                pod: self.id,
                compartment: id,
            })
    }

    fn compartment_mut(&mut self, id: CompartmentId) -> StorageResult<&mut Compartment> {
        let pod = self.id;
        self.compartments
            .get_mut(id.0 as usize)
            .ok_or(StorageError::UnknownCompartment {
                pod,
                compartment: id,
            })
    }

    // ==========================================
    // 资格查询
    // ==========================================

    /// 可为该批次新建预留的格口
    pub fn compartments_eligible_for_reservation(&self, bundle: &ItemBundle) -> Vec<CompartmentId> {
        self.compartments
            .iter()
            .filter(|c| c.fits_for_reservation(bundle))
            .map(|c| c.id())
            .collect()
    }

    /// 物理上可放下该批次的格口
    pub fn compartments_eligible_for_placement(&self, bundle: &ItemBundle) -> Vec<CompartmentId> {
        self.compartments
            .iter()
            .filter(|c| c.fits(bundle))
            .map(|c| c.id())
            .collect()
    }

    // ==========================================
    // 入库
    // ==========================================

    /// 在指定格口为批次预留容量,并通知外部环境
    pub fn register_bundle(&mut self, bundle: &ItemBundle, compartment_id: CompartmentId) -> StorageResult<()> {
        self.compartment_mut(compartment_id)?.register_bundle(bundle)?;
        publish_or_warn(
            self.publisher.as_ref(),
            StorageEvent::BundleReserved {
                pod_id: self.id,
                compartment_id,
                bundle_id: bundle.id(),
                weight: bundle.bundle_weight(),
            },
        );
        Ok(())
    }

    /// 物理放入批次 (带容量校验)
    ///
    /// 校验计入其他批次的预留,因此不会侵占已预留的容量
    ///
    /// # 返回
    /// - `Ok(true)`: 放入成功,请求标记完成
    /// - `Ok(false)`: 容量不足,请求标记中止,预留被释放
    pub fn add(
        &mut self,
        compartment_id: CompartmentId,
        bundle: &ItemBundle,
        insert_request: &mut InsertRequest,
    ) -> StorageResult<bool> {
        self.changed = true;
        ensure_pending(insert_request.id(), insert_request.state())?;

        let pod_id = self.id;
        let compartment = self.compartment_mut(compartment_id)?;
        if compartment.fits_for_commit(bundle) {
            compartment.add(bundle)?;
            self.content_changed = true;
            self.statistics.bundles_handled += 1;
            insert_request.finish()?;
            publish_or_warn(
                self.publisher.as_ref(),
                StorageEvent::BundleStored {
                    pod_id,
                    compartment_id,
                    bundle_id: bundle.id(),
                },
            );
            Ok(true)
        } else {
            compartment.unregister_bundle(bundle);
            tracing::warn!(
                pod = %pod_id,
                compartment = %compartment_id,
                bundle = %bundle.id(),
                in_use = compartment.capacity_in_use(),
                capacity = compartment.capacity(),
                "提交时容量不足,入库请求中止"
            );
            insert_request.abort()?;
            Ok(false)
        }
    }

    // ==========================================
    // 拣选预留
    // ==========================================

    /// 为出库请求预留一件货品
    ///
    /// 在有可用库存的格口中均匀随机选择,分散同一 SKU 的拣选压力。
    /// 库存已全部被拣选预留的格口不参与抽样 (不为其抽随机数)。
    pub fn register_item_for_pick(
        &mut self,
        item: ItemDescriptionId,
        extract_request: &mut ExtractRequest,
    ) -> StorageResult<CompartmentId> {
        ensure_pending(extract_request.id(), extract_request.state())?;
        if let Some(assigned) = extract_request.assigned_pod() {
            return Err(StorageError::RequestAlreadyAssigned {
                request: extract_request.id(),
                assigned,
                requested: self.id,
            });
        }

        let candidates: Vec<CompartmentId> = self
            .compartments
            .iter()
            .filter(|c| c.is_available(item))
            .map(|c| c.id())
            .collect();
        let chosen = self
            .randomizer
            .pick_uniform(candidates)
            .ok_or(StorageError::ItemNotAvailable { pod: self.id, item })?;

        self.compartment_mut(chosen)?.register_item(item)?;
        self.pick_reservations
            .entry(item)
            .or_default()
            .push_back(PickReservation {
                compartment_id: chosen,
                request_id: extract_request.id(),
            });
        extract_request.assign(self.id)?;

        publish_or_warn(
            self.publisher.as_ref(),
            StorageEvent::ItemReserved {
                pod_id: self.id,
                item,
                request: extract_request.id(),
            },
        );
        Ok(chosen)
    }

    /// 撤销出库请求的拣选预留
    ///
    /// 正常情况下预留与撤销按同一顺序成对出现,释放的就是队首;
    /// 若顺序被打乱,按请求定位到其真实格口释放并告警。
    pub fn unregister_item_for_pick(
        &mut self,
        item: ItemDescriptionId,
        extract_request: &mut ExtractRequest,
    ) -> StorageResult<()> {
        let request_id = extract_request.id();
        ensure_pending(request_id, extract_request.state())?;
        if extract_request.assigned_pod() != Some(self.id) {
            return Err(StorageError::RequestNotAssigned {
                request: request_id,
                pod: self.id,
            });
        }
        let position = self.pick_position(item, request_id).ok_or(StorageError::PickReservationMismatch {
            pod: self.id,
            item,
            request: request_id,
        })?;
        if position != 0 {
            tracing::warn!(
                pod = %self.id,
                item = %item,
                request = %request_id,
                position,
                "拣选预留释放顺序与预留顺序不一致"
            );
        }

        let compartment_id = self.pick_reservation_at(item, position, request_id)?;
        self.compartment_mut(compartment_id)?.unregister_item(item)?;
        self.take_pick_reservation(item, position, request_id)?;
        extract_request.unassign(self.id)?;

        publish_or_warn(
            self.publisher.as_ref(),
            StorageEvent::ItemUnreserved {
                pod_id: self.id,
                item,
                request: request_id,
            },
        );
        Ok(())
    }

    fn pick_position(&self, item: ItemDescriptionId, request_id: Uuid) -> Option<usize> {
        self.pick_reservations
            .get(&item)?
            .iter()
            .position(|r| r.request_id == request_id)
    }

    fn take_pick_reservation(&mut self, item: ItemDescriptionId, position: usize, request: Uuid) -> StorageResult<CompartmentId> {
        let reservation = self
            .pick_reservations
            .get_mut(&item)
            .and_then(|q| q.remove(position));
        if self.pick_reservations.get(&item).map_or(false, |q| q.is_empty()) {
            self.pick_reservations.remove(&item);
        }
        reservation
            .map(|r| r.compartment_id)
            .ok_or(StorageError::PickReservationMismatch {
                pod: self.id,
                item,
                request,
            })
    }

    // ==========================================
    // 出库
    // ==========================================

    /// 物理取出一件货品
    ///
    /// 请求在本货架持有拣选预留时从预留格口取出 (不抽样);
    /// 否则在有可用库存的格口中均匀随机选择。
    /// 请求在其他货架持有拣选预留时拒绝,账本与请求均不变。
    pub fn remove(&mut self, item: &ItemDescription, extract_request: &mut ExtractRequest) -> StorageResult<CompartmentId> {
        ensure_pending(extract_request.id(), extract_request.state())?;
        let assigned = extract_request.assigned_pod();
        if let Some(other) = assigned.filter(|pod| *pod != self.id) {
            return Err(StorageError::RequestAlreadyAssigned {
                request: extract_request.id(),
                assigned: other,
                requested: self.id,
            });
        }

        let position = self.pick_position(item.id, extract_request.id());
        if assigned.is_some() && position.is_none() {
            return Err(StorageError::PickReservationMismatch {
                pod: self.id,
                item: item.id,
                request: extract_request.id(),
            });
        }

        let compartment_id = match position {
            Some(position) => {
                let compartment_id = self.pick_reservation_at(item.id, position, extract_request.id())?;
                self.compartment_mut(compartment_id)?.remove(item)?;
                self.take_pick_reservation(item.id, position, extract_request.id())?;
                extract_request.unassign(self.id)?;
                compartment_id
            }
            None => {
                let candidates: Vec<CompartmentId> = self
                    .compartments
                    .iter()
                    .filter(|c| c.is_available(item.id))
                    .map(|c| c.id())
                    .collect();
                let chosen = self.randomizer.pick_uniform(candidates).ok_or(StorageError::ItemNotAvailable {
                    pod: self.id,
                    item: item.id,
                })?;
                self.compartment_mut(chosen)?.remove_unreserved(item)?;
                chosen
            }
        };

        self.changed = true;
        self.content_changed = true;
        self.statistics.items_handled += 1;
        extract_request.finish()?;

        publish_or_warn(
            self.publisher.as_ref(),
            StorageEvent::ItemRemoved {
                pod_id: self.id,
                item: item.id,
            },
        );
        Ok(compartment_id)
    }

    fn pick_reservation_at(&self, item: ItemDescriptionId, position: usize, request: Uuid) -> StorageResult<CompartmentId> {
        self.pick_reservations
            .get(&item)
            .and_then(|q| q.get(position))
            .map(|r| r.compartment_id)
            .ok_or(StorageError::PickReservationMismatch {
                pod: self.id,
                item,
                request,
            })
    }

    // ==========================================
    // 聚合查询
    // ==========================================

    pub fn is_contained(&self, item: ItemDescriptionId) -> bool {
        self.compartments.iter().any(|c| c.is_contained(item))
    }

    pub fn is_available(&self, item: ItemDescriptionId) -> bool {
        self.compartments.iter().any(|c| c.is_available(item))
    }

    pub fn count_contained(&self, item: ItemDescriptionId) -> u32 {
        self.compartments.iter().map(|c| c.count_contained(item)).sum()
    }

    pub fn count_available(&self, item: ItemDescriptionId) -> u32 {
        self.compartments.iter().map(|c| c.count_available(item)).sum()
    }

    /// 是否有格口物理上能放下该批次
    pub fn fits(&self, bundle: &ItemBundle) -> bool {
        self.compartments.iter().any(|c| c.fits(bundle))
    }

    pub fn capacity(&self) -> f64 {
        self.compartments.iter().map(|c| c.capacity()).sum()
    }

    pub fn capacity_in_use(&self) -> f64 {
        self.compartments.iter().map(|c| c.capacity_in_use()).sum()
    }

    pub fn capacity_reserved(&self) -> f64 {
        self.compartments.iter().map(|c| c.capacity_reserved()).sum()
    }

    pub fn compartment_capacities(&self) -> Vec<f64> {
        self.compartments.iter().map(|c| c.capacity()).collect()
    }

    pub fn compartments_capacity_used(&self) -> Vec<f64> {
        self.compartments.iter().map(|c| c.capacity_in_use()).collect()
    }

    /// 当前容量利用率 (已用 / 总容量)
    pub fn utilization(&self) -> f64 {
        let capacity = self.capacity();
        if capacity <= 0.0 {
            return 0.0;
        }
        self.capacity_in_use() / capacity
    }

    /// 某货品的拣选预留队列长度
    pub fn pick_reservation_count(&self, item: ItemDescriptionId) -> usize {
        self.pick_reservations.get(&item).map_or(0, |q| q.len())
    }

    /// 拣选预留队列与格口账本是否一致
    pub fn pick_reservations_consistent(&self) -> bool {
        let mut per_compartment: HashMap<(CompartmentId, ItemDescriptionId), u32> = HashMap::new();
        for (item, queue) in &self.pick_reservations {
            for reservation in queue {
                *per_compartment.entry((reservation.compartment_id, *item)).or_default() += 1;
            }
        }
        self.compartments.iter().all(|c| {
            c.item_descriptions_contained().all(|item| {
                let expected = c.stock(*item).reserved_for_pick();
                per_compartment.get(&(c.id(), *item)).copied().unwrap_or(0) == expected
            })
        }) && per_compartment.iter().all(|((cid, item), count)| {
            self.compartments
                .get(cid.0 as usize)
                .map_or(false, |c| c.stock(*item).reserved_for_pick() == *count)
        })
    }

    // ==========================================
    // 观察与统计
    // ==========================================

    /// 读取并清除"已变更"标志
    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }

    /// 读取并清除"内容已变更"标志
    pub fn take_content_changed(&mut self) -> bool {
        std::mem::replace(&mut self.content_changed, false)
    }

    pub fn statistics(&self) -> PodStatistics {
        self.statistics
    }

    pub fn reset_statistics(&mut self) {
        self.statistics = PodStatistics::default();
    }

    pub fn carrier(&self) -> Option<u32> {
        self.carrier
    }

    pub fn set_carrier(&mut self, carrier: Option<u32>) {
        self.carrier = carrier;
    }

    pub fn location(&self) -> Option<u32> {
        self.location
    }

    pub fn set_location(&mut self, location: Option<u32>) {
        self.location = location;
    }
}

fn ensure_pending(request: Uuid, state: RequestState) -> StorageResult<()> {
    if state.is_terminal() {
        return Err(StorageError::InvalidStateTransition {
            request,
            from: state.to_string(),
            to: RequestState::Finished.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for Pod {
    /// 例: `Pod3[(40%/60%)(0%/0%)]`,每个格口为 已用% / (已用+预留)%
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.id)?;
        for c in &self.compartments {
            let (used, booked) = if c.capacity() > 0.0 {
                (
                    c.capacity_in_use() / c.capacity() * 100.0,
                    (c.capacity_in_use() + c.capacity_reserved()) / c.capacity() * 100.0,
                )
            } else {
                (0.0, 0.0)
            };
            write!(f, "({:.0}%/{:.0}%)", used, booked)?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pod")
            .field("id", &self.id)
            .field("compartments", &self.compartments)
            .field("pick_reservations", &self.pick_reservations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Placement;
    use crate::env::events::{RecordingEventPublisher, StorageEventType};

    fn item_x() -> ItemDescription {
        ItemDescription::new(1, 2.0)
    }

    fn create_pod(capacities: &[f64]) -> (Pod, Arc<RecordingEventPublisher>, SharedRandomizer) {
        let publisher = Arc::new(RecordingEventPublisher::new());
        let randomizer = SharedRandomizer::seeded(11);
        let pod = Pod::new(PodId(0), capacities, randomizer.clone(), publisher.clone());
        (pod, publisher, randomizer)
    }

    fn stock(pod: &mut Pod, compartment: u32, bundle_id: u64, count: u32) {
        let bundle = ItemBundle::new(bundle_id, item_x(), count);
        let cid = CompartmentId(compartment);
        pod.register_bundle(&bundle, cid).unwrap();
        let mut request = InsertRequest::new(bundle.clone(), Placement::new(pod.id(), cid));
        assert!(pod.add(cid, &bundle, &mut request).unwrap());
    }

    // ==========================================
    // 入库
    // ==========================================

    #[test]
    fn test_eligible_compartments() {
        let (mut pod, _, _) = create_pod(&[10.0, 50.0, 50.0]);
        let bundle = ItemBundle::new(1, item_x(), 10); // 20.0
        assert_eq!(
            pod.compartments_eligible_for_reservation(&bundle),
            vec![CompartmentId(1), CompartmentId(2)]
        );

        pod.register_bundle(&bundle, CompartmentId(1)).unwrap();
        assert_eq!(pod.compartments_eligible_for_reservation(&bundle), vec![CompartmentId(2)]);
        assert_eq!(
            pod.compartments_eligible_for_placement(&bundle),
            vec![CompartmentId(1), CompartmentId(2)]
        );
    }

    #[test]
    fn test_register_bundle_notifies() {
        let (mut pod, publisher, _) = create_pod(&[100.0]);
        let bundle = ItemBundle::new(1, item_x(), 5);
        pod.register_bundle(&bundle, CompartmentId(0)).unwrap();
        assert_eq!(publisher.count(StorageEventType::BundleReserved), 1);
        assert_eq!(pod.capacity_reserved(), 10.0);

        let err = pod.register_bundle(&bundle, CompartmentId(5)).unwrap_err();
        assert!(matches!(err, StorageError::UnknownCompartment { .. }));
    }

    #[test]
    fn test_add_success_and_abort() {
        let (mut pod, publisher, _) = create_pod(&[10.0]);
        let fits = ItemBundle::new(1, item_x(), 4); // 8.0
        pod.register_bundle(&fits, CompartmentId(0)).unwrap();
        let mut ok_request = InsertRequest::new(fits.clone(), Placement::new(PodId(0), CompartmentId(0)));
        assert!(pod.add(CompartmentId(0), &fits, &mut ok_request).unwrap());
        assert_eq!(ok_request.state(), RequestState::Finished);
        assert_eq!(publisher.count(StorageEventType::BundleStored), 1);

        let too_big = ItemBundle::new(2, item_x(), 2); // 4.0, 8 + 4 > 10
        let mut abort_request = InsertRequest::new(too_big.clone(), Placement::new(PodId(0), CompartmentId(0)));
        assert!(pod.take_changed());
        assert!(!pod.add(CompartmentId(0), &too_big, &mut abort_request).unwrap());
        assert_eq!(abort_request.state(), RequestState::Aborted);
        assert!(pod.take_changed());
        assert_eq!(pod.capacity_in_use(), 8.0);

        // 终态请求不可再次提交
        assert!(pod.add(CompartmentId(0), &fits, &mut ok_request).is_err());
    }

    // ==========================================
    // 拣选预留
    // ==========================================

    #[test]
    fn test_register_and_unregister_item_for_pick() {
        let (mut pod, publisher, _) = create_pod(&[100.0, 100.0]);
        stock(&mut pod, 0, 1, 2);
        stock(&mut pod, 1, 2, 2);

        let mut request = ExtractRequest::new(item_x());
        pod.register_item_for_pick(item_x().id, &mut request).unwrap();
        assert_eq!(request.assigned_pod(), Some(PodId(0)));
        assert_eq!(pod.count_available(item_x().id), 3);
        assert_eq!(pod.count_contained(item_x().id), 4);
        assert_eq!(pod.pick_reservation_count(item_x().id), 1);
        assert!(pod.pick_reservations_consistent());

        pod.unregister_item_for_pick(item_x().id, &mut request).unwrap();
        assert_eq!(request.assigned_pod(), None);
        assert_eq!(pod.count_available(item_x().id), 4);
        assert_eq!(pod.pick_reservation_count(item_x().id), 0);
        assert_eq!(publisher.count(StorageEventType::ItemReserved), 1);
        assert_eq!(publisher.count(StorageEventType::ItemUnreserved), 1);
    }

    #[test]
    fn test_register_item_requires_stock() {
        let (mut pod, _, randomizer) = create_pod(&[100.0]);
        let mut request = ExtractRequest::new(item_x());
        let err = pod.register_item_for_pick(item_x().id, &mut request).unwrap_err();
        assert!(matches!(err, StorageError::ItemNotAvailable { .. }));
        assert_eq!(request.assigned_pod(), None);
        assert_eq!(randomizer.draw_count(), 0);
    }

    #[test]
    fn test_double_registration_rejected() {
        let (mut pod, _, _) = create_pod(&[100.0]);
        stock(&mut pod, 0, 1, 3);
        let mut request = ExtractRequest::new(item_x());
        pod.register_item_for_pick(item_x().id, &mut request).unwrap();
        let err = pod.register_item_for_pick(item_x().id, &mut request).unwrap_err();
        assert!(matches!(err, StorageError::RequestAlreadyAssigned { .. }));
        assert_eq!(pod.count_available(item_x().id), 2);
    }

    #[test]
    fn test_unregister_without_registration_is_mismatch() {
        let (mut pod, _, _) = create_pod(&[100.0]);
        stock(&mut pod, 0, 1, 3);
        let mut request = ExtractRequest::new(item_x());
        request.assign(PodId(0)).unwrap();
        let err = pod.unregister_item_for_pick(item_x().id, &mut request).unwrap_err();
        assert!(matches!(err, StorageError::PickReservationMismatch { .. }));
        assert_eq!(pod.count_available(item_x().id), 3);
    }

    #[test]
    fn test_out_of_order_release_hits_own_compartment() {
        let (mut pod, _, _) = create_pod(&[100.0, 100.0]);
        stock(&mut pod, 0, 1, 1);
        stock(&mut pod, 1, 2, 1);

        let mut first = ExtractRequest::new(item_x());
        let mut second = ExtractRequest::new(item_x());
        let c_first = pod.register_item_for_pick(item_x().id, &mut first).unwrap();
        let c_second = pod.register_item_for_pick(item_x().id, &mut second).unwrap();
        assert_ne!(c_first, c_second);

        // 先释放后预留的请求
        pod.unregister_item_for_pick(item_x().id, &mut second).unwrap();
        assert_eq!(pod.compartment(c_second).unwrap().count_available(item_x().id), 1);
        assert_eq!(pod.compartment(c_first).unwrap().count_available(item_x().id), 0);
        assert!(pod.pick_reservations_consistent());
    }

    // ==========================================
    // 出库
    // ==========================================

    #[test]
    fn test_remove_uses_reserved_compartment_without_draw() {
        let (mut pod, publisher, randomizer) = create_pod(&[100.0, 100.0]);
        stock(&mut pod, 0, 1, 1);
        stock(&mut pod, 1, 2, 1);

        let mut request = ExtractRequest::new(item_x());
        let reserved = pod.register_item_for_pick(item_x().id, &mut request).unwrap();
        let draws = randomizer.draw_count();

        let removed_from = pod.remove(&item_x(), &mut request).unwrap();
        assert_eq!(removed_from, reserved);
        assert_eq!(randomizer.draw_count(), draws);
        assert_eq!(request.state(), RequestState::Finished);
        assert_eq!(request.assigned_pod(), None);
        assert_eq!(pod.count_contained(item_x().id), 1);
        assert_eq!(pod.pick_reservation_count(item_x().id), 0);
        assert_eq!(pod.statistics().items_handled, 1);
        assert_eq!(publisher.count(StorageEventType::ItemRemoved), 1);
        assert!(pod.pick_reservations_consistent());
    }

    #[test]
    fn test_remove_without_reservation_keeps_other_reservations() {
        let (mut pod, _, _) = create_pod(&[100.0, 100.0]);
        stock(&mut pod, 0, 1, 1);
        stock(&mut pod, 1, 2, 1);

        let mut reserved = ExtractRequest::new(item_x());
        let reserved_in = pod.register_item_for_pick(item_x().id, &mut reserved).unwrap();

        let mut direct = ExtractRequest::new(item_x());
        let removed_from = pod.remove(&item_x(), &mut direct).unwrap();
        assert_ne!(removed_from, reserved_in);
        assert_eq!(pod.count_contained(item_x().id), 1);
        assert_eq!(pod.count_available(item_x().id), 0);
        assert!(pod.pick_reservations_consistent());

        // 没有可用库存时直接出库报错
        let mut another = ExtractRequest::new(item_x());
        assert!(matches!(
            pod.remove(&item_x(), &mut another),
            Err(StorageError::ItemNotAvailable { .. })
        ));
    }

    #[test]
    fn test_fully_reserved_compartment_not_drawn_for_pick() {
        let (mut pod, _, randomizer) = create_pod(&[100.0, 100.0]);
        stock(&mut pod, 0, 1, 1);
        stock(&mut pod, 1, 2, 1);

        let before = randomizer.draw_count();
        let mut first = ExtractRequest::new(item_x());
        let taken = pod.register_item_for_pick(item_x().id, &mut first).unwrap();
        assert_eq!(randomizer.draw_count(), before + 2);

        // 第一个格口已无可用库存,只剩一个候选
        let mut second = ExtractRequest::new(item_x());
        let other = pod.register_item_for_pick(item_x().id, &mut second).unwrap();
        assert_ne!(other, taken);
        assert_eq!(randomizer.draw_count(), before + 3);
    }

    #[test]
    fn test_remove_rejects_request_reserved_on_other_pod() {
        let (mut pod, _, randomizer) = create_pod(&[100.0]);
        stock(&mut pod, 0, 1, 2);
        let mut request = ExtractRequest::new(item_x());
        request.assign(PodId(7)).unwrap();
        let draws = randomizer.draw_count();

        let err = pod.remove(&item_x(), &mut request).unwrap_err();
        assert!(matches!(
            err,
            StorageError::RequestAlreadyAssigned {
                assigned: PodId(7),
                requested: PodId(0),
                ..
            }
        ));
        assert_eq!(request.state(), RequestState::Pending);
        assert_eq!(request.assigned_pod(), Some(PodId(7)));
        assert_eq!(pod.count_contained(item_x().id), 2);
        assert_eq!(pod.count_available(item_x().id), 2);
        assert_eq!(pod.statistics().items_handled, 0);
        assert_eq!(randomizer.draw_count(), draws);
    }

    #[test]
    fn test_remove_assigned_without_queue_entry_is_mismatch() {
        let (mut pod, _, _) = create_pod(&[100.0]);
        stock(&mut pod, 0, 1, 2);
        let mut request = ExtractRequest::new(item_x());
        request.assign(PodId(0)).unwrap();

        let err = pod.remove(&item_x(), &mut request).unwrap_err();
        assert!(matches!(err, StorageError::PickReservationMismatch { .. }));
        assert_eq!(request.state(), RequestState::Pending);
        assert_eq!(pod.count_contained(item_x().id), 2);
    }

    #[test]
    fn test_release_after_terminal_state_is_rejected() {
        let (mut pod, _, _) = create_pod(&[100.0]);
        stock(&mut pod, 0, 1, 3);

        let mut finished = ExtractRequest::new(item_x());
        pod.register_item_for_pick(item_x().id, &mut finished).unwrap();
        finished.finish().unwrap();
        let err = pod.unregister_item_for_pick(item_x().id, &mut finished).unwrap_err();
        assert!(matches!(err, StorageError::InvalidStateTransition { .. }));
        assert_eq!(finished.assigned_pod(), Some(PodId(0)));
        assert_eq!(pod.count_available(item_x().id), 2);
        assert_eq!(pod.pick_reservation_count(item_x().id), 1);

        let mut aborted = ExtractRequest::new(item_x());
        pod.register_item_for_pick(item_x().id, &mut aborted).unwrap();
        aborted.abort().unwrap();
        assert!(pod.unregister_item_for_pick(item_x().id, &mut aborted).is_err());
        assert_eq!(pod.count_available(item_x().id), 1);
        assert!(pod.pick_reservations_consistent());
    }

    // ==========================================
    // 聚合与展示
    // ==========================================

    #[test]
    fn test_aggregates_and_display() {
        let (mut pod, _, _) = create_pod(&[10.0, 20.0]);
        stock(&mut pod, 0, 1, 2); // 4.0
        let bundle = ItemBundle::new(2, item_x(), 5); // 10.0
        pod.register_bundle(&bundle, CompartmentId(1)).unwrap();

        assert_eq!(pod.capacity(), 30.0);
        assert_eq!(pod.capacity_in_use(), 4.0);
        assert_eq!(pod.capacity_reserved(), 10.0);
        assert!(pod.is_contained(item_x().id));
        assert!(pod.fits(&ItemBundle::new(3, item_x(), 10)));
        assert!(!pod.fits(&ItemBundle::new(4, item_x(), 11)));
        assert_eq!(pod.compartments_capacity_used(), vec![4.0, 0.0]);
        assert_eq!(pod.to_string(), "Pod0[(40%/40%)(0%/50%)]");
    }

    #[test]
    fn test_from_layout() {
        let layout = PodLayout::uniform(7, 3, 12.0);
        let pod = Pod::from_layout(
            &layout,
            SharedRandomizer::seeded(1),
            Arc::new(crate::env::events::NoOpEventPublisher),
        );
        assert_eq!(pod.id(), PodId(7));
        assert_eq!(pod.compartment_capacities(), vec![12.0, 12.0, 12.0]);
    }
}
