// ==========================================
// 货架存储分配核心 - 存储决策引擎
// ==========================================
// 职责:
// - 维护待处理批次队列
// - 每个决策周期为待处理批次选择格口并立即预留
// - 已预留批次按货架缓冲,满足阈值或超时后作为入库请求提交
// - 物理处理层回报入库/出库结果时更新账本
// 并发: 同一时刻只运行一个决策周期 (&mut self);
//       只对单个货架加锁,不持有全局锁
// 红线: 批次永不丢弃,要么被预留,要么留在队列等待下一周期
// 红线: 中止的请求不自动重排队
// ==========================================

use crate::config::AllocationConfig;
use crate::domain::error::{StorageError, StorageResult};
use crate::domain::item::ItemBundle;
use crate::domain::layout::PodLayout;
use crate::domain::request::{ExtractRequest, InsertRequest};
use crate::domain::types::{BundleId, CompartmentId, ItemDescriptionId, Placement, PodId};
use crate::env::events::{PodHandledEvent, StorageEventPublisher};
use crate::engine::fleet::{CapacityTotals, PodFleet};
use crate::engine::policy::StoragePolicy;
use crate::engine::random_policy::RandomStoragePolicy;
use crate::env::randomizer::SharedRandomizer;
use crate::perf::{record_reservation, PerfGuard};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{field, instrument, Span};

/// 已预留、等待提交的批次
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedBundle {
    pub bundle: ItemBundle,
    pub placement: Placement,
    pub buffered_at: f64,
}

/// 一次决策周期的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionOutcome {
    /// 本周期完成预留的批次
    pub reserved: Vec<(BundleId, Placement)>,
    /// 仍在等待的批次数
    pub left_pending: usize,
}

// ==========================================
// StorageManager - 存储决策引擎
// ==========================================
pub struct StorageManager<P: StoragePolicy> {
    fleet: Arc<PodFleet>,
    policy: P,
    randomizer: SharedRandomizer,

    // ===== 决策状态 =====
    pending: VecDeque<ItemBundle>,
    ready: HashMap<PodId, Vec<BufferedBundle>>,
    reservations: HashMap<BundleId, Placement>,
    current_time: f64,
    situation_investigated: bool,

    // ===== 入站事件通道 =====
    pod_events_tx: mpsc::UnboundedSender<PodHandledEvent>,
    pod_events_rx: mpsc::UnboundedReceiver<PodHandledEvent>,
}

impl StorageManager<RandomStoragePolicy> {
    /// 按布局与配置创建随机策略引擎
    ///
    /// 随机源以 `config.random_seed` 播种,并由所有货架共享
    pub fn with_random_policy(
        layouts: &[PodLayout],
        config: AllocationConfig,
        publisher: Arc<dyn StorageEventPublisher>,
    ) -> StorageResult<Self> {
        config.validate().map_err(|e| StorageError::Other(e.into()))?;
        let randomizer = SharedRandomizer::seeded(config.random_seed);
        let fleet = PodFleet::from_layouts(layouts, &randomizer, publisher)?;
        Ok(Self::new(Arc::new(fleet), RandomStoragePolicy::new(config), randomizer))
    }
}

impl<P: StoragePolicy> StorageManager<P> {
    /// 创建决策引擎
    ///
    /// # 参数
    /// - `fleet`: 货架集合
    /// - `policy`: 格口选择策略
    /// - `randomizer`: 与货架共享的随机源
    pub fn new(fleet: Arc<PodFleet>, policy: P, randomizer: SharedRandomizer) -> Self {
        let (pod_events_tx, pod_events_rx) = mpsc::unbounded_channel();
        Self {
            fleet,
            policy,
            randomizer,
            pending: VecDeque::new(),
            ready: HashMap::new(),
            reservations: HashMap::new(),
            current_time: 0.0,
            situation_investigated: false,
            pod_events_tx,
            pod_events_rx,
        }
    }

    // ==========================================
    // 需求入口
    // ==========================================

    /// 新增入库需求
    pub fn enqueue_bundle(&mut self, bundle: ItemBundle) -> StorageResult<()> {
        let bundle_id = bundle.id();
        if self.is_known_bundle(bundle_id) {
            return Err(StorageError::DuplicateBundle(bundle_id));
        }
        tracing::debug!(bundle = %bundle_id, weight = bundle.bundle_weight(), "批次入队");
        self.pending.push_back(bundle);
        self.situation_investigated = false;
        Ok(())
    }

    fn is_known_bundle(&self, bundle_id: BundleId) -> bool {
        self.reservations.contains_key(&bundle_id) || self.pending.iter().any(|b| b.id() == bundle_id)
    }

    // ==========================================
    // 决策周期
    // ==========================================

    /// 为所有待处理批次做一次决策
    ///
    /// 选中的格口在货架锁内再次校验可预留性 (扫描只是快照);
    /// 校验失败或无可用格口的批次留在队列中。
    #[instrument(skip(self), fields(policy = field::Empty, pending = field::Empty))]
    pub fn decide_about_pending_bundles(&mut self) -> StorageResult<DecisionOutcome> {
        let _perf = PerfGuard::new("decide_about_pending_bundles");
        let span = Span::current();
        span.record("policy", self.policy.name());
        span.record("pending", self.pending.len());

        let mut outcome = DecisionOutcome::default();
        let mut remaining = VecDeque::new();
        let mut queue = std::mem::take(&mut self.pending).into_iter();

        while let Some(bundle) = queue.next() {
            match self.try_reserve(&bundle) {
                Ok(Some(placement)) => {
                    outcome.reserved.push((bundle.id(), placement));
                    self.reservations.insert(bundle.id(), placement);
                    self.ready.entry(placement.pod_id).or_default().push(BufferedBundle {
                        bundle,
                        placement,
                        buffered_at: self.current_time,
                    });
                }
                Ok(None) => remaining.push_back(bundle),
                Err(e) => {
                    // 出错时保留全部未处理批次
                    remaining.push_back(bundle);
                    remaining.extend(queue);
                    self.pending = remaining;
                    tracing::error!(error = %e, "决策周期中断");
                    return Err(e);
                }
            }
        }

        self.pending = remaining;
        self.situation_investigated = true;
        outcome.left_pending = self.pending.len();
        tracing::info!(
            reserved = outcome.reserved.len(),
            left_pending = outcome.left_pending,
            "决策周期完成"
        );
        Ok(outcome)
    }

    fn try_reserve(&mut self, bundle: &ItemBundle) -> StorageResult<Option<Placement>> {
        let Some(placement) = self
            .policy
            .select_compartment(&self.fleet, &self.randomizer, bundle)?
        else {
            tracing::debug!(bundle = %bundle.id(), "无可预留格口，批次继续等待");
            return Ok(None);
        };

        let mut pod = self.fleet.lock(placement.pod_id)?;
        if !pod.compartment(placement.compartment_id)?.fits_for_reservation(bundle) {
            tracing::warn!(
                bundle = %bundle.id(),
                placement = %placement,
                "选中格口已不可预留，批次继续等待"
            );
            return Ok(None);
        }
        pod.register_bundle(bundle, placement.compartment_id)?;
        record_reservation();
        Ok(Some(placement))
    }

    /// 设置当前仿真时间并转发给策略
    pub fn signal_current_time(&mut self, current_time: f64) {
        if current_time < self.current_time {
            tracing::warn!(
                previous = self.current_time,
                current = current_time,
                "仿真时间回退"
            );
        }
        self.current_time = current_time;
        self.policy.signal_current_time(current_time);
    }

    /// 货架被物理处理
    pub fn on_pod_handled(&mut self, event: PodHandledEvent) {
        tracing::debug!(pod = %event.pod_id, station = %event.handling_point, "货架已处理");
        self.policy.on_pod_handled(&event);
        self.situation_investigated = false;
    }

    /// 供物理处理层使用的事件发送端
    ///
    /// 事件在下一次 `update` 开始时统一消费
    pub fn pod_event_sender(&self) -> mpsc::UnboundedSender<PodHandledEvent> {
        self.pod_events_tx.clone()
    }

    fn drain_pod_events(&mut self) {
        while let Ok(event) = self.pod_events_rx.try_recv() {
            self.on_pod_handled(event);
        }
    }

    /// 仿真时钟推进
    ///
    /// 1. 消费货架处理事件
    /// 2. 同步时间
    /// 3. 局面有变化且策略就绪时执行决策周期
    /// 4. 提交满足阈值或超时的缓冲批次
    #[instrument(skip(self))]
    pub fn update(&mut self, current_time: f64) -> StorageResult<Vec<InsertRequest>> {
        self.drain_pod_events();
        self.signal_current_time(current_time);

        if !self.situation_investigated && self.policy.is_ready() {
            if self.pending.is_empty() {
                self.situation_investigated = true;
            } else {
                self.decide_about_pending_bundles()?;
            }
        }

        self.flush_ready_buffers()
    }

    /// 提交满足条件的缓冲批次
    ///
    /// 条件 (任一满足):
    /// - 阈值为 0
    /// - 缓冲重量 / 货架总容量 >= 阈值
    /// - 最早缓冲的批次已等待 >= 超时
    #[instrument(skip(self))]
    pub fn flush_ready_buffers(&mut self) -> StorageResult<Vec<InsertRequest>> {
        let _perf = PerfGuard::new("flush_ready_buffers");
        let mut requests = Vec::new();

        for pod_id in self.fleet.pod_ids() {
            let Some(buffer) = self.ready.get(&pod_id) else {
                continue;
            };
            let Some(oldest) = buffer.first() else {
                continue;
            };

            let threshold = self.policy.buffer_threshold(pod_id);
            let timeout = self.policy.buffer_timeout(pod_id);
            let capacity = self.fleet.lock(pod_id)?.capacity();
            let buffered_weight: f64 = buffer.iter().map(|b| b.bundle.bundle_weight()).sum();
            let fill = if capacity > 0.0 {
                buffered_weight / capacity
            } else {
                f64::INFINITY
            };
            let waited = self.current_time - oldest.buffered_at;

            if threshold <= 0.0 || fill >= threshold || waited >= timeout {
                let flushed = self.ready.remove(&pod_id).unwrap_or_default();
                tracing::info!(
                    pod = %pod_id,
                    bundles = flushed.len(),
                    fill,
                    waited,
                    "缓冲批次已提交"
                );
                requests.extend(
                    flushed
                        .into_iter()
                        .map(|b| InsertRequest::new(b.bundle, b.placement)),
                );
            }
        }
        Ok(requests)
    }

    // ==========================================
    // 物理处理回报
    // ==========================================

    /// 入库请求物理提交
    ///
    /// # 返回
    /// - `Ok(true)`: 入库成功
    /// - `Ok(false)`: 提交时容量不足,请求已中止,由调用方决定是否重新入队
    pub fn complete_insertion(&mut self, request: &mut InsertRequest) -> StorageResult<bool> {
        let bundle = request.bundle().clone();
        let placement = request.placement();
        match self.reservations.get(&bundle.id()) {
            Some(reserved) if *reserved == placement => {}
            _ => return Err(StorageError::BundleNotReserved(bundle.id())),
        }

        let committed = self
            .fleet
            .lock(placement.pod_id)?
            .add(placement.compartment_id, &bundle, request)?;
        self.reservations.remove(&bundle.id());
        self.situation_investigated = false;

        if committed {
            tracing::debug!(bundle = %bundle.id(), placement = %placement, "批次已入库");
        } else {
            tracing::warn!(bundle = %bundle.id(), placement = %placement, "批次入库中止");
        }
        Ok(committed)
    }

    /// 为出库请求在指定货架预留一件货品
    pub fn reserve_pick(&mut self, pod_id: PodId, request: &mut ExtractRequest) -> StorageResult<CompartmentId> {
        let item = request.item().id;
        self.fleet.lock(pod_id)?.register_item_for_pick(item, request)
    }

    /// 撤销出库请求在指定货架上的拣选预留
    pub fn release_pick(&mut self, pod_id: PodId, request: &mut ExtractRequest) -> StorageResult<()> {
        let item = request.item().id;
        self.fleet.lock(pod_id)?.unregister_item_for_pick(item, request)
    }

    /// 出库请求在指定货架物理取货
    pub fn complete_extraction(&mut self, pod_id: PodId, request: &mut ExtractRequest) -> StorageResult<CompartmentId> {
        let item = *request.item();
        let compartment_id = self.fleet.lock(pod_id)?.remove(&item, request)?;
        self.situation_investigated = false;
        Ok(compartment_id)
    }

    /// 初始库存: 同步完成预留与入库
    ///
    /// 不经过待处理队列与缓冲,也不影响亲和状态
    pub fn place_initial_inventory(&mut self, bundle: &ItemBundle) -> StorageResult<Option<Placement>> {
        if self.is_known_bundle(bundle.id()) {
            return Err(StorageError::DuplicateBundle(bundle.id()));
        }
        let Some(placement) = self
            .policy
            .select_for_initial_inventory(&self.fleet, &self.randomizer, bundle)?
        else {
            tracing::warn!(bundle = %bundle.id(), "初始库存无可用格口");
            return Ok(None);
        };

        let mut pod = self.fleet.lock(placement.pod_id)?;
        pod.register_bundle(bundle, placement.compartment_id)?;
        let mut request = InsertRequest::new(bundle.clone(), placement);
        if pod.add(placement.compartment_id, bundle, &mut request)? {
            Ok(Some(placement))
        } else {
            Ok(None)
        }
    }

    // ==========================================
    // 只读查询
    // ==========================================

    pub fn pending_bundles(&self) -> impl Iterator<Item = &ItemBundle> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn buffered_bundles(&self, pod_id: PodId) -> &[BufferedBundle] {
        self.ready.get(&pod_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn buffered_count(&self) -> usize {
        self.ready.values().map(Vec::len).sum()
    }

    /// 批次的预留位置 (已预留、未入库)
    pub fn reservation_of(&self, bundle_id: BundleId) -> Option<Placement> {
        self.reservations.get(&bundle_id).copied()
    }

    pub fn is_contained(&self, item: ItemDescriptionId) -> StorageResult<bool> {
        self.fleet.is_contained(item)
    }

    pub fn count_contained(&self, item: ItemDescriptionId) -> StorageResult<u32> {
        self.fleet.count_contained(item)
    }

    pub fn count_available(&self, item: ItemDescriptionId) -> StorageResult<u32> {
        self.fleet.count_available(item)
    }

    pub fn capacity_totals(&self) -> StorageResult<CapacityTotals> {
        self.fleet.capacity_totals()
    }

    pub fn fleet(&self) -> &Arc<PodFleet> {
        &self.fleet
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn randomizer(&self) -> &SharedRandomizer {
        &self.randomizer
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// 上次决策后局面是否未变化
    pub fn situation_investigated(&self) -> bool {
        self.situation_investigated
    }
}
