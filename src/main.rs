// ==========================================
// 货架存储分配核心 - 演示入口
// ==========================================
// 用法: pod-storage-alloc [config.db]
// - 提供配置库时从 config_kv 加载分配配置,否则使用默认配置
// - 以固定种子运行一段入库/出库流程并输出汇总
// 环境变量: POD_STORAGE_LOG_FORMAT=json 切换为 JSON 日志
// ==========================================

use anyhow::{Context, Result};
use pod_storage_alloc::engine::ChannelEventPublisher;
use pod_storage_alloc::{
    logging, AllocationConfig, ConfigManager, ExtractRequest, ItemBundle, ItemDescription, PodHandledEvent, PodLayout,
    StorageManager,
};
use std::sync::Arc;

const POD_COUNT: u32 = 4;
const COMPARTMENTS_PER_POD: usize = 4;
const COMPARTMENT_CAPACITY: f64 = 50.0;
const TICKS: u32 = 30;
const TICK_SECONDS: f64 = 60.0;

fn load_config() -> Result<AllocationConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let manager = ConfigManager::new(&path).with_context(|| format!("无法打开配置库: {}", path))?;
            Ok(manager.load_allocation_config()?)
        }
        None => Ok(AllocationConfig {
            buffer_threshold: 0.2,
            buffer_timeout: 600.0,
            stick_to_pod_until_full: true,
            random_seed: 42,
            ..AllocationConfig::default()
        }),
    }
}

fn main() -> Result<()> {
    // POD_STORAGE_LOG_FORMAT=json 时输出 JSON 行日志
    match std::env::var("POD_STORAGE_LOG_FORMAT").as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{} v{}", pod_storage_alloc::APP_NAME, pod_storage_alloc::VERSION);
    tracing::info!("==================================================");

    let config = load_config()?;
    let layouts: Vec<PodLayout> = (0..POD_COUNT)
        .map(|id| PodLayout::uniform(id, COMPARTMENTS_PER_POD, COMPARTMENT_CAPACITY))
        .collect();
    let (publisher, mut events) = ChannelEventPublisher::channel();
    let mut manager = StorageManager::with_random_policy(&layouts, config, Arc::new(publisher))?;
    let pod_events = manager.pod_event_sender();

    let items: Vec<ItemDescription> = (1..=3).map(|id| ItemDescription::new(id, 1.5 * id as f64)).collect();

    // 初始库存
    let mut next_bundle_id = 1u64;
    for item in &items {
        let bundle = ItemBundle::new(next_bundle_id, *item, 4);
        next_bundle_id += 1;
        if manager.place_initial_inventory(&bundle)?.is_none() {
            tracing::warn!(bundle = %bundle.id(), "初始库存未能放置");
        }
    }

    let mut inserted = 0usize;
    let mut aborted = 0usize;
    let mut picked = 0usize;

    for tick in 0..TICKS {
        let now = tick as f64 * TICK_SECONDS;

        // 每个周期到达一个新批次
        let item = items[tick as usize % items.len()];
        manager.enqueue_bundle(ItemBundle::new(next_bundle_id, item, 2 + tick % 3))?;
        next_bundle_id += 1;

        // 提交的入库请求立即物理完成
        for mut request in manager.update(now)? {
            let pod_id = request.placement().pod_id;
            if manager.complete_insertion(&mut request)? {
                inserted += 1;
            } else {
                aborted += 1;
            }
            pod_events.send(PodHandledEvent::inbound(pod_id, 0))?;
        }

        // 每隔几个周期拣出一件货
        if tick % 4 == 3 {
            let wanted = items[(tick as usize / 4) % items.len()];
            for pod_id in manager.fleet().pod_ids() {
                if manager.fleet().lock(pod_id)?.is_available(wanted.id) {
                    let mut request = ExtractRequest::new(wanted);
                    manager.reserve_pick(pod_id, &mut request)?;
                    manager.complete_extraction(pod_id, &mut request)?;
                    pod_events.send(PodHandledEvent::outbound(pod_id, 0))?;
                    picked += 1;
                    break;
                }
            }
        }
    }

    let mut event_count = 0usize;
    while events.try_recv().is_ok() {
        event_count += 1;
    }

    let totals = manager.capacity_totals()?;
    tracing::info!(
        inserted,
        aborted,
        picked,
        pending = manager.pending_count(),
        buffered = manager.buffered_count(),
        events = event_count,
        random_draws = manager.randomizer().draw_count(),
        "运行结束"
    );
    tracing::info!(
        capacity = totals.capacity,
        in_use = totals.capacity_in_use,
        reserved = totals.capacity_reserved,
        "容量汇总"
    );
    for shared in manager.fleet().list_storage_units() {
        let pod = shared
            .lock()
            .map_err(|e| anyhow::anyhow!("货架锁获取失败: {}", e))?;
        tracing::info!("{}", pod);
    }
    Ok(())
}
