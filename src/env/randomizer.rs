// ==========================================
// 货架存储分配核心 - 随机源
// ==========================================
// 职责: 可注入、可设种子的共享随机源
// 红线: 抽样顺序属于可观察行为,同一种子 + 同一调用顺序 => 同一结果
// 红线: 不使用全局随机源
// ==========================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// 随机源接口: 返回 [0, 1) 区间的浮点数
pub trait Randomizer: Send {
    fn next_double(&mut self) -> f64;
}

/// 基于 StdRng 的可设种子随机源
pub struct SeededRandomizer {
    rng: StdRng,
}

impl SeededRandomizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Randomizer for SeededRandomizer {
    fn next_double(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

// ==========================================
// SharedRandomizer - 共享随机源句柄
// ==========================================
// 决策引擎与所有货架共用同一个实例,克隆只复制句柄
#[derive(Clone)]
pub struct SharedRandomizer {
    inner: Arc<Mutex<Box<dyn Randomizer>>>,
    draws: Arc<AtomicU64>,
}

impl SharedRandomizer {
    /// 以种子创建
    pub fn seeded(seed: u64) -> Self {
        Self::from_source(SeededRandomizer::new(seed))
    }

    /// 包装任意随机源 (测试中可注入固定序列)
    pub fn from_source<R: Randomizer + 'static>(source: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(source))),
            draws: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 抽取一个 [0, 1) 浮点数
    pub fn next_double(&self) -> f64 {
        // 随机源内部不会 panic,中毒时继续使用其状态即可
        let mut source = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.draws.fetch_add(1, Ordering::Relaxed);
        crate::perf::record_random_draw();
        source.next_double()
    }

    /// 累计抽样次数
    pub fn draw_count(&self) -> u64 {
        self.draws.load(Ordering::Relaxed)
    }

    /// 从候选中均匀随机取一个
    ///
    /// 等价于"按随机键排序后取第一个":每个候选按顺序各抽一次键,
    /// 取键最小者,相同键取靠前者。抽样次数恒等于候选数。
    pub fn pick_uniform<T>(&self, candidates: Vec<T>) -> Option<T> {
        let mut best: Option<(f64, T)> = None;
        for candidate in candidates {
            let key = self.next_double();
            match &best {
                Some((best_key, _)) if *best_key <= key => {}
                _ => best = Some((key, candidate)),
            }
        }
        best.map(|(_, candidate)| candidate)
    }
}

impl std::fmt::Debug for SharedRandomizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRandomizer")
            .field("draws", &self.draw_count())
            .finish()
    }
}
