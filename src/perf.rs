use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Once;
use std::time::Instant;

static PERF_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_CYCLE_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);
static INIT: Once = Once::new();

thread_local! {
    static PERF_DEPTH: Cell<u32> = Cell::new(0);
    static DRAW_COUNT: Cell<u64> = Cell::new(0);
    static RESERVATION_COUNT: Cell<u64> = Cell::new(0);
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// 读取性能统计开关（进程内只读取一次）
///
/// 开关：
/// - Debug 默认开启；Release 默认关闭（可通过环境变量开启）
/// - `POD_STORAGE_PERF=1` 强制开启
/// - `POD_STORAGE_SLOW_CYCLE_MS=20` 配置慢周期阈值（毫秒）
fn ensure_initialized() {
    INIT.call_once(|| {
        let enabled = match std::env::var("POD_STORAGE_PERF") {
            Ok(v) => is_true(&v),
            Err(_) => cfg!(debug_assertions),
        };
        PERF_ENABLED.store(enabled, Ordering::Relaxed);

        let slow_ms = std::env::var("POD_STORAGE_SLOW_CYCLE_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 20 } else { 100 });
        SLOW_CYCLE_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);
    });
}

fn active() -> bool {
    PERF_ENABLED.load(Ordering::Relaxed) && PERF_DEPTH.with(|d| d.get() > 0)
}

/// 记录一次随机抽样（仅在 PerfGuard 活跃时计数）
pub fn record_random_draw() {
    if active() {
        DRAW_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 记录一次批次预留（仅在 PerfGuard 活跃时计数）
pub fn record_reservation() {
    if active() {
        RESERVATION_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 性能统计 Guard：记录 elapsed_ms + 随机抽样数 + 预留数
///
/// 使用方式：
/// ```ignore
/// let _perf = pod_storage_alloc::perf::PerfGuard::new("decide_about_pending_bundles");
/// // do work...
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    draw_start: u64,
    reservation_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        ensure_initialized();
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            draw_start: DRAW_COUNT.with(|c| c.get()),
            reservation_start: RESERVATION_COUNT.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        if PERF_ENABLED.load(Ordering::Relaxed) {
            let elapsed_ms = self.start.elapsed().as_millis() as u64;
            let draw_count = DRAW_COUNT.with(|c| c.get()).saturating_sub(self.draw_start);
            let reservation_count = RESERVATION_COUNT
                .with(|c| c.get())
                .saturating_sub(self.reservation_start);

            tracing::info!(
                target: "perf",
                op = self.op,
                elapsed_ms,
                draw_count,
                reservation_count,
                "done"
            );

            let threshold = SLOW_CYCLE_THRESHOLD_MS.load(Ordering::Relaxed);
            if threshold > 0 && elapsed_ms >= threshold {
                tracing::warn!(
                    target: "slow_cycle",
                    op = self.op,
                    elapsed_ms,
                    threshold_ms = threshold,
                    "slow cycle"
                );
            }
        }

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_true() {
        assert!(is_true(" ON "));
        assert!(is_true("1"));
        assert!(!is_true("off"));
    }

    #[test]
    fn test_counters_only_inside_guard() {
        ensure_initialized();
        PERF_ENABLED.store(true, Ordering::Relaxed);

        let before = DRAW_COUNT.with(|c| c.get());
        record_random_draw();
        assert_eq!(DRAW_COUNT.with(|c| c.get()), before);

        {
            let _perf = PerfGuard::new("test");
            record_random_draw();
            record_reservation();
        }
        assert_eq!(DRAW_COUNT.with(|c| c.get()), before + 1);
        assert_eq!(PERF_DEPTH.with(|d| d.get()), 0);
    }
}
