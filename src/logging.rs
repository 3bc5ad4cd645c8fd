// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别
// ==========================================

use tracing::Subscriber;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=pod_storage_alloc=trace,perf=info
///
/// # 示例
/// ```no_run
/// use pod_storage_alloc::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// 以 JSON 行格式初始化日志（便于外部仿真环境采集）
///
/// 由 `POD_STORAGE_LOG_FORMAT=json` 启用
pub fn init_json() {
    json_subscriber().init();
}

fn json_subscriber() -> impl Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .finish()
}

/// 初始化测试环境的日志系统
///
/// 使用 debug 级别，重复调用安全
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_subscriber_accepts_spans_and_events() {
        tracing::subscriber::with_default(json_subscriber(), || {
            let span = tracing::info_span!("decide", pending = 3u64);
            let _entered = span.enter();
            tracing::info!(pod = 1u32, "缓冲批次已提交");
        });
    }
}
