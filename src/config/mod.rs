// ==========================================
// 货架存储分配核心 - 配置层
// ==========================================
// 职责: 分配配置定义与持久化,支持货架级覆写
// 存储: config_kv 表
// ==========================================

pub mod allocation_config;
pub mod config_manager;

pub use allocation_config::{AllocationConfig, BufferPolicy, DEFAULT_BUFFER_TIMEOUT};
pub use config_manager::{config_keys, ConfigError, ConfigManager, ConfigResult, ConfigScope};
