// ==========================================
// 货架存储分配核心 - 核心库
// ==========================================
// 系统定位: 仓储机器人系统中货架格口的容量账本与入库分配决策
// 边界: 不含机器人运动、站台排序、全局时钟与界面
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 账本与请求
pub mod domain;

// 环境接口 - 随机源与事件
pub mod env;

// 引擎层 - 分配决策
pub mod engine;

// 配置层 - 分配配置
pub mod config;

// 数据库基础设施（配置存储连接/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{AllocationConfig, BufferPolicy, ConfigError, ConfigManager, ConfigScope};
pub use domain::{
    BundleId, Compartment, CompartmentId, ExtractRequest, InsertRequest, ItemBundle, ItemDescription,
    ItemDescriptionId, Placement, Pod, PodId, PodLayout, RequestState, StorageError, StorageResult,
};
pub use engine::{
    DecisionOutcome, PodFleet, PodHandledEvent, RandomStoragePolicy, SharedRandomizer, StorageEvent,
    StorageEventPublisher, StorageManager, StoragePolicy,
};

// ==========================================
// 常量定义
// ==========================================

// 版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 名称
pub const APP_NAME: &str = "货架存储分配核心";
