// ==========================================
// 货架存储分配核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 作用域: global / pod/{id} (货架级缓冲覆写)
// ==========================================

use crate::config::allocation_config::{AllocationConfig, BufferPolicy};
use crate::db::{configure_sqlite_connection, ensure_config_table, open_sqlite_connection};
use crate::domain::types::PodId;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置快照序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("配置值无效 (scope={scope}, key={key}, value={value}): {reason}")]
    InvalidValue {
        scope: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,               // 全局
    Pod { pod_id: PodId }, // 单个货架
}

impl ConfigScope {
    pub fn scope_id(&self) -> String {
        self.to_string()
    }

    /// 解析 scope_id;无法识别时返回 None
    pub fn parse(scope_id: &str) -> Option<Self> {
        if scope_id == "global" {
            return Some(ConfigScope::Global);
        }
        let raw = scope_id.strip_prefix("pod/")?;
        raw.trim()
            .parse::<u32>()
            .ok()
            .map(|id| ConfigScope::Pod { pod_id: PodId(id) })
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::Global => write!(f, "global"),
            ConfigScope::Pod { pod_id } => write!(f, "pod/{}", pod_id.0),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 打开数据库文件并确保 config_kv 表存在
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_config_table(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            ensure_config_table(&guard)?;
        }
        Ok(Self { conn })
    }

    fn lock(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))
    }

    /// 读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, scope: ConfigScope, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope.scope_id(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取配置值，带默认值
    pub fn get_config_or_default(&self, scope: ConfigScope, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(scope, key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, scope: ConfigScope, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![scope.scope_id(), key, value],
        )?;
        tracing::debug!(scope = %scope, key, value, "配置已写入");
        Ok(())
    }

    /// 获取所有配置的快照（JSON: scope_id -> key -> value）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT scope_id, key, value FROM config_kv ORDER BY scope_id, key")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut snapshot: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for row in rows {
            let (scope_id, key, value) = row?;
            snapshot.entry(scope_id).or_default().insert(key, value);
        }
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// 从配置快照恢复配置
    ///
    /// 覆盖快照中出现的键,不删除快照外的键
    ///
    /// # 返回
    /// - 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let snapshot: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (scope_id, entries) in &snapshot {
            if ConfigScope::parse(scope_id).is_none() {
                tracing::warn!(scope_id = %scope_id, "快照中存在无法识别的作用域，已跳过");
                continue;
            }
            for (key, value) in entries {
                count += tx.execute(
                    "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
                    params![scope_id, key, value],
                )?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// 列出存在覆写配置的货架
    pub fn list_pod_scopes(&self) -> ConfigResult<Vec<PodId>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT scope_id FROM config_kv WHERE scope_id LIKE 'pod/%' ORDER BY scope_id")?;
        let scope_ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(scope_ids
            .iter()
            .filter_map(|s| match ConfigScope::parse(s) {
                Some(ConfigScope::Pod { pod_id }) => Some(pod_id),
                _ => {
                    tracing::warn!(scope_id = %s, "无法解析的货架作用域，已忽略");
                    None
                }
            })
            .collect())
    }

    // ===== 分配配置 =====

    /// 加载分配配置（global + 各货架覆写）
    ///
    /// 无法解析的值回退为默认值并告警;解析成功但越界的值返回错误
    pub fn load_allocation_config(&self) -> ConfigResult<AllocationConfig> {
        let defaults = AllocationConfig::default();
        let global = ConfigScope::Global;

        let mut config = AllocationConfig {
            buffer_threshold: self.parsed_or(global, config_keys::BUFFER_THRESHOLD, defaults.buffer_threshold)?,
            buffer_timeout: self.parsed_or(global, config_keys::BUFFER_TIMEOUT, defaults.buffer_timeout)?,
            stick_to_pod_until_full: self.bool_or(
                global,
                config_keys::STICK_TO_POD_UNTIL_FULL,
                defaults.stick_to_pod_until_full,
            )?,
            random_seed: self.parsed_or(global, config_keys::RANDOM_SEED, defaults.random_seed)?,
            pod_overrides: Default::default(),
        };

        for pod_id in self.list_pod_scopes()? {
            let scope = ConfigScope::Pod { pod_id };
            let policy = BufferPolicy {
                threshold: self.parsed_or(scope, config_keys::BUFFER_THRESHOLD, config.buffer_threshold)?,
                timeout: self.parsed_or(scope, config_keys::BUFFER_TIMEOUT, config.buffer_timeout)?,
            };
            config.pod_overrides.insert(pod_id, policy);
        }

        config.validate()?;
        tracing::info!(
            buffer_threshold = config.buffer_threshold,
            buffer_timeout = config.buffer_timeout,
            stick_to_pod_until_full = config.stick_to_pod_until_full,
            random_seed = config.random_seed,
            pod_overrides = config.pod_overrides.len(),
            "分配配置已加载"
        );
        Ok(config)
    }

    /// 保存分配配置到 global 作用域（覆写写入各自的 pod 作用域）
    pub fn save_allocation_config(&self, config: &AllocationConfig) -> ConfigResult<()> {
        config.validate()?;
        let global = ConfigScope::Global;
        self.set_config_value(global, config_keys::BUFFER_THRESHOLD, &config.buffer_threshold.to_string())?;
        self.set_config_value(global, config_keys::BUFFER_TIMEOUT, &config.buffer_timeout.to_string())?;
        self.set_config_value(
            global,
            config_keys::STICK_TO_POD_UNTIL_FULL,
            &config.stick_to_pod_until_full.to_string(),
        )?;
        self.set_config_value(global, config_keys::RANDOM_SEED, &config.random_seed.to_string())?;
        for (pod_id, policy) in &config.pod_overrides {
            let scope = ConfigScope::Pod { pod_id: *pod_id };
            self.set_config_value(scope, config_keys::BUFFER_THRESHOLD, &policy.threshold.to_string())?;
            self.set_config_value(scope, config_keys::BUFFER_TIMEOUT, &policy.timeout.to_string())?;
        }
        Ok(())
    }

    fn parsed_or<T>(&self, scope: ConfigScope, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy,
    {
        let Some(raw) = self.get_config_value(scope, key)? else {
            return Ok(default);
        };
        Ok(raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(
                scope = %scope,
                config_key = key,
                raw_value = %raw,
                "配置格式错误，使用默认值"
            );
            default
        }))
    }

    fn bool_or(&self, scope: ConfigScope, key: &str, default: bool) -> ConfigResult<bool> {
        let Some(raw) = self.get_config_value(scope, key)? else {
            return Ok(default);
        };
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => {
                tracing::warn!(
                    scope = %scope,
                    config_key = key,
                    raw_value = %raw,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 缓冲
    pub const BUFFER_THRESHOLD: &str = "buffer_threshold";
    pub const BUFFER_TIMEOUT: &str = "buffer_timeout";

    // 亲和
    pub const STICK_TO_POD_UNTIL_FULL: &str = "stick_to_pod_until_full";

    // 随机源
    pub const RANDOM_SEED: &str = "random_seed";
}
