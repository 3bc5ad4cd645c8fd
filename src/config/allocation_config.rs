// ==========================================
// 货架存储分配核心 - 分配配置
// ==========================================
// 职责: 决策引擎可识别的配置项
// - buffer_threshold: 触发提交的需求水位 (占货架总容量的比例)
// - buffer_timeout: 最长缓冲时长 (仿真秒)
// - stick_to_pod_until_full: 是否启用格口亲和
// 红线: 阈值 0 表示每个周期立即提交
// ==========================================

use crate::config::ConfigError;
use crate::domain::types::PodId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 默认缓冲超时 (仿真秒)
pub const DEFAULT_BUFFER_TIMEOUT: f64 = 1200.0;

/// 单个货架的缓冲策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferPolicy {
    pub threshold: f64,
    pub timeout: f64,
}

impl BufferPolicy {
    fn validate(&self, scope: &str) -> Result<(), ConfigError> {
        check_non_negative(scope, "buffer_threshold", self.threshold)?;
        check_non_negative(scope, "buffer_timeout", self.timeout)
    }
}

/// 分配配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub buffer_threshold: f64,
    pub buffer_timeout: f64,
    pub stick_to_pod_until_full: bool,
    pub random_seed: u64,
    /// 货架级覆写,来自 `pod/{id}` 作用域
    #[serde(skip)]
    pub pod_overrides: HashMap<PodId, BufferPolicy>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            buffer_threshold: 0.0,
            buffer_timeout: DEFAULT_BUFFER_TIMEOUT,
            stick_to_pod_until_full: false,
            random_seed: 0,
            pod_overrides: HashMap::new(),
        }
    }
}

impl AllocationConfig {
    /// 校验配置
    ///
    /// 阈值与超时必须为有限非负数
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.global_policy().validate("global")?;
        for (pod_id, policy) in &self.pod_overrides {
            policy.validate(&format!("pod/{}", pod_id.0))?;
        }
        Ok(())
    }

    pub fn global_policy(&self) -> BufferPolicy {
        BufferPolicy {
            threshold: self.buffer_threshold,
            timeout: self.buffer_timeout,
        }
    }

    /// 某货架生效的缓冲策略 (有覆写时取覆写)
    pub fn buffer_policy(&self, pod_id: PodId) -> BufferPolicy {
        self.pod_overrides
            .get(&pod_id)
            .copied()
            .unwrap_or_else(|| self.global_policy())
    }

    pub fn with_pod_override(mut self, pod_id: PodId, policy: BufferPolicy) -> Self {
        self.pod_overrides.insert(pod_id, policy);
        self
    }
}

fn check_non_negative(scope: &str, key: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            scope: scope.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "必须为有限非负数".to_string(),
        });
    }
    Ok(())
}
