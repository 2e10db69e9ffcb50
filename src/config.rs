//! 客户端配置
//!
//! Consul 连接参数与监听循环的重试参数，可从 TOML 文件加载

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{DiscoveryError, Result};
use crate::retry::{BackoffPolicy, ExponentialBackoff, FixedBackoff};

/// 阻塞查询等待时间下限（秒）
pub const MIN_WAIT_TIME_SECS: u64 = 1;
/// 阻塞查询等待时间上限（秒）
pub const MAX_WAIT_TIME_SECS: u64 = 600;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub consul: ConsulConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl AgentConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AgentConfig = toml::from_str(content)?;
        config.consul.validate()?;
        Ok(config)
    }
}

/// Consul 连接配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsulConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 阻塞查询在服务端的最长等待时间（秒），取值 1..=600
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,
    /// 客户端读超时在 wait 之上额外留出的余量（秒）
    #[serde(default = "default_read_timeout_margin_secs")]
    pub read_timeout_margin_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8500
}

fn default_wait_time_secs() -> u64 {
    300
}

fn default_read_timeout_margin_secs() -> u64 {
    10
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            wait_time_secs: default_wait_time_secs(),
            read_timeout_margin_secs: default_read_timeout_margin_secs(),
        }
    }
}

impl ConsulConfig {
    /// 校验配置，等待时间越界时直接失败
    pub fn validate(&self) -> Result<()> {
        if !(MIN_WAIT_TIME_SECS..=MAX_WAIT_TIME_SECS).contains(&self.wait_time_secs) {
            return Err(DiscoveryError::invalid_config(format!(
                "wait time must be between {} and {} seconds, got {}",
                MIN_WAIT_TIME_SECS, MAX_WAIT_TIME_SECS, self.wait_time_secs
            )));
        }
        if self.host.trim().is_empty() {
            return Err(DiscoveryError::invalid_config("consul host must not be empty"));
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// 客户端请求超时：始终严格大于服务端 wait，用于区分“无变化”与网络故障
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs + self.read_timeout_margin_secs.max(1))
    }
}

/// 退避配置
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    Fixed { delay_ms: u64 },
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Exponential {
            base_ms: 1_000,
            max_ms: 30_000,
        }
    }
}

impl BackoffConfig {
    pub fn into_policy(self) -> Arc<dyn BackoffPolicy> {
        match self {
            BackoffConfig::Fixed { delay_ms } => {
                Arc::new(FixedBackoff::new(Duration::from_millis(delay_ms)))
            }
            BackoffConfig::Exponential { base_ms, max_ms } => Arc::new(ExponentialBackoff::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(max_ms),
            )),
        }
    }
}

/// 监听循环配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatchConfig {
    /// 连续失败次数上限；为空表示无限重试
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl WatchConfig {
    pub fn into_settings(self) -> WatchSettings {
        WatchSettings::new(self.max_retries, self.backoff.into_policy())
    }
}

/// 监听循环的运行期参数
#[derive(Clone)]
pub struct WatchSettings {
    pub max_retries: Option<u32>,
    pub backoff: Arc<dyn BackoffPolicy>,
}

impl WatchSettings {
    pub fn new(max_retries: Option<u32>, backoff: Arc<dyn BackoffPolicy>) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// 使用调用方提供的“尝试次数 -> 延迟”函数
    pub fn with_delay_fn<F>(max_retries: Option<u32>, delay_fn: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::new(max_retries, Arc::new(delay_fn))
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        WatchConfig::default().into_settings()
    }
}

impl fmt::Debug for WatchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSettings")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
