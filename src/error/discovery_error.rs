//! 服务发现统一错误类型

use super::code::ErrorCode;
use thiserror::Error;

/// 服务发现统一错误类型
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// 配置错误（构造阶段快速失败，不重试）
    #[error("配置错误: {0}")]
    InvalidConfig(String),

    /// 网络层错误（连接失败、超时等）
    #[error("网络错误: {0}")]
    Transport(#[from] reqwest::Error),

    /// 响应体格式错误
    #[error("响应解析失败: {0}")]
    Decode(#[from] serde_json::Error),

    /// 自定义后端抛出的其他错误
    #[error("后端错误: {0}")]
    Backend(String),

    /// 没有可用的服务实例
    #[error("There is no \"{service}\" service available")]
    NoServiceAvailable { service: String },

    /// 监听循环超过重试上限，已永久停止
    #[error("监听服务 \"{service}\" 失败，已重试 {attempts} 次: {reason}")]
    RetriesExhausted {
        service: String,
        attempts: u32,
        reason: String,
    },

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DiscoveryError {
    /// 创建配置错误
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        DiscoveryError::InvalidConfig(msg.into())
    }

    /// 创建后端错误
    pub fn backend(msg: impl Into<String>) -> Self {
        DiscoveryError::Backend(msg.into())
    }

    /// 创建“无可用服务”错误
    pub fn no_service_available(service: impl Into<String>) -> Self {
        DiscoveryError::NoServiceAvailable {
            service: service.into(),
        }
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            DiscoveryError::InvalidConfig(_) => ErrorCode::ConfigurationError,
            DiscoveryError::Transport(e) if e.is_timeout() => ErrorCode::NetworkTimeout,
            DiscoveryError::Transport(_) => ErrorCode::NetworkError,
            DiscoveryError::Decode(_) => ErrorCode::DeserializationError,
            DiscoveryError::Backend(_) => ErrorCode::BackendError,
            DiscoveryError::NoServiceAvailable { .. } => ErrorCode::NoServiceAvailable,
            DiscoveryError::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
            DiscoveryError::Io(_) => ErrorCode::IoError,
            DiscoveryError::Toml(_) => ErrorCode::ConfigurationError,
        }
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, DiscoveryError>;
