//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 配置相关错误
/// - 2000-2999: 后端（Consul）访问相关错误
/// - 3000-3999: 负载均衡相关错误
/// - 9000-9999: 通用错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 配置相关错误 (1000-1999)
    // ============================================================
    ConfigurationError = 1000,
    InvalidParameter = 1001,

    // ============================================================
    // 后端访问相关错误 (2000-2999)
    // ============================================================
    NetworkError = 2000,
    NetworkTimeout = 2001,
    DeserializationError = 2002,
    BackendError = 2003,
    RetriesExhausted = 2004,

    // ============================================================
    // 负载均衡相关错误 (3000-3999)
    // ============================================================
    NoServiceAvailable = 3000,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    IoError = 9000,
    UnknownError = 9999,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::NetworkTimeout => "NETWORK_TIMEOUT",
            ErrorCode::DeserializationError => "DESERIALIZATION_ERROR",
            ErrorCode::BackendError => "BACKEND_ERROR",
            ErrorCode::RetriesExhausted => "RETRIES_EXHAUSTED",
            ErrorCode::NoServiceAvailable => "NO_SERVICE_AVAILABLE",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Configuration,
            2000..=2999 => ErrorCategory::Backend,
            3000..=3999 => ErrorCategory::Balancer,
            _ => ErrorCategory::General,
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// 监听循环只对这类错误执行退避重试；配置错误在构造阶段直接失败
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::NetworkTimeout
                | ErrorCode::DeserializationError
                | ErrorCode::BackendError
                | ErrorCode::NoServiceAvailable
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Configuration,
    Backend,
    Balancer,
    General,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "CONFIGURATION"),
            ErrorCategory::Backend => write!(f, "BACKEND"),
            ErrorCategory::Balancer => write!(f, "BALANCER"),
            ErrorCategory::General => write!(f, "GENERAL"),
        }
    }
}
