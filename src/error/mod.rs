//! 错误处理模块
//!
//! 统一的错误类型与错误代码分类

pub mod code;
pub mod discovery_error;

pub use code::{ErrorCategory, ErrorCode};
pub use discovery_error::{DiscoveryError, Result};
