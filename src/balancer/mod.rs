//! 负载均衡模块
//!
//! 在服务发现维护的实时实例列表上选择下一个实例

pub mod round_robin;

pub use round_robin::RoundRobinLoadBalancer;

use crate::error::Result;

/// 负载均衡器
///
/// 对下一个可用实例的地址和端口执行 `f` 并返回其结果；没有可用实例时返回
/// `DiscoveryError::NoServiceAvailable`。不同的选择策略（加权、最少连接等）
/// 实现同一个 trait 即可替换，调用方无需改动。
pub trait LoadBalancer: Send + Sync {
    fn with_next_endpoint<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&str, u16) -> T;
}
