//! 服务发现后端抽象和实现

pub mod consul;

use async_trait::async_trait;

use crate::discovery::instance::ServiceSnapshot;
use crate::discovery::request::WatchRequest;
use crate::error::Result;

/// 服务发现后端 trait
///
/// 一次调用即一次阻塞查询：若自 `request.index()` 以来没有变化，后端最多阻塞到
/// 配置的等待时间后返回。
///
/// 返回值约定：
/// * `Ok(Some(snapshot))` - 当前健康实例及新的版本号
/// * `Ok(None)` - 本轮没有可用数据（例如非成功状态码），视为“无变化”
/// * `Err` - 网络层故障或响应格式错误，触发监听循环的退避重试
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    async fn discover_service(&self, request: &WatchRequest) -> Result<Option<ServiceSnapshot>>;
}
