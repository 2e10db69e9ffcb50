//! 服务实例与快照定义

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// 某个服务当前的实例列表，整体替换、从不原地修改
pub type ServiceList = Arc<Vec<ServiceInstance>>;

/// 服务实例
///
/// 由后端解码边界创建，下游只读持有。相等性按全部字段比较，标签顺序无关。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ServiceInstance {
    /// 所在节点名
    pub node: String,

    /// 节点地址
    pub address: String,

    /// 服务实例 ID
    pub service_id: String,

    /// 服务名
    pub service_name: String,

    /// 服务标签
    pub tags: BTreeSet<String>,

    /// 服务可路由地址
    pub service_address: String,

    /// 服务端口
    pub service_port: u16,
}

impl ServiceInstance {
    /// 创建新的服务实例
    pub fn new(
        node: impl Into<String>,
        address: impl Into<String>,
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        service_address: impl Into<String>,
        service_port: u16,
    ) -> Self {
        Self {
            node: node.into(),
            address: address.into(),
            service_id: service_id.into(),
            service_name: service_name.into(),
            tags: BTreeSet::new(),
            service_address: service_address.into(),
            service_port,
        }
    }

    /// 添加标签
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// 添加多个标签
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// `host:port` 形式的访问地址
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.service_address, self.service_port)
    }

    /// 转换为 HTTP URL
    pub fn to_http_url(&self) -> String {
        format!("http://{}", self.endpoint())
    }
}

/// 一次成功轮询得到的完整实例集合及其版本号
///
/// 版本号只有在后端未返回时才为空（例如不带 index 的查询）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub instances: ServiceList,
    pub index: Option<String>,
}

impl ServiceSnapshot {
    pub fn new(instances: Vec<ServiceInstance>, index: Option<String>) -> Self {
        Self {
            instances: Arc::new(instances),
            index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }
}
