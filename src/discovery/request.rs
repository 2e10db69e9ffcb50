//! 阻塞查询请求

use crate::error::{DiscoveryError, Result};

/// 初始版本号，表示“尚无任何状态”
pub const INITIAL_INDEX: &str = "0";

/// 单次阻塞查询的请求参数
///
/// 每次轮询构建一次；版本号沿用上一次成功快照的 index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchRequest {
    service_name: String,
    index: String,
    tag: Option<String>,
}

impl WatchRequest {
    pub fn builder() -> WatchRequestBuilder {
        WatchRequestBuilder::default()
    }

    /// 仅指定服务名的请求，版本号为初始值
    pub fn for_service(service_name: impl Into<String>) -> Result<Self> {
        Self::builder().for_service(service_name).build()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

/// `WatchRequest` 构建器
#[derive(Debug, Clone, Default)]
pub struct WatchRequestBuilder {
    service_name: Option<String>,
    index: Option<String>,
    tag: Option<String>,
}

impl WatchRequestBuilder {
    /// 设置服务名（必填）
    pub fn for_service(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// 设置标签过滤
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// 设置可选的标签过滤
    pub fn tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    /// 设置上一次已知的版本号
    pub fn last_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn build(self) -> Result<WatchRequest> {
        let service_name = self
            .service_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| DiscoveryError::invalid_config("service name is mandatory"))?;

        Ok(WatchRequest {
            service_name,
            index: self.index.unwrap_or_else(|| INITIAL_INDEX.to_string()),
            tag: self.tag,
        })
    }
}
