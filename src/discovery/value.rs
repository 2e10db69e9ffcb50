//! Consul KV 条目

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// KV 读取结果
///
/// `value` 保留 Consul 返回的 base64 原文，需要时再解码
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValue {
    pub key: String,

    #[serde(default)]
    pub value: Option<String>,

    pub create_index: u64,

    pub modify_index: u64,

    pub lock_index: u64,

    pub flags: u64,

    #[serde(default)]
    pub session: Option<String>,
}

impl KeyValue {
    /// base64 解码后的原始字节；值为空或编码非法时返回 `None`
    pub fn decoded_bytes(&self) -> Option<Vec<u8>> {
        self.value
            .as_deref()
            .and_then(|raw| STANDARD.decode(raw).ok())
    }

    /// base64 解码后按 UTF-8 解释的字符串
    pub fn decoded_value(&self) -> Option<String> {
        self.decoded_bytes()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }
}
