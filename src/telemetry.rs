//! 日志初始化
//!
//! `RUST_LOG` 优先，未设置时使用传入的默认级别

use tracing_subscriber::{EnvFilter, fmt};

/// 安装全局 tracing subscriber
///
/// 重复调用是安全的：全局 subscriber 已存在时返回 `false`
pub fn init_tracing(default_level: &str, json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.is_ok()
}
