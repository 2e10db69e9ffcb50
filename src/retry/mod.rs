//! 重试退避策略模块
//!
//! 监听循环在连续失败时按尝试次数计算下一次重试前的等待时间。
//! 尝试次数从 1 开始，任意一次成功后归零。

pub mod exponential;
pub mod fixed;

pub use exponential::ExponentialBackoff;
pub use fixed::FixedBackoff;

use std::time::Duration;

/// 退避策略 trait
pub trait BackoffPolicy: Send + Sync {
    /// 第 `attempt` 次连续失败后的等待时间
    fn delay(&self, attempt: u32) -> Duration;
}

/// 任意 `Fn(u32) -> Duration` 闭包都可直接作为退避策略使用
impl<F> BackoffPolicy for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}
