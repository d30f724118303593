// 分片重试策略
//
// 默认无限重试（失败的分片一直重传直到成功），
// 可配置重试上限，超过上限后错误返回给调用方

use crate::api::UploadErrorKind;
use std::time::Duration;

/// 初始退避延迟（毫秒）
const INITIAL_BACKOFF_MS: u64 = 100;

/// 最大退避延迟（毫秒）
const MAX_BACKOFF_MS: u64 = 5000;

/// 限流时的额外等待时间（毫秒）
const RATE_LIMIT_BACKOFF_MS: u64 = 10000;

/// 分片重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大重试次数（首次尝试不计入），None 表示无限重试
    pub max_retries: Option<u32>,
    /// 初始退避延迟
    pub initial_backoff: Duration,
    /// 最大退避延迟
    pub max_backoff: Duration,
    /// 限流时的最小等待时间
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
            rate_limit_backoff: Duration::from_millis(RATE_LIMIT_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// 无限重试、不等待
    pub fn immediate() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
        }
    }

    /// 限定重试次数
    pub fn bounded(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Self::default()
        }
    }

    /// 已重试 `retries` 次后是否还能继续
    pub fn should_retry(&self, retries: u32) -> bool {
        match self.max_retries {
            Some(max) => retries < max,
            None => true,
        }
    }

    /// 计算指数退避延迟
    ///
    /// # 延迟序列（默认配置）
    /// - retry=0: 100ms
    /// - retry=1: 200ms
    /// - retry=2: 400ms
    /// - 最大: 5000ms，限流时至少 10000ms
    pub fn backoff_delay(&self, retry: u32, error_kind: UploadErrorKind) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        let delay = self
            .initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);

        if error_kind == UploadErrorKind::RateLimited {
            delay.max(self.rate_limit_backoff)
        } else {
            delay
        }
    }
}
