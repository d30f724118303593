// 上传接口数据类型

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 通用响应信封 `{ code, data, msg }`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    /// 业务码（0 或 200 表示成功）
    #[serde(default)]
    pub code: i32,

    /// 响应数据
    pub data: Option<T>,

    /// 提示信息
    #[serde(default, alias = "message")]
    pub msg: String,
}

impl<T> ApiResponse<T> {
    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.code == 0 || self.code == 200
    }
}

/// 整文件上传返回数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WholeUploadData {
    /// 文件访问地址
    #[serde(default)]
    pub url: Option<String>,

    /// 服务器文件名
    #[serde(default)]
    pub filename: Option<String>,
}

/// 整文件上传附带的固定元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WholeUploadMetadata {
    /// 业务场景，如 "feed"
    pub scene: String,
    /// 媒体类型，如 "image"
    pub media_type: String,
}

impl Default for WholeUploadMetadata {
    fn default() -> Self {
        Self {
            scene: "feed".to_string(),
            media_type: "image".to_string(),
        }
    }
}

/// 服务器确认（会话初始化、分片上传）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadAck {
    /// 原始响应体
    pub body: String,
}

impl UploadAck {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// 空响应不算确认
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// 上传错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// 网络错误（可重试）
    Network,
    /// 超时（可重试）
    Timeout,
    /// 服务器错误（可重试）
    ServerError,
    /// 限流（可重试，需要更长等待时间）
    RateLimited,
    /// 资源不存在（不可重试）
    NotFound,
    /// 权限不足（不可重试）
    Forbidden,
    /// 参数错误（不可重试）
    BadRequest,
    /// 未知错误
    Unknown,
}

impl UploadErrorKind {
    /// 是否可重试
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            UploadErrorKind::Network
                | UploadErrorKind::Timeout
                | UploadErrorKind::ServerError
                | UploadErrorKind::RateLimited
        )
    }

    /// 错误分类
    ///
    /// 优先使用错误链中的 HTTP 状态码和 reqwest 错误类型，
    /// 都没有时才匹配最底层错误的文本（上层 context 可能带分片索引等数字）
    pub fn classify(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(status_error) = cause.downcast_ref::<HttpStatusError>() {
                return Self::from_status(status_error.status);
            }
            if let Some(request_error) = cause.downcast_ref::<reqwest::Error>() {
                if request_error.is_timeout() {
                    return UploadErrorKind::Timeout;
                }
                if let Some(status) = request_error.status() {
                    return Self::from_status(status.as_u16());
                }
                if request_error.is_connect() || request_error.is_request() {
                    return UploadErrorKind::Network;
                }
            }
        }

        Self::from_message(&error.root_cause().to_string())
    }

    /// 根据 HTTP 状态码分类
    pub fn from_status(status: u16) -> Self {
        match status {
            408 | 504 => UploadErrorKind::Timeout,
            429 => UploadErrorKind::RateLimited,
            404 => UploadErrorKind::NotFound,
            403 => UploadErrorKind::Forbidden,
            400 => UploadErrorKind::BadRequest,
            500..=599 => UploadErrorKind::ServerError,
            _ => UploadErrorKind::Unknown,
        }
    }

    /// 根据错误文本分类
    fn from_message(message: &str) -> Self {
        let error_str = message.to_lowercase();

        if error_str.contains("timeout") || error_str.contains("timed out") {
            UploadErrorKind::Timeout
        } else if error_str.contains("429") || error_str.contains("rate limit") {
            UploadErrorKind::RateLimited
        } else if error_str.contains("connection")
            || error_str.contains("network")
            || error_str.contains("dns")
        {
            UploadErrorKind::Network
        } else if error_str.contains("404") || error_str.contains("not found") {
            UploadErrorKind::NotFound
        } else if error_str.contains("403") || error_str.contains("forbidden") {
            UploadErrorKind::Forbidden
        } else if error_str.contains("400") || error_str.contains("bad request") {
            UploadErrorKind::BadRequest
        } else if error_str.contains("500")
            || error_str.contains("502")
            || error_str.contains("503")
            || error_str.contains("internal server")
        {
            UploadErrorKind::ServerError
        } else {
            UploadErrorKind::Unknown
        }
    }
}

/// 非 2xx 响应
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {body}")]
pub struct HttpStatusError {
    /// HTTP 状态码
    pub status: u16,
    /// 响应体
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_upload_response() {
        let body = r#"{"code":0,"data":{"url":"https://cdn/x.png","filename":"x.png"},"msg":"ok"}"#;
        let resp: ApiResponse<WholeUploadData> = serde_json::from_str(body).unwrap();
        assert!(resp.is_success());
        let data = resp.data.unwrap();
        assert_eq!(data.url.as_deref(), Some("https://cdn/x.png"));
        assert_eq!(data.filename.as_deref(), Some("x.png"));
    }

    #[test]
    fn test_parse_response_without_data() {
        let body = r#"{"code":500,"message":"busy"}"#;
        let resp: ApiResponse<WholeUploadData> = serde_json::from_str(body).unwrap();
        assert!(!resp.is_success());
        assert!(resp.data.is_none());
        assert_eq!(resp.msg, "busy");
    }

    #[test]
    fn test_empty_ack() {
        assert!(UploadAck::new("  ").is_empty());
        assert!(!UploadAck::new("{\"code\":0}").is_empty());
    }

    #[test]
    fn test_classify_errors() {
        let kind = |msg: &str| UploadErrorKind::classify(&anyhow::anyhow!(msg.to_string()));
        assert_eq!(kind("operation timed out"), UploadErrorKind::Timeout);
        assert_eq!(kind("HTTP 429 Too Many Requests"), UploadErrorKind::RateLimited);
        assert_eq!(kind("connection reset"), UploadErrorKind::Network);
        assert_eq!(kind("HTTP 403 Forbidden"), UploadErrorKind::Forbidden);
        assert_eq!(kind("HTTP 503"), UploadErrorKind::ServerError);
        assert_eq!(kind("weird"), UploadErrorKind::Unknown);
    }

    #[test]
    fn test_classify_ignores_chunk_index_in_context() {
        let busy = |part: usize| {
            anyhow::Error::new(HttpStatusError {
                status: 503,
                body: "busy".to_string(),
            })
            .context(format!("上传分片失败: part={}", part))
        };
        assert_eq!(UploadErrorKind::classify(&busy(429)), UploadErrorKind::ServerError);
        assert_eq!(UploadErrorKind::classify(&busy(1429)), UploadErrorKind::ServerError);
        assert_eq!(UploadErrorKind::classify(&busy(404)), UploadErrorKind::ServerError);

        let delay = crate::uploader::RetryPolicy::default()
            .backoff_delay(0, UploadErrorKind::classify(&busy(1429)));
        assert_eq!(delay.as_millis(), 100);

        // 没有类型信息时只看最底层错误
        let untyped = anyhow::anyhow!("HTTP 503: busy").context("上传分片失败: part=429");
        assert_eq!(UploadErrorKind::classify(&untyped), UploadErrorKind::ServerError);

        let limited = anyhow::Error::new(HttpStatusError {
            status: 429,
            body: String::new(),
        })
        .context("上传分片失败: part=7");
        assert_eq!(UploadErrorKind::classify(&limited), UploadErrorKind::RateLimited);
    }

    #[test]
    fn test_from_status() {
        assert_eq!(UploadErrorKind::from_status(429), UploadErrorKind::RateLimited);
        assert_eq!(UploadErrorKind::from_status(502), UploadErrorKind::ServerError);
        assert_eq!(UploadErrorKind::from_status(504), UploadErrorKind::Timeout);
        assert_eq!(UploadErrorKind::from_status(400), UploadErrorKind::BadRequest);
        assert_eq!(UploadErrorKind::from_status(302), UploadErrorKind::Unknown);
    }

    #[test]
    fn test_upload_error_kind_retriable() {
        assert!(UploadErrorKind::Network.is_retriable());
        assert!(UploadErrorKind::Timeout.is_retriable());
        assert!(UploadErrorKind::ServerError.is_retriable());
        assert!(UploadErrorKind::RateLimited.is_retriable());

        assert!(!UploadErrorKind::NotFound.is_retriable());
        assert!(!UploadErrorKind::Forbidden.is_retriable());
        assert!(!UploadErrorKind::BadRequest.is_retriable());
        assert!(!UploadErrorKind::Unknown.is_retriable());
    }
}
