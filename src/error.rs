// 上传错误定义
//
// 核心层对调用方暴露的错误类型。
// 分片上传的传输错误默认不会出现在这里（无限重试吸收），
// 只有配置了重试上限时才会以 ChunkRetriesExhausted 的形式冒泡。

use thiserror::Error;

/// 上传核心错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 参数错误（分片大小为 0、分片索引越界等）
    #[error("参数错误: {0}")]
    InvalidArgument(String),

    /// 大文件上传会话初始化失败
    #[error("初始化大文件上传会话失败: identifier={identifier}, 错误: {source}")]
    SessionInit {
        identifier: String,
        #[source]
        source: anyhow::Error,
    },

    /// 整文件上传失败（请求失败或响应没有 data）
    #[error("整文件上传失败: {name}, 错误: {source}")]
    WholeUpload {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// 分片重试次数耗尽（仅在设置了重试上限时出现）
    #[error("分片 #{index} 上传失败，共尝试 {attempts} 次: identifier={identifier}, 错误: {source}")]
    ChunkRetriesExhausted {
        identifier: String,
        index: usize,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// 读取本地文件失败
    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// 构造参数错误
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        UploadError::InvalidArgument(msg.into())
    }

    /// 是否为参数错误
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, UploadError::InvalidArgument(_))
    }
}

pub type UploadResult<T> = std::result::Result<T, UploadError>;
