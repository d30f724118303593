// 上传接口模块
//
// 核心上传流程只依赖 UploadApi trait，
// HttpUploadClient 是基于 reqwest 的默认实现

pub mod client;
pub mod types;

pub use client::HttpUploadClient;
pub use types::*;

use crate::uploader::RawFile;
use anyhow::Result;
use async_trait::async_trait;

/// 分片上传请求
#[derive(Debug, Clone)]
pub struct ChunkUploadRequest<'a> {
    /// 文件唯一标识
    pub identifier: &'a str,
    /// 分片索引（从 0 开始）
    pub index: usize,
    /// 分片数据
    pub data: Vec<u8>,
    /// 分片内容哈希（可选）
    pub hash: Option<String>,
}

/// 整文件上传请求
///
/// 只携带文件句柄，内容由实现方流式读取
#[derive(Debug, Clone)]
pub struct WholeUploadRequest<'a> {
    /// 待上传文件
    pub file: &'a RawFile,
    /// 固定元数据
    pub metadata: &'a WholeUploadMetadata,
}

/// 上传接口
///
/// 同一分片可能因为重试被调用任意多次
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// 初始化大文件上传会话（每个分片文件调用一次）
    async fn init_large_file(&self, identifier: &str) -> Result<UploadAck>;

    /// 上传一个分片
    async fn upload_chunk(&self, request: ChunkUploadRequest<'_>) -> Result<UploadAck>;

    /// 整文件上传
    async fn upload_whole_file(&self, request: WholeUploadRequest<'_>) -> Result<WholeUploadData>;
}
