// 上传引擎
//
// 核心功能：
// 1. 单文件上传：按 MIME 分类决定整文件上传或分片上传
// 2. 分片严格按索引升序逐个上传，同一时刻只有一个请求在途
// 3. 分片失败后按重试策略重传，完成计数只在服务器确认后增加
// 4. 每次完成都通过回调通知进度

use crate::api::{
    ChunkUploadRequest, UploadApi, UploadErrorKind, WholeUploadMetadata, WholeUploadRequest,
};
use crate::error::{UploadError, UploadResult};
use crate::uploader::{
    ChunkPlan, ContentHasher, FileDescriptor, FileKind, ProgressCallback, ProgressUpdate,
    RetryPolicy, DEFAULT_PIECE_SIZE,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 单个分片的上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// 上传成功，attempts 为总请求次数
    Uploaded { attempts: u32 },
    /// 文件已全部完成，没有发出请求
    AlreadyComplete,
}

// =====================================================
// 分片上传
// =====================================================

/// 分片上传器
///
/// 负责一个分片的上传和重试
#[derive(Clone)]
pub struct ChunkUploader {
    /// 上传接口
    api: Arc<dyn UploadApi>,
    /// 重试策略
    retry_policy: RetryPolicy,
    /// 分片哈希（可选）
    hasher: Option<Arc<dyn ContentHasher>>,
}

impl ChunkUploader {
    pub fn new(api: Arc<dyn UploadApi>, retry_policy: RetryPolicy) -> Self {
        Self {
            api,
            retry_policy,
            hasher: None,
        }
    }

    /// 上传时附带分片哈希
    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    /// 上传一个分片
    ///
    /// 返回时要么该分片已被服务器确认，要么文件早已完成（直接通知 100%）。
    /// 默认策略下失败会一直重试，不会返回传输错误
    pub async fn upload_chunk(
        &self,
        chunk_data: Vec<u8>,
        chunk_index: usize,
        descriptor: &mut FileDescriptor,
        progress: ProgressCallback<'_>,
    ) -> UploadResult<ChunkOutcome> {
        if descriptor.is_finished() {
            debug!(
                "[分片#{}] 文件已完成，跳过上传: {}",
                chunk_index,
                descriptor.name()
            );
            progress(&ProgressUpdate::completed(descriptor), descriptor);
            return Ok(ChunkOutcome::AlreadyComplete);
        }

        let hash = self.hasher.as_ref().map(|h| h.hash_bytes(&chunk_data));
        let chunk_size = chunk_data.len();
        let mut retries: u32 = 0;

        loop {
            let request = ChunkUploadRequest {
                identifier: descriptor.identifier(),
                index: chunk_index,
                data: chunk_data.clone(),
                hash: hash.clone(),
            };

            let result = match self.api.upload_chunk(request).await {
                Ok(ack) if ack.is_empty() => Err(anyhow::anyhow!("服务器返回空确认")),
                other => other,
            };

            match result {
                Ok(_) => {
                    let finish_count = descriptor.record_finished()?;
                    let update = ProgressUpdate::from_descriptor(descriptor);

                    debug!(
                        "[分片#{}] ✓ 上传成功 ({}/{} 完成, {}%, 大小: {} bytes, 尝试 {} 次)",
                        chunk_index,
                        finish_count,
                        descriptor.chunk_count(),
                        update.percent,
                        chunk_size,
                        retries + 1
                    );

                    progress(&update, descriptor);
                    return Ok(ChunkOutcome::Uploaded {
                        attempts: retries + 1,
                    });
                }
                Err(e) => {
                    let error_kind = UploadErrorKind::classify(&e);

                    if !self.retry_policy.should_retry(retries) {
                        error!(
                            "[分片#{}] 上传失败，已达最大重试次数 ({}): {}, 错误: {:#}",
                            chunk_index,
                            retries,
                            descriptor.name(),
                            e
                        );
                        return Err(UploadError::ChunkRetriesExhausted {
                            identifier: descriptor.identifier().to_string(),
                            index: chunk_index,
                            attempts: retries + 1,
                            source: e,
                        });
                    }

                    if !error_kind.is_retriable() {
                        debug!(
                            "[分片#{}] 错误类型 {:?} 通常不可恢复，仍按策略重试",
                            chunk_index, error_kind
                        );
                    }

                    let delay = self.retry_policy.backoff_delay(retries, error_kind);
                    retries += 1;
                    warn!(
                        "[分片#{}] 上传失败 ({:?})，等待 {}ms 后第 {} 次重试: {:#}",
                        chunk_index,
                        error_kind,
                        delay.as_millis(),
                        retries,
                        e
                    );

                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

// =====================================================
// 单文件上传
// =====================================================

/// 上传引擎
///
/// 负责单个文件的完整上传：
/// - 分片文件：初始化会话，然后逐个上传分片
/// - 整文件：一次上传，附带服务器返回的地址
#[derive(Clone)]
pub struct UploadEngine {
    /// 上传接口
    api: Arc<dyn UploadApi>,
    /// 分片上传器
    chunk_uploader: ChunkUploader,
    /// 分片大小
    piece_size: u64,
    /// 整文件上传元数据
    whole_metadata: WholeUploadMetadata,
}

impl UploadEngine {
    /// 创建上传引擎（默认分片大小、默认重试策略）
    pub fn new(api: Arc<dyn UploadApi>) -> Self {
        Self::with_retry_policy(api, RetryPolicy::default())
    }

    /// 创建上传引擎（指定重试策略）
    pub fn with_retry_policy(api: Arc<dyn UploadApi>, retry_policy: RetryPolicy) -> Self {
        Self {
            chunk_uploader: ChunkUploader::new(api.clone(), retry_policy),
            api,
            piece_size: DEFAULT_PIECE_SIZE,
            whole_metadata: WholeUploadMetadata::default(),
        }
    }

    pub fn with_piece_size(mut self, piece_size: u64) -> Self {
        self.piece_size = piece_size;
        self
    }

    pub fn with_whole_metadata(mut self, metadata: WholeUploadMetadata) -> Self {
        self.whole_metadata = metadata;
        self
    }

    pub fn with_chunk_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.chunk_uploader = self.chunk_uploader.with_hasher(hasher);
        self
    }

    /// 替换重试策略，保留分片哈希设置
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.chunk_uploader.set_retry_policy(retry_policy);
    }

    pub fn piece_size(&self) -> u64 {
        self.piece_size
    }

    pub fn chunk_uploader(&self) -> &ChunkUploader {
        &self.chunk_uploader
    }

    /// 上传单个文件
    ///
    /// 失败时文件标记为 Failed 并返回错误
    pub async fn upload_file(
        &self,
        descriptor: &mut FileDescriptor,
        progress: ProgressCallback<'_>,
    ) -> UploadResult<()> {
        info!(
            "开始上传: name={}, identifier={}, size={}, kind={:?}",
            descriptor.name(),
            descriptor.identifier(),
            descriptor.size(),
            descriptor.kind()
        );

        descriptor.mark_in_progress();

        let result = match descriptor.kind() {
            FileKind::Chunked => self.upload_chunked(descriptor, progress).await,
            FileKind::Whole => self.upload_whole(descriptor, progress).await,
        };

        match result {
            Ok(()) => {
                descriptor.mark_completed();
                info!(
                    "上传完成: name={}, 分片 {}/{}",
                    descriptor.name(),
                    descriptor.finish_count(),
                    descriptor.chunk_count()
                );
                Ok(())
            }
            Err(e) => {
                error!("上传失败: name={}, 错误: {}", descriptor.name(), e);
                descriptor.mark_failed(e.to_string());
                Err(e)
            }
        }
    }

    /// 分片上传
    async fn upload_chunked(
        &self,
        descriptor: &mut FileDescriptor,
        progress: ProgressCallback<'_>,
    ) -> UploadResult<()> {
        let plan = ChunkPlan::new(descriptor.size(), self.piece_size)?;
        descriptor.assign_chunk_count(plan.chunk_count())?;

        self.api
            .init_large_file(descriptor.identifier())
            .await
            .map_err(|source| UploadError::SessionInit {
                identifier: descriptor.identifier().to_string(),
                source,
            })?;

        info!(
            "[分片上传] {}: 分片大小={} bytes, 分片数量={}",
            descriptor.name(),
            plan.piece_size(),
            plan.chunk_count()
        );

        // 空文件没有分片，直接通知完成
        if plan.chunk_count() == 0 {
            progress(&ProgressUpdate::completed(descriptor), descriptor);
            return Ok(());
        }

        for chunk in plan.chunks() {
            let chunk_data = descriptor.file().read_range(chunk.range.clone()).await?;

            debug!(
                "[分片#{}] 开始上传 (范围: {}-{}, 大小: {} bytes)",
                chunk.index,
                chunk.range.start,
                chunk.range.end - 1,
                chunk.size()
            );

            self.chunk_uploader
                .upload_chunk(chunk_data, chunk.index, descriptor, progress)
                .await?;
        }

        Ok(())
    }

    /// 整文件上传
    async fn upload_whole(
        &self,
        descriptor: &mut FileDescriptor,
        progress: ProgressCallback<'_>,
    ) -> UploadResult<()> {
        descriptor.assign_chunk_count(1)?;

        let request = WholeUploadRequest {
            file: descriptor.file(),
            metadata: &self.whole_metadata,
        };

        let response = self.api.upload_whole_file(request).await.map_err(|source| {
            UploadError::WholeUpload {
                name: descriptor.name().to_string(),
                source,
            }
        })?;

        descriptor.record_finished()?;
        let update =
            ProgressUpdate::from_descriptor(descriptor).with_location(response.url, response.filename);
        progress(&update, descriptor);

        Ok(())
    }
}
