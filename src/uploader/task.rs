// 上传文件描述
//
// 每个输入文件在批次开始时生成一个 FileDescriptor，
// 上传过程中只修改完成计数和状态，批次结束后丢弃

use crate::error::{UploadError, UploadResult};
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// 文件内容来源
#[derive(Debug, Clone)]
pub enum FileSource {
    /// 本地文件
    Path(PathBuf),
    /// 内存数据
    Memory(Arc<Vec<u8>>),
}

/// 原始文件句柄（名称、MIME 类型、大小、内容）
#[derive(Debug, Clone)]
pub struct RawFile {
    /// 文件名
    pub name: String,
    /// 声明的 MIME 类型，如 "video/mp4"
    pub mime_type: String,
    /// 文件大小
    pub size: u64,
    /// 外部提供的唯一标识
    pub uid: Option<String>,
    /// 内容来源
    pub source: FileSource,
}

impl RawFile {
    /// 从内存数据创建
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            uid: None,
            source: FileSource::Memory(Arc::new(data)),
        }
    }

    /// 从本地文件创建
    ///
    /// MIME 类型根据扩展名推断，并分配一个随机 uid
    pub async fn from_path(path: impl AsRef<Path>) -> UploadResult<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(UploadError::invalid_argument(format!(
                "不是普通文件: {:?}",
                path
            )));
        }

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| UploadError::invalid_argument(format!("无效的文件名: {:?}", path)))?;

        Ok(Self {
            name,
            mime_type: guess_mime_type(path).to_string(),
            size: metadata.len(),
            uid: Some(Uuid::new_v4().to_string()),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// 设置外部唯一标识
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// 读取指定字节范围
    pub async fn read_range(&self, range: Range<u64>) -> UploadResult<Vec<u8>> {
        if range.start > range.end || range.end > self.size {
            return Err(UploadError::invalid_argument(format!(
                "读取范围越界: {}..{}, size={}",
                range.start, range.end, self.size
            )));
        }

        match &self.source {
            FileSource::Memory(data) => {
                Ok(data[range.start as usize..range.end as usize].to_vec())
            }
            FileSource::Path(path) => {
                let path = path.clone();
                let len = (range.end - range.start) as usize;

                tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
                    let mut file = std::fs::File::open(&path)?;
                    file.seek(SeekFrom::Start(range.start))?;

                    let mut buffer = vec![0u8; len];
                    file.read_exact(&mut buffer)?;
                    Ok(buffer)
                })
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
                .map_err(UploadError::from)
            }
        }
    }

    /// 读取全部内容
    pub async fn read_all(&self) -> UploadResult<Vec<u8>> {
        self.read_range(0..self.size).await
    }
}

/// 根据扩展名推断 MIME 类型
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// 文件上传方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// 整文件一次上传
    Whole,
    /// 分片上传
    Chunked,
}

/// 文件上传状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileUploadStatus {
    /// 等待中
    Pending,
    /// 上传中
    InProgress,
    /// 已完成
    Completed,
    /// 失败
    Failed,
}

/// 单个文件的上传状态记录
#[derive(Debug, Clone, Serialize)]
pub struct FileDescriptor {
    /// 原始文件
    #[serde(skip)]
    file: RawFile,
    /// 显示名称
    name: String,
    /// 唯一标识（外部 uid 或内容哈希）
    identifier: String,
    /// 上传方式
    kind: FileKind,
    /// 总分片数（整文件为 1），只设置一次
    chunk_count: Option<usize>,
    /// 已完成分片数
    finish_count: usize,
    /// 状态
    status: FileUploadStatus,
    /// 开始时间 (Unix timestamp)
    started_at: Option<i64>,
    /// 完成时间 (Unix timestamp)
    completed_at: Option<i64>,
    /// 错误信息
    error: Option<String>,
}

impl FileDescriptor {
    pub fn new(file: RawFile, identifier: String, kind: FileKind) -> Self {
        Self {
            name: file.name.clone(),
            file,
            identifier,
            kind,
            chunk_count: None,
            finish_count: 0,
            status: FileUploadStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn file(&self) -> &RawFile {
        &self.file
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.file.size
    }

    /// 总分片数（未规划时为 0）
    pub fn chunk_count(&self) -> usize {
        self.chunk_count.unwrap_or(0)
    }

    pub fn finish_count(&self) -> usize {
        self.finish_count
    }

    pub fn status(&self) -> FileUploadStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<i64> {
        self.completed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 设置总分片数，只允许设置一次
    pub fn assign_chunk_count(&mut self, chunk_count: usize) -> UploadResult<()> {
        match self.chunk_count {
            Some(existing) if existing != chunk_count => Err(UploadError::invalid_argument(format!(
                "分片数已设置: {}, 不能改为 {}",
                existing, chunk_count
            ))),
            _ => {
                self.chunk_count = Some(chunk_count);
                Ok(())
            }
        }
    }

    /// 是否已全部完成
    pub fn is_finished(&self) -> bool {
        self.chunk_count.is_some() && self.finish_count >= self.chunk_count()
    }

    /// 记录一个分片（或整文件）完成，返回新的完成数
    ///
    /// 完成数不会超过总分片数
    pub fn record_finished(&mut self) -> UploadResult<usize> {
        if self.is_finished() || self.chunk_count.is_none() {
            return Err(UploadError::invalid_argument(format!(
                "完成数不能超过分片数: finish={}, chunk_count={}",
                self.finish_count,
                self.chunk_count()
            )));
        }
        self.finish_count += 1;
        Ok(self.finish_count)
    }

    /// 标记为上传中
    pub fn mark_in_progress(&mut self) {
        self.status = FileUploadStatus::InProgress;
        if self.started_at.is_none() {
            self.started_at = Some(chrono::Utc::now().timestamp());
        }
    }

    /// 标记为已完成
    pub fn mark_completed(&mut self) {
        self.status = FileUploadStatus::Completed;
        self.completed_at = Some(chrono::Utc::now().timestamp());
    }

    /// 标记为失败
    pub fn mark_failed(&mut self, error: String) {
        self.status = FileUploadStatus::Failed;
        self.error = Some(error);
    }
}
