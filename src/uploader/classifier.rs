// 文件分类：根据 MIME 类型决定整文件上传还是分片上传

use crate::error::{UploadError, UploadResult};
use crate::uploader::FileKind;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

type ChunkedPredicate = dyn Fn(&str) -> bool + Send + Sync;

/// 文件分类器
///
/// 内部是一个 `is_chunked(mime_type)` 判定函数
#[derive(Clone)]
pub struct FileClassifier {
    is_chunked: Arc<ChunkedPredicate>,
}

impl FileClassifier {
    /// 使用自定义判定函数
    pub fn new<F>(is_chunked: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            is_chunked: Arc::new(is_chunked),
        }
    }

    /// MIME 类型匹配正则的走分片上传
    pub fn from_pattern(pattern: &str) -> UploadResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            UploadError::invalid_argument(format!("无效的 MIME 正则: {}, 错误: {}", pattern, e))
        })?;
        Ok(Self::new(move |mime_type| regex.is_match(mime_type)))
    }

    /// 视频分片，其余整文件上传
    pub fn video_chunked() -> Self {
        Self::new(|mime_type| mime_type.contains("video"))
    }

    /// 图片整文件上传，其余分片
    pub fn image_whole() -> Self {
        Self::new(|mime_type| !mime_type.contains("image"))
    }

    /// 分类
    pub fn classify(&self, mime_type: &str) -> FileKind {
        if (self.is_chunked)(mime_type) {
            FileKind::Chunked
        } else {
            FileKind::Whole
        }
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::video_chunked()
    }
}

impl fmt::Debug for FileClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileClassifier").finish_non_exhaustive()
    }
}
