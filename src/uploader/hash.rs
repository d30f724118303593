// 内容哈希
//
// 用于生成文件唯一标识（未提供 uid 时）和分片哈希

use crate::error::{UploadError, UploadResult};
use crate::uploader::{FileSource, RawFile};
use async_trait::async_trait;
use md5::Context as Md5Context;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// 内容哈希计算
#[async_trait]
pub trait ContentHasher: Send + Sync {
    /// 计算一段数据的哈希
    fn hash_bytes(&self, data: &[u8]) -> String;

    /// 计算整个文件的哈希
    async fn hash_file(&self, file: &RawFile) -> UploadResult<String>;
}

/// MD5 哈希
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5ContentHasher;

impl Md5ContentHasher {
    /// 分块读取本地文件计算 MD5
    fn hash_path_sync(path: &Path) -> std::io::Result<String> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::with_capacity(1024 * 1024, file);

        let mut hasher = Md5Context::new();
        let mut buffer = [0u8; 65536]; // 64KB 缓冲区

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.consume(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.compute()))
    }
}

#[async_trait]
impl ContentHasher for Md5ContentHasher {
    fn hash_bytes(&self, data: &[u8]) -> String {
        format!("{:x}", md5::compute(data))
    }

    async fn hash_file(&self, file: &RawFile) -> UploadResult<String> {
        let hash = match &file.source {
            FileSource::Memory(data) => self.hash_bytes(data),
            FileSource::Path(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || Self::hash_path_sync(&path))
                    .await
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
                    .map_err(UploadError::from)?
            }
        };

        debug!("文件哈希计算完成: name={}, md5={}", file.name, hash);
        Ok(hash)
    }
}
