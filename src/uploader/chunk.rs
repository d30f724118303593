// 上传分片规划
//
// 分片规则：
// - 分片大小固定（默认 5,000,000 字节）
// - 分片数量 = ceil(文件大小 / 分片大小)
// - 第 i 个分片的字节范围为 [i * 分片大小, min(文件大小, (i + 1) * 分片大小))

use crate::error::{UploadError, UploadResult};
use std::ops::Range;

/// 默认分片大小: 5,000,000 字节
pub const DEFAULT_PIECE_SIZE: u64 = 5_000_000;

/// 上传分片信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk {
    /// 分片索引
    pub index: usize,
    /// 字节范围（左闭右开）
    pub range: Range<u64>,
}

impl UploadChunk {
    pub fn new(index: usize, range: Range<u64>) -> Self {
        Self { index, range }
    }

    /// 分片大小
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }
}

/// 分片规划结果
///
/// 纯计算，没有副作用；分片数量只在创建时计算一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// 文件总大小
    total_size: u64,
    /// 分片大小
    piece_size: u64,
    /// 分片数量
    chunk_count: usize,
}

impl ChunkPlan {
    /// 创建分片规划
    ///
    /// # 参数
    /// * `total_size` - 文件总大小
    /// * `piece_size` - 分片大小，必须大于 0
    pub fn new(total_size: u64, piece_size: u64) -> UploadResult<Self> {
        if piece_size == 0 {
            return Err(UploadError::invalid_argument("分片大小必须大于 0"));
        }

        let chunk_count = usize::try_from(total_size.div_ceil(piece_size)).map_err(|_| {
            UploadError::invalid_argument(format!(
                "分片数量超出范围: size={}, piece_size={}",
                total_size, piece_size
            ))
        })?;

        Ok(Self {
            total_size,
            piece_size,
            chunk_count,
        })
    }

    /// 使用默认分片大小创建
    pub fn with_default_piece_size(total_size: u64) -> UploadResult<Self> {
        Self::new(total_size, DEFAULT_PIECE_SIZE)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn piece_size(&self) -> u64 {
        self.piece_size
    }

    /// 获取分片数量
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// 获取指定分片的字节范围
    pub fn chunk_range(&self, index: usize) -> UploadResult<Range<u64>> {
        if index >= self.chunk_count {
            return Err(UploadError::invalid_argument(format!(
                "分片索引越界: index={}, chunk_count={}",
                index, self.chunk_count
            )));
        }

        Ok(self.range_of(index))
    }

    /// 字节范围计算，调用方保证索引有效
    fn range_of(&self, index: usize) -> Range<u64> {
        let start = index as u64 * self.piece_size;
        let end = std::cmp::min(self.total_size, start + self.piece_size);
        start..end
    }

    /// 获取指定分片
    pub fn chunk(&self, index: usize) -> UploadResult<UploadChunk> {
        Ok(UploadChunk::new(index, self.chunk_range(index)?))
    }

    /// 按索引升序遍历所有分片
    pub fn chunks(&self) -> impl Iterator<Item = UploadChunk> + '_ {
        (0..self.chunk_count).map(move |index| UploadChunk::new(index, self.range_of(index)))
    }
}
