// 上传进度
//
// 进度只通过调用方提供的回调向上传递，不通过返回值

use crate::uploader::{FileDescriptor, FileKind};
use serde::Serialize;

/// 进度回调
///
/// 同一文件的 percent 单调不减，完成时恰好为 100
pub type ProgressCallback<'a> = &'a (dyn Fn(&ProgressUpdate, &FileDescriptor) + Send + Sync);

/// 一次进度通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// 进度百分比 0-100
    pub percent: u8,
    /// 文件名
    pub name: String,
    /// 文件唯一标识
    pub identifier: String,
    /// 上传方式
    pub kind: FileKind,
    /// 已完成分片数
    pub finish_count: usize,
    /// 总分片数
    pub chunk_count: usize,
    /// 服务器返回的文件地址（仅整文件上传）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 服务器返回的文件名（仅整文件上传）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ProgressUpdate {
    /// 根据描述当前状态生成进度
    pub fn from_descriptor(descriptor: &FileDescriptor) -> Self {
        Self {
            percent: calculate_progress_percent(
                descriptor.finish_count(),
                descriptor.chunk_count(),
            ),
            name: descriptor.name().to_string(),
            identifier: descriptor.identifier().to_string(),
            kind: descriptor.kind(),
            finish_count: descriptor.finish_count(),
            chunk_count: descriptor.chunk_count(),
            url: None,
            filename: None,
        }
    }

    /// 已完成通知（固定 100）
    pub fn completed(descriptor: &FileDescriptor) -> Self {
        Self {
            percent: 100,
            ..Self::from_descriptor(descriptor)
        }
    }

    /// 附加服务器返回的地址和文件名
    pub fn with_location(mut self, url: Option<String>, filename: Option<String>) -> Self {
        self.url = url;
        self.filename = filename;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.percent == 100
    }
}

/// 计算进度百分比
///
/// percent = min(ceil(finish / total * 100), 100)，总数为 0 时视为完成
pub fn calculate_progress_percent(finish_count: usize, chunk_count: usize) -> u8 {
    if chunk_count == 0 {
        return 100;
    }
    let percent = (finish_count as u64 * 100).div_ceil(chunk_count as u64);
    percent.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::RawFile;

    #[test]
    fn test_three_chunk_percents() {
        assert_eq!(calculate_progress_percent(0, 3), 0);
        assert_eq!(calculate_progress_percent(1, 3), 34);
        assert_eq!(calculate_progress_percent(2, 3), 67);
        assert_eq!(calculate_progress_percent(3, 3), 100);
    }

    #[test]
    fn test_percent_capped() {
        assert_eq!(calculate_progress_percent(5, 3), 100);
        assert_eq!(calculate_progress_percent(0, 0), 100);
        assert_eq!(calculate_progress_percent(1, 1), 100);
    }

    #[test]
    fn test_percent_monotonic() {
        for total in 1..200usize {
            let mut last = 0;
            for finish in 0..=total {
                let p = calculate_progress_percent(finish, total);
                assert!(p >= last);
                last = p;
            }
            assert_eq!(last, 100);
        }
    }

    #[test]
    fn test_update_from_descriptor() {
        let file = RawFile::from_bytes("a.png", "image/png", vec![1, 2, 3]);
        let mut descriptor = FileDescriptor::new(file, "id".to_string(), FileKind::Whole);
        descriptor.assign_chunk_count(1).unwrap();
        descriptor.record_finished().unwrap();

        let update = ProgressUpdate::from_descriptor(&descriptor)
            .with_location(Some("https://cdn/a.png".to_string()), Some("a.png".to_string()));
        assert_eq!(update.percent, 100);
        assert!(update.is_complete());
        assert_eq!(update.kind, FileKind::Whole);
        assert_eq!(update.url.as_deref(), Some("https://cdn/a.png"));
    }
}
