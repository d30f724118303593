// 上传管理器
//
// 负责一个批次的上传：
// - 批次开始时为每个文件生成描述（分类、唯一标识）
// - 按输入顺序逐个上传，前一个文件结束后才开始下一个
// - 进度通过调用方回调通知

use crate::api::UploadApi;
use crate::config::{AppConfig, IdentifierSource};
use crate::error::UploadResult;
use crate::uploader::{
    ContentHasher, FileClassifier, FileDescriptor, Md5ContentHasher, ProgressUpdate, RawFile,
    RetryPolicy, UploadEngine,
};
use std::sync::Arc;
use tracing::info;

/// 批次状态
///
/// 文件列表和当前游标，批次结束后丢弃
#[derive(Debug)]
pub struct BatchState {
    files: Vec<FileDescriptor>,
    cursor: usize,
}

impl BatchState {
    pub fn new(files: Vec<FileDescriptor>) -> Self {
        Self { files, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    /// 当前文件，全部处理完后为 None
    pub fn current_mut(&mut self) -> Option<&mut FileDescriptor> {
        self.files.get_mut(self.cursor)
    }

    /// 移到下一个文件
    pub fn advance(&mut self) {
        if self.cursor < self.files.len() {
            self.cursor += 1;
        }
    }

    pub fn into_files(self) -> Vec<FileDescriptor> {
        self.files
    }
}

/// 上传管理器
#[derive(Clone)]
pub struct UploadManager {
    /// 上传引擎
    engine: UploadEngine,
    /// 文件分类器
    classifier: FileClassifier,
    /// 唯一标识来源
    identifier_source: IdentifierSource,
    /// 内容哈希（生成唯一标识用）
    hasher: Arc<dyn ContentHasher>,
}

impl UploadManager {
    /// 使用默认设置创建
    pub fn new(api: Arc<dyn UploadApi>) -> Self {
        Self {
            engine: UploadEngine::new(api),
            classifier: FileClassifier::default(),
            identifier_source: IdentifierSource::Supplied,
            hasher: Arc::new(Md5ContentHasher),
        }
    }

    /// 根据配置创建
    pub fn from_config(api: Arc<dyn UploadApi>, config: &AppConfig) -> UploadResult<Self> {
        let engine = UploadEngine::with_retry_policy(api, config.upload.retry_policy())
            .with_piece_size(config.upload.piece_size)
            .with_whole_metadata(config.api.whole_upload_metadata());

        Ok(Self {
            engine,
            classifier: FileClassifier::from_pattern(&config.upload.chunked_mime_pattern)?,
            identifier_source: config.upload.identifier_source,
            hasher: Arc::new(Md5ContentHasher),
        })
    }

    pub fn with_classifier(mut self, classifier: FileClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.engine.set_retry_policy(retry_policy);
        self
    }

    pub fn with_piece_size(mut self, piece_size: u64) -> Self {
        self.engine = self.engine.with_piece_size(piece_size);
        self
    }

    pub fn with_identifier_source(mut self, identifier_source: IdentifierSource) -> Self {
        self.identifier_source = identifier_source;
        self
    }

    /// 分片上传时附带分片 MD5
    pub fn with_chunk_hashes(mut self) -> Self {
        self.engine = self.engine.with_chunk_hasher(self.hasher.clone());
        self
    }

    pub fn engine(&self) -> &UploadEngine {
        &self.engine
    }

    /// 生成唯一标识
    async fn identifier_for(&self, file: &RawFile) -> UploadResult<String> {
        match (&self.identifier_source, &file.uid) {
            (IdentifierSource::Supplied, Some(uid)) => Ok(uid.clone()),
            _ => self.hasher.hash_file(file).await,
        }
    }

    /// 为一批文件生成描述，顺序与输入一致
    pub async fn build_descriptors(
        &self,
        files: impl IntoIterator<Item = RawFile>,
    ) -> UploadResult<Vec<FileDescriptor>> {
        let mut descriptors = Vec::new();
        for file in files {
            let identifier = self.identifier_for(&file).await?;
            let kind = self.classifier.classify(&file.mime_type);
            descriptors.push(FileDescriptor::new(file, identifier, kind));
        }
        Ok(descriptors)
    }

    /// 批量上传
    ///
    /// 文件严格按输入顺序上传，任一文件失败时批次停止并返回错误。
    /// 空输入直接返回，不发出任何请求
    pub async fn upload_by_pieces<F>(
        &self,
        files: impl IntoIterator<Item = RawFile>,
        progress: F,
    ) -> UploadResult<()>
    where
        F: Fn(&ProgressUpdate, &FileDescriptor) + Send + Sync,
    {
        let mut batch = BatchState::new(self.build_descriptors(files).await?);
        if batch.is_empty() {
            return Ok(());
        }

        info!("开始批量上传: {} 个文件", batch.len());

        while let Some(descriptor) = batch.current_mut() {
            self.engine.upload_file(descriptor, &progress).await?;
            batch.advance();
        }

        info!("批量上传完成: {} 个文件", batch.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::testing::{Event, MockUploadApi};
    use crate::uploader::FileKind;

    fn video(name: &str, size: usize) -> RawFile {
        RawFile::from_bytes(name, "video/mp4", vec![1u8; size]).with_uid(format!("uid-{}", name))
    }

    fn image(name: &str, size: usize) -> RawFile {
        RawFile::from_bytes(name, "image/png", vec![2u8; size]).with_uid(format!("uid-{}", name))
    }

    fn manager(api: &MockUploadApi) -> UploadManager {
        UploadManager::new(Arc::new(api.clone())).with_retry_policy(RetryPolicy::immediate())
    }

    #[tokio::test]
    async fn test_video_then_image() {
        let api = MockUploadApi::new();
        api.fail_chunk("uid-a.mp4", 1, 1);

        manager(&api)
            .upload_by_pieces(
                vec![video("a.mp4", 12_000_000), image("b.png", 100)],
                api.recorder(),
            )
            .await
            .unwrap();

        let events = api.events();
        let last_video_progress = events
            .iter()
            .position(|e| matches!(e, Event::Progress { name, percent: 100, .. } if name == "a.mp4"))
            .unwrap();
        let whole_call = events
            .iter()
            .position(|e| matches!(e, Event::Whole { .. }))
            .unwrap();

        assert!(whole_call > last_video_progress);
        assert_eq!(api.chunk_calls("uid-a.mp4"), vec![0, 1, 1, 2]);
        assert_eq!(api.percents("a.mp4"), vec![34, 67, 100]);
        assert_eq!(api.percents("b.png"), vec![100]);
    }

    #[tokio::test]
    async fn test_files_uploaded_in_input_order() {
        let api = MockUploadApi::new();

        manager(&api)
            .with_piece_size(4)
            .upload_by_pieces(
                vec![video("1.mp4", 9), video("2.mp4", 4), video("3.mp4", 1)],
                api.recorder(),
            )
            .await
            .unwrap();

        let inits: Vec<String> = api
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Init { identifier } => Some(identifier),
                _ => None,
            })
            .collect();
        assert_eq!(inits, vec!["uid-1.mp4", "uid-2.mp4", "uid-3.mp4"]);
        assert_eq!(api.percents("1.mp4"), vec![34, 67, 100]);
        assert_eq!(api.percents("2.mp4"), vec![100]);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let api = MockUploadApi::new();

        manager(&api)
            .upload_by_pieces(Vec::<RawFile>::new(), api.recorder())
            .await
            .unwrap();

        assert!(api.events().is_empty());
    }

    #[tokio::test]
    async fn test_content_hash_identifier() {
        let api = MockUploadApi::new();
        let file = RawFile::from_bytes("c.mp4", "video/mp4", b"hello".to_vec());

        manager(&api)
            .with_identifier_source(IdentifierSource::ContentHash)
            .upload_by_pieces(vec![file.with_uid("ignored")], api.recorder())
            .await
            .unwrap();

        assert_eq!(
            api.chunk_calls("5d41402abc4b2a76b9719d911017c592"),
            vec![0]
        );
    }

    #[tokio::test]
    async fn test_missing_uid_falls_back_to_hash() {
        let api = MockUploadApi::new();
        let descriptors = manager(&api)
            .build_descriptors(vec![
                RawFile::from_bytes("d.mp4", "video/mp4", b"hello".to_vec()),
                image("e.png", 1),
            ])
            .await
            .unwrap();

        assert_eq!(descriptors[0].identifier(), "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(descriptors[0].kind(), FileKind::Chunked);
        assert_eq!(descriptors[1].identifier(), "uid-e.png");
        assert_eq!(descriptors[1].kind(), FileKind::Whole);
    }

    #[tokio::test]
    async fn test_failure_stops_batch() {
        let api = MockUploadApi::new();
        api.fail_init();

        let err = manager(&api)
            .upload_by_pieces(vec![video("a.mp4", 10), image("b.png", 10)], api.recorder())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::error::UploadError::SessionInit { .. }));
        assert!(!api
            .events()
            .iter()
            .any(|e| matches!(e, Event::Whole { .. })));
    }

    #[tokio::test]
    async fn test_image_whole_classifier() {
        let api = MockUploadApi::new();

        manager(&api)
            .with_classifier(FileClassifier::image_whole())
            .upload_by_pieces(
                vec![RawFile::from_bytes("doc.pdf", "application/pdf", vec![0u8; 3]).with_uid("pdf")],
                api.recorder(),
            )
            .await
            .unwrap();

        assert_eq!(api.chunk_calls("pdf"), vec![0]);
    }

    #[tokio::test]
    async fn test_from_config() {
        let api = MockUploadApi::new();
        let mut config = AppConfig::default();
        config.upload.piece_size = 2;
        config.upload.chunked_mime_pattern = "^application/".to_string();
        config.upload.max_retries = Some(0);
        config.api.scene = "album".to_string();

        let manager = UploadManager::from_config(Arc::new(api.clone()), &config).unwrap();
        assert_eq!(manager.engine().piece_size(), 2);

        manager
            .upload_by_pieces(
                vec![
                    RawFile::from_bytes("a.bin", "application/zip", vec![0u8; 5]).with_uid("zip"),
                    RawFile::from_bytes("v.mp4", "video/mp4", vec![0u8; 5]).with_uid("mp4"),
                ],
                api.recorder(),
            )
            .await
            .unwrap();

        assert_eq!(api.chunk_calls("zip"), vec![0, 1, 2]);
        assert!(api.events().contains(&Event::Whole {
            name: "v.mp4".to_string(),
            scene: "album".to_string(),
            media_type: "image".to_string(),
        }));

        config.upload.chunked_mime_pattern = "(".to_string();
        assert!(UploadManager::from_config(Arc::new(api), &config).is_err());
    }

    #[test]
    fn test_batch_state_cursor() {
        let files = vec![
            FileDescriptor::new(
                RawFile::from_bytes("a", "video/mp4", vec![]),
                "a".to_string(),
                FileKind::Chunked,
            ),
            FileDescriptor::new(
                RawFile::from_bytes("b", "image/png", vec![]),
                "b".to_string(),
                FileKind::Whole,
            ),
        ];
        let mut batch = BatchState::new(files);

        assert_eq!(batch.current_mut().map(|d| d.name().to_string()), Some("a".to_string()));
        batch.advance();
        assert_eq!(batch.current_mut().map(|d| d.name().to_string()), Some("b".to_string()));
        batch.advance();
        assert!(batch.current_mut().is_none());
        batch.advance();
        assert_eq!(batch.cursor(), 2);
    }
}
