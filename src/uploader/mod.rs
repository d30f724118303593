// 上传引擎模块
//
// 顺序分片上传：
// - 视频等大文件按固定大小分片，逐个上传
// - 其余文件整文件一次上传
// - 分片失败按重试策略重传
// - 进度通过回调通知

pub mod chunk;
pub mod classifier;
pub mod engine;
pub mod hash;
pub mod manager;
pub mod progress;
pub mod retry;
pub mod task;

#[cfg(test)]
pub mod testing;

pub use chunk::{ChunkPlan, UploadChunk, DEFAULT_PIECE_SIZE};
pub use classifier::FileClassifier;
pub use engine::{ChunkOutcome, ChunkUploader, UploadEngine};
pub use hash::{ContentHasher, Md5ContentHasher};
pub use manager::{BatchState, UploadManager};
pub use progress::{calculate_progress_percent, ProgressCallback, ProgressUpdate};
pub use retry::RetryPolicy;
pub use task::{guess_mime_type, FileDescriptor, FileKind, FileSource, FileUploadStatus, RawFile};
