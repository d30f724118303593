// Piece Upload Rust Library
// 顺序分片上传核心库

// 上传接口模块
pub mod api;

// 配置管理模块
pub mod config;

// 错误定义
pub mod error;

// 日志模块
pub mod logging;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use api::{HttpUploadClient, UploadApi};
pub use config::AppConfig;
pub use error::{UploadError, UploadResult};
pub use uploader::{
    FileClassifier, FileDescriptor, FileKind, ProgressUpdate, RawFile, RetryPolicy, UploadEngine,
    UploadManager,
};
