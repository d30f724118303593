// 配置管理模块

use crate::api::WholeUploadMetadata;
use crate::uploader::{RetryPolicy, DEFAULT_PIECE_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 上传接口配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 文件标识来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    /// 使用外部提供的 uid（缺失时回退到内容哈希）
    Supplied,
    /// 总是使用内容哈希
    ContentHash,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 分片大小（字节）
    #[serde(default = "default_piece_size")]
    pub piece_size: u64,
    /// 匹配该正则的 MIME 类型走分片上传，其余整文件上传
    #[serde(default = "default_chunked_mime_pattern")]
    pub chunked_mime_pattern: String,
    /// 分片最大重试次数，不设置表示无限重试
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// 初始退避延迟（毫秒）
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// 最大退避延迟（毫秒）
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// 限流时的最小等待时间（毫秒）
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
    /// 文件标识来源
    #[serde(default = "default_identifier_source")]
    pub identifier_source: IdentifierSource,
}

fn default_piece_size() -> u64 {
    DEFAULT_PIECE_SIZE
}

fn default_chunked_mime_pattern() -> String {
    "video".to_string()
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_rate_limit_backoff_ms() -> u64 {
    10000
}

fn default_identifier_source() -> IdentifierSource {
    IdentifierSource::Supplied
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            piece_size: default_piece_size(),
            chunked_mime_pattern: default_chunked_mime_pattern(),
            max_retries: None,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            identifier_source: default_identifier_source(),
        }
    }
}

impl UploadConfig {
    /// 转换为分片重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
        }
    }
}

/// 上传接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 接口基础地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 大文件上传初始化路径
    #[serde(default = "default_init_path")]
    pub init_path: String,
    /// 分片上传路径
    #[serde(default = "default_chunk_path")]
    pub chunk_path: String,
    /// 整文件上传路径
    #[serde(default = "default_whole_path")]
    pub whole_path: String,
    /// 整文件上传的业务场景
    #[serde(default = "default_scene")]
    pub scene: String,
    /// 整文件上传的媒体类型
    #[serde(default = "default_media_type")]
    pub media_type: String,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_init_path() -> String {
    "/upload/large/init".to_string()
}

fn default_chunk_path() -> String {
    "/upload/large/part".to_string()
}

fn default_whole_path() -> String {
    "/upload/single".to_string()
}

fn default_scene() -> String {
    "feed".to_string()
}

fn default_media_type() -> String {
    "image".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            init_path: default_init_path(),
            chunk_path: default_chunk_path(),
            whole_path: default_whole_path(),
            scene: default_scene(),
            media_type: default_media_type(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// 整文件上传元数据
    pub fn whole_upload_metadata(&self) -> WholeUploadMetadata {
        WholeUploadMetadata {
            scene: self.scene.clone(),
            media_type: self.media_type.clone(),
        }
    }

    /// 拼接完整接口地址
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config: AppConfig = toml::from_str(&content).context("解析配置文件失败")?;
        config.validate().context("配置校验失败")?;

        Ok(config)
    }

    /// 加载配置，文件不存在时使用默认配置
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from_file(path).await
        } else {
            tracing::info!("配置文件不存在，使用默认配置: {:?}", path);
            Ok(Self::default())
        }
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        // 确保父目录存在
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("创建配置目录失败")?;
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("写入配置文件失败: {:?}", path))?;

        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.upload.piece_size == 0 {
            anyhow::bail!("upload.piece_size 必须大于 0");
        }
        regex::Regex::new(&self.upload.chunked_mime_pattern).with_context(|| {
            format!(
                "upload.chunked_mime_pattern 不是合法的正则: {}",
                self.upload.chunked_mime_pattern
            )
        })?;
        if self.upload.initial_backoff_ms > self.upload.max_backoff_ms {
            anyhow::bail!("upload.initial_backoff_ms 不能大于 upload.max_backoff_ms");
        }
        if self.api.base_url.trim().is_empty() {
            anyhow::bail!("api.base_url 不能为空");
        }
        Ok(())
    }
}
