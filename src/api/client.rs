// 上传接口 HTTP 客户端实现

use crate::api::{
    ApiResponse, ChunkUploadRequest, HttpStatusError, UploadAck, UploadApi, WholeUploadData,
    WholeUploadRequest,
};
use crate::config::ApiConfig;
use crate::uploader::{FileSource, RawFile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::{Body, Client};
use std::time::Duration;
use tracing::{debug, error, info};

/// 上传接口客户端
#[derive(Debug, Clone)]
pub struct HttpUploadClient {
    /// HTTP客户端
    client: Client,
    /// 接口配置
    config: ApiConfig,
}

impl HttpUploadClient {
    /// 创建新的上传客户端
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("创建 HTTP 客户端失败")?;

        info!("初始化上传客户端: base_url={}", config.base_url);

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// 发送表单并返回响应体
    ///
    /// 非 2xx 状态返回 `HttpStatusError`，供重试时按状态码分类
    async fn send_multipart(&self, url: &str, form: multipart::Form) -> Result<String> {
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("请求发送失败: {}", url))?;

        let status = response.status();
        let body = response.text().await.context("读取响应失败")?;

        if !status.is_success() {
            error!("请求失败: url={}, status={}, body={}", url, status, body);
            return Err(HttpStatusError {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(body)
    }

    /// 构造整文件表单的文件部分
    ///
    /// 本地文件以流的形式发送，不整体读入内存
    async fn file_part(file: &RawFile) -> Result<multipart::Part> {
        let part = match &file.source {
            FileSource::Path(path) => {
                let handle = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("无法打开文件: {:?}", path))?;
                multipart::Part::stream_with_length(Body::from(handle), file.size)
            }
            FileSource::Memory(data) => multipart::Part::bytes(data.as_ref().clone()),
        };

        Ok(part
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?)
    }
}

#[async_trait]
impl UploadApi for HttpUploadClient {
    async fn init_large_file(&self, identifier: &str) -> Result<UploadAck> {
        let url = self.config.endpoint(&self.config.init_path);
        info!("初始化大文件上传: uuid={}", identifier);

        let form = multipart::Form::new().text("uuid", identifier.to_string());
        let body = self
            .send_multipart(&url, form)
            .await
            .context("初始化大文件上传失败")?;

        debug!("初始化响应: uuid={}, body={}", identifier, body);
        Ok(UploadAck::new(body))
    }

    async fn upload_chunk(&self, request: ChunkUploadRequest<'_>) -> Result<UploadAck> {
        let url = self.config.endpoint(&self.config.chunk_path);
        let size = request.data.len();

        let part = multipart::Part::bytes(request.data)
            .file_name("blob")
            .mime_str("application/octet-stream")?;

        let mut form = multipart::Form::new()
            .text("uuid", request.identifier.to_string())
            .part("file", part)
            .text("index", request.index.to_string());
        if let Some(hash) = request.hash {
            form = form.text("hash", hash);
        }

        let body = self
            .send_multipart(&url, form)
            .await
            .with_context(|| format!("上传分片失败: part={}", request.index))?;

        debug!(
            "上传分片响应: uuid={}, part={}, size={}, body={}",
            request.identifier, request.index, size, body
        );
        Ok(UploadAck::new(body))
    }

    async fn upload_whole_file(&self, request: WholeUploadRequest<'_>) -> Result<WholeUploadData> {
        let url = self.config.endpoint(&self.config.whole_path);
        info!(
            "整文件上传: name={}, size={}",
            request.file.name, request.file.size
        );

        let form = multipart::Form::new()
            .part("file", Self::file_part(request.file).await?)
            .text("scene", request.metadata.scene.clone())
            .text("mediaType", request.metadata.media_type.clone());

        let body = self.send_multipart(&url, form).await?;

        let response: ApiResponse<WholeUploadData> = serde_json::from_str(&body)
            .with_context(|| format!("解析整文件上传响应失败: body={}", body))?;

        match response.data {
            Some(data) if response.is_success() => Ok(data),
            _ => anyhow::bail!(
                "整文件上传未返回数据: code={}, msg={}",
                response.code,
                response.msg
            ),
        }
    }
}
