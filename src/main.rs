use anyhow::{Context, Result};
use piece_upload_rust::{
    config::DEFAULT_CONFIG_PATH, logging, AppConfig, HttpUploadClient, RawFile, UploadManager,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await?;

    // 初始化日志系统（守卫需要保持到程序结束）
    let _log_guard = logging::init_logging(&config.log);

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("用法: piece-upload <文件>...");
        std::process::exit(2);
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = RawFile::from_path(path)
            .await
            .with_context(|| format!("无法打开文件: {}", path))?;
        info!(
            "待上传: {} ({}, {} bytes)",
            file.name, file.mime_type, file.size
        );
        files.push(file);
    }

    info!("上传服务地址: {}", config.api.base_url);

    let client = HttpUploadClient::new(config.api.clone())?;
    let manager = UploadManager::from_config(Arc::new(client), &config)?;

    let result = manager
        .upload_by_pieces(files, |update, _descriptor| {
            match (&update.url, update.is_complete()) {
                (Some(url), _) => info!("✓ {} 上传完成: {}", update.name, url),
                (None, true) => info!("✓ {} 上传完成", update.name),
                (None, false) => info!(
                    "{} 上传中: {}% ({}/{})",
                    update.name, update.percent, update.finish_count, update.chunk_count
                ),
            }
        })
        .await;

    if let Err(e) = result {
        error!("批量上传失败: {}", e);
        return Err(e.into());
    }

    info!("全部 {} 个文件上传完成", paths.len());
    Ok(())
}
