// 测试用上传接口
//
// 按顺序记录所有接口调用和进度回调，可以让指定分片先失败若干次

use crate::api::{
    ChunkUploadRequest, UploadAck, UploadApi, WholeUploadData, WholeUploadRequest,
};
use crate::uploader::{FileDescriptor, ProgressUpdate};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 时间线事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Init {
        identifier: String,
    },
    Chunk {
        identifier: String,
        index: usize,
        size: usize,
        hash: Option<String>,
    },
    Whole {
        name: String,
        scene: String,
        media_type: String,
    },
    Progress {
        name: String,
        percent: u8,
        url: Option<String>,
        filename: Option<String>,
    },
}

#[derive(Default)]
struct MockState {
    events: Vec<Event>,
    /// (identifier, index) -> 剩余失败次数
    chunk_failures: HashMap<(String, usize), u32>,
    fail_init: bool,
    fail_whole: bool,
    empty_ack_once: bool,
}

/// 记录调用的上传接口
#[derive(Clone, Default)]
pub struct MockUploadApi {
    state: Arc<Mutex<MockState>>,
}

impl MockUploadApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定分片先失败 `times` 次
    pub fn fail_chunk(&self, identifier: &str, index: usize, times: u32) {
        self.state
            .lock()
            .unwrap()
            .chunk_failures
            .insert((identifier.to_string(), index), times);
    }

    pub fn fail_init(&self) {
        self.state.lock().unwrap().fail_init = true;
    }

    pub fn fail_whole(&self) {
        self.state.lock().unwrap().fail_whole = true;
    }

    /// 下一次分片上传返回空确认
    pub fn empty_ack_once(&self) {
        self.state.lock().unwrap().empty_ack_once = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// 进度回调，写入同一条时间线
    pub fn recorder(&self) -> impl Fn(&ProgressUpdate, &FileDescriptor) + Send + Sync {
        let state = self.state.clone();
        move |update, _descriptor| {
            state.lock().unwrap().events.push(Event::Progress {
                name: update.name.clone(),
                percent: update.percent,
                url: update.url.clone(),
                filename: update.filename.clone(),
            });
        }
    }

    pub fn chunk_calls(&self, identifier: &str) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Chunk {
                    identifier: id,
                    index,
                    ..
                } if id == identifier => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn percents(&self, name: &str) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress {
                    name: n, percent, ..
                } if n == name => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn api_call_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| !matches!(e, Event::Progress { .. }))
            .count()
    }
}

#[async_trait]
impl UploadApi for MockUploadApi {
    async fn init_large_file(&self, identifier: &str) -> Result<UploadAck> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Init {
            identifier: identifier.to_string(),
        });
        if state.fail_init {
            anyhow::bail!("HTTP 500: init failed");
        }
        Ok(UploadAck::new("{\"code\":0}"))
    }

    async fn upload_chunk(&self, request: ChunkUploadRequest<'_>) -> Result<UploadAck> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Chunk {
            identifier: request.identifier.to_string(),
            index: request.index,
            size: request.data.len(),
            hash: request.hash.clone(),
        });

        let key = (request.identifier.to_string(), request.index);
        if let Some(remaining) = state.chunk_failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                anyhow::bail!("connection reset by peer");
            }
        }
        if state.empty_ack_once {
            state.empty_ack_once = false;
            return Ok(UploadAck::default());
        }
        Ok(UploadAck::new("{\"code\":0}"))
    }

    async fn upload_whole_file(&self, request: WholeUploadRequest<'_>) -> Result<WholeUploadData> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Whole {
            name: request.file.name.clone(),
            scene: request.metadata.scene.clone(),
            media_type: request.metadata.media_type.clone(),
        });
        if state.fail_whole {
            anyhow::bail!("HTTP 400: rejected");
        }
        Ok(WholeUploadData {
            url: Some(format!("https://cdn.example.com/{}", request.file.name)),
            filename: Some(format!("srv-{}", request.file.name)),
        })
    }
}
