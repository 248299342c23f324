//! 传输引擎
//!
//! 单文件流式下载：边读边写盘，按百分比上报进度。
//! 任何网络或磁盘错误都会终止传输，已写入的部分文件保留原样。

use crate::config::DownloadConfig;
use crate::downloader::progress::{JobEvent, PercentTracker, ProgressEvent, ProgressSink};
use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// 文件名中不允许出现的字符
pub const FORBIDDEN_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// 最大重定向次数
const MAX_REDIRECTS: usize = 10;

/// 传输错误
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("无法从 URL 推导文件名: {0}")]
    InvalidFilename(String),
    #[error("创建下载目录失败 {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("下载请求失败: {0}")]
    Request(#[source] reqwest::Error),
    #[error("服务器返回异常状态码: {0}")]
    Status(reqwest::StatusCode),
    #[error("读取数据流失败: {0}")]
    Stream(#[source] reqwest::Error),
    #[error("写入文件失败 {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("传输任务异常终止: {0}")]
    Aborted(String),
    #[error("HTTP 客户端初始化失败: {0}")]
    Client(#[source] reqwest::Error),
}

/// 取 URL 最后一段路径并去掉查询串
pub fn raw_filename_from_url(url: &str) -> &str {
    let last = url.rsplit('/').next().unwrap_or("");
    last.split('?').next().unwrap_or("")
}

/// 将文件系统不安全字符逐个替换为 `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// 由 URL 推导目标文件名
pub fn filename_from_url(url: &str) -> String {
    sanitize_filename(raw_filename_from_url(url))
}

/// 传输引擎
#[derive(Debug, Clone)]
pub struct TransferEngine {
    client: Client,
}

impl TransferEngine {
    pub fn new(config: &DownloadConfig) -> Result<Self, TransferError> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .tcp_nodelay(true);

        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }

        let client = builder.build().map_err(TransferError::Client)?;
        Ok(Self { client })
    }

    /// 执行一次下载，成功时返回写入的文件名
    pub async fn run(
        &self,
        job_id: &str,
        url: &str,
        destination_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<String, TransferError> {
        // 1. 文件名
        let filename = filename_from_url(url);
        if filename.is_empty() {
            return Err(TransferError::InvalidFilename(url.to_string()));
        }

        // 2. 目录（幂等）
        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(|source| TransferError::CreateDir {
                path: destination_dir.to_path_buf(),
                source,
            })?;
        let path = destination_dir.join(&filename);

        // 3. 发起请求，读取声明大小
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(TransferError::Request)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransferError::Status(status));
        }
        let total = declared_length(&resp);

        info!(
            "开始下载: job={}, file={}, 声明大小={} bytes",
            job_id, filename, total
        );

        let mut file = File::create(&path)
            .await
            .map_err(|source| TransferError::Write {
                path: path.clone(),
                source,
            })?;

        // 4/5/6. 逐块写盘并上报进度
        let mut tracker = PercentTracker::new(total);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(TransferError::Stream)?;

            file.write_all(&chunk)
                .await
                .map_err(|source| TransferError::Write {
                    path: path.clone(),
                    source,
                })?;

            if let Some(percent) = tracker.advance(chunk.len() as u64) {
                sink.emit(JobEvent::Progress(ProgressEvent {
                    job_id: job_id.to_string(),
                    percent,
                    filename: filename.clone(),
                }));
            }
        }

        file.flush().await.map_err(|source| TransferError::Write {
            path: path.clone(),
            source,
        })?;

        if total > 0 && tracker.downloaded() != total {
            warn!(
                "下载字节数与声明大小不一致: job={}, 实际={}, 声明={}",
                job_id,
                tracker.downloaded(),
                total
            );
        }
        debug!("下载完成: job={}, {:?}, {} bytes", job_id, path, tracker.downloaded());

        Ok(filename)
    }
}

/// 解析 Content-Length，缺失或非整数时为 0
fn declared_length(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0)
}
