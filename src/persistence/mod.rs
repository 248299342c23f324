//! 任务记录持久化模块
//!
//! 任务状态变更以 best-effort 方式写入文档存储（按任务ID upsert）：
//! - `JobStore`: 文档存储抽象
//! - `CouchJobStore`: CouchDB 实现
//! - `PersistenceWriter`: 后台写入任务，保证同一任务的写入顺序，失败只记日志
//!
//! 持久化失败永远不会中断或回滚传输。

pub mod couch;
pub mod writer;

use crate::downloader::Job;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use couch::CouchJobStore;
pub use writer::PersistenceWriter;

/// 持久化错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("文档存储请求失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("文档存储返回异常状态码 {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("文档格式错误: {0}")]
    Format(String),
}

/// 写入文档存储的任务记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDocument {
    pub status: String,
    pub url: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC3339
    pub updated_at: String,
}

impl From<&Job> for JobDocument {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status.as_str().to_string(),
            url: job.url.clone(),
            filename: job.filename.clone(),
            file: job.result_filename.clone(),
            error: job.error.clone(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// 文档存储
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// 按任务ID插入或合并更新
    async fn upsert(&self, job_id: &str, doc: &JobDocument) -> Result<(), PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::{JobFields, JobStatus};

    #[test]
    fn test_document_from_job() {
        let mut job = Job::new("https://cdn.example/a.nsp", "a.nsp");
        job.apply(JobStatus::Downloading, JobFields::none());
        job.apply(JobStatus::Completed, JobFields::completed("a.nsp"));

        let doc = JobDocument::from(&job);
        assert_eq!(doc.status, "completed");
        assert_eq!(doc.file.as_deref(), Some("a.nsp"));
        assert!(doc.error.is_none());

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["url"], "https://cdn.example/a.nsp");
    }
}
