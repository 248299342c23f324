use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 下载任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// 已接受，等待槽位
    Queued,
    /// 占用槽位，传输中
    Downloading,
    /// 已完成
    Completed,
    /// 失败
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// 是否为终态（终态不会再被重试或修改）
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// 检查状态迁移是否合法
    ///
    /// queued -> downloading -> completed | error，queued 也可直接进入 error
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Downloading)
                | (JobStatus::Queued, JobStatus::Error)
                | (JobStatus::Downloading, JobStatus::Completed)
                | (JobStatus::Downloading, JobStatus::Error)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状态迁移时附带更新的字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFields {
    pub error: Option<String>,
    pub result_filename: Option<String>,
}

impl JobFields {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn completed(filename: impl Into<String>) -> Self {
        Self {
            error: None,
            result_filename: Some(filename.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            result_filename: None,
        }
    }
}

/// 下载任务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// 任务ID（每次下载请求新生成）
    pub id: String,
    /// 源地址
    pub url: String,
    /// 由 URL 推导出的目标文件名
    pub filename: String,
    /// 任务状态
    pub status: JobStatus,
    /// 错误信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 完成后实际写入的文件名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_filename: Option<String>,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
    /// 开始传输时间 (Unix timestamp)
    pub started_at: Option<i64>,
    /// 结束时间 (Unix timestamp)
    pub finished_at: Option<i64>,
}

impl Job {
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: format!("dl-{}", Uuid::new_v4()),
            url: url.into(),
            filename: filename.into(),
            status: JobStatus::Queued,
            error: None,
            result_filename: None,
            created_at: chrono::Utc::now().timestamp(),
            started_at: None,
            finished_at: None,
        }
    }

    /// 应用状态迁移（调用方负责校验合法性）
    pub(crate) fn apply(&mut self, status: JobStatus, fields: JobFields) {
        let now = chrono::Utc::now().timestamp();
        self.status = status;
        match status {
            JobStatus::Downloading => {
                self.started_at.get_or_insert(now);
            }
            JobStatus::Completed | JobStatus::Error => {
                self.finished_at = Some(now);
            }
            JobStatus::Queued => {}
        }
        if fields.error.is_some() {
            self.error = fields.error;
        }
        if fields.result_filename.is_some() {
            self.result_filename = fields.result_filename;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let a = Job::new("https://cdn.example/a.nsp", "a.nsp");
        let b = Job::new("https://cdn.example/a.nsp", "a.nsp");

        assert_eq!(a.status, JobStatus::Queued);
        assert!(a.id.starts_with("dl-"));
        assert_ne!(a.id, b.id);
        assert!(a.started_at.is_none());
    }

    #[test]
    fn test_status_transitions() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Downloading));
        assert!(Queued.can_transition_to(Error));
        assert!(Downloading.can_transition_to(Completed));
        assert!(Downloading.can_transition_to(Error));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Error));
        assert!(!Error.can_transition_to(Downloading));
        assert!(!Downloading.can_transition_to(Queued));
    }

    #[test]
    fn test_apply_sets_timestamps_and_fields() {
        let mut job = Job::new("https://cdn.example/a.nsp", "a.nsp");

        job.apply(JobStatus::Downloading, JobFields::none());
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_none());

        job.apply(JobStatus::Error, JobFields::failed("connection reset"));
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("connection reset"));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&JobStatus::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
    }
}
