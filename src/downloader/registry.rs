//! 任务注册表
//!
//! 进程内的 job_id -> Job 映射。按分片加锁，不同任务可并发修改；
//! 同一任务同一时刻只有一个写入方，单条记录按最后写入为准。

use crate::downloader::{Job, JobFields, JobStatus};
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

/// 注册表操作错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("任务不存在: {0}")]
    NotFound(String),
    #[error("非法状态迁移: {job_id} {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

/// 任务注册表
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记任务，返回任务ID
    pub fn create(&self, job: Job) -> String {
        let id = job.id.clone();
        debug!("登记任务: {} ({})", id, job.url);
        self.jobs.insert(id.clone(), job);
        id
    }

    /// 迁移任务状态，返回迁移后的快照
    pub fn transition(
        &self,
        job_id: &str,
        status: JobStatus,
        fields: JobFields,
    ) -> Result<Job, RegistryError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| RegistryError::NotFound(job_id.to_string()))?;

        if !entry.status.can_transition_to(status) {
            return Err(RegistryError::InvalidTransition {
                job_id: job_id.to_string(),
                from: entry.status,
                to: status,
            });
        }

        debug!("任务状态迁移: {} {} -> {}", job_id, entry.status, status);
        entry.apply(status, fields);
        Ok(entry.clone())
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    /// 所有任务，按创建时间倒序
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|j| j.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status == status).count()
    }

    /// 其他正在写入同名文件的任务ID
    pub fn downloading_with_filename(&self, filename: &str, except_id: &str) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| {
                j.status == JobStatus::Downloading && j.filename == filename && j.id != except_id
            })
            .map(|j| j.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
