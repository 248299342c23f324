use crate::config::DownloadConfig;
use crate::downloader::{
    filename_from_url, AdmissionController, Job, JobEvent, JobFields, JobRegistry, JobStatus,
    ProgressSink, TransferEngine, TransferError,
};
use crate::persistence::PersistenceWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 下载管理器
///
/// 串起注册表、准入控制、传输引擎和持久化：
/// 1. `create_job` 登记 queued 任务
/// 2. `submit` 派发后台任务，拿到槽位后进入 downloading
/// 3. 传输结果统一经 `finish` 更新注册表、写持久化并推送终态事件
#[derive(Debug)]
pub struct DownloadManager {
    registry: Arc<JobRegistry>,
    admission: Arc<AdmissionController>,
    engine: Arc<TransferEngine>,
    download_dir: PathBuf,
    persistence: Option<PersistenceWriter>,
}

impl DownloadManager {
    pub fn new(
        config: &DownloadConfig,
        registry: Arc<JobRegistry>,
        persistence: Option<PersistenceWriter>,
    ) -> Result<Self, TransferError> {
        let engine = TransferEngine::new(config)?;

        info!(
            "创建下载管理器: 下载目录={:?}, 最大同时下载数={}, 持久化={}",
            config.download_dir,
            config.max_concurrent_tasks,
            persistence.is_some()
        );

        Ok(Self {
            registry,
            admission: Arc::new(AdmissionController::new(config.max_concurrent_tasks)),
            engine: Arc::new(engine),
            download_dir: config.download_dir.clone(),
            persistence,
        })
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    /// 为 URL 新建任务并登记为 queued
    pub fn create_job(&self, url: &str) -> Job {
        let job = Job::new(url, filename_from_url(url));
        self.registry.create(job.clone());
        self.persist(&job);
        info!("任务已排队: {} -> {:?}", job.id, job.filename);
        job
    }

    /// 提交任务，立即返回；槽位等待和传输都在后台任务中进行
    pub fn submit(self: &Arc<Self>, job: Job, sink: Arc<dyn ProgressSink>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run_job(job, sink).await })
    }

    async fn run_job(self: Arc<Self>, job: Job, sink: Arc<dyn ProgressSink>) {
        let permit = match self.admission.acquire(&job.id).await {
            Ok(permit) => permit,
            Err(e) => {
                self.finish(&job, Err(TransferError::Aborted(e.to_string())), sink.as_ref());
                return;
            }
        };

        match self
            .registry
            .transition(&job.id, JobStatus::Downloading, JobFields::none())
        {
            Ok(snapshot) => self.persist(&snapshot),
            Err(e) => {
                warn!("任务无法进入下载状态，跳过: {}", e);
                return;
            }
        }

        let clashes = self
            .registry
            .downloading_with_filename(&job.filename, &job.id);
        if !clashes.is_empty() {
            warn!(
                "⚠️ 同名文件已有任务在写入: job={}, file={}, 其他任务={:?}",
                job.id, job.filename, clashes
            );
        }

        // 传输放在独立任务里执行，panic 会以 JoinError 的形式回到这里
        let engine = Arc::clone(&self.engine);
        let dir = self.download_dir.clone();
        let job_id = job.id.clone();
        let url = job.url.clone();
        let transfer_sink = Arc::clone(&sink);
        let handle = tokio::spawn(async move {
            engine.run(&job_id, &url, &dir, transfer_sink.as_ref()).await
        });

        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                error!("传输任务异常终止: job={}, {}", job.id, join_err);
                Err(TransferError::Aborted(join_err.to_string()))
            }
        };

        // 先落终态再释放槽位，注册表里 downloading 数量不会超过上限
        let terminal = self.settle(&job, &result);
        drop(permit);

        if let Some(snapshot) = terminal {
            self.persist(&snapshot);
        }
        self.notify(&job, result, sink.as_ref());
    }

    /// 结果处理：注册表 + 持久化 + 终态事件
    fn finish(&self, job: &Job, result: Result<String, TransferError>, sink: &dyn ProgressSink) {
        if let Some(snapshot) = self.settle(job, &result) {
            self.persist(&snapshot);
        }
        self.notify(job, result, sink);
    }

    fn settle(&self, job: &Job, result: &Result<String, TransferError>) -> Option<Job> {
        let (status, fields) = match result {
            Ok(filename) => (JobStatus::Completed, JobFields::completed(filename.as_str())),
            Err(e) => (JobStatus::Error, JobFields::failed(e.to_string())),
        };

        match self.registry.transition(&job.id, status, fields) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("更新任务终态失败: {}", e);
                None
            }
        }
    }

    fn notify(&self, job: &Job, result: Result<String, TransferError>, sink: &dyn ProgressSink) {
        match result {
            Ok(filename) => {
                info!("✅ 下载完成: {} -> {}", job.id, filename);
                sink.emit(JobEvent::Completed {
                    job_id: job.id.clone(),
                    filename,
                });
            }
            Err(e) => {
                warn!("❌ 下载失败: {} ({}) - {}", job.id, job.url, e);
                sink.emit(JobEvent::Failed {
                    job_id: job.id.clone(),
                    filename: job.filename.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn persist(&self, job: &Job) {
        if let Some(writer) = &self.persistence {
            writer.record(job);
        }
    }
}
