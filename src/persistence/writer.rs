//! 后台持久化写入
//!
//! 单消费者按提交顺序写入，同一任务的状态记录不会乱序；调用方只做一次
//! 非阻塞的 channel 发送。

use crate::downloader::Job;
use crate::persistence::{JobDocument, JobStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum WriterMsg {
    Upsert { job_id: String, doc: JobDocument },
    Shutdown(oneshot::Sender<()>),
}

/// 持久化写入器（可克隆，共享同一个后台任务）
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriterMsg>,
    /// 已提交但尚未处理完的记录数
    pending: Arc<AtomicUsize>,
}

impl PersistenceWriter {
    /// 启动后台写入任务
    pub fn spawn(store: Arc<dyn JobStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriterMsg>();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    WriterMsg::Upsert { job_id, doc } => {
                        if let Err(e) = store.upsert(&job_id, &doc).await {
                            warn!(
                                "任务记录写入失败（忽略）: job={}, status={}, 错误: {}",
                                job_id, doc.status, e
                            );
                        }
                        worker_pending.fetch_sub(1, Ordering::SeqCst);
                    }
                    WriterMsg::Shutdown(done) => {
                        let _ = done.send(());
                        break;
                    }
                }
            }
            info!("持久化写入任务已退出");
        });

        Self { tx, pending }
    }

    /// 尚未写出的记录数
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// 记录任务当前状态（不阻塞）
    pub fn record(&self, job: &Job) {
        let msg = WriterMsg::Upsert {
            job_id: job.id.clone(),
            doc: JobDocument::from(job),
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(msg).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            debug!("持久化写入任务已停止，丢弃记录: {}", job.id);
        }
    }

    /// 写完已提交的记录后停止后台任务
    ///
    /// 最多等待 `deadline`；超时返回 false，剩余记录被丢弃
    pub async fn shutdown(&self, deadline: Duration) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriterMsg::Shutdown(done_tx)).is_err() {
            return true;
        }

        match tokio::time::timeout(deadline, done_rx).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    "任务记录写出超时（{:?}），放弃剩余 {} 条记录",
                    deadline,
                    self.pending()
                );
                false
            }
        }
    }
}
