//! 准入控制
//!
//! 计数信号量限制同时运行的传输数。等待中的任务不占用槽位，
//! 槽位随 `AdmissionPermit` 析构释放，任何退出路径（包括 panic 展开）都会归还。

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

#[derive(Debug, Error)]
#[error("准入控制器已关闭")]
pub struct AdmissionClosed;

/// 槽位使用情况
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub max_slots: usize,
    pub active: usize,
    pub waiting: usize,
}

/// 准入控制器
#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    max_slots: usize,
    active: Arc<AtomicUsize>,
    waiting: Arc<AtomicUsize>,
}

impl AdmissionController {
    pub fn new(max_slots: usize) -> Self {
        info!("创建准入控制器，最大并发传输数: {}", max_slots);
        Self {
            semaphore: Arc::new(Semaphore::new(max_slots)),
            max_slots,
            active: Arc::new(AtomicUsize::new(0)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// 当前占用槽位数
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 空闲槽位数
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            max_slots: self.max_slots,
            active: self.active(),
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }

    /// 等待并获取一个槽位
    pub async fn acquire(&self, job_id: &str) -> Result<AdmissionPermit, AdmissionClosed> {
        let _waiting = WaitingGuard::enter(&self.waiting);

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AdmissionClosed)?;

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("分配槽位: job={}, 占用 {}/{}", job_id, active, self.max_slots);

        Ok(AdmissionPermit {
            _permit: permit,
            active: Arc::clone(&self.active),
            job_id: job_id.to_string(),
        })
    }

    /// 关闭控制器，之后的 acquire 都会失败
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// 已获取的槽位，析构时释放
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
    job_id: String,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let left = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("释放槽位: job={}, 剩余占用 {}", self.job_id, left);
    }
}

/// 等待计数，future 被丢弃时同样回退
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_creation() {
        let ac = AdmissionController::new(3);
        assert_eq!(ac.max_slots(), 3);
        assert_eq!(ac.available(), 3);
        assert_eq!(ac.active(), 0);
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let ac = AdmissionController::new(2);
        let a = ac.acquire("a").await.unwrap();
        let b = ac.acquire("b").await.unwrap();
        assert_eq!(ac.active(), 2);
        assert_eq!(ac.available(), 0);

        drop(a);
        assert_eq!(ac.active(), 1);
        assert_eq!(ac.available(), 1);
        drop(b);
        assert_eq!(ac.active(), 0);
    }

    #[tokio::test]
    async fn test_waiter_blocks_until_slot_frees() {
        let ac = Arc::new(AdmissionController::new(1));
        let first = ac.acquire("first").await.unwrap();

        let ac2 = Arc::clone(&ac);
        let waiter = tokio::spawn(async move { ac2.acquire("second").await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        assert_eq!(ac.stats().waiting, 1);

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(ac.stats().waiting, 0);
    }

    #[tokio::test]
    async fn test_permit_released_when_task_panics() {
        let ac = Arc::new(AdmissionController::new(1));

        let ac2 = Arc::clone(&ac);
        let handle = tokio::spawn(async move {
            let _permit = ac2.acquire("boom").await.unwrap();
            panic!("transfer blew up");
        });
        assert!(handle.await.unwrap_err().is_panic());

        assert_eq!(ac.active(), 0);
        assert_eq!(ac.available(), 1);
    }

    #[tokio::test]
    async fn test_closed_controller_rejects() {
        let ac = AdmissionController::new(1);
        ac.close();
        assert!(ac.acquire("x").await.is_err());
    }
}
