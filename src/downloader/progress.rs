//! 进度上报
//!
//! 传输引擎只依赖 `ProgressSink`，不关心事件最终发往哪条连接

use serde::Serialize;

/// 进度事件（仅传输，不落库）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub job_id: String,
    /// 0-100
    pub percent: u8,
    pub filename: String,
}

/// 任务事件：进度 + 终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Progress(ProgressEvent),
    Completed {
        job_id: String,
        filename: String,
    },
    Failed {
        job_id: String,
        /// 失败前已推导出的文件名（可能为空）
        filename: String,
        error: String,
    },
}

/// 进度接收方
///
/// 实现必须是非阻塞且不失败的：接收方已断开时直接丢弃事件
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: JobEvent) {}
}

/// 百分比去重器
///
/// 只有严格大于上次发出的值时才放行，保证单次传输内百分比严格递增
#[derive(Debug, Clone, Default)]
pub struct PercentTracker {
    total: u64,
    downloaded: u64,
    last_emitted: Option<u8>,
}

impl PercentTracker {
    /// `total` 为 0 表示大小未知，此时不产生任何进度
    pub fn new(total: u64) -> Self {
        Self {
            total,
            downloaded: 0,
            last_emitted: None,
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// 累加字节数，返回需要发出的新百分比
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.downloaded += bytes;
        if self.total == 0 {
            return None;
        }

        let percent = (self.downloaded.saturating_mul(100) / self.total).min(100) as u8;
        match self.last_emitted {
            Some(last) if percent <= last => None,
            _ => {
                self.last_emitted = Some(percent);
                Some(percent)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unknown_total_never_emits() {
        let mut tracker = PercentTracker::new(0);
        assert_eq!(tracker.advance(100), None);
        assert_eq!(tracker.advance(100), None);
        assert_eq!(tracker.downloaded(), 200);
    }

    #[test]
    fn test_deduplicates_equal_percent() {
        let mut tracker = PercentTracker::new(1000);
        assert_eq!(tracker.advance(1), Some(0));
        assert_eq!(tracker.advance(1), None);
        assert_eq!(tracker.advance(8), Some(1));
        assert_eq!(tracker.advance(490), Some(50));
        assert_eq!(tracker.advance(500), Some(100));
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let mut tracker = PercentTracker::new(10);
        assert_eq!(tracker.advance(20), Some(100));
        assert_eq!(tracker.advance(5), None);
    }

    proptest! {
        #[test]
        fn prop_emitted_percent_strictly_increasing(
            total in 1u64..1_000_000,
            chunks in proptest::collection::vec(1u64..50_000, 1..200),
        ) {
            let mut tracker = PercentTracker::new(total);
            let mut emitted = Vec::new();
            for c in chunks {
                if let Some(p) = tracker.advance(c) {
                    emitted.push(p);
                }
            }
            prop_assert!(emitted.iter().all(|p| *p <= 100));
            prop_assert!(emitted.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
