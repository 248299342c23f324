//! 下载模块
//!
//! - `job` / `registry`: 任务模型与内存注册表
//! - `admission`: 并发槽位控制
//! - `engine`: 单个 URL 的流式传输
//! - `progress`: 进度事件与百分比去重
//! - `manager`: 把以上部分串成完整的任务生命周期

pub mod admission;
pub mod engine;
pub mod job;
pub mod manager;
pub mod progress;
pub mod registry;

pub use admission::{AdmissionClosed, AdmissionController, AdmissionPermit, AdmissionStats};
pub use engine::{filename_from_url, sanitize_filename, TransferEngine, TransferError};
pub use job::{Job, JobFields, JobStatus};
pub use manager::DownloadManager;
pub use progress::{JobEvent, NullSink, PercentTracker, ProgressEvent, ProgressSink};
pub use registry::{JobRegistry, RegistryError};
