//! 远程目录模块
//!
//! 拉取远程目录 JSON 并按关键字过滤，返回带稳定 ID 的候选条目

mod client;
mod types;

pub use client::{extract_matches, CatalogClient, CatalogError};
pub use types::{entry_id, CatalogDocument, CatalogEntry, CatalogFile};
