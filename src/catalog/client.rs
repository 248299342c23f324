// 远程目录客户端

use crate::catalog::{CatalogDocument, CatalogEntry};
use crate::config::CatalogConfig;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// 目录获取错误
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("目录请求失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("目录服务返回异常状态码: {0}")]
    Status(reqwest::StatusCode),
}

/// 远程目录客户端
///
/// 每次搜索都重新拉取完整目录，不做缓存
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    url: String,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// 拉取目录文档
    pub async fn fetch(&self) -> Result<CatalogDocument, CatalogError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status));
        }

        let doc: CatalogDocument = resp.json().await?;
        debug!("目录拉取完成: {} 个条目", doc.files.len());
        Ok(doc)
    }

    /// 拉取目录并按关键字过滤
    pub async fn search(&self, term: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let doc = self.fetch().await?;
        let matches = extract_matches(&doc, term);
        info!("目录搜索: 关键字={:?}, 命中={}", term, matches.len());
        Ok(matches)
    }
}

/// 按 URL 子串（忽略大小写）过滤目录，保持原始顺序
pub fn extract_matches(doc: &CatalogDocument, term: &str) -> Vec<CatalogEntry> {
    let needle = term.to_lowercase();
    doc.files
        .iter()
        .filter(|f| f.url.to_lowercase().contains(&needle))
        .map(|f| CatalogEntry::new(f.url.clone(), f.size))
        .collect()
}
