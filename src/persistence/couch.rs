// CouchDB 文档存储

use crate::config::PersistenceConfig;
use crate::persistence::{JobDocument, JobStore, PersistenceError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// CouchDB 实现：GET 取 `_rev` 后合并字段再 PUT，不存在则直接创建
#[derive(Debug, Clone)]
pub struct CouchJobStore {
    client: Client,
    server: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl CouchJobStore {
    pub fn new(config: &PersistenceConfig) -> Result<Self, PersistenceError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            server: config.server.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn db_url(&self) -> String {
        format!("{}/{}", self.server, self.database)
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/{}", self.db_url(), id)
    }

    fn auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        }
    }

    /// 确保数据库存在（已存在时 CouchDB 返回 412）
    pub async fn ensure_database(&self) -> Result<(), PersistenceError> {
        let resp = self.auth(self.client.put(self.db_url())).send().await?;
        match resp.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!("已创建 CouchDB 数据库: {}", self.database);
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED => Ok(()),
            status => Err(PersistenceError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn load(&self, id: &str) -> Result<Option<Map<String, Value>>, PersistenceError> {
        let resp = self.auth(self.client.get(self.doc_url(id))).send().await?;
        match resp.status() {
            StatusCode::OK => match resp.json::<Value>().await? {
                Value::Object(map) => Ok(Some(map)),
                other => Err(PersistenceError::Format(format!("文档不是对象: {}", other))),
            },
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(PersistenceError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl JobStore for CouchJobStore {
    async fn upsert(&self, job_id: &str, doc: &JobDocument) -> Result<(), PersistenceError> {
        let mut merged = self.load(job_id).await?.unwrap_or_default();

        match serde_json::to_value(doc) {
            Ok(Value::Object(fields)) => merged.extend(fields),
            Ok(_) => return Err(PersistenceError::Format("任务记录不是对象".to_string())),
            Err(e) => return Err(PersistenceError::Format(e.to_string())),
        }

        let resp = self
            .auth(self.client.put(self.doc_url(job_id)))
            .json(&Value::Object(merged))
            .send()
            .await?;

        match resp.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::OK => {
                debug!("任务记录已写入: {} ({})", job_id, doc.status);
                Ok(())
            }
            status => Err(PersistenceError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}
