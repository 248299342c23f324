// 目录类型定义

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 远程目录文档 `{"files": [...]}`
///
/// 单个条目格式异常不影响整个文档：非对象条目被跳过，
/// `url` / `size` 缺失、为 null 或类型不符时分别取 `""` / `0`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDocument {
    #[serde(default, deserialize_with = "lenient_files")]
    pub files: Vec<CatalogFile>,
}

/// 目录中的原始文件项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFile {
    pub url: String,
    /// 目录声明的大小，仅作展示用途
    pub size: u64,
}

impl CatalogFile {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let url = obj
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let size = obj.get("size").map(lenient_size).unwrap_or(0);
        Some(Self { url, size })
    }
}

/// 非负整数原样保留，非负小数向下取整，其余一律为 0
fn lenient_size(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 => f as u64,
        _ => 0,
    }
}

fn lenient_files<'de, D>(deserializer: D) -> Result<Vec<CatalogFile>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.iter().filter_map(CatalogFile::from_value).collect())
}

/// 搜索结果条目
///
/// 创建后不可变，生命周期为一次搜索响应加上随后的下载查找
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub url: String,
    pub size: u64,
    pub id: String,
}

impl CatalogEntry {
    pub fn new(url: String, size: u64) -> Self {
        let id = entry_id(&url);
        Self { url, size, id }
    }
}

/// 由 URL 推导稳定 ID（URL 命名空间下的 UUIDv5）
pub fn entry_id(url: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
}
