//! 检索客户端契约
//!
//! search 返回按分数降序排列的段落；实现必须可被多个调用方并发使用。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 检索命中的段落
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(alias = "documentId")]
    pub doc_id: u64,
    pub content: String,
    pub score: f32,
}

/// 语料中的文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "documentId")]
    pub doc_id: u64,
    pub content: String,
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError>;

    /// 枚举整个语料（编排循环本身不调用）
    async fn list_documents(&self) -> Result<Vec<Document>, RetrievalError>;
}
