//! HTTP 检索客户端
//!
//! POST {base}/search（body: {"query", "top_k"}）与 GET {base}/documents，均返回 JSON 数组；
//! 超时由 reqwest Client 统一施加。reqwest::Client 内部是连接池，可安全并发。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::retrieval::{Document, Passage, RetrievalClient, RetrievalError};

pub struct HttpRetrievalClient {
    client: Client,
    base_url: String,
}

impl HttpRetrievalClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RetrievalError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RetrievalError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RetrievalClient for HttpRetrievalClient {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
        tracing::debug!(query, top_k, "retrieval search");
        let response = self
            .client
            .post(self.url("search"))
            .json(&serde_json::json!({ "query": query, "top_k": top_k }))
            .send()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        let mut passages: Vec<Passage> = Self::decode(response).await?;
        passages.sort_by(|a, b| b.score.total_cmp(&a.score));
        passages.truncate(top_k);
        Ok(passages)
    }

    async fn list_documents(&self) -> Result<Vec<Document>, RetrievalError> {
        let response = self
            .client
            .get(self.url("documents"))
            .send()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;
        Self::decode(response).await
    }
}
