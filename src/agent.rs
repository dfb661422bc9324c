//! Headless Agent 运行时
//!
//! 根据配置构建对话模型、检索客户端与 Orchestrator，供 CLI 或其它服务层调用；
//! 每次 ask 都在 Orchestrator 内部新建 Scratchpad，多个请求之间不共享可变状态。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator};
use crate::llm::{ChatModel, MockChatModel, OpenAiChatModel, DEEPSEEK_BASE_URL};
use crate::retrieval::{HttpRetrievalClient, RetrievalClient, StaticCorpus};

/// 按顺序取第一个已设置且非空的环境变量
fn env_key(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| std::env::var(n).ok().filter(|k| !k.is_empty()))
}

/// 根据配置与环境变量选择对话模型（OpenAI 兼容 / DeepSeek / Azure / Mock）
pub fn create_chat_model(cfg: &AppConfig) -> Result<Arc<dyn ChatModel>, AgentError> {
    let llm = &cfg.llm;
    let timeout = llm.timeouts.request;
    match llm.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Ok(Arc::new(MockChatModel))
        }
        "azure" => {
            let endpoint = llm
                .base_url
                .as_deref()
                .ok_or_else(|| AgentError::Config("llm.base_url is required for azure".into()))?;
            let key = llm
                .api_key
                .clone()
                .or_else(|| env_key(&["AZURE_OPENAI_API_KEY"]))
                .ok_or_else(|| AgentError::Config("AZURE_OPENAI_API_KEY is not set".into()))?;
            let deployment = llm.deployment.as_deref().unwrap_or(&llm.model);
            tracing::info!("Using Azure OpenAI deployment ({})", deployment);
            Ok(Arc::new(OpenAiChatModel::azure(
                endpoint,
                deployment,
                &llm.api_version,
                &key,
                timeout,
            )?))
        }
        "deepseek" => {
            let key = llm
                .api_key
                .clone()
                .or_else(|| env_key(&["DEEPSEEK_API_KEY", "OPENAI_API_KEY"]));
            let base = llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
            tracing::info!("Using DeepSeek LLM ({})", llm.model);
            Ok(Arc::new(OpenAiChatModel::new(
                Some(base),
                &llm.model,
                key.as_deref(),
                timeout,
            )?))
        }
        "openai" => match llm.api_key.clone().or_else(|| env_key(&["OPENAI_API_KEY"])) {
            Some(key) => {
                tracing::info!("Using OpenAI LLM ({})", llm.model);
                Ok(Arc::new(OpenAiChatModel::new(
                    llm.base_url.as_deref(),
                    &llm.model,
                    Some(&key),
                    timeout,
                )?))
            }
            None => {
                tracing::warn!("No API key set, using Mock LLM");
                Ok(Arc::new(MockChatModel))
            }
        },
        other => Err(AgentError::Config(format!("unknown llm provider: {other}"))),
    }
}

/// 根据配置选择检索后端（HTTP 服务 / 内置语料）
pub fn create_retrieval(cfg: &AppConfig) -> Result<Arc<dyn RetrievalClient>, AgentError> {
    let r = &cfg.retrieval;
    match r.backend.to_lowercase().as_str() {
        "memory" => {
            tracing::info!("Using in-memory corpus");
            Ok(Arc::new(StaticCorpus::acme()))
        }
        "http" => {
            tracing::info!("Using retrieval service at {}", r.base_url);
            Ok(Arc::new(HttpRetrievalClient::new(&r.base_url, r.timeout_secs)?))
        }
        other => Err(AgentError::Config(format!("unknown retrieval backend: {other}"))),
    }
}

/// 预构建的 Agent：Orchestrator 可被多个请求复用，检索客户端可单独用于枚举语料
pub struct Agent {
    orchestrator: Orchestrator,
    retrieval: Arc<dyn RetrievalClient>,
}

impl Agent {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let model = create_chat_model(cfg)?;
        let retrieval = create_retrieval(cfg)?;
        Ok(Self::new(model, retrieval, cfg))
    }

    pub fn new(model: Arc<dyn ChatModel>, retrieval: Arc<dyn RetrievalClient>, cfg: &AppConfig) -> Self {
        Self {
            orchestrator: Orchestrator::new(model, retrieval.clone(), &cfg.agent),
            retrieval,
        }
    }

    /// 回答一个问题；只有对话模型不可达时返回 Err
    pub async fn ask(&self, question: &str) -> Result<String, AgentError> {
        self.orchestrator.run(question).await
    }

    pub fn retrieval(&self) -> &Arc<dyn RetrievalClient> {
        &self.retrieval
    }
}
