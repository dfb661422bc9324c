//! 对话模型抽象
//!
//! 编排核心只把 LLM 当作 `messages, tool_schemas -> assistant_message` 的不透明函数。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{AssistantMessage, Message, ToolSchema};

/// 对话模型调用失败（对 run 而言是致命错误）
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("empty response")]
    EmptyResponse,
}

/// 对话模型 trait：一次非流式补全，可返回工具调用
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<AssistantMessage, LlmError>;

    /// 累计 token 使用：(prompt, completion, total)，默认不统计
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
