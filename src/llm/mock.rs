//! Mock 对话模型（无需 API Key，用于本地跑通与测试）
//!
//! 第一轮对问题发起一次 search_knowledge；看到工具结果后以该结果调用 finish。

use async_trait::async_trait;

use crate::llm::{AssistantMessage, ChatModel, LlmError, Message, Role, ToolCall, ToolSchema};

#[derive(Debug, Default)]
pub struct MockChatModel;

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<AssistantMessage, LlmError> {
        if let Some(observation) = messages.iter().rev().find(|m| m.role == Role::Tool) {
            let args = serde_json::json!({
                "answer": format!("Retrieved from knowledge base: {}", observation.content)
            });
            return Ok(AssistantMessage::with_tool_calls(vec![ToolCall::new(
                "mock-finish",
                "finish",
                args.to_string(),
            )]));
        }

        let question = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        let args = serde_json::json!({ "query": question });
        Ok(AssistantMessage::with_tool_calls(vec![ToolCall::new(
            "mock-search",
            "search_knowledge",
            args.to_string(),
        )]))
    }
}
