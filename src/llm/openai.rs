//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url，DeepSeek 亦走此路径），
//! 或 Azure OpenAI 部署；把内部 Message / ToolSchema 转为 API 格式并解析回 tool_calls。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{AssistantMessage, ChatModel, LlmError, Message, Role, ToolCall, ToolSchema};

/// DeepSeek 的 OpenAI 兼容端点
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// 累计 token 用量；complete 可并发调用，计数用原子量
#[derive(Debug, Default)]
pub struct TokenUsage {
    prompt: AtomicU64,
    completion: AtomicU64,
}

impl TokenUsage {
    pub fn record(&self, prompt: u64, completion: u64) {
        self.prompt.fetch_add(prompt, Ordering::Relaxed);
        self.completion.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn totals(&self) -> (u64, u64, u64) {
        let prompt = self.prompt.load(Ordering::Relaxed);
        let completion = self.completion.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// 对话客户端：持有 Client 与模型名（Azure 下模型由 deployment 决定，model 仅作记录）
pub struct OpenAiChatModel<C: Config> {
    client: Client<C>,
    model: String,
    usage: TokenUsage,
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::InvalidRequest(format!("http client: {e}")))
}

impl OpenAiChatModel<OpenAIConfig> {
    /// OpenAI 兼容端点；api_key 缺省时读 OPENAI_API_KEY
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client(timeout_secs)?),
            model: model.to_string(),
            usage: TokenUsage::default(),
        })
    }
}

impl OpenAiChatModel<AzureConfig> {
    /// Azure OpenAI 部署
    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let config = AzureConfig::new()
            .with_api_base(endpoint)
            .with_deployment_id(deployment)
            .with_api_version(api_version)
            .with_api_key(api_key);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client(timeout_secs)?),
            model: deployment.to_string(),
            usage: TokenUsage::default(),
        })
    }
}

fn invalid(e: impl std::fmt::Display) -> LlmError {
    LlmError::InvalidRequest(e.to_string())
}

fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    messages
        .iter()
        .map(|m| {
            let msg: ChatCompletionRequestMessage = match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(invalid)?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(invalid)?
                    .into(),
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !m.content.is_empty() {
                        args.content(m.content.clone());
                    }
                    if !m.tool_calls.is_empty() {
                        let calls = m
                            .tool_calls
                            .iter()
                            .map(|tc| {
                                ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                                    id: tc.id.clone(),
                                    function: FunctionCall {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.clone(),
                                    },
                                })
                            })
                            .collect::<Vec<_>>();
                        args.tool_calls(calls);
                    }
                    args.build().map_err(invalid)?.into()
                }
                Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                    .content(m.content.clone())
                    .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
                    .build()
                    .map_err(invalid)?
                    .into(),
            };
            Ok(msg)
        })
        .collect()
}

fn to_openai_tools(tools: &[ToolSchema]) -> Vec<ChatCompletionTools> {
    tools
        .iter()
        .map(|t| {
            ChatCompletionTools::Function(ChatCompletionTool {
                function: FunctionObject {
                    name: t.name.clone(),
                    description: Some(t.description.clone()),
                    parameters: Some(t.parameters.clone()),
                    strict: None,
                },
            })
        })
        .collect()
}

#[async_trait]
impl<C> ChatModel for OpenAiChatModel<C>
where
    C: Config + Send + Sync + 'static,
{
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.totals()
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<AssistantMessage, LlmError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(to_openai_messages(messages)?);
        if !tools.is_empty() {
            builder.tools(to_openai_tools(tools));
        }
        let request = builder.build().map_err(invalid)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .record(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyResponse)?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| match call {
                ChatCompletionMessageToolCalls::Function(f) => {
                    Some(ToolCall::new(f.id, f.function.name, f.function.arguments))
                }
                _ => None,
            })
            .collect();

        Ok(AssistantMessage {
            content: message.content,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let usage = TokenUsage::default();
        usage.record(120, 30);
        usage.record(80, 20);
        assert_eq!(usage.totals(), (200, 50, 250));
    }

    #[test]
    fn test_model_reports_recorded_usage() {
        let model = OpenAiChatModel::new(Some("http://127.0.0.1:9"), "gpt-4.1", Some("sk-test"), 5).unwrap();
        assert_eq!(model.token_usage(), (0, 0, 0));
        model.usage.record(10, 5);
        assert_eq!(model.token_usage(), (10, 5, 15));
    }

    #[test]
    fn test_tool_call_history_converts() {
        let history = vec![
            Message::system("sys"),
            Message::user("q"),
            AssistantMessage::with_tool_calls(vec![ToolCall::new("c1", "finish", r#"{"answer":"a"}"#)])
                .to_message(),
            Message::tool("c1", r#"{"status":"done"}"#),
        ];
        let converted = to_openai_messages(&history).unwrap();
        assert_eq!(converted.len(), 4);
        assert!(matches!(converted[3], ChatCompletionRequestMessage::Tool(_)));
        assert_eq!(to_openai_tools(&crate::tools::tool_schemas()).len(), 4);
    }
}
