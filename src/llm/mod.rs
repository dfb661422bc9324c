//! LLM 层：对话模型抽象与实现（OpenAI 兼容 / Azure / Mock）

pub mod mock;
pub mod openai;
pub mod traits;
pub mod types;

pub use mock::MockChatModel;
pub use openai::{OpenAiChatModel, DEEPSEEK_BASE_URL};
pub use traits::{ChatModel, LlmError};
pub use types::{AssistantMessage, Message, Role, ToolCall, ToolSchema};
