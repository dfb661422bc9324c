//! 错误类型
//!
//! 分两层：AgentError 是运行级错误（只有对话模型不可达才会中止一次 run）；
//! ToolError 是工具级错误，序列化成工具结果回传给 LLM，由下一轮 Planning 自行调整。

use thiserror::Error;

use crate::core::scratchpad::{TaskId, TaskStatus};
use crate::llm::LlmError;
use crate::retrieval::RetrievalError;

/// 运行级错误：返回给调用方，区别于正常答案
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Config error: {0}")]
    Config(String),

    /// 仅出现在 run 之外（如 CLI 列出文档）；run 内部的检索失败会降级为 ToolError
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),
}

/// 工具级错误：校验失败或协作方失败，不会中止 run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Unknown task id: {0}")]
    UnknownTask(TaskId),

    #[error("Invalid dependency: task {0} does not exist")]
    InvalidDependency(TaskId),

    #[error("Task {id} is {status} and cannot be completed")]
    NotCompletable { id: TaskId, status: TaskStatus },

    #[error("Task {id} is not runnable (status {status}, dependencies unmet or blocked)")]
    NotRunnable { id: TaskId, status: TaskStatus },

    #[error("Final answer already recorded")]
    AlreadyFinished,

    #[error("Search failed: {0}")]
    Retrieval(String),
}
