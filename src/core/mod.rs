//! 核心编排层：草稿本、任务调度、编排循环与错误类型

pub mod error;
pub mod orchestrator;
pub mod scratchpad;
pub mod task_scheduler;

pub use error::{AgentError, ToolError};
pub use orchestrator::{fallback_answer, Orchestrator, PartialReason, RunOutcome, RunStatus, MAX_ITERATIONS};
pub use scratchpad::{Scratchpad, Task, TaskId, TaskStatus};
pub use task_scheduler::{runnable_tasks, TaskScheduler};
