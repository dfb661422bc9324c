//! 工具调用解析
//!
//! LLM 只能调用固定的四种工具；按名称把 JSON 参数解析为 ToolInvocation，
//! 未知工具或参数错误返回 ToolError（作为工具结果回传，不会中止 run）。

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::{TaskId, ToolError};

pub const SEARCH_KNOWLEDGE: &str = "search_knowledge";
pub const ADD_TASK: &str = "add_task";
pub const COMPLETE_TASK: &str = "complete_task";
pub const FINISH: &str = "finish";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchKnowledgeArgs {
    /// Search query
    pub query: String,
    /// Number of results (default 3)
    #[serde(default, alias = "topK")]
    pub top_k: Option<usize>,
    /// ID of the task this search is working on, if any
    #[serde(default, alias = "taskId")]
    pub task_id: Option<TaskId>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddTaskArgs {
    /// What this task will research
    pub description: String,
    /// Task IDs this task must wait for
    #[serde(default, alias = "dependsOn")]
    pub depends_on: Vec<TaskId>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CompleteTaskArgs {
    /// ID of the task
    #[serde(alias = "taskId")]
    pub task_id: TaskId,
    /// Summary of what was found
    pub result: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FinishArgs {
    /// Final answer based on retrieved information
    pub answer: String,
}

/// 四种工具调用，穷尽
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    SearchKnowledge {
        query: String,
        top_k: Option<usize>,
        task_id: Option<TaskId>,
    },
    AddTask {
        description: String,
        depends_on: Vec<TaskId>,
    },
    CompleteTask {
        task_id: TaskId,
        result: String,
    },
    Finish {
        answer: String,
    },
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &str) -> Result<T, ToolError> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

impl ToolInvocation {
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        match name {
            SEARCH_KNOWLEDGE => {
                let args: SearchKnowledgeArgs = parse_args(name, arguments)?;
                Ok(Self::SearchKnowledge {
                    query: args.query,
                    top_k: args.top_k,
                    task_id: args.task_id,
                })
            }
            ADD_TASK => {
                let args: AddTaskArgs = parse_args(name, arguments)?;
                Ok(Self::AddTask {
                    description: args.description,
                    depends_on: args.depends_on,
                })
            }
            COMPLETE_TASK => {
                let args: CompleteTaskArgs = parse_args(name, arguments)?;
                Ok(Self::CompleteTask {
                    task_id: args.task_id,
                    result: args.result,
                })
            }
            FINISH => {
                let args: FinishArgs = parse_args(name, arguments)?;
                Ok(Self::Finish { answer: args.answer })
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchKnowledge { .. } => SEARCH_KNOWLEDGE,
            Self::AddTask { .. } => ADD_TASK,
            Self::CompleteTask { .. } => COMPLETE_TASK,
            Self::Finish { .. } => FINISH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_defaults() {
        let inv = ToolInvocation::parse("search_knowledge", r#"{"query": "AX-7 price"}"#).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::SearchKnowledge {
                query: "AX-7 price".into(),
                top_k: None,
                task_id: None
            }
        );
    }

    #[test]
    fn test_parse_accepts_camel_case() {
        let inv = ToolInvocation::parse("add_task", r#"{"description": "d", "dependsOn": [0, 1]}"#)
            .unwrap();
        assert_eq!(
            inv,
            ToolInvocation::AddTask {
                description: "d".into(),
                depends_on: vec![0, 1]
            }
        );
        let inv = ToolInvocation::parse("complete_task", r#"{"taskId": 2, "result": "r"}"#).unwrap();
        assert_eq!(inv.name(), COMPLETE_TASK);
    }

    #[test]
    fn test_add_task_without_dependencies() {
        let inv = ToolInvocation::parse("add_task", r#"{"description": "d"}"#).unwrap();
        assert!(matches!(inv, ToolInvocation::AddTask { depends_on, .. } if depends_on.is_empty()));
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolInvocation::parse("delete_everything", "{}").unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("delete_everything".into()));
    }

    #[test]
    fn test_malformed_arguments() {
        let err = ToolInvocation::parse("finish", "{not json").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { tool, .. } if tool == "finish"));
        let err = ToolInvocation::parse("complete_task", "").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
