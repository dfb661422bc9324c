//! 工具 Schema 生成（schemars 从参数结构体自动生成 JSON Schema）

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::llm::ToolSchema;
use crate::tools::invocation::{
    AddTaskArgs, CompleteTaskArgs, FinishArgs, SearchKnowledgeArgs, ADD_TASK, COMPLETE_TASK,
    FINISH, SEARCH_KNOWLEDGE,
};

fn parameters<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| {
        serde_json::json!({ "type": "object", "properties": {} })
    });
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

fn tool<T: JsonSchema>(name: &str, description: &str) -> ToolSchema {
    ToolSchema {
        name: name.to_string(),
        description: description.to_string(),
        parameters: parameters::<T>(),
    }
}

/// 提供给 LLM 的四个工具签名
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        tool::<SearchKnowledgeArgs>(
            SEARCH_KNOWLEDGE,
            "Search the knowledge base. Pass task_id to record which task the search works on.",
        ),
        tool::<AddTaskArgs>(ADD_TASK, "Add a new research task to the scratchpad."),
        tool::<CompleteTaskArgs>(COMPLETE_TASK, "Mark a task as complete and record its result."),
        tool::<FinishArgs>(
            FINISH,
            "Provide the final synthesized answer and end the research loop.",
        ),
    ]
}
