//! Scratchpad：单次 run 的可变状态（问题、任务图、最终答案）
//!
//! 任务以追加式数组保存，依赖通过整数 ID 引用而不是指针，天然没有循环所有权问题。
//! 每次 run 新建一个实例并显式传递，run 结束即丢弃，不做持久化。

use std::fmt;

use serde::Serialize;

use crate::core::ToolError;

/// 任务 ID：run 内单调递增，不复用
pub type TaskId = u64;

/// 任务状态：pending -> running -> complete，或 pending -> blocked；不可回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Complete,
    /// 依赖链永远无法满足（环、悬空依赖），对该任务是终态
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Complete => "complete",
            TaskStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// 单个检索子任务
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub depends_on: Vec<TaskId>,
    /// 仅在 complete 时有值，写入后不可变
    pub result: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, description: impl Into<String>, depends_on: Vec<TaskId>) -> Self {
        Self {
            id,
            description: description.into(),
            status: TaskStatus::Pending,
            depends_on,
            result: None,
        }
    }
}

/// 单次 run 的草稿本
#[derive(Debug, Clone, Serialize)]
pub struct Scratchpad {
    question: String,
    tasks: Vec<Task>,
    final_answer: Option<String>,
}

impl Scratchpad {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            tasks: Vec::new(),
            final_answer: None,
        }
    }

    /// 直接以给定任务图构建（不做依赖校验，可含环或悬空依赖）
    pub fn with_tasks(question: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            question: question.into(),
            tasks,
            final_answer: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.final_answer.is_some()
    }

    /// 下一个任务 ID：现有最大 ID + 1，空时为 0
    fn next_id(&self) -> TaskId {
        self.tasks.iter().map(|t| t.id).max().map_or(0, |max| max + 1)
    }

    /// 追加 pending 任务；依赖必须全部已存在，否则不改动状态并返回错误
    pub fn add_task(
        &mut self,
        description: impl Into<String>,
        depends_on: Vec<TaskId>,
    ) -> Result<TaskId, ToolError> {
        if let Some(missing) = depends_on.iter().find(|id| self.task(**id).is_none()) {
            return Err(ToolError::InvalidDependency(*missing));
        }

        let mut deps = Vec::with_capacity(depends_on.len());
        for id in depends_on {
            if !deps.contains(&id) {
                deps.push(id);
            }
        }

        let id = self.next_id();
        self.tasks.push(Task::new(id, description, deps));
        Ok(id)
    }

    /// 标记完成并记录结果；只接受 pending / running，重复完成被拒绝且不覆盖原结果
    pub fn complete_task(&mut self, id: TaskId, result: impl Into<String>) -> Result<(), ToolError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(ToolError::UnknownTask(id))?;
        match task.status {
            TaskStatus::Pending | TaskStatus::Running => {
                task.status = TaskStatus::Complete;
                task.result = Some(result.into());
                Ok(())
            }
            status => Err(ToolError::NotCompletable { id, status }),
        }
    }

    pub fn set_final_answer(&mut self, answer: impl Into<String>) -> Result<(), ToolError> {
        if self.final_answer.is_some() {
            return Err(ToolError::AlreadyFinished);
        }
        self.final_answer = Some(answer.into());
        Ok(())
    }

    /// pending -> running；可运行性由调度器判断
    pub(crate) fn mark_running(&mut self, id: TaskId) -> bool {
        self.transition(id, TaskStatus::Running)
    }

    /// pending -> blocked
    pub(crate) fn mark_blocked(&mut self, id: TaskId) -> bool {
        self.transition(id, TaskStatus::Blocked)
    }

    fn transition(&mut self, id: TaskId, to: TaskStatus) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = to;
                true
            }
            _ => false,
        }
    }

    /// 已完成且有结果的任务，按创建顺序
    pub fn completed_results(&self) -> impl Iterator<Item = (&Task, &str)> {
        self.tasks.iter().filter_map(|t| match (&t.status, &t.result) {
            (TaskStatus::Complete, Some(r)) if !r.is_empty() => Some((t, r.as_str())),
            _ => None,
        })
    }

    /// Planning 阶段注入 system message 的结构化快照
    pub fn snapshot_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
