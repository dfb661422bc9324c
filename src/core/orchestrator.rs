//! 编排循环：Planning -> Dispatching -> Updating -> (Planning | Terminated)
//!
//! 每轮把完整 Scratchpad 序列化进 system message 调用一次 LLM；按调用顺序执行变更类工具，
//! 同一轮的 search_knowledge 统一扇出、全部返回后再回填（同步屏障，下一轮 Planning 不会看到半轮结果）。
//! 终止条件：finish 写入答案；LLM 未调用任何工具（视为隐式 finish）；达到迭代上限（合成部分答案）。
//! 只有对话模型失败会作为运行级错误返回。

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::Instrument;

use crate::config::AgentSection;
use crate::core::{runnable_tasks, AgentError, Scratchpad, TaskScheduler, ToolError};
use crate::llm::{ChatModel, Message, ToolCall, ToolSchema};
use crate::retrieval::RetrievalClient;
use crate::tools::{render, tool_schemas, Dispatch, ToolDispatcher, ToolInvocation};

/// 默认迭代上限
pub const MAX_ITERATIONS: usize = 10;

pub const SYSTEM_PROMPT: &str = "\
You are a research agent with access to a knowledge base.
You MUST only answer from retrieved information, never from prior knowledge.

You maintain a scratchpad of tasks to track your research progress.
Before doing anything, always consult the current scratchpad state in the system message.

Your workflow:
1. Decompose the question into tasks using `add_task`. Use `depends_on` when one task requires
   the result of another.
2. Execute runnable tasks by calling `search_knowledge` (pass `task_id`) to retrieve relevant
   documents. Independent tasks can be searched in the same turn.
3. Mark each task done with `complete_task` once you have retrieved useful results.
4. When all tasks needed to answer the question are complete, call `finish` with a synthesized answer.

Rules:
- Always use `search_knowledge`, never answer from memory.
- Call `finish` only when you have enough retrieved information to answer fully.
- If you hit a dead end on a task, mark it complete with a note and move on.
- Tasks marked `blocked` can never run; work around them.
";

/// 未调用 finish 时部分答案的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReason {
    /// 达到迭代上限
    IterationLimit,
    /// LLM 既没调用工具也没给出文本
    EmptyResponse,
}

/// run 的终止方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// 调用了 finish
    Finished,
    /// 回复不含工具调用，文本即答案
    ImplicitFinish,
    Partial(PartialReason),
}

/// run 的完整结果（供测试与诊断；对外的 run 只返回 answer）
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub answer: String,
    pub status: RunStatus,
    pub iterations: usize,
    pub scratchpad: Scratchpad,
    pub messages: Vec<Message>,
}

pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    scheduler: Arc<TaskScheduler>,
    dispatcher: ToolDispatcher,
    tools: Vec<ToolSchema>,
    max_iterations: usize,
    system_prompt: String,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        retrieval: Arc<dyn RetrievalClient>,
        settings: &AgentSection,
    ) -> Self {
        let scheduler = Arc::new(TaskScheduler::new(settings.max_concurrent_searches));
        Self {
            model,
            dispatcher: ToolDispatcher::new(retrieval, scheduler.clone(), settings.default_top_k),
            scheduler,
            tools: tool_schemas(),
            max_iterations: settings.max_iterations.max(1),
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// 覆盖指令集
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 对外入口：回答问题；只有对话模型不可达才返回 Err
    pub async fn run(&self, question: &str) -> Result<String, AgentError> {
        Ok(self.run_detailed(question).await?.answer)
    }

    pub async fn run_detailed(&self, question: &str) -> Result<RunOutcome, AgentError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        async {
            let outcome = self.run_inner(question).await;
            let (prompt, completion, total) = self.model.token_usage();
            tracing::info!(
                prompt_tokens = prompt,
                completion_tokens = completion,
                total_tokens = total,
                "Cumulative token usage"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_inner(&self, question: &str) -> Result<RunOutcome, AgentError> {
        tracing::info!(question, "Agent starting");
        let mut scratchpad = Scratchpad::new(question);
        let mut history = vec![Message::user(question)];
        let mut iterations = 0;

        loop {
            // Planning
            tracing::debug!(
                iteration = iterations,
                runnable = ?runnable_tasks(&scratchpad),
                "Planning"
            );
            let mut request = Vec::with_capacity(history.len() + 1);
            request.push(Message::system(self.system_message(&scratchpad)));
            request.extend(history.iter().cloned());
            let reply = self.model.complete(&request, &self.tools).await?;
            history.push(reply.to_message());

            if reply.tool_calls.is_empty() {
                iterations += 1;
                let text = reply.content.unwrap_or_default();
                if text.trim().is_empty() {
                    tracing::warn!("LLM returned neither tool calls nor text");
                    return Ok(self.partial(scratchpad, history, iterations, PartialReason::EmptyResponse));
                }
                tracing::info!(iterations, "No tool calls, treating reply as final answer");
                if let Err(e) = scratchpad.set_final_answer(text.clone()) {
                    tracing::warn!(error = %e, "Implicit finish after an answer was recorded");
                }
                return Ok(RunOutcome {
                    answer: text,
                    status: RunStatus::ImplicitFinish,
                    iterations,
                    scratchpad,
                    messages: history,
                });
            }

            // Dispatching
            let results = self.dispatch_all(&reply.tool_calls, &mut scratchpad).await;

            // Updating
            for (call, content) in reply.tool_calls.iter().zip(results) {
                history.push(Message::tool(call.id.clone(), content));
            }
            self.scheduler.block_unresolvable(&mut scratchpad);
            iterations += 1;
            tracing::debug!(iterations, snapshot = %scratchpad.snapshot_json(), "Updated scratchpad");

            if let Some(answer) = scratchpad.final_answer() {
                tracing::info!(iterations, "Agent finished");
                return Ok(RunOutcome {
                    answer: answer.to_string(),
                    status: RunStatus::Finished,
                    iterations,
                    scratchpad,
                    messages: history,
                });
            }
            if iterations >= self.max_iterations {
                tracing::warn!(iterations, "Max iterations reached without finish");
                return Ok(self.partial(scratchpad, history, iterations, PartialReason::IterationLimit));
            }
        }
    }

    fn system_message(&self, scratchpad: &Scratchpad) -> String {
        format!(
            "{}\n\n--- Current Scratchpad ---\n{}",
            self.system_prompt,
            scratchpad.snapshot_json()
        )
    }

    /// 顺序阶段按调用顺序执行变更并校验检索，随后并发扇出全部检索；结果按调用顺序返回
    async fn dispatch_all(&self, calls: &[ToolCall], scratchpad: &mut Scratchpad) -> Vec<String> {
        let mut slots: Vec<Option<Result<String, ToolError>>> = Vec::with_capacity(calls.len());
        let mut searches = Vec::new();

        for (index, call) in calls.iter().enumerate() {
            let dispatch = match ToolInvocation::parse(&call.name, &call.arguments) {
                Ok(invocation) => self.dispatcher.dispatch(invocation, scratchpad),
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "Rejected tool call");
                    Dispatch::Done(Err(e))
                }
            };
            match dispatch {
                Dispatch::Done(result) => slots.push(Some(result)),
                Dispatch::Search { query, top_k } => {
                    searches.push((index, query, top_k));
                    slots.push(None);
                }
            }
        }

        if !searches.is_empty() {
            tracing::debug!(count = searches.len(), "Fanning out searches");
        }
        let dispatcher = &self.dispatcher;
        let finished = join_all(searches.into_iter().map(|(index, query, top_k)| async move {
            (index, dispatcher.search(&query, top_k).await)
        }))
        .await;
        for (index, result) in finished {
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .map(|slot| {
                render(slot.unwrap_or_else(|| Err(ToolError::Retrieval("search was not executed".into()))))
            })
            .collect()
    }

    fn partial(
        &self,
        scratchpad: Scratchpad,
        messages: Vec<Message>,
        iterations: usize,
        reason: PartialReason,
    ) -> RunOutcome {
        RunOutcome {
            answer: fallback_answer(&scratchpad, reason),
            status: RunStatus::Partial(reason),
            iterations,
            scratchpad,
            messages,
        }
    }
}

/// 由已完成任务的结果合成部分答案，始终带不完整提示
pub fn fallback_answer(scratchpad: &Scratchpad, reason: PartialReason) -> String {
    let notice = match reason {
        PartialReason::IterationLimit => "[Partial answer: max iterations reached]",
        PartialReason::EmptyResponse => "[Partial answer: the model stopped without an answer]",
    };
    let lines: Vec<String> = scratchpad
        .completed_results()
        .map(|(task, result)| format!("- {}: {}", task.description, result))
        .collect();
    if lines.is_empty() {
        format!("{notice}\nUnable to answer: no task results were recorded.")
    } else {
        format!("{notice}\n{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_lists_completed_tasks() {
        let mut pad = Scratchpad::new("q");
        let a = pad.add_task("find product", vec![]).unwrap();
        pad.add_task("find creator", vec![a]).unwrap();
        pad.complete_task(a, "AX-7").unwrap();
        let answer = fallback_answer(&pad, PartialReason::IterationLimit);
        assert_eq!(answer, "[Partial answer: max iterations reached]\n- find product: AX-7");
    }

    #[test]
    fn test_fallback_without_results_is_not_empty() {
        let pad = Scratchpad::new("q");
        let answer = fallback_answer(&pad, PartialReason::EmptyResponse);
        assert!(answer.starts_with("[Partial answer"));
        assert!(answer.contains("no task results"));
    }
}
