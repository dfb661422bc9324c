//! 工具分发器
//!
//! dispatch 对一次工具调用做唯一的穷尽分支：变更类（add_task / complete_task / finish）
//! 立即作用于 Scratchpad；search_knowledge 只做任务关联校验，返回待并发执行的检索请求，
//! 由编排循环统一扇出后再按调用顺序回填。分发器从不调用 LLM。

use std::sync::Arc;
use std::time::Instant;

use crate::core::{Scratchpad, TaskScheduler, ToolError};
use crate::retrieval::RetrievalClient;
use crate::tools::ToolInvocation;

/// 单次分发的结果
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// 已处理完毕（变更类调用，或校验失败的检索）
    Done(Result<String, ToolError>),
    /// 待并发执行的检索
    Search { query: String, top_k: usize },
}

pub struct ToolDispatcher {
    retrieval: Arc<dyn RetrievalClient>,
    scheduler: Arc<TaskScheduler>,
    default_top_k: usize,
}

impl ToolDispatcher {
    pub fn new(
        retrieval: Arc<dyn RetrievalClient>,
        scheduler: Arc<TaskScheduler>,
        default_top_k: usize,
    ) -> Self {
        Self {
            retrieval,
            scheduler,
            default_top_k: default_top_k.max(1),
        }
    }

    /// 顺序阶段：按 LLM 发出的顺序调用，变更立即生效
    pub fn dispatch(&self, invocation: ToolInvocation, scratchpad: &mut Scratchpad) -> Dispatch {
        let tool = invocation.name();
        let start = Instant::now();
        let result = match invocation {
            ToolInvocation::SearchKnowledge { query, top_k, task_id } => {
                if let Some(id) = task_id {
                    if let Err(e) = self.scheduler.start_task(scratchpad, id) {
                        audit(tool, Err(&e), start);
                        return Dispatch::Done(Err(e));
                    }
                }
                return Dispatch::Search {
                    query,
                    top_k: top_k.unwrap_or(self.default_top_k).max(1),
                };
            }
            ToolInvocation::AddTask { description, depends_on } => {
                tracing::info!(%description, ?depends_on, "Invoking tool: add_task");
                scratchpad
                    .add_task(description, depends_on)
                    .map(|id| serde_json::json!({ "task_id": id }).to_string())
            }
            ToolInvocation::CompleteTask { task_id, result } => {
                tracing::info!(task_id, "Invoking tool: complete_task");
                scratchpad
                    .complete_task(task_id, result)
                    .map(|_| serde_json::json!({ "status": "ok" }).to_string())
            }
            ToolInvocation::Finish { answer } => {
                tracing::info!("Invoking tool: finish");
                scratchpad
                    .set_final_answer(answer)
                    .map(|_| serde_json::json!({ "status": "done" }).to_string())
            }
        };
        audit(tool, result.as_ref().map(|_| ()), start);
        Dispatch::Done(result)
    }

    /// 并发阶段：只读检索，不接触 Scratchpad；失败转为工具级错误
    pub async fn search(&self, query: &str, top_k: usize) -> Result<String, ToolError> {
        let start = Instant::now();
        tracing::info!(query, top_k, "Invoking tool: search_knowledge");
        let result = async {
            let _permit = self.scheduler.acquire_search().await?;
            let passages = self
                .retrieval
                .search(query, top_k)
                .await
                .map_err(|e| ToolError::Retrieval(e.to_string()))?;
            serde_json::to_string(&passages).map_err(|e| ToolError::Retrieval(e.to_string()))
        }
        .await;
        audit("search_knowledge", result.as_ref().map(|_| ()), start);
        result
    }
}

/// 工具结果文本：成功原样返回，失败包成 {"error": ...}
pub fn render(result: Result<String, ToolError>) -> String {
    match result {
        Ok(content) => content,
        Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
    }
}

fn audit(tool: &str, outcome: Result<(), &ToolError>, start: Instant) {
    let duration_ms = start.elapsed().as_millis() as u64;
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": tool,
        "ok": outcome.is_ok(),
        "error": outcome.err().map(|e| e.to_string()),
        "duration_ms": duration_ms,
    });
    match outcome {
        Ok(()) => tracing::info!(audit = %audit, "tool"),
        Err(_) => tracing::warn!(audit = %audit, "tool"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskStatus;
    use crate::retrieval::{Document, Passage, RetrievalError, StaticCorpus};
    use async_trait::async_trait;

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(
            Arc::new(StaticCorpus::acme()),
            Arc::new(TaskScheduler::default()),
            3,
        )
    }

    struct FailingRetrieval;

    #[async_trait]
    impl RetrievalClient for FailingRetrieval {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
            Err(RetrievalError::Transport("connection refused".into()))
        }

        async fn list_documents(&self) -> Result<Vec<Document>, RetrievalError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_add_and_complete() {
        let d = dispatcher();
        let mut pad = Scratchpad::new("q");
        let out = d.dispatch(
            ToolInvocation::AddTask { description: "find product".into(), depends_on: vec![] },
            &mut pad,
        );
        assert_eq!(out, Dispatch::Done(Ok(r#"{"task_id":0}"#.to_string())));

        let out = d.dispatch(
            ToolInvocation::CompleteTask { task_id: 0, result: "AX-7".into() },
            &mut pad,
        );
        assert_eq!(out, Dispatch::Done(Ok(r#"{"status":"ok"}"#.to_string())));
        assert_eq!(pad.task(0).unwrap().status, TaskStatus::Complete);
    }

    #[test]
    fn test_invalid_dependency_does_not_mutate() {
        let d = dispatcher();
        let mut pad = Scratchpad::new("q");
        let out = d.dispatch(
            ToolInvocation::AddTask { description: "x".into(), depends_on: vec![3] },
            &mut pad,
        );
        assert_eq!(out, Dispatch::Done(Err(ToolError::InvalidDependency(3))));
        assert!(pad.tasks().is_empty());
    }

    #[test]
    fn test_finish_sets_answer() {
        let d = dispatcher();
        let mut pad = Scratchpad::new("q");
        d.dispatch(ToolInvocation::Finish { answer: "42".into() }, &mut pad);
        assert_eq!(pad.final_answer(), Some("42"));
    }

    #[test]
    fn test_search_links_runnable_task() {
        let d = dispatcher();
        let mut pad = Scratchpad::new("q");
        let a = pad.add_task("a", vec![]).unwrap();
        let b = pad.add_task("b", vec![a]).unwrap();

        let out = d.dispatch(
            ToolInvocation::SearchKnowledge { query: "AX-7".into(), top_k: None, task_id: Some(a) },
            &mut pad,
        );
        assert_eq!(out, Dispatch::Search { query: "AX-7".into(), top_k: 3 });
        assert_eq!(pad.task(a).unwrap().status, TaskStatus::Running);

        let out = d.dispatch(
            ToolInvocation::SearchKnowledge { query: "creator".into(), top_k: Some(0), task_id: Some(b) },
            &mut pad,
        );
        assert!(matches!(out, Dispatch::Done(Err(ToolError::NotRunnable { .. }))));
        assert_eq!(pad.task(b).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_top_k_clamped() {
        let d = dispatcher();
        let mut pad = Scratchpad::new("q");
        let out = d.dispatch(
            ToolInvocation::SearchKnowledge { query: "q".into(), top_k: Some(0), task_id: None },
            &mut pad,
        );
        assert_eq!(out, Dispatch::Search { query: "q".into(), top_k: 1 });
    }

    #[tokio::test]
    async fn test_search_serializes_passages() {
        let d = dispatcher();
        let out = d.search("GridMind developed", 2).await.unwrap();
        let v: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(v.len(), 2);
        assert!(v[0]["doc_id"].is_u64());
        assert!(v[0]["score"].is_number());
    }

    #[tokio::test]
    async fn test_search_failure_is_tool_error() {
        let d = ToolDispatcher::new(Arc::new(FailingRetrieval), Arc::new(TaskScheduler::default()), 3);
        let err = d.search("anything", 3).await.unwrap_err();
        assert!(matches!(err, ToolError::Retrieval(_)));
        let text = render(Err(err));
        assert!(text.contains("connection refused"));
    }
}
