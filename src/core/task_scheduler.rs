//! 任务调度：可运行集合、死锁检测、检索并发限制
//!
//! 可运行 = pending 且所有依赖均已 complete。同一轮的可运行任务互相独立，可并发检索；
//! 检索并发数由 Semaphore 限制（默认 8）。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::scratchpad::{Scratchpad, Task, TaskId, TaskStatus};
use crate::core::ToolError;

/// 任务调度器
pub struct TaskScheduler {
    /// 检索并发限制
    search_semaphore: Arc<Semaphore>,
}

impl TaskScheduler {
    pub fn new(max_concurrent_searches: usize) -> Self {
        Self {
            search_semaphore: Arc::new(Semaphore::new(max_concurrent_searches.max(1))),
        }
    }

    /// 获取检索许可；Semaphore 从不关闭，失败时按工具错误处理
    pub async fn acquire_search(&self) -> Result<OwnedSemaphorePermit, ToolError> {
        self.search_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ToolError::Retrieval(e.to_string()))
    }

    /// 将可运行任务置为 running；任务存在但不可运行时拒绝
    pub fn start_task(&self, scratchpad: &mut Scratchpad, id: TaskId) -> Result<(), ToolError> {
        let task = scratchpad.task(id).ok_or(ToolError::UnknownTask(id))?;
        let status = task.status;
        let runnable = is_runnable(scratchpad, task);
        match status {
            TaskStatus::Running => Ok(()),
            TaskStatus::Pending if runnable => {
                scratchpad.mark_running(id);
                Ok(())
            }
            _ => Err(ToolError::NotRunnable { id, status }),
        }
    }

    /// 标记永远无法满足的任务为 blocked，返回本次新标记的 ID
    pub fn block_unresolvable(&self, scratchpad: &mut Scratchpad) -> Vec<TaskId> {
        let blocked = unresolvable_tasks(scratchpad);
        for id in &blocked {
            scratchpad.mark_blocked(*id);
        }
        if !blocked.is_empty() {
            tracing::warn!(?blocked, "tasks blocked by unresolvable dependencies");
        }
        blocked
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(8)
    }
}

fn is_runnable(scratchpad: &Scratchpad, task: &Task) -> bool {
    task.status == TaskStatus::Pending
        && task.depends_on.iter().all(|dep| {
            scratchpad
                .task(*dep)
                .is_some_and(|d| d.status == TaskStatus::Complete)
        })
}

/// pending 且依赖全部 complete 的任务
pub fn runnable_tasks(scratchpad: &Scratchpad) -> Vec<TaskId> {
    scratchpad
        .tasks()
        .iter()
        .filter(|t| is_runnable(scratchpad, t))
        .map(|t| t.id)
        .collect()
}

/// 在非 complete 子图上做入度传播：complete 依赖直接扣除，running 视为可满足的源头，
/// 缺失或 blocked 的依赖永不满足；入度始终降不到 0 的 pending 任务即不可解。O(V + E)。
fn unresolvable_tasks(scratchpad: &Scratchpad) -> Vec<TaskId> {
    let tasks = scratchpad.tasks();
    let status: HashMap<TaskId, TaskStatus> = tasks.iter().map(|t| (t.id, t.status)).collect();

    // 依赖 -> 依赖它的 pending 任务
    let mut adjacency: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    let mut in_degree: HashMap<TaskId, usize> = HashMap::new();
    let mut queue: VecDeque<TaskId> = VecDeque::new();

    for task in tasks {
        match task.status {
            TaskStatus::Running => queue.push_back(task.id),
            TaskStatus::Complete | TaskStatus::Blocked => {}
            TaskStatus::Pending => {
                let mut degree = 0;
                for dep in &task.depends_on {
                    match status.get(dep) {
                        Some(TaskStatus::Complete) => {}
                        Some(_) | None => {
                            adjacency.entry(*dep).or_default().push(task.id);
                            degree += 1;
                        }
                    }
                }
                in_degree.insert(task.id, degree);
                if degree == 0 {
                    queue.push_back(task.id);
                }
            }
        }
    }

    // complete 的依赖已在建图时扣除
    while let Some(id) = queue.pop_front() {
        if let Some(dependents) = adjacency.get(&id) {
            for dependent in dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }
    }

    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| in_degree.get(&t.id).is_some_and(|d| *d > 0))
        .map(|t| t.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(tasks: Vec<Task>) -> Scratchpad {
        Scratchpad::with_tasks("q", tasks)
    }

    #[test]
    fn test_runnable_requires_complete_dependencies() {
        let mut p = Scratchpad::new("find product then creator");
        let product = p.add_task("find product", vec![]).unwrap();
        let creator = p.add_task("find its creator", vec![product]).unwrap();

        assert_eq!(runnable_tasks(&p), vec![product]);

        p.complete_task(product, "AX-7").unwrap();
        assert_eq!(runnable_tasks(&p), vec![creator]);
    }

    #[test]
    fn test_independent_tasks_runnable_together() {
        let mut p = Scratchpad::new("q");
        let a = p.add_task("a", vec![]).unwrap();
        let b = p.add_task("b", vec![]).unwrap();
        assert_eq!(runnable_tasks(&p), vec![a, b]);
    }

    #[test]
    fn test_runnable_never_returns_non_pending() {
        let mut p = Scratchpad::new("q");
        let a = p.add_task("a", vec![]).unwrap();
        let b = p.add_task("b", vec![]).unwrap();
        let c = p.add_task("c", vec![]).unwrap();
        let sched = TaskScheduler::default();
        sched.start_task(&mut p, a).unwrap();
        p.complete_task(b, "done").unwrap();
        p.mark_blocked(c);
        assert!(runnable_tasks(&p).is_empty());
    }

    #[test]
    fn test_start_task_rejects_unmet_dependency() {
        let mut p = Scratchpad::new("q");
        let a = p.add_task("a", vec![]).unwrap();
        let b = p.add_task("b", vec![a]).unwrap();
        let sched = TaskScheduler::default();
        assert_eq!(
            sched.start_task(&mut p, b).unwrap_err(),
            ToolError::NotRunnable { id: b, status: TaskStatus::Pending }
        );
        assert_eq!(sched.start_task(&mut p, 42).unwrap_err(), ToolError::UnknownTask(42));
        sched.start_task(&mut p, a).unwrap();
        assert_eq!(p.task(a).unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn test_cycle_is_blocked() {
        let mut p = pad(vec![Task::new(0, "A", vec![1]), Task::new(1, "B", vec![0])]);
        let sched = TaskScheduler::default();
        let blocked = sched.block_unresolvable(&mut p);
        assert_eq!(blocked, vec![0, 1]);
        assert!(p.tasks().iter().all(|t| t.status == TaskStatus::Blocked));
        assert!(runnable_tasks(&p).is_empty());
    }

    #[test]
    fn test_dangling_and_downstream_are_blocked() {
        let mut p = pad(vec![
            Task::new(0, "root", vec![]),
            Task::new(1, "dangling", vec![9]),
            Task::new(2, "after dangling", vec![1]),
            Task::new(3, "after root", vec![0]),
        ]);
        let blocked = TaskScheduler::default().block_unresolvable(&mut p);
        assert_eq!(blocked, vec![1, 2]);
        assert_eq!(p.task(3).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_chain_behind_running_is_resolvable() {
        let mut p = pad(vec![Task::new(0, "a", vec![]), Task::new(1, "b", vec![0])]);
        let sched = TaskScheduler::default();
        sched.start_task(&mut p, 0).unwrap();
        assert!(sched.block_unresolvable(&mut p).is_empty());
    }

    #[test]
    fn test_complete_tasks_untouched() {
        let mut done = Task::new(0, "done", vec![]);
        done.status = TaskStatus::Complete;
        done.result = Some("r".into());
        let mut p = pad(vec![
            done,
            Task::new(1, "x", vec![2]),
            Task::new(2, "y", vec![1]),
            Task::new(3, "z", vec![0]),
        ]);
        let blocked = TaskScheduler::default().block_unresolvable(&mut p);
        assert_eq!(blocked, vec![1, 2]);
        assert_eq!(p.task(0).unwrap().status, TaskStatus::Complete);
        assert_eq!(runnable_tasks(&p), vec![3]);
    }

    #[tokio::test]
    async fn test_acquire_search_permits() {
        let sched = TaskScheduler::new(2);
        let p1 = sched.acquire_search().await.unwrap();
        let _p2 = sched.acquire_search().await.unwrap();
        drop(p1);
        assert!(sched.acquire_search().await.is_ok());
    }
}
