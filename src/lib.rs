//! research-agent：依赖感知的检索问答智能体
//!
//! 模块划分：
//! - **agent**: 无头 Agent 运行时（按配置构建模型、检索与编排器）
//! - **cli**: 命令行参数定义（clap）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 草稿本、任务调度、编排循环、错误类型
//! - **llm**: 对话模型抽象与实现（OpenAI 兼容 / Azure / Mock）
//! - **observability**: 日志初始化
//! - **retrieval**: 检索客户端（HTTP / 内置语料）
//! - **tools**: 工具调用解析、Schema 与分发

pub mod agent;
pub mod cli;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod retrieval;
pub mod tools;

pub use agent::Agent;
pub use core::{AgentError, Orchestrator};
