//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RESEARCH__*` 覆盖（双下划线表示嵌套，如 `RESEARCH__LLM__PROVIDER=azure`）。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::MAX_ITERATIONS;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub retrieval: RetrievalSection,
}

/// [agent] 段：编排循环参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 单次 run 的最大迭代数（Planning -> Dispatching -> Updating 为一轮）
    pub max_iterations: usize,
    /// search_knowledge 未给 top_k 时的默认值
    pub default_top_k: usize,
    /// 同一轮内并发检索上限
    pub max_concurrent_searches: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            default_top_k: 3,
            max_concurrent_searches: 8,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / deepseek / azure / mock
    pub provider: String,
    pub model: String,
    /// OpenAI 兼容端点；azure 时为资源 endpoint
    pub base_url: Option<String>,
    /// 未设置时读 OPENAI_API_KEY / DEEPSEEK_API_KEY / AZURE_OPENAI_API_KEY
    pub api_key: Option<String>,
    /// Azure 部署名，未设置时用 model
    pub deployment: Option<String>,
    pub api_version: String,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4.1".to_string(),
            base_url: None,
            api_key: None,
            deployment: None,
            api_version: "2025-01-01-preview".to_string(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次补全请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [retrieval] 段：检索后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    /// http / memory
    pub backend: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            backend: "http".to_string(),
            base_url: "http://localhost:8001".to_string(),
            timeout_secs: 30,
        }
    }
}

/// 默认配置文件，取第一个存在的
const DEFAULT_FILES: [&str; 2] = ["config/default.toml", "default.toml"];

/// 从 config 目录加载配置，环境变量 RESEARCH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RESEARCH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(base) = DEFAULT_FILES.iter().find(|p| Path::new(p).exists()) {
        builder = builder.add_source(config::File::from(Path::new(base)));
    }
    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path));
    }

    builder
        .add_source(
            config::Environment::with_prefix("RESEARCH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_iterations, 10);
        assert_eq!(cfg.agent.default_top_k, 3);
        assert_eq!(cfg.retrieval.backend, "http");
        assert_eq!(cfg.llm.timeouts.request, 60);
    }

    #[test]
    fn test_missing_explicit_file_is_skipped() {
        let cfg = load_config(Some(PathBuf::from("does/not/exist.toml"))).unwrap();
        assert_eq!(cfg.agent.max_iterations, MAX_ITERATIONS);
        assert_eq!(cfg.agent.max_concurrent_searches, 8);
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[agent]\nmax_iterations = 4\n\n[retrieval]\nbackend = \"memory\"\n\n[llm]\nprovider = \"mock\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.agent.max_iterations, 4);
        assert_eq!(cfg.agent.default_top_k, 3);
        assert_eq!(cfg.retrieval.backend, "memory");
        assert_eq!(cfg.retrieval.base_url, "http://localhost:8001");
        assert_eq!(cfg.llm.provider, "mock");
    }
}
