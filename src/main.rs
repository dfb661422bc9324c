//! research-agent 命令行入口

use anyhow::Context;
use clap::Parser;
use research_agent::cli::{Cli, Command};
use research_agent::{config::load_config, config::AppConfig, observability, Agent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init();

    let cfg = load_config(cli.config).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let agent = Agent::from_config(&cfg).context("Failed to create agent")?;

    match cli.command {
        Command::Ask { question } => {
            let question = question.join(" ");
            let answer = agent.ask(&question).await.context("Agent run failed")?;
            println!("{answer}");
        }
        Command::Documents => {
            let documents = agent
                .retrieval()
                .list_documents()
                .await
                .context("Failed to list documents")?;
            for doc in documents {
                println!("[{}] {}", doc.doc_id, doc.content);
            }
        }
    }

    Ok(())
}
