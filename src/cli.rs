//! 命令行定义

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// 依赖感知的检索问答智能体
#[derive(Debug, Parser)]
#[command(name = "research-agent", version, about = "Answer questions from a knowledge base")]
pub struct Cli {
    /// 额外的配置文件，覆盖 config/default.toml
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Command {
    /// Ask a question and print the answer
    Ask {
        /// Question text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// List every document in the knowledge base
    Documents,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_collects_words() {
        let cli = Cli::try_parse_from(["research-agent", "ask", "Who", "built", "GridMind?"]).unwrap();
        assert_eq!(cli.config, None);
        assert_eq!(
            cli.command,
            Command::Ask { question: vec!["Who".into(), "built".into(), "GridMind?".into()] }
        );
    }

    #[test]
    fn test_config_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["research-agent", "ask", "--config", "x.toml", "q"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert_eq!(cli.command, Command::Ask { question: vec!["q".into()] });
    }

    #[test]
    fn test_config_before_subcommand() {
        let cli = Cli::try_parse_from(["research-agent", "-c", "x.toml", "documents"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert_eq!(cli.command, Command::Documents);
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["research-agent", "ask"]).is_err());
        assert!(Cli::try_parse_from(["research-agent"]).is_err());
    }
}
