//! Geris - 自然语言驱动的 Gitea 议题管理
//!
//! 入口：解析参数、加载配置、构建动作注册表与编排器，然后运行 TUI 或一次性对话。

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use geris::actions::{ActionRegistry, Dispatcher};
use geris::config::{default_config_path, load_config};
use geris::core::{spawn_session, Orchestrator};
use geris::gitea::{GiteaActions, GiteaClient};
use geris::llm::{ChatTransport, OpenAiTransport};
use geris::observability;
use geris::transcript::{ChannelSink, FanoutSink, FileTranscriptSink, TracingSink};
use geris::ui::run_app;

#[derive(Debug, Parser)]
#[command(
    name = "geris",
    about = "Manage Gitea issues, labels and milestones in plain language",
    after_help = "Examples:\n  geris -p 'list open issues on acme/web'\n  geris -d -g staging\n  geris --list-actions"
)]
struct Cli {
    #[arg(short = 'c', long = "config", help = "Config file (default: ~/.gerisrc)")]
    config: Option<PathBuf>,
    #[arg(short = 'd', long = "debug", help = "Write per-turn transcript files and show the debug pane")]
    debug: bool,
    #[arg(short = 'g', long = "gitea", default_value = "default", help = "Gitea profile name")]
    gitea: String,
    #[arg(short = 'o', long = "openai", default_value = "default", help = "OpenAI profile name")]
    openai: String,
    #[arg(short = 'p', long = "prompt", help = "Run one conversation headless and print the result")]
    prompt: Option<String>,
    #[arg(long = "list-actions", help = "Print the compiled action catalog as JSON and exit")]
    list_actions: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let headless = cli.prompt.is_some() || cli.list_actions;

    let config_path = cli
        .config
        .clone()
        .or_else(default_config_path)
        .context("HOME is not set; pass -c <config>")?;
    let cfg = load_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    // TUI 占用终端，日志写文件
    if headless {
        observability::init();
    } else {
        let log_path = log_file_path(&cfg.debug.dir)?;
        observability::init_file(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    }

    let gitea = cfg.gitea_profile(&cli.gitea)?;
    let client = GiteaClient::new(&gitea.uri, &gitea.token, cfg.chat.action_timeout_secs)
        .context("Failed to build Gitea client")?;
    let registry = Arc::new(
        ActionRegistry::from_provider(&GiteaActions::new(client))
            .context("Failed to build action registry")?,
    );

    if cli.list_actions {
        println!("{}", serde_json::to_string_pretty(registry.tool_catalog())?);
        return Ok(ExitCode::SUCCESS);
    }

    let openai = cfg.openai_profile(&cli.openai)?;
    let transport = Arc::new(OpenAiTransport::new(
        openai.uri.as_deref(),
        &openai.model,
        openai.token.as_deref(),
    ));
    tracing::info!(model = %openai.model, gitea = %gitea.uri, actions = registry.len(), "starting");

    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if cli.debug {
        let files = FileTranscriptSink::new(&cfg.debug.dir)
            .with_context(|| format!("Failed to create debug dir {}", cfg.debug.dir.display()))?;
        sink = sink.with(Arc::new(files));
    }
    let debug_rx = if cli.debug && !headless {
        let (tx, rx) = mpsc::unbounded_channel();
        sink = sink.with(Arc::new(ChannelSink::new(tx)));
        Some(rx)
    } else {
        None
    };

    let orchestrator = Orchestrator::new(
        transport.clone(),
        Dispatcher::new(registry, cfg.chat.action_timeout_secs),
        cfg.orchestrator_config(),
    )
    .with_sink(Arc::new(sink));

    if let Some(prompt) = cli.prompt {
        let outcome = orchestrator.run(&prompt).await;
        println!("{}", outcome.to_markdown());
        let (prompt_tokens, completion_tokens, total_tokens) = transport.token_usage();
        tracing::info!(prompt_tokens, completion_tokens, total_tokens, "token usage");
        return Ok(if outcome.is_finalized() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let (cmd_tx, state_rx) = spawn_session(Arc::new(orchestrator));
    run_app(state_rx, debug_rx, cmd_tx)
        .await
        .context("App run failed")?;

    Ok(ExitCode::SUCCESS)
}

/// TUI 日志文件路径；目录不存在时创建
fn log_file_path(dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create debug dir {}", dir.display()))?;
    Ok(dir.join("geris.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["geris"]).unwrap();
        assert_eq!(cli.gitea, "default");
        assert_eq!(cli.openai, "default");
        assert!(!cli.debug);
        assert!(cli.prompt.is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::try_parse_from([
            "geris", "-c", "/tmp/rc", "-d", "-g", "staging", "-o", "local", "-p", "list repos",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/rc")));
        assert!(cli.debug);
        assert_eq!(cli.gitea, "staging");
        assert_eq!(cli.openai, "local");
        assert_eq!(cli.prompt.as_deref(), Some("list repos"));
    }

    #[test]
    fn test_log_file_path_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("debug").join("nested");
        let path = log_file_path(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(path, dir.join("geris.log"));
    }

    #[test]
    fn test_log_file_path_reports_unusable_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let err = log_file_path(&blocker.join("sub")).unwrap_err();
        assert!(err.to_string().starts_with("Failed to create debug dir"));
    }
}
