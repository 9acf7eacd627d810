//! 应用配置：从 `~/.gerisrc`（TOML）与环境变量加载
//!
//! 加载顺序：先读配置文件（必须存在），再用环境变量 `GERIS__*` 覆盖（双下划线表示嵌套，
//! 如 `GERIS__CHAT__MAX_TURNS=8`、`GERIS__GITEA__DEFAULT__TOKEN=...`）。
//! Gitea 与 OpenAI 按命名 profile 组织，启动时用 `-g` / `-o` 选择。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{ConfigError, FileFormat};
use serde::Deserialize;

use crate::core::{OrchestratorConfig, DEFAULT_SYSTEM_PROMPT};

/// 覆盖 system prompt 的环境变量
pub const PROMPT_ENV: &str = "OPENAI_DEFAULT_PROMPT";

/// 应用配置根（对应 ~/.gerisrc 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub gitea: HashMap<String, GiteaProfile>,
    #[serde(default)]
    pub openai: HashMap<String, OpenAiProfile>,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub debug: DebugSection,
}

/// [gitea.<profile>] 段
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GiteaProfile {
    pub uri: String,
    pub token: String,
}

/// [openai.<profile>] 段；uri 缺省走官方端点，token 缺省读 OPENAI_API_KEY
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OpenAiProfile {
    pub uri: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [chat] 段：对话循环参数
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 单次动作调用超时（秒）
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,
    #[serde(default)]
    pub parallel_dispatch: bool,
}

fn default_max_turns() -> usize {
    16
}

fn default_request_timeout() -> u64 {
    60
}

fn default_action_timeout() -> u64 {
    30
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_turns: default_max_turns(),
            request_timeout_secs: default_request_timeout(),
            action_timeout_secs: default_action_timeout(),
            parallel_dispatch: false,
        }
    }
}

/// [debug] 段：-d 时调试文件的输出目录
#[derive(Debug, Clone, Deserialize)]
pub struct DebugSection {
    #[serde(default = "default_debug_dir")]
    pub dir: PathBuf,
}

fn default_debug_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for DebugSection {
    fn default() -> Self {
        Self {
            dir: default_debug_dir(),
        }
    }
}

impl AppConfig {
    pub fn gitea_profile(&self, name: &str) -> Result<&GiteaProfile, ConfigError> {
        self.gitea
            .get(name)
            .ok_or_else(|| ConfigError::NotFound(format!("gitea profile `{name}`")))
    }

    pub fn openai_profile(&self, name: &str) -> Result<&OpenAiProfile, ConfigError> {
        self.openai
            .get(name)
            .ok_or_else(|| ConfigError::NotFound(format!("openai profile `{name}`")))
    }

    /// 优先级：OPENAI_DEFAULT_PROMPT > [chat].system_prompt > 内置默认
    pub fn system_prompt(&self) -> String {
        std::env::var(PROMPT_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.chat.system_prompt.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            system_prompt: self.system_prompt(),
            max_turns: self.chat.max_turns,
            request_timeout_secs: self.chat.request_timeout_secs,
            parallel_dispatch: self.chat.parallel_dispatch,
        }
    }
}

/// `$HOME/.gerisrc`
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".gerisrc"))
}

/// 加载配置文件并叠加环境变量 GERIS__*；文件不存在是错误
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let builder = config::Config::builder()
        .add_source(config::File::from(path).format(FileFormat::Toml).required(true))
        .add_source(
            config::Environment::with_prefix("GERIS")
                .separator("__")
                .try_parsing(true),
        );

    builder.build()?.try_deserialize()
}
