//! Geris - 自然语言驱动的 Gitea 议题管理
//!
//! 模块划分：
//! - **actions**: 动作注册表、文档块 Schema 编译器、参数访问、分发器
//! - **config**: 应用配置加载（TOML + 环境变量，命名 profile）
//! - **core**: 错误分类、对话状态、编排状态机、UI 会话任务
//! - **gitea**: Gitea REST 客户端与动作目录
//! - **llm**: 消息线格式与传输抽象（OpenAI 兼容 / 脚本回放）
//! - **observability**: 日志初始化
//! - **transcript**: 每轮请求/响应/失败的记录（日志、调试文件、调试面板）
//! - **ui**: Ratatui TUI 界面

pub mod actions;
pub mod config;
pub mod core;
pub mod gitea;
pub mod llm;
pub mod observability;
pub mod transcript;
pub mod ui;
