//! Gitea 后端：REST 客户端与动作目录

pub mod actions;
pub mod client;

pub use actions::GiteaActions;
pub use client::{GiteaClient, IssueFilter};
