//! 动作注册表
//!
//! 所有动作实现 Action trait（name / params / doc / invoke），由 ActionProvider 一次性列出；
//! ActionRegistry 在构建时逐个经 Schema 编译器生成 ActionDescriptor，并校验名称唯一。
//! 构建完成后只读，可用 Arc 在多个对话之间共享。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use crate::actions::args::ActionArgs;
use crate::actions::schema::{compile, ActionDescriptor, FormalParam};
use crate::core::{ActionError, RegistryError};

/// 动作 trait：名称、形参（含类型）、文档块、异步调用
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    /// 形参列表，顺序即 properties 顺序
    fn params(&self) -> &[FormalParam];

    /// 文档块（见 schema 模块的语法说明）
    fn doc(&self) -> &str;

    async fn invoke(&self, args: ActionArgs) -> Result<Value, ActionError>;
}

type Handler = dyn Fn(ActionArgs) -> BoxFuture<'static, Result<Value, ActionError>> + Send + Sync;

/// 显式注册记录：名称 + 形参 + 文档 + 闭包
pub struct FnAction {
    name: String,
    params: Vec<FormalParam>,
    doc: String,
    handler: Arc<Handler>,
}

impl FnAction {
    pub fn new<F, Fut>(name: &str, params: Vec<FormalParam>, doc: &str, handler: F) -> Self
    where
        F: Fn(ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            params,
            doc: doc.to_string(),
            handler: Arc::new(move |args| handler(args).boxed()),
        }
    }
}

#[async_trait]
impl Action for FnAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &[FormalParam] {
        &self.params
    }

    fn doc(&self) -> &str {
        &self.doc
    }

    async fn invoke(&self, args: ActionArgs) -> Result<Value, ActionError> {
        (self.handler)(args).await
    }
}

/// 动作提供方：一次性列出本会话支持的全部动作
pub trait ActionProvider {
    fn actions(&self) -> Vec<Arc<dyn Action>>;
}

struct Entry {
    descriptor: ActionDescriptor,
    action: Arc<dyn Action>,
}

/// 动作注册表：保持注册顺序，按名绑定
#[derive(Default)]
pub struct ActionRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    catalog: Vec<Value>,
}

impl ActionRegistry {
    /// 编译全部动作；任何一个描述不完整或重名都会让构建失败
    pub fn build(actions: impl IntoIterator<Item = Arc<dyn Action>>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for action in actions {
            let descriptor = compile(action.name(), action.params(), action.doc())?;
            if registry.index.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateAction(descriptor.name));
            }
            registry
                .index
                .insert(descriptor.name.clone(), registry.entries.len());
            registry.catalog.push(descriptor.to_tool_json());
            registry.entries.push(Entry { descriptor, action });
        }
        tracing::info!(actions = registry.entries.len(), "action registry built");
        Ok(registry)
    }

    pub fn from_provider(provider: &dyn ActionProvider) -> Result<Self, RegistryError> {
        Self::build(provider.actions())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.index.get(name).map(|&i| self.entries[i].action.clone())
    }

    pub fn descriptor(&self, name: &str) -> Option<&ActionDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i].descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// 线格式的工具目录，每轮请求原样注入
    pub fn tool_catalog(&self) -> &[Value] {
        &self.catalog
    }

    pub fn action_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.descriptor.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
