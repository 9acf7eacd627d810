//! 动作层：Schema 编译、注册表、参数访问与分发

pub mod args;
pub mod dispatcher;
pub mod registry;
pub mod schema;

pub use args::ActionArgs;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use registry::{Action, ActionProvider, ActionRegistry, FnAction};
pub use schema::{compile, ActionDescriptor, FormalParam, ParamKind, ParamType, ParameterSpec};
