//! Schema 编译器：形参列表 + 文档块 -> ActionDescriptor
//!
//! 文档块按行解析，每行形如 `key:value; attr:value; ...`：
//! - 首个 key 为已声明的形参名：该行的 value 作为参数描述，`enum:` / `default:` 补充约束；
//! - 首个 key 为 `description`（且不与形参同名）：动作描述，取第一行；
//! - 首个 key 为 `required`：必填参数名列表（逗号分隔），缺省时所有参数可选；
//! - 其它 key：忽略。
//!
//! 参数类型不从文档读取，而是由注册时的 Rust 类型经 [`ParamKind`] 静态推导。

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Value};

use crate::core::SchemaCompileError;

/// 参数类型标签
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ParamType>),
    Unknown,
}

impl ParamType {
    pub fn tag(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array(_) => "array",
            ParamType::Unknown => "unknown",
        }
    }

    /// 将文档中的字面量按参数类型转成 JSON 值；无法解析时保留字符串
    fn coerce_literal(&self, raw: &str) -> Value {
        match self {
            ParamType::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            ParamType::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            ParamType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            _ => Value::String(raw.to_string()),
        }
    }
}

impl Serialize for ParamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.tag())?;
        if let ParamType::Array(items) = self {
            map.serialize_entry("items", items.as_ref())?;
        }
        map.end()
    }
}

/// 由 Rust 类型静态推导参数类型
pub trait ParamKind {
    fn param_type() -> ParamType;
}

macro_rules! impl_param_kind {
    ($variant:ident => $($t:ty),+) => {
        $(impl ParamKind for $t {
            fn param_type() -> ParamType {
                ParamType::$variant
            }
        })+
    };
}

impl_param_kind!(String => String, &str, char);
impl_param_kind!(Integer => i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);
impl_param_kind!(Number => f32, f64);
impl_param_kind!(Boolean => bool);
impl_param_kind!(Unknown => Value);

impl<T: ParamKind> ParamKind for Vec<T> {
    fn param_type() -> ParamType {
        ParamType::Array(Box::new(T::param_type()))
    }
}

impl<T: ParamKind> ParamKind for &[T] {
    fn param_type() -> ParamType {
        ParamType::Array(Box::new(T::param_type()))
    }
}

/// 可选性只由 required 列表决定，Option<T> 与 T 同类型
impl<T: ParamKind> ParamKind for Option<T> {
    fn param_type() -> ParamType {
        T::param_type()
    }
}

/// 注册记录中的一个形参：名称 + 推导出的类型
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormalParam {
    pub name: String,
    pub ty: ParamType,
}

impl FormalParam {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self { name: name.into(), ty }
    }

    /// 例：`FormalParam::of::<Vec<i64>>("labels")`
    pub fn of<T: ParamKind>(name: impl Into<String>) -> Self {
        Self::new(name, T::param_type())
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Unknown)
    }
}

/// 编译后的单个参数
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: ParamType,
    pub description: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub default: Option<Value>,
}

impl ParameterSpec {
    fn bare(param: &FormalParam) -> Self {
        Self {
            name: param.name.clone(),
            ty: param.ty.clone(),
            description: None,
            enum_values: None,
            default: None,
        }
    }

    /// properties 中该参数的 JSON 对象
    pub fn to_property(&self) -> Value {
        let mut prop = serde_json::to_value(&self.ty).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut prop {
            if let Some(d) = &self.description {
                map.insert("description".into(), Value::String(d.clone()));
            }
            if let Some(values) = &self.enum_values {
                map.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(d) = &self.default {
                map.insert("default".into(), d.clone());
            }
        }
        prop
    }
}

/// 编译后的动作描述，构建后不可变
#[derive(Clone, Debug, PartialEq)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    pub required: Vec<String>,
}

impl ActionDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// `{name, description, parameters: {type: "object", properties, required}}`
    pub fn to_function_json(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_property()))
            .collect();
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": self.required,
            }
        })
    }

    /// 注入 Chat Completion 请求 `tools` 数组的线格式
    pub fn to_tool_json(&self) -> Value {
        json!({
            "type": "function",
            "function": self.to_function_json(),
        })
    }
}

/// 一行文档：`(key, value)` 列表，首项为行首 key
fn parse_line(line: &str) -> Vec<(&str, &str)> {
    line.split(';')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .map(|tok| match tok.split_once(':') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (tok, ""),
        })
        .collect()
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// 编译单个动作；失败发生在 Registry 构建期，不会拖到调用时
pub fn compile(
    name: &str,
    params: &[FormalParam],
    doc: &str,
) -> Result<ActionDescriptor, SchemaCompileError> {
    let mut specs: Vec<ParameterSpec> = Vec::with_capacity(params.len());
    for p in params {
        if specs.iter().any(|s| s.name == p.name) {
            return Err(SchemaCompileError::DuplicateParameter {
                action: name.to_string(),
                param: p.name.clone(),
            });
        }
        specs.push(ParameterSpec::bare(p));
    }

    let mut description: Option<String> = None;
    let mut required: Vec<String> = Vec::new();

    for line in doc.lines() {
        let tokens = parse_line(line);
        let Some(&(lead, lead_value)) = tokens.first() else {
            continue;
        };

        if let Some(spec) = specs.iter_mut().find(|s| s.name == lead) {
            spec.description = Some(lead_value.to_string());
            for &(key, value) in &tokens[1..] {
                match key {
                    "enum" => {
                        let values = split_list(value).map(|v| spec.ty.coerce_literal(v)).collect();
                        spec.enum_values = Some(values);
                    }
                    "default" => spec.default = Some(spec.ty.coerce_literal(value)),
                    _ => {}
                }
            }
            continue;
        }

        if lead != "description" && lead != "required" {
            tracing::debug!(action = name, key = lead, "ignoring undeclared doc key");
            continue;
        }

        for (key, value) in tokens {
            match key {
                "description" if description.is_none() => description = Some(value.to_string()),
                "required" => {
                    required.clear();
                    for r in split_list(value) {
                        if !required.iter().any(|x| x == r) {
                            required.push(r.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let description = description.ok_or_else(|| SchemaCompileError::MissingDescription {
        action: name.to_string(),
    })?;

    if let Some(unknown) = required.iter().find(|r| !specs.iter().any(|s| &s.name == *r)) {
        return Err(SchemaCompileError::UnknownRequired {
            action: name.to_string(),
            param: unknown.clone(),
        });
    }

    Ok(ActionDescriptor {
        name: name.to_string(),
        description,
        parameters: specs,
        required,
    })
}
