//! 动作参数访问
//!
//! 模型给出的 arguments 已由 Dispatcher 解码为 JSON 对象；这里按参数名取出具体类型，
//! 缺失或类型不符时返回 ActionError，由 Dispatcher 转为错误结果。

use serde_json::{Map, Value};

use crate::core::ActionError;

/// 按名取参的参数包
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionArgs {
    values: Map<String, Value>,
}

impl ActionArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// 解码模型发出的 arguments 字符串：空串视为 `{}`，其余必须是 JSON 对象
    pub fn parse(raw: &str) -> Result<Self, ActionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(values)) => Ok(Self { values }),
            Ok(Value::Null) => Ok(Self::default()),
            Ok(other) => Err(ActionError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ActionError::InvalidPayload(e.to_string())),
        }
    }

    /// null 与缺失同等对待
    fn present(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// 模型给出的全部参数名（按出现顺序）
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn str(&self, name: &str) -> Result<String, ActionError> {
        self.opt_str(name)?
            .ok_or_else(|| ActionError::MissingArgument(name.to_string()))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<String>, ActionError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(invalid(name, "a string")),
        }
    }

    pub fn str_or(&self, name: &str, default: &str) -> Result<String, ActionError> {
        Ok(self.opt_str(name)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn i64(&self, name: &str) -> Result<i64, ActionError> {
        self.opt_i64(name)?
            .ok_or_else(|| ActionError::MissingArgument(name.to_string()))
    }

    /// 整数参数；模型偶尔把数字写成字符串（"3"），一并接受
    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>, ActionError> {
        match self.present(name) {
            None => Ok(None),
            Some(v) => as_i64(v).map(Some).ok_or_else(|| invalid(name, "an integer")),
        }
    }

    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, ActionError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(_) => Err(invalid(name, "a boolean")),
        }
    }

    pub fn i64_list(&self, name: &str) -> Result<Vec<i64>, ActionError> {
        self.opt_i64_list(name)?
            .ok_or_else(|| ActionError::MissingArgument(name.to_string()))
    }

    pub fn opt_i64_list(&self, name: &str) -> Result<Option<Vec<i64>>, ActionError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(as_i64)
                .collect::<Option<Vec<_>>>()
                .map(Some)
                .ok_or_else(|| invalid(name, "an array of integers")),
            Some(v) => as_i64(v)
                .map(|n| Some(vec![n]))
                .ok_or_else(|| invalid(name, "an array of integers")),
        }
    }

    pub fn opt_str_list(&self, name: &str) -> Result<Option<Vec<String>>, ActionError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .map(Some)
                .ok_or_else(|| invalid(name, "an array of strings")),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(_) => Err(invalid(name, "an array of strings")),
        }
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn invalid(name: &str, expected: &'static str) -> ActionError {
    ActionError::InvalidArgument {
        name: name.to_string(),
        expected,
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_is_empty_object() {
        assert_eq!(ActionArgs::parse("").unwrap(), ActionArgs::default());
        assert_eq!(ActionArgs::parse("  ").unwrap(), ActionArgs::default());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = ActionArgs::parse("[1,2]").unwrap_err();
        assert_eq!(
            err,
            ActionError::InvalidPayload("expected a JSON object, got an array".into())
        );
        assert!(matches!(ActionArgs::parse("{not json"), Err(ActionError::InvalidPayload(_))));
    }

    #[test]
    fn test_typed_access() {
        let args = ActionArgs::parse(
            r#"{"owner":"acme","index":"7","labels":[1,2],"closed":false,"note":null}"#,
        )
        .unwrap();
        assert_eq!(args.str("owner").unwrap(), "acme");
        assert_eq!(args.i64("index").unwrap(), 7);
        assert_eq!(args.i64_list("labels").unwrap(), vec![1, 2]);
        assert_eq!(args.opt_bool("closed").unwrap(), Some(false));
        assert_eq!(args.opt_str("note").unwrap(), None);
        assert_eq!(args.str_or("state", "open").unwrap(), "open");
        assert_eq!(
            args.keys().collect::<Vec<_>>(),
            vec!["owner", "index", "labels", "closed", "note"]
        );
    }

    #[test]
    fn test_missing_and_mismatched() {
        let args = ActionArgs::parse(r#"{"index":"abc","owner":3}"#).unwrap();
        assert_eq!(args.str("repo").unwrap_err(), ActionError::MissingArgument("repo".into()));
        assert!(matches!(args.i64("index"), Err(ActionError::InvalidArgument { .. })));
        assert_eq!(args.str("owner").unwrap(), "3");
    }
}
