//! 模板渲染器
//!
//! 提供 `{{variable}}` 与 `{{variable|default:value}}` 两种占位符的变量替换。
//!
//! 内置变量（每次渲染时重新计算）：
//! - `{{_now}}` - 当前本地时间，ISO-8601 格式
//! - `{{_timestamp}}` - Unix 时间戳（秒）
//! - `{{_timestamp_ms}}` - Unix 时间戳（毫秒）
//!
//! 用户变量与内置变量同名时用户变量优先。
//!
//! ## 使用示例
//!
//! ```
//! use callback_service::template::render;
//! use serde_json::json;
//!
//! let vars = json!({"order_id": "ORD-1", "amount": 99.5});
//! let vars = vars.as_object().unwrap();
//!
//! let rendered = render(r#"{"id":"{{order_id}}","amount":{{amount}},"tag":"{{tag|default:none}}"}"#, vars);
//! assert_eq!(rendered, r#"{"id":"ORD-1","amount":99.5,"tag":"none"}"#);
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::{CaptureMatches, Regex};
use serde_json::Value;
use tracing::trace;

use crate::Variables;

/// 占位符匹配正则
///
/// 默认值部分不能包含 `}`，因此 `{{x|default:a}}b}}` 中默认值只会取到 `a`。
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(\w+)(?:\|default:([^}]*))?\}\}").expect("占位符正则必须合法")
});

/// 模板片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// 原样输出的文本
    Literal(&'a str),
    /// 变量占位符
    Variable {
        name: &'a str,
        default: Option<&'a str>,
        /// 占位符原文，变量缺失且无默认值时原样输出
        raw: &'a str,
    },
}

/// 单遍扫描模板，惰性产出文本片段与变量片段
pub struct Segments<'a> {
    template: &'a str,
    matches: CaptureMatches<'static, 'a>,
    pos: usize,
    pending: Option<Segment<'a>>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }

        match self.matches.next() {
            Some(caps) => {
                let whole = caps.get(0)?;
                let variable = Segment::Variable {
                    name: caps.get(1).map_or("", |m| m.as_str()),
                    default: caps.get(2).map(|m| m.as_str()),
                    raw: whole.as_str(),
                };
                let literal_start = self.pos;
                self.pos = whole.end();

                if whole.start() > literal_start {
                    self.pending = Some(variable);
                    Some(Segment::Literal(&self.template[literal_start..whole.start()]))
                } else {
                    Some(variable)
                }
            }
            None if self.pos < self.template.len() => {
                let rest = &self.template[self.pos..];
                self.pos = self.template.len();
                Some(Segment::Literal(rest))
            }
            None => None,
        }
    }
}

/// 把模板切分为片段序列
pub fn segments(template: &str) -> Segments<'_> {
    Segments {
        template,
        matches: TOKEN_PATTERN.captures_iter(template),
        pos: 0,
        pending: None,
    }
}

/// 计算内置时间变量
pub fn builtin_variables(now: DateTime<Local>) -> Variables {
    let mut vars = Variables::new();
    vars.insert(
        "_now".to_string(),
        Value::String(now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    );
    vars.insert("_timestamp".to_string(), Value::from(now.timestamp()));
    vars.insert("_timestamp_ms".to_string(), Value::from(now.timestamp_millis()));
    vars
}

/// 变量值转字符串
///
/// 字符串原样输出，数值保持自身的字符串形式，null 输出空串，
/// 数组和对象输出紧凑 JSON。
pub fn value_to_string(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Value::Number(n) => Cow::Owned(n.to_string()),
        other => Cow::Owned(other.to_string()),
    }
}

/// 渲染模板字符串，使用当前时间计算内置变量
pub fn render(template: &str, variables: &Variables) -> String {
    if template.is_empty() {
        return String::new();
    }
    render_at(template, variables, Local::now())
}

/// 以指定时间渲染模板
pub fn render_at(template: &str, variables: &Variables, now: DateTime<Local>) -> String {
    let builtins = builtin_variables(now);
    let mut output = String::with_capacity(template.len());

    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => output.push_str(text),
            Segment::Variable { name, default, raw } => {
                match variables.get(name).or_else(|| builtins.get(name)) {
                    Some(value) => output.push_str(&value_to_string(value)),
                    None => match default {
                        Some(fallback) => output.push_str(fallback),
                        None => {
                            trace!(variable = name, "模板变量未找到，保留原样");
                            output.push_str(raw);
                        }
                    },
                }
            }
        }
    }

    output
}

/// 渲染映射中的每个值，键保持不变
pub fn render_dict(
    data: &BTreeMap<String, String>,
    variables: &Variables,
) -> BTreeMap<String, String> {
    data.iter()
        .map(|(key, value)| (key.clone(), render(value, variables)))
        .collect()
}
