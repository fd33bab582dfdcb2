//! Baby-name generation: prompt rendering and validation of suggestions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TaskCodec, outer_span};

/// At most this many suggestions are kept from one reply.
pub const MAX_SUGGESTIONS: usize = 12;

/// Number of names the prompt asks for.
const REQUESTED_NAMES: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    Boy,
    Girl,
    #[default]
    Unknown,
}

impl Gender {
    fn label(&self) -> &'static str {
        match self {
            Gender::Boy => "男孩",
            Gender::Girl => "女孩",
            Gender::Unknown => "未知",
        }
    }
}

/// Parents' details a naming task is generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingRequest {
    pub father: String,
    pub mother: String,
    #[serde(default)]
    pub gender: Gender,
    /// Free-form wishes for the child, e.g. "healthy and kind".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectations: Option<String>,
}

/// One name proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameSuggestion {
    pub name: String,
    pub meaning: String,
    /// Boy / girl / neutral, as worded by the model.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NamingCodec;

impl TaskCodec for NamingCodec {
    type Request = NamingRequest;
    type Output = Vec<NameSuggestion>;

    fn render_prompt(&self, request: &NamingRequest) -> String {
        let expectations = request
            .expectations
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or("健康成长");

        format!(
            "你是起名专家。请为宝宝起名。\n\n\
             父亲：{father}\n母亲：{mother}\n性别：{gender}\n期望：{expectations}\n\n\
             请生成{count}个名字，只返回如下格式的JSON数组，不要其他文字：\n\
             [{{\"name\":\"完整姓名\",\"type\":\"男孩/女孩/中性\",\"meaning\":\"寓意\",\
             \"source\":\"出处\",\"structure\":\"单字名/双字名\",\"score\":85,\
             \"elements\":\"五行\",\"pronunciation\":\"读音特点\"}}]",
            father = request.father,
            mother = request.mother,
            gender = request.gender.label(),
            count = REQUESTED_NAMES,
        )
    }

    fn decode(&self, text: &str) -> Result<Vec<NameSuggestion>, String> {
        let entries = outer_span(text, '[', ']')
            .and_then(|span| serde_json::from_str::<Vec<Value>>(span).ok())
            .or_else(|| serde_json::from_str::<Vec<Value>>(text).ok())
            .ok_or_else(|| "reply does not contain a JSON array".to_owned())?;

        let suggestions: Vec<NameSuggestion> = entries
            .iter()
            .filter_map(suggestion)
            .take(MAX_SUGGESTIONS)
            .collect();

        if suggestions.is_empty() {
            return Err("no suggestion with both a name and a meaning".to_owned());
        }
        Ok(suggestions)
    }
}

/// Build a suggestion from one reply entry. Only `name` and `meaning` are
/// required; optional fields with an unexpected JSON type are coerced to
/// text or dropped, never the whole entry.
fn suggestion(entry: &Value) -> Option<NameSuggestion> {
    let field = |key: &str| entry.get(key).and_then(text);
    Some(NameSuggestion {
        name: field("name")?,
        meaning: field("meaning")?,
        kind: field("type"),
        source: field("source"),
        structure: field("structure"),
        score: entry.get("score").and_then(score),
        elements: field("elements"),
        pronunciation: field("pronunciation"),
    })
}

/// Non-empty text from a string, number or list of those.
fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().filter_map(text).collect::<Vec<_>>().join("、"),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
