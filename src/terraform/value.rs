//! Target-system values
//!
//! A `TfValue` is either a literal known at conversion time or a deferred
//! Terraform expression that is resolved later, at plan/apply time.
//! Deferred expressions render as `${...}` tokens in Terraform JSON.

use serde_json::{Number, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// Body of a Terraform expression, e.g. `aws_s3_bucket.Bucket.arn`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TfExpr(String);

impl TfExpr {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn body(&self) -> &str {
        &self.0
    }

    /// The interpolation token this expression renders as
    pub fn token(&self) -> String {
        format!("${{{}}}", self.0)
    }
}

impl fmt::Display for TfExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Expr(TfExpr),
}

/// A property value in the target graph
#[derive(Debug, Clone, PartialEq)]
pub enum TfValue {
    Null,
    Bool(bool),
    Number(Number),
    /// Literal string
    String(String),
    /// Deferred expression
    Expr(TfExpr),
    /// String template mixing literal text and deferred expressions
    Interpolated(Vec<Fragment>),
    List(Vec<TfValue>),
    Map(BTreeMap<String, TfValue>),
}

impl TfValue {
    pub fn str(s: impl Into<String>) -> Self {
        TfValue::String(s.into())
    }

    pub fn expr(body: impl Into<String>) -> Self {
        TfValue::Expr(TfExpr::new(body))
    }

    pub fn list_of_strs<S: AsRef<str>>(items: &[S]) -> Self {
        TfValue::List(items.iter().map(|s| TfValue::str(s.as_ref())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TfValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TfValue]> {
        match self {
            TfValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, TfValue>> {
        match self {
            TfValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Field of a map value
    pub fn get(&self, key: &str) -> Option<&TfValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TfValue::Null)
    }

    /// True when nothing in this value is deferred
    pub fn is_literal(&self) -> bool {
        match self {
            TfValue::Expr(_) | TfValue::Interpolated(_) => false,
            TfValue::List(items) => items.iter().all(TfValue::is_literal),
            TfValue::Map(map) => map.values().all(TfValue::is_literal),
            _ => true,
        }
    }

    /// Plain JSON of a fully literal value; `None` if anything is deferred
    pub fn literal_json(&self) -> Option<JsonValue> {
        match self {
            TfValue::Null => Some(JsonValue::Null),
            TfValue::Bool(b) => Some(JsonValue::Bool(*b)),
            TfValue::Number(n) => Some(JsonValue::Number(n.clone())),
            TfValue::String(s) => Some(JsonValue::String(s.clone())),
            TfValue::Expr(_) | TfValue::Interpolated(_) => None,
            TfValue::List(items) => items
                .iter()
                .map(TfValue::literal_json)
                .collect::<Option<Vec<_>>>()
                .map(JsonValue::Array),
            TfValue::Map(map) => map
                .iter()
                .map(|(k, v)| v.literal_json().map(|j| (k.clone(), j)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(JsonValue::Object),
        }
    }

    /// String-like values as template fragments; `None` for anything else
    pub fn to_fragments(&self) -> Option<Vec<Fragment>> {
        match self {
            TfValue::String(s) => Some(vec![Fragment::Text(s.clone())]),
            TfValue::Number(n) => Some(vec![Fragment::Text(n.to_string())]),
            TfValue::Bool(b) => Some(vec![Fragment::Text(b.to_string())]),
            TfValue::Expr(e) => Some(vec![Fragment::Expr(e.clone())]),
            TfValue::Interpolated(frags) => Some(frags.clone()),
            _ => None,
        }
    }

    /// Normalize fragments: adjacent text merged, all-text collapses to a
    /// literal, a lone expression collapses to `Expr`.
    pub fn from_fragments(fragments: Vec<Fragment>) -> TfValue {
        let mut merged: Vec<Fragment> = Vec::with_capacity(fragments.len());
        for frag in fragments {
            match frag {
                Fragment::Text(t) if t.is_empty() => {}
                Fragment::Text(t) => {
                    if let Some(Fragment::Text(prev)) = merged.last_mut() {
                        prev.push_str(&t);
                    } else {
                        merged.push(Fragment::Text(t));
                    }
                }
                expr => merged.push(expr),
            }
        }
        match merged.as_slice() {
            [] => TfValue::String(String::new()),
            [Fragment::Text(t)] => TfValue::String(t.clone()),
            [Fragment::Expr(e)] => TfValue::Expr(e.clone()),
            _ => TfValue::Interpolated(merged),
        }
    }

    // =========================================================================
    // RENDERING
    // =========================================================================

    /// Terraform JSON rendering (deferred parts become `${...}` tokens)
    pub fn to_json(&self) -> JsonValue {
        match self {
            TfValue::Null => JsonValue::Null,
            TfValue::Bool(b) => JsonValue::Bool(*b),
            TfValue::Number(n) => JsonValue::Number(n.clone()),
            TfValue::String(s) => JsonValue::String(escape_template(s)),
            TfValue::Expr(e) => JsonValue::String(e.token()),
            TfValue::Interpolated(frags) => {
                let mut out = String::new();
                for frag in frags {
                    match frag {
                        Fragment::Text(t) => out.push_str(&escape_template(t)),
                        Fragment::Expr(e) => out.push_str(&e.token()),
                    }
                }
                JsonValue::String(out)
            }
            TfValue::List(items) => JsonValue::Array(items.iter().map(TfValue::to_json).collect()),
            TfValue::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// The value as an expression operand: tokens are unwrapped to their
    /// bodies, literals become HCL literals.
    pub fn to_hcl(&self) -> String {
        match self {
            TfValue::Null => "null".to_string(),
            TfValue::Bool(b) => b.to_string(),
            TfValue::Number(n) => n.to_string(),
            TfValue::String(s) => hcl_quote(s),
            TfValue::Expr(e) => e.body().to_string(),
            TfValue::Interpolated(frags) => {
                let mut out = String::from("\"");
                for frag in frags {
                    match frag {
                        Fragment::Text(t) => out.push_str(&hcl_escape(t)),
                        Fragment::Expr(e) => out.push_str(&e.token()),
                    }
                }
                out.push('"');
                out
            }
            TfValue::List(items) => format!(
                "[{}]",
                items.iter().map(TfValue::to_hcl).collect::<Vec<_>>().join(", ")
            ),
            TfValue::Map(map) => format!(
                "{{{}}}",
                map.iter()
                    .map(|(k, v)| format!("{} = {}", hcl_quote(k), v.to_hcl()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl From<&JsonValue> for TfValue {
    fn from(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => TfValue::Null,
            JsonValue::Bool(b) => TfValue::Bool(*b),
            JsonValue::Number(n) => TfValue::Number(n.clone()),
            JsonValue::String(s) => TfValue::String(s.clone()),
            JsonValue::Array(items) => TfValue::List(items.iter().map(TfValue::from).collect()),
            JsonValue::Object(map) => TfValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), TfValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for TfValue {
    fn from(s: &str) -> Self {
        TfValue::String(s.to_string())
    }
}

impl From<String> for TfValue {
    fn from(s: String) -> Self {
        TfValue::String(s)
    }
}

impl From<bool> for TfValue {
    fn from(b: bool) -> Self {
        TfValue::Bool(b)
    }
}

impl From<TfExpr> for TfValue {
    fn from(e: TfExpr) -> Self {
        TfValue::Expr(e)
    }
}

/// Literal text inside a Terraform string template
fn escape_template(s: &str) -> String {
    s.replace("${", "$${").replace("%{", "%%{")
}

fn hcl_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    escape_template(&out)
}

fn hcl_quote(s: &str) -> String {
    format!("\"{}\"", hcl_escape(s))
}
