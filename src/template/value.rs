//! Property values of a CloudFormation template
//!
//! Values are classified once, when the template is parsed, into a closed
//! tagged type:
//! - **Literals**: null, booleans, numbers, strings
//! - **Containers**: lists and maps
//! - **Intrinsics**: `Ref` and the supported `Fn::*` functions
//!
//! Downstream code pattern-matches on `CfnValue` and never re-inspects raw
//! JSON maps to decide whether something is an expression.

use serde_json::{Number, Value as JsonValue};
use std::collections::BTreeMap;

use crate::error::{ConvertError, ConvertResult};

// =============================================================================
// VALUE TYPES
// =============================================================================

/// A property value in a source template
#[derive(Debug, Clone, PartialEq)]
pub enum CfnValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<CfnValue>),
    Map(BTreeMap<String, CfnValue>),
    Intrinsic(Box<Intrinsic>),
}

/// One of the supported intrinsic functions
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
    /// `{"Ref": "Name"}`
    Ref(String),
    /// `{"Fn::GetAtt": ["Name", "Attr"]}` or `{"Fn::GetAtt": "Name.Attr"}`
    GetAtt { resource: String, attribute: String },
    /// `{"Fn::Join": [sep, parts]}`; `parts` is a list or a list-valued expression
    Join { separator: String, parts: CfnValue },
    /// `{"Fn::Split": [sep, source]}`
    Split { separator: String, source: CfnValue },
    /// `{"Fn::Select": [index, list]}`
    Select { index: CfnValue, list: CfnValue },
    /// `{"Fn::Sub": "tmpl"}` or `{"Fn::Sub": ["tmpl", {vars}]}`
    Sub {
        template: String,
        variables: BTreeMap<String, CfnValue>,
    },
    /// `{"Fn::ImportValue": key}`
    ImportValue(CfnValue),
}

impl Intrinsic {
    /// The template key this intrinsic was written with
    pub fn function_name(&self) -> &'static str {
        match self {
            Intrinsic::Ref(_) => "Ref",
            Intrinsic::GetAtt { .. } => "Fn::GetAtt",
            Intrinsic::Join { .. } => "Fn::Join",
            Intrinsic::Split { .. } => "Fn::Split",
            Intrinsic::Select { .. } => "Fn::Select",
            Intrinsic::Sub { .. } => "Fn::Sub",
            Intrinsic::ImportValue(_) => "Fn::ImportValue",
        }
    }
}

impl CfnValue {
    pub fn string(s: impl Into<String>) -> Self {
        CfnValue::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CfnValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[CfnValue]> {
        match self {
            CfnValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, CfnValue>> {
        match self {
            CfnValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_intrinsic(&self) -> Option<&Intrinsic> {
        match self {
            CfnValue::Intrinsic(i) => Some(i),
            _ => None,
        }
    }

    /// Field of a map value
    pub fn get(&self, key: &str) -> Option<&CfnValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Name targeted by a `Ref`, if this value is one
    pub fn ref_target(&self) -> Option<&str> {
        match self.as_intrinsic() {
            Some(Intrinsic::Ref(name)) => Some(name),
            _ => None,
        }
    }

    /// Short description used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            CfnValue::Null => "null",
            CfnValue::Bool(_) => "boolean",
            CfnValue::Number(_) => "number",
            CfnValue::String(_) => "string",
            CfnValue::List(_) => "list",
            CfnValue::Map(_) => "map",
            CfnValue::Intrinsic(i) => i.function_name(),
        }
    }

    // =========================================================================
    // PARSING
    // =========================================================================

    /// Classify a raw JSON value. `path` names the location for error messages.
    pub fn from_json(json: &JsonValue, path: &str) -> ConvertResult<CfnValue> {
        match json {
            JsonValue::Null => Ok(CfnValue::Null),
            JsonValue::Bool(b) => Ok(CfnValue::Bool(*b)),
            JsonValue::Number(n) => Ok(CfnValue::Number(n.clone())),
            JsonValue::String(s) => Ok(CfnValue::String(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| CfnValue::from_json(item, &format!("{}[{}]", path, i)))
                .collect::<ConvertResult<Vec<_>>>()
                .map(CfnValue::List),
            JsonValue::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, arg)) = map.iter().next() {
                        if key == "Ref" || key.starts_with("Fn::") {
                            let intrinsic = parse_intrinsic(key, arg, path)?;
                            return Ok(CfnValue::Intrinsic(Box::new(intrinsic)));
                        }
                    }
                }
                let mut out = BTreeMap::new();
                for (key, value) in map {
                    out.insert(
                        key.clone(),
                        CfnValue::from_json(value, &format!("{}.{}", path, key))?,
                    );
                }
                Ok(CfnValue::Map(out))
            }
        }
    }
}

fn parse_intrinsic(key: &str, arg: &JsonValue, path: &str) -> ConvertResult<Intrinsic> {
    let context = format!("{} ({})", path, key);
    match key {
        "Ref" => match arg {
            JsonValue::String(name) => Ok(Intrinsic::Ref(name.clone())),
            other => Err(ConvertError::malformed(
                context,
                format!("expected a string name, got {}", json_kind(other)),
            )),
        },
        "Fn::GetAtt" => parse_get_att(arg, &context),
        "Fn::Join" => {
            let [separator, parts] = two_args(arg, &context)?;
            let separator = expect_string(separator, &context, "separator")?;
            let parts = CfnValue::from_json(parts, &format!("{}[1]", path))?;
            match parts {
                CfnValue::List(_) | CfnValue::Intrinsic(_) => Ok(Intrinsic::Join { separator, parts }),
                other => Err(ConvertError::malformed(
                    context,
                    format!("expected a list of parts, got {}", other.kind_name()),
                )),
            }
        }
        "Fn::Split" => {
            let [separator, source] = two_args(arg, &context)?;
            let separator = expect_string(separator, &context, "separator")?;
            let source = CfnValue::from_json(source, &format!("{}[1]", path))?;
            Ok(Intrinsic::Split { separator, source })
        }
        "Fn::Select" => {
            let [index, list] = two_args(arg, &context)?;
            let index = CfnValue::from_json(index, &format!("{}[0]", path))?;
            let list = CfnValue::from_json(list, &format!("{}[1]", path))?;
            Ok(Intrinsic::Select { index, list })
        }
        "Fn::Sub" => parse_sub(arg, path, &context),
        "Fn::ImportValue" => Ok(Intrinsic::ImportValue(CfnValue::from_json(arg, &context)?)),
        other => Err(ConvertError::malformed(
            context,
            format!("unsupported intrinsic function '{}'", other),
        )),
    }
}

fn parse_get_att(arg: &JsonValue, context: &str) -> ConvertResult<Intrinsic> {
    match arg {
        JsonValue::Array(items) if items.len() == 2 => {
            let resource = expect_string(&items[0], context, "resource name")?;
            let attribute = expect_string(&items[1], context, "attribute name")?;
            Ok(Intrinsic::GetAtt { resource, attribute })
        }
        JsonValue::String(s) => match s.split_once('.') {
            Some((resource, attribute)) if !resource.is_empty() && !attribute.is_empty() => {
                Ok(Intrinsic::GetAtt {
                    resource: resource.to_string(),
                    attribute: attribute.to_string(),
                })
            }
            _ => Err(ConvertError::malformed(
                context,
                format!("expected 'Resource.Attribute', got '{}'", s),
            )),
        },
        _ => Err(ConvertError::malformed(
            context,
            "expected [Resource, Attribute] or 'Resource.Attribute'",
        )),
    }
}

fn parse_sub(arg: &JsonValue, path: &str, context: &str) -> ConvertResult<Intrinsic> {
    match arg {
        JsonValue::String(template) => Ok(Intrinsic::Sub {
            template: template.clone(),
            variables: BTreeMap::new(),
        }),
        JsonValue::Array(items) if items.len() == 2 => {
            let template = expect_string(&items[0], context, "template")?;
            let JsonValue::Object(vars) = &items[1] else {
                return Err(ConvertError::malformed(
                    context,
                    format!("expected a variable map, got {}", json_kind(&items[1])),
                ));
            };
            let mut variables = BTreeMap::new();
            for (name, value) in vars {
                variables.insert(
                    name.clone(),
                    CfnValue::from_json(value, &format!("{}[1].{}", path, name))?,
                );
            }
            Ok(Intrinsic::Sub { template, variables })
        }
        other => Err(ConvertError::malformed(
            context,
            format!("expected a template string or [template, vars], got {}", json_kind(other)),
        )),
    }
}

fn two_args<'a>(arg: &'a JsonValue, context: &str) -> ConvertResult<[&'a JsonValue; 2]> {
    match arg {
        JsonValue::Array(items) if items.len() == 2 => Ok([&items[0], &items[1]]),
        other => Err(ConvertError::malformed(
            context,
            format!("expected a two-element list, got {}", json_kind(other)),
        )),
    }
}

fn expect_string(value: &JsonValue, context: &str, what: &str) -> ConvertResult<String> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        ConvertError::malformed(
            context,
            format!("{} must be a string, got {}", what, json_kind(value)),
        )
    })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "map",
    }
}
