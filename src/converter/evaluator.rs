//! Intrinsic Function Evaluator
//!
//! Turns a `CfnValue` into a `TfValue`. Literals pass through; containers
//! are evaluated element-wise; intrinsics become either a literal (when
//! every input is known now) or a deferred Terraform expression.
//!
//! | Form            | Literal result        | Deferred result                 |
//! |-----------------|-----------------------|---------------------------------|
//! | `Ref`           | pseudo-param / name   | `type.name.id` ...              |
//! | `Fn::GetAtt`    | known attribute       | `type.name.attr`                |
//! | `Fn::Join`      | joined string         | interpolated / `join(...)`      |
//! | `Fn::Split`     | list of strings       | `split("sep", x)`               |
//! | `Fn::Select`    | list element          | `element(x, i)`                 |
//! | `Fn::Sub`       | substituted string    | interpolated                    |
//! | `Fn::ImportValue` | remote-state value  | remote-state value              |

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use super::attributes::terraform_attribute;
use super::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::reference_map::{ReferenceMap, NO_VALUE};
use crate::template::{CfnValue, Intrinsic};
use crate::terraform::{Fragment, TfValue};

/// `${...}` placeholder inside an `Fn::Sub` template
static SUB_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").unwrap());

impl<'t> Converter<'t> {
    /// Evaluate a property value against the graph built so far
    pub fn evaluate(&mut self, value: &CfnValue) -> ConvertResult<TfValue> {
        match value {
            CfnValue::Null => Ok(TfValue::Null),
            CfnValue::Bool(b) => Ok(TfValue::Bool(*b)),
            CfnValue::Number(n) => Ok(TfValue::Number(n.clone())),
            CfnValue::String(s) => Ok(TfValue::String(s.clone())),
            CfnValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let v = self.evaluate(item)?;
                    if !v.is_null() {
                        out.push(v);
                    }
                }
                Ok(TfValue::List(out))
            }
            CfnValue::Map(map) => {
                let mut out = BTreeMap::new();
                for (key, item) in map {
                    let v = self.evaluate(item)?;
                    if !v.is_null() {
                        out.insert(key.clone(), v);
                    }
                }
                Ok(TfValue::Map(out))
            }
            CfnValue::Intrinsic(intrinsic) => self.evaluate_intrinsic(intrinsic),
        }
    }

    fn evaluate_intrinsic(&mut self, intrinsic: &Intrinsic) -> ConvertResult<TfValue> {
        let result = match intrinsic {
            Intrinsic::Ref(name) => self.evaluate_ref(name),
            Intrinsic::GetAtt {
                resource,
                attribute,
            } => self.evaluate_get_att(resource, attribute),
            Intrinsic::Join { separator, parts } => self.evaluate_join(separator, parts),
            Intrinsic::Split { separator, source } => self.evaluate_split(separator, source),
            Intrinsic::Select { index, list } => self.evaluate_select(index, list),
            Intrinsic::Sub {
                template,
                variables,
            } => self.evaluate_sub(template, variables),
            Intrinsic::ImportValue(key) => self.evaluate_import(key),
        }?;
        debug!("{} -> {:?}", intrinsic.function_name(), result);
        Ok(result)
    }

    // =========================================================================
    // REFERENCES
    // =========================================================================

    pub(crate) fn evaluate_ref(&mut self, name: &str) -> ConvertResult<TfValue> {
        if name == NO_VALUE {
            return Ok(TfValue::Null);
        }
        if ReferenceMap::is_pseudo(name) {
            return self
                .state
                .ref_map
                .get(name)
                .map(TfValue::str)
                .ok_or_else(|| ConvertError::unresolved(name));
        }
        let handle = self.resolve(name)?;
        self.note_literal_reference(&handle, &handle.identity);
        Ok(handle.identity)
    }

    pub(crate) fn evaluate_get_att(&mut self, resource: &str, attribute: &str) -> ConvertResult<TfValue> {
        let handle = self.resolve(resource)?;
        let tf_attribute = terraform_attribute(handle.kind, attribute);
        let value = handle.attribute(&tf_attribute);
        self.note_literal_reference(&handle, &value);
        Ok(value)
    }

    // =========================================================================
    // STRING AND LIST FUNCTIONS
    // =========================================================================

    fn evaluate_join(&mut self, separator: &str, parts: &CfnValue) -> ConvertResult<TfValue> {
        let items = match parts {
            CfnValue::List(items) => {
                let mut evaluated = Vec::with_capacity(items.len());
                for item in items {
                    evaluated.push(self.evaluate(item)?);
                }
                evaluated
            }
            expr => match self.evaluate(expr)? {
                TfValue::List(items) => items,
                deferred @ (TfValue::Expr(_) | TfValue::Interpolated(_)) => {
                    return Ok(TfValue::expr(format!(
                        "join({}, {})",
                        TfValue::str(separator).to_hcl(),
                        deferred.to_hcl()
                    )));
                }
                other => {
                    return Err(ConvertError::malformed(
                        "Fn::Join",
                        format!("expected a list of parts, got {}", describe(&other)),
                    ));
                }
            },
        };

        let mut fragments = Vec::with_capacity(items.len() * 2);
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                fragments.push(Fragment::Text(separator.to_string()));
            }
            let part = item.to_fragments().ok_or_else(|| {
                ConvertError::malformed(
                    "Fn::Join",
                    format!("part {} is a {}, expected a string", i, describe(item)),
                )
            })?;
            fragments.extend(part);
        }
        Ok(TfValue::from_fragments(fragments))
    }

    fn evaluate_split(&mut self, separator: &str, source: &CfnValue) -> ConvertResult<TfValue> {
        match self.evaluate(source)? {
            TfValue::String(s) => Ok(TfValue::List(
                s.split(separator).map(TfValue::str).collect(),
            )),
            deferred @ (TfValue::Expr(_) | TfValue::Interpolated(_)) => Ok(TfValue::expr(format!(
                "split({}, {})",
                TfValue::str(separator).to_hcl(),
                deferred.to_hcl()
            ))),
            other => Err(ConvertError::malformed(
                "Fn::Split",
                format!("expected a string to split, got {}", describe(&other)),
            )),
        }
    }

    fn evaluate_select(&mut self, index: &CfnValue, list: &CfnValue) -> ConvertResult<TfValue> {
        let index = match self.evaluate(index)? {
            TfValue::Number(n) => n.as_u64(),
            TfValue::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| ConvertError::malformed("Fn::Select", "index must be a non-negative integer"))?;

        match self.evaluate(list)? {
            TfValue::List(items) => {
                let len = items.len();
                items.into_iter().nth(index).ok_or_else(|| {
                    ConvertError::malformed(
                        "Fn::Select",
                        format!("index {} out of range for list of {}", index, len),
                    )
                })
            }
            deferred @ (TfValue::Expr(_) | TfValue::Interpolated(_)) => Ok(TfValue::expr(format!(
                "element({}, {})",
                deferred.to_hcl(),
                index
            ))),
            other => Err(ConvertError::malformed(
                "Fn::Select",
                format!("expected a list, got {}", describe(&other)),
            )),
        }
    }

    // =========================================================================
    // SUBSTITUTION AND IMPORTS
    // =========================================================================

    fn evaluate_sub(
        &mut self,
        template: &str,
        variables: &BTreeMap<String, CfnValue>,
    ) -> ConvertResult<TfValue> {
        let mut fragments = Vec::new();
        let mut last = 0;

        for caps in SUB_TOKEN.captures_iter(template) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            fragments.push(Fragment::Text(template[last..whole.start()].to_string()));
            last = whole.end();

            let token = inner.as_str().trim();
            if let Some(literal) = token.strip_prefix('!') {
                fragments.push(Fragment::Text(format!("${{{}}}", literal)));
                continue;
            }

            let value = if let Some(var) = variables.get(token) {
                self.evaluate(var)?
            } else if ReferenceMap::is_pseudo(token) {
                self.evaluate_ref(token)?
            } else if let Some((resource, attribute)) = token.split_once('.') {
                self.evaluate_get_att(resource, attribute)?
            } else {
                self.evaluate_ref(token)?
            };

            let piece = value.to_fragments().ok_or_else(|| {
                ConvertError::malformed(
                    "Fn::Sub",
                    format!("'${{{}}}' is a {}, expected a string", token, describe(&value)),
                )
            })?;
            fragments.extend(piece);
        }
        fragments.push(Fragment::Text(template[last..].to_string()));

        Ok(TfValue::from_fragments(fragments))
    }

    fn evaluate_import(&mut self, key: &CfnValue) -> ConvertResult<TfValue> {
        let key = match self.evaluate(key)? {
            TfValue::String(s) => s,
            other => {
                return Err(ConvertError::malformed(
                    "Fn::ImportValue",
                    format!("export name must be a literal string, got {}", describe(&other)),
                ));
            }
        };
        self.remote_state
            .lookup(&key)
            .map_err(|e| ConvertError::ImportFailed {
                key: key.clone(),
                reason: e.to_string(),
            })
    }
}

fn describe(value: &TfValue) -> &'static str {
    match value {
        TfValue::Null => "null",
        TfValue::Bool(_) => "boolean",
        TfValue::Number(_) => "number",
        TfValue::String(_) => "string",
        TfValue::Expr(_) => "expression",
        TfValue::Interpolated(_) => "interpolated string",
        TfValue::List(_) => "list",
        TfValue::Map(_) => "map",
    }
}
