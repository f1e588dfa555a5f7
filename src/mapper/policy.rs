//! IAM policy documents → `aws_iam_policy_document` data sources
//!
//! Shared by bucket policies, role trust policies and inline role policies.
//! The document is evaluated first; statements are then reshaped from the
//! evaluated values, so intrinsics anywhere in a statement are supported.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::{check_fields, list_items, Props};
use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::template::CfnValue;
use crate::terraform::{Block, ResourceAddress, TfValue};

const DOCUMENT_TYPE: &str = "aws_iam_policy_document";

/// Convert `document` into a data source named `local_name`.
/// `owner` and `property` attribute errors to the source resource.
pub(crate) fn policy_document(
    cx: &mut Converter<'_>,
    owner: &str,
    property: &str,
    local_name: &str,
    document: &CfnValue,
) -> ConvertResult<ResourceAddress> {
    let context = format!("{}.{}", owner, property);
    let evaluated = match cx.evaluate(document)? {
        TfValue::String(text) => {
            let json: JsonValue = serde_json::from_str(&text).map_err(|e| {
                ConvertError::malformed(&context, format!("policy document string is not valid JSON: {}", e))
            })?;
            TfValue::from(&json)
        }
        other => other,
    };
    if evaluated.as_map().is_none() {
        return Err(ConvertError::malformed(context, "policy document must be a map"));
    }
    check_fields(&evaluated, &["Version", "Id", "Statement"], &context)?;

    let statements = evaluated
        .get("Statement")
        .ok_or_else(|| ConvertError::missing(owner, format!("{}.Statement", property)))?;

    let mut blocks = Vec::new();
    for (i, statement) in list_items(statements).iter().enumerate() {
        let block = statement_block(statement, &format!("{}.Statement[{}]", context, i))?;
        blocks.push(TfValue::Map(block));
    }

    let mut props = Block::new();
    if let Some(version) = evaluated.get("Version") {
        props.insert("version".to_string(), version.clone());
    }
    if let Some(id) = evaluated.get("Id") {
        props.insert("policy_id".to_string(), id.clone());
    }
    props.insert("statement".to_string(), TfValue::List(blocks));

    let (_, address) = cx.add_data_source(DOCUMENT_TYPE, local_name, props)?;
    Ok(address)
}

/// Convenience for routines holding a `Props`: convert a required document property
pub(crate) fn required_document(
    cx: &mut Converter<'_>,
    props: &Props<'_>,
    property: &str,
    suffix: &str,
) -> ConvertResult<ResourceAddress> {
    let document = props.required(property)?;
    let local_name = super::ancillary_name(props.name(), suffix);
    policy_document(cx, props.name(), property, &local_name, document)
}

const STATEMENT_FIELDS: &[&str] = &[
    "Sid",
    "Effect",
    "Action",
    "NotAction",
    "Resource",
    "NotResource",
    "Principal",
    "NotPrincipal",
    "Condition",
];

fn statement_block(statement: &TfValue, context: &str) -> ConvertResult<Block> {
    if statement.as_map().is_none() {
        return Err(ConvertError::malformed(context, "statement must be a map"));
    }
    check_fields(statement, STATEMENT_FIELDS, context)?;

    let mut block = Block::new();
    if let Some(sid) = statement.get("Sid") {
        block.insert("sid".to_string(), sid.clone());
    }
    if let Some(effect) = statement.get("Effect") {
        block.insert("effect".to_string(), effect.clone());
    }

    for (source, target) in [
        ("Action", "actions"),
        ("NotAction", "not_actions"),
        ("Resource", "resources"),
        ("NotResource", "not_resources"),
    ] {
        if let Some(value) = statement.get(source) {
            block.insert(target.to_string(), TfValue::List(list_items(value)));
        }
    }

    if let Some(principal) = statement.get("Principal") {
        block.insert("principals".to_string(), principals(principal, context)?);
    }
    if let Some(principal) = statement.get("NotPrincipal") {
        block.insert("not_principals".to_string(), principals(principal, context)?);
    }
    if let Some(condition) = statement.get("Condition") {
        block.insert("condition".to_string(), conditions(condition, context)?);
    }

    Ok(block)
}

/// `"*"` becomes the wildcard principal; a map becomes one block per principal type
fn principals(principal: &TfValue, context: &str) -> ConvertResult<TfValue> {
    match principal {
        TfValue::String(s) if s == "*" => Ok(TfValue::List(vec![principal_block(
            TfValue::str("*"),
            TfValue::list_of_strs(&["*"]),
        )])),
        TfValue::Map(by_type) => Ok(TfValue::List(
            by_type
                .iter()
                .map(|(kind, ids)| principal_block(TfValue::str(kind), TfValue::List(list_items(ids))))
                .collect(),
        )),
        _ => Err(ConvertError::malformed(
            context,
            "Principal must be \"*\" or a map of principal type to identifiers",
        )),
    }
}

fn principal_block(kind: TfValue, identifiers: TfValue) -> TfValue {
    let mut block = BTreeMap::new();
    block.insert("type".to_string(), kind);
    block.insert("identifiers".to_string(), identifiers);
    TfValue::Map(block)
}

/// `{Operator: {Key: values}}` becomes one condition block per (operator, key)
fn conditions(condition: &TfValue, context: &str) -> ConvertResult<TfValue> {
    let by_operator = condition
        .as_map()
        .ok_or_else(|| ConvertError::malformed(context, "Condition must be a map"))?;

    let mut blocks = Vec::new();
    for (operator, tests) in by_operator {
        let tests = tests.as_map().ok_or_else(|| {
            ConvertError::malformed(context, format!("Condition '{}' must be a map", operator))
        })?;
        for (variable, values) in tests {
            let mut block = BTreeMap::new();
            block.insert("test".to_string(), TfValue::str(operator));
            block.insert("variable".to_string(), TfValue::str(variable));
            block.insert(
                "values".to_string(),
                TfValue::List(list_items(values).into_iter().map(stringify).collect()),
            );
            blocks.push(TfValue::Map(block));
        }
    }
    Ok(TfValue::List(blocks))
}

/// Condition values are strings in Terraform
fn stringify(value: TfValue) -> TfValue {
    match value {
        TfValue::Bool(b) => TfValue::String(b.to_string()),
        TfValue::Number(n) => TfValue::String(n.to_string()),
        other => other,
    }
}
