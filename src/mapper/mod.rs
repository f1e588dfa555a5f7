//! Resource Type Mapper
//!
//! One conversion routine per `ResourceKind`. Each routine reads its source
//! properties, evaluates them through the converter, and creates exactly one
//! primary Terraform resource plus any ancillary resources and data sources
//! it needs. Routines resolve sibling resources through the converter, so a
//! reference always finds its target already converted.
//!
//! Ancillary local names are derived from the source logical id with a
//! lowercase suffix (`Role_assume_role_document`, `Api_integration`), which
//! keeps them out of the logical-id namespace.

mod apigateway;
mod cloudfront;
mod events;
mod iam;
mod lambda;
mod logs;
mod policy;
mod s3;

use std::collections::BTreeMap;

use crate::converter::{Converter, TargetHandle};
use crate::error::{ConvertError, ConvertResult};
use crate::template::{CfnValue, ResourceKind, SourceResource};
use crate::terraform::{Block, ResourceAddress, ResourceId, TfValue};

/// Dispatch to the conversion routine for `kind`
pub(crate) fn convert_resource(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
    kind: ResourceKind,
) -> ConvertResult<TargetHandle> {
    match kind {
        ResourceKind::S3Bucket => s3::convert_bucket(cx, resource),
        ResourceKind::S3BucketPolicy => s3::convert_bucket_policy(cx, resource),
        ResourceKind::LogGroup => logs::convert_log_group(cx, resource),
        ResourceKind::IamRole => iam::convert_role(cx, resource),
        ResourceKind::LambdaFunction => lambda::convert_function(cx, resource),
        ResourceKind::LambdaVersion => lambda::convert_version(cx, resource),
        ResourceKind::LambdaPermission => lambda::convert_permission(cx, resource),
        ResourceKind::CloudFrontDistribution => cloudfront::convert_distribution(cx, resource),
        ResourceKind::RestApi => apigateway::convert_rest_api(cx, resource),
        ResourceKind::ApiResource => apigateway::convert_resource(cx, resource),
        ResourceKind::ApiMethod => apigateway::convert_method(cx, resource),
        ResourceKind::ApiAuthorizer => apigateway::convert_authorizer(cx, resource),
        ResourceKind::ApiDeployment => apigateway::convert_deployment(cx, resource),
        ResourceKind::EventRule => events::convert_rule(cx, resource),
    }
}

// =============================================================================
// PROPERTY ACCESS
// =============================================================================

/// Read access to a resource's properties, with required-property errors
/// attributed to the resource
pub(crate) struct Props<'a> {
    resource: &'a SourceResource,
}

impl<'a> Props<'a> {
    /// Wrap `resource`; any property outside `known` is an error
    pub(crate) fn new(resource: &'a SourceResource, known: &[&str]) -> ConvertResult<Self> {
        if let Some(key) = resource
            .properties
            .keys()
            .find(|key| !known.contains(&key.as_str()))
        {
            return Err(unsupported(&resource.name, key));
        }
        Ok(Self { resource })
    }

    pub(crate) fn name(&self) -> &'a str {
        &self.resource.name
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a CfnValue> {
        self.resource.properties.get(key)
    }

    pub(crate) fn required(&self, key: &str) -> ConvertResult<&'a CfnValue> {
        self.get(key)
            .ok_or_else(|| ConvertError::missing(self.name(), key))
    }

    /// Evaluate an optional property. Absent and `AWS::NoValue` are both `None`.
    pub(crate) fn eval(&self, cx: &mut Converter<'_>, key: &str) -> ConvertResult<Option<TfValue>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => {
                let value = cx.evaluate(value)?;
                Ok((!value.is_null()).then_some(value))
            }
        }
    }

    pub(crate) fn eval_required(&self, cx: &mut Converter<'_>, key: &str) -> ConvertResult<TfValue> {
        self.eval(cx, key)?
            .ok_or_else(|| ConvertError::missing(self.name(), key))
    }

    /// Evaluate `key` into `block[tf_key]` when present
    pub(crate) fn copy(
        &self,
        cx: &mut Converter<'_>,
        block: &mut Block,
        key: &str,
        tf_key: &str,
    ) -> ConvertResult<()> {
        if let Some(value) = self.eval(cx, key)? {
            block.insert(tf_key.to_string(), value);
        }
        Ok(())
    }

    /// `Tags` as a Terraform `tags` map
    pub(crate) fn tags(&self, cx: &mut Converter<'_>, block: &mut Block) -> ConvertResult<()> {
        let Some(tags) = self.eval(cx, "Tags")? else {
            return Ok(());
        };
        let mut out = BTreeMap::new();
        for tag in list_items(&tags) {
            let key = tag.get("Key").and_then(TfValue::as_str).ok_or_else(|| {
                ConvertError::malformed(
                    format!("{}.Tags", self.name()),
                    "each tag needs a literal string Key",
                )
            })?;
            let value = tag.get("Value").cloned().unwrap_or_else(|| TfValue::str(""));
            out.insert(key.to_string(), value);
        }
        if !out.is_empty() {
            block.insert("tags".to_string(), TfValue::Map(out));
        }
        Ok(())
    }
}

// =============================================================================
// VALUE RESHAPING
// =============================================================================

/// Items of a list value; a single non-list value counts as a one-item list
pub(crate) fn list_items(value: &TfValue) -> Vec<TfValue> {
    match value {
        TfValue::List(items) => items.clone(),
        TfValue::Null => vec![],
        other => vec![other.clone()],
    }
}

pub(crate) fn unsupported(context: &str, key: &str) -> ConvertError {
    ConvertError::malformed(format!("{}.{}", context, key), "unsupported property")
}

/// Fail on any key of an evaluated sub-structure outside `allowed`.
/// Null passes; a value that is not a map is malformed.
pub(crate) fn check_fields(value: &TfValue, allowed: &[&str], context: &str) -> ConvertResult<()> {
    match value {
        TfValue::Null => Ok(()),
        TfValue::Map(map) => match map.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(unsupported(context, key)),
            None => Ok(()),
        },
        _ => Err(ConvertError::malformed(context, "expected a map")),
    }
}

/// Copy the fields of an evaluated map under their Terraform names.
/// `handled` lists the keys the caller reads itself; any other key fails.
pub(crate) fn remap(
    value: &TfValue,
    fields: &[(&str, &str)],
    handled: &[&str],
    context: &str,
) -> ConvertResult<Block> {
    let allowed: Vec<&str> = fields
        .iter()
        .map(|(source, _)| *source)
        .chain(handled.iter().copied())
        .collect();
    check_fields(value, &allowed, context)?;

    let mut block = Block::new();
    for (source, target) in fields {
        if let Some(v) = value.get(source) {
            if !v.is_null() {
                block.insert((*target).to_string(), v.clone());
            }
        }
    }
    Ok(block)
}

/// A nested block in Terraform JSON form (a one-element list)
pub(crate) fn nested(block: Block) -> TfValue {
    TfValue::List(vec![TfValue::Map(block)])
}

/// Required field of an evaluated sub-structure
pub(crate) fn required_field(
    value: &TfValue,
    key: &str,
    resource: &str,
    path: &str,
) -> ConvertResult<TfValue> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| ConvertError::missing(resource, format!("{}.{}", path, key)))
}

/// A JSON document property (policy, event pattern) as a Terraform string:
/// literal JSON text when fully known, else `jsonencode(...)`
pub(crate) fn json_document(value: &TfValue) -> TfValue {
    match value {
        TfValue::String(_) => value.clone(),
        _ => match value.literal_json() {
            Some(json) => TfValue::String(json.to_string()),
            None => TfValue::expr(format!("jsonencode({})", value.to_hcl())),
        },
    }
}

/// `"Enabled"`/`"ENABLED"` style status flags as a boolean
pub(crate) fn status_flag(value: &TfValue, context: &str) -> ConvertResult<TfValue> {
    match value {
        TfValue::Bool(_) => Ok(value.clone()),
        TfValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "enabled" => Ok(TfValue::Bool(true)),
            "disabled" | "suspended" => Ok(TfValue::Bool(false)),
            other => Err(ConvertError::malformed(
                context,
                format!("unknown status '{}'", other),
            )),
        },
        _ => Err(ConvertError::malformed(context, "status must be a literal string")),
    }
}

/// Local name of an ancillary resource
pub(crate) fn ancillary_name(owner: &str, suffix: &str) -> String {
    format!("{}_{}", owner, suffix)
}

/// Handle whose `Ref` is a name-like attribute, literal when the template gave one
pub(crate) fn named_handle(
    kind: ResourceKind,
    id: ResourceId,
    address: ResourceAddress,
    name_attr: &str,
    literal_name: Option<&TfValue>,
) -> TargetHandle {
    let handle = TargetHandle::new(kind, id, address, name_attr);
    match literal_name {
        Some(name) if name.is_literal() => handle.with_known_attribute(name_attr, name.clone()),
        _ => handle,
    }
}
