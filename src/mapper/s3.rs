//! S3 buckets and bucket policies

use tracing::debug;

use super::{check_fields, list_items, nested, policy, remap, required_field, status_flag, Props};
use crate::converter::{to_snake_case, Converter, TargetHandle};
use crate::error::{ConvertError, ConvertResult};
use crate::template::{Intrinsic, ResourceKind, SourceResource};
use crate::terraform::{Block, Fragment, TfValue};

const BUCKET_PROPERTIES: &[&str] = &[
    "BucketName",
    "AccessControl",
    "BucketEncryption",
    "VersioningConfiguration",
    "WebsiteConfiguration",
    "CorsConfiguration",
    "LifecycleConfiguration",
    "Tags",
];

pub(crate) fn convert_bucket(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, BUCKET_PROPERTIES)?;
    let name = props.name();
    let mut block = Block::new();

    let bucket_name = props.eval(cx, "BucketName")?;
    if let Some(bucket) = &bucket_name {
        block.insert("bucket".to_string(), bucket.clone());
    }

    if let Some(acl) = props.eval(cx, "AccessControl")? {
        block.insert("acl".to_string(), canned_acl(&acl));
    }

    if let Some(encryption) = props.eval(cx, "BucketEncryption")? {
        block.insert(
            "server_side_encryption_configuration".to_string(),
            encryption_configuration(&encryption, name)?,
        );
    }

    if let Some(versioning) = props.eval(cx, "VersioningConfiguration")? {
        check_fields(&versioning, &["Status"], &format!("{}.VersioningConfiguration", name))?;
        let status = required_field(&versioning, "Status", name, "VersioningConfiguration")?;
        let mut v = Block::new();
        v.insert(
            "enabled".to_string(),
            status_flag(&status, &format!("{}.VersioningConfiguration.Status", name))?,
        );
        block.insert("versioning".to_string(), nested(v));
    }

    if let Some(website) = props.eval(cx, "WebsiteConfiguration")? {
        block.insert("website".to_string(), website_block(&website, name)?);
    }

    if let Some(cors) = props.eval(cx, "CorsConfiguration")? {
        check_fields(&cors, &["CorsRules"], &format!("{}.CorsConfiguration", name))?;
        let rules = required_field(&cors, "CorsRules", name, "CorsConfiguration")?;
        let mut out = Vec::new();
        for (i, rule) in list_items(&rules).iter().enumerate() {
            let block = remap(
                rule,
                &[
                    ("AllowedHeaders", "allowed_headers"),
                    ("AllowedMethods", "allowed_methods"),
                    ("AllowedOrigins", "allowed_origins"),
                    ("ExposedHeaders", "expose_headers"),
                    ("MaxAge", "max_age_seconds"),
                ],
                &[],
                &format!("{}.CorsConfiguration.CorsRules[{}]", name, i),
            )?;
            out.push(TfValue::Map(block));
        }
        block.insert("cors_rule".to_string(), TfValue::List(out));
    }

    if let Some(lifecycle) = props.eval(cx, "LifecycleConfiguration")? {
        check_fields(&lifecycle, &["Rules"], &format!("{}.LifecycleConfiguration", name))?;
        let rules = required_field(&lifecycle, "Rules", name, "LifecycleConfiguration")?;
        let mut out = Vec::new();
        for (i, rule) in list_items(&rules).iter().enumerate() {
            out.push(lifecycle_rule(rule, name, i)?);
        }
        block.insert("lifecycle_rule".to_string(), TfValue::List(out));
    }

    props.tags(cx, &mut block)?;

    let (id, address) = cx.add_resource(ResourceKind::S3Bucket.terraform_type(), name, block)?;
    let mut handle = TargetHandle::new(ResourceKind::S3Bucket, id, address, "id");
    if let Some(bucket) = bucket_name.filter(TfValue::is_literal) {
        handle = handle
            .with_known_attribute("bucket", bucket.clone())
            .with_known_attribute("id", bucket);
    }
    Ok(handle)
}

/// `PublicRead` → `public-read`
fn canned_acl(acl: &TfValue) -> TfValue {
    match acl {
        TfValue::String(s) => TfValue::String(to_snake_case(s).replace('_', "-")),
        other => other.clone(),
    }
}

fn encryption_configuration(encryption: &TfValue, name: &str) -> ConvertResult<TfValue> {
    let path = "BucketEncryption";
    check_fields(encryption, &["ServerSideEncryptionConfiguration"], &format!("{}.{}", name, path))?;
    let configs = required_field(encryption, "ServerSideEncryptionConfiguration", name, path)?;

    let mut rules = Vec::new();
    for (i, config) in list_items(&configs).iter().enumerate() {
        let path = format!("BucketEncryption.ServerSideEncryptionConfiguration[{}]", i);
        check_fields(config, &["ServerSideEncryptionByDefault"], &format!("{}.{}", name, path))?;
        let default = required_field(config, "ServerSideEncryptionByDefault", name, &path)?;
        let path = format!("{}.ServerSideEncryptionByDefault", path);
        check_fields(&default, &["SSEAlgorithm", "KMSMasterKeyID"], &format!("{}.{}", name, path))?;
        let mut by_default = Block::new();
        by_default.insert(
            "sse_algorithm".to_string(),
            required_field(&default, "SSEAlgorithm", name, &path)?,
        );
        if let Some(key) = default.get("KMSMasterKeyID") {
            by_default.insert("kms_master_key_id".to_string(), key.clone());
        }
        let mut rule = Block::new();
        rule.insert(
            "apply_server_side_encryption_by_default".to_string(),
            nested(by_default),
        );
        rules.push(TfValue::Map(rule));
    }

    let mut out = Block::new();
    out.insert("rule".to_string(), TfValue::List(rules));
    Ok(nested(out))
}

fn website_block(website: &TfValue, name: &str) -> ConvertResult<TfValue> {
    let context = format!("{}.WebsiteConfiguration", name);
    let mut block = remap(
        website,
        &[
            ("IndexDocument", "index_document"),
            ("ErrorDocument", "error_document"),
        ],
        &["RedirectAllRequestsTo"],
        &context,
    )?;
    if let Some(redirect) = website.get("RedirectAllRequestsTo") {
        check_fields(
            redirect,
            &["HostName", "Protocol"],
            &format!("{}.RedirectAllRequestsTo", context),
        )?;
        let host = redirect.get("HostName").cloned().unwrap_or(TfValue::Null);
        let target = match redirect.get("Protocol").and_then(TfValue::to_fragments) {
            Some(mut fragments) => match host.to_fragments() {
                Some(host) => {
                    fragments.push(Fragment::Text("://".to_string()));
                    fragments.extend(host);
                    TfValue::from_fragments(fragments)
                }
                None => host,
            },
            None => host,
        };
        if !target.is_null() {
            block.insert("redirect_all_requests_to".to_string(), target);
        }
    }
    Ok(nested(block))
}

fn lifecycle_rule(rule: &TfValue, name: &str, index: usize) -> ConvertResult<TfValue> {
    let path = format!("LifecycleConfiguration.Rules[{}]", index);
    let mut block = remap(
        rule,
        &[("Id", "id"), ("Prefix", "prefix")],
        &["Status", "ExpirationInDays", "NoncurrentVersionExpirationInDays"],
        &format!("{}.{}", name, path),
    )?;
    let status = required_field(rule, "Status", name, &path)?;
    block.insert(
        "enabled".to_string(),
        status_flag(&status, &format!("{}.{}.Status", name, path))?,
    );
    for (source, target) in [
        ("ExpirationInDays", "expiration"),
        ("NoncurrentVersionExpirationInDays", "noncurrent_version_expiration"),
    ] {
        if let Some(days) = rule.get(source) {
            let mut inner = Block::new();
            inner.insert("days".to_string(), days.clone());
            block.insert(target.to_string(), nested(inner));
        }
    }
    Ok(TfValue::Map(block))
}

// =============================================================================
// BUCKET POLICY
// =============================================================================

pub(crate) fn convert_bucket_policy(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, &["Bucket", "PolicyDocument"])?;
    let name = props.name();

    // A bucket from this template is read through its handle so the policy
    // uses the bucket's literal name when it has one.
    let (bucket, bucket_address) = match props.required("Bucket")?.as_intrinsic() {
        Some(Intrinsic::Ref(target)) if cx.template().contains(target) => {
            let handle = cx.resolve(target)?;
            if handle.kind != ResourceKind::S3Bucket {
                return Err(ConvertError::malformed(
                    format!("{}.Bucket", name),
                    format!("'{}' is a {}, not a bucket", target, handle.kind),
                ));
            }
            (handle.attribute("bucket"), Some(handle.address))
        }
        _ => (props.eval_required(cx, "Bucket")?, None),
    };

    let document = policy::required_document(cx, &props, "PolicyDocument", "document")?;

    let mut block = Block::new();
    block.insert("bucket".to_string(), bucket);
    block.insert("policy".to_string(), TfValue::Expr(document.attr("json")));

    let (id, address) = cx.add_resource(ResourceKind::S3BucketPolicy.terraform_type(), name, block)?;
    if let Some(bucket_address) = bucket_address {
        debug!("{} depends on {}", address, bucket_address);
        cx.add_depends_on(id, bucket_address);
    }
    Ok(TargetHandle::new(ResourceKind::S3BucketPolicy, id, address, "id"))
}

#[cfg(test)]
mod tests {
    use crate::converter::convert_template;
    use crate::error::ConvertError;
    use crate::reference_map::DeploymentEnvironment;
    use crate::remote_state::NoRemoteState;
    use crate::template::SourceTemplate;
    use crate::terraform::{synth, TerraformStack};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn convert(template: serde_json::Value) -> Result<TerraformStack, ConvertError> {
        let t = SourceTemplate::from_json_value(&template).unwrap();
        convert_template(&t, &DeploymentEnvironment::default(), &NoRemoteState)
    }

    #[test]
    fn test_deployment_bucket_encryption() {
        let stack = convert(json!({
            "Resources": {
                "ServerlessDeploymentBucket": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {
                        "BucketEncryption": {
                            "ServerSideEncryptionConfiguration": [{
                                "ServerSideEncryptionByDefault": {"SSEAlgorithm": "AES256"}
                            }]
                        },
                        "AccessControl": "Private",
                        "VersioningConfiguration": {"Status": "Enabled"}
                    }
                }
            }
        }))
        .unwrap();
        let json = synth::to_json(&stack);
        assert_eq!(
            json["resource"]["aws_s3_bucket"]["ServerlessDeploymentBucket"],
            json!({
                "acl": "private",
                "server_side_encryption_configuration": [{
                    "rule": [{
                        "apply_server_side_encryption_by_default": [{"sse_algorithm": "AES256"}]
                    }]
                }],
                "versioning": [{"enabled": true}]
            })
        );
    }

    #[test]
    fn test_missing_sse_algorithm() {
        let err = convert(json!({
            "Resources": {
                "B": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {
                        "BucketEncryption": {
                            "ServerSideEncryptionConfiguration": [{"ServerSideEncryptionByDefault": {}}]
                        }
                    }
                }
            }
        }))
        .unwrap_err();
        assert!(matches!(err, ConvertError::MissingRequiredProperty { .. }));
    }

    fn bucket(properties: serde_json::Value) -> Result<TerraformStack, ConvertError> {
        convert(json!({
            "Resources": {"B": {"Type": "AWS::S3::Bucket", "Properties": properties}}
        }))
    }

    #[test]
    fn test_lifecycle_transitions_are_not_dropped() {
        let err = bucket(json!({
            "LifecycleConfiguration": {"Rules": [{
                "Status": "Enabled",
                "ExpirationInDays": 30,
                "Transitions": [{"StorageClass": "GLACIER", "TransitionInDays": 7}]
            }]}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ConvertError::malformed(
                "B.LifecycleConfiguration.Rules[0].Transitions",
                "unsupported property"
            )
        );
    }

    #[test]
    fn test_website_routing_rules_rejected() {
        let err = bucket(json!({
            "WebsiteConfiguration": {
                "IndexDocument": "index.html",
                "RoutingRules": [{"RedirectRule": {"HostName": "example.com"}}]
            }
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ConvertError::malformed("B.WebsiteConfiguration.RoutingRules", "unsupported property")
        );
    }

    #[test]
    fn test_unknown_bucket_property_rejected() {
        let err = bucket(json!({
            "PublicAccessBlockConfiguration": {"BlockPublicAcls": true}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ConvertError::malformed("B.PublicAccessBlockConfiguration", "unsupported property")
        );
    }

    #[test]
    fn test_website_and_lifecycle_conversion() {
        let stack = bucket(json!({
            "WebsiteConfiguration": {
                "IndexDocument": "index.html",
                "RedirectAllRequestsTo": {"HostName": "example.com", "Protocol": "https"}
            },
            "LifecycleConfiguration": {"Rules": [{"Id": "expire", "Status": "Enabled", "ExpirationInDays": 30}]}
        }))
        .unwrap();
        let json = synth::to_json(&stack);
        let bucket = &json["resource"]["aws_s3_bucket"]["B"];
        assert_eq!(
            bucket["website"],
            json!([{"index_document": "index.html", "redirect_all_requests_to": "https://example.com"}])
        );
        assert_eq!(
            bucket["lifecycle_rule"],
            json!([{"id": "expire", "enabled": true, "expiration": [{"days": 30}]}])
        );
    }

    #[test]
    fn test_policy_on_unnamed_bucket_defers_and_depends() {
        let stack = convert(json!({
            "Resources": {
                "Policy": {
                    "Type": "AWS::S3::BucketPolicy",
                    "Properties": {
                        "Bucket": {"Ref": "B"},
                        "PolicyDocument": {"Statement": [{
                            "Effect": "Allow",
                            "Principal": {"AWS": "arn:aws:iam::1:root"},
                            "Action": "s3:GetObject",
                            "Resource": {"Fn::Sub": "${B.Arn}/*"}
                        }]}
                    }
                },
                "B": {"Type": "AWS::S3::Bucket"}
            }
        }))
        .unwrap();
        let json = synth::to_json(&stack);
        assert_eq!(
            json["resource"]["aws_s3_bucket_policy"]["Policy"],
            json!({
                "bucket": "${aws_s3_bucket.B.bucket}",
                "policy": "${data.aws_iam_policy_document.Policy_document.json}",
                "depends_on": ["aws_s3_bucket.B"]
            })
        );
        assert_eq!(
            json["data"]["aws_iam_policy_document"]["Policy_document"]["statement"][0]["resources"],
            json!(["${aws_s3_bucket.B.arn}/*"])
        );
    }

    #[test]
    fn test_policy_requires_document() {
        let err = convert(json!({
            "Resources": {
                "Policy": {"Type": "AWS::S3::BucketPolicy", "Properties": {"Bucket": "literal-bucket"}}
            }
        }))
        .unwrap_err();
        assert_eq!(err, ConvertError::missing("Policy", "PolicyDocument"));
    }
}
