//! CloudFront distributions
//!
//! `DistributionConfig` is evaluated as a whole and reshaped into the
//! provider's nested blocks. Blocks Terraform requires but CloudFormation
//! defaults (`restrictions`, `viewer_certificate`, cache-behavior method
//! lists) are filled with CloudFormation's defaults.

use super::{check_fields, list_items, nested, remap, required_field, Props};
use crate::converter::{Converter, TargetHandle};
use crate::error::ConvertResult;
use crate::template::{ResourceKind, SourceResource};
use crate::terraform::{Block, TfValue};

const CONFIG: &str = "DistributionConfig";

const CACHE_BEHAVIOR_FIELDS: &[(&str, &str)] = &[
    ("PathPattern", "path_pattern"),
    ("TargetOriginId", "target_origin_id"),
    ("ViewerProtocolPolicy", "viewer_protocol_policy"),
    ("Compress", "compress"),
    ("MinTTL", "min_ttl"),
    ("DefaultTTL", "default_ttl"),
    ("MaxTTL", "max_ttl"),
    ("SmoothStreaming", "smooth_streaming"),
    ("FieldLevelEncryptionId", "field_level_encryption_id"),
];

pub(crate) fn convert_distribution(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, &[CONFIG, "Tags"])?;
    let name = props.name();
    let config = props.eval_required(cx, CONFIG)?;
    let context = format!("{}.{}", name, CONFIG);

    let mut block = remap(
        &config,
        &[
            ("Aliases", "aliases"),
            ("Comment", "comment"),
            ("DefaultRootObject", "default_root_object"),
            ("HttpVersion", "http_version"),
            ("IPV6Enabled", "is_ipv6_enabled"),
            ("PriceClass", "price_class"),
            ("WebACLId", "web_acl_id"),
        ],
        &[
            "Enabled",
            "Origins",
            "DefaultCacheBehavior",
            "CacheBehaviors",
            "CustomErrorResponses",
            "Logging",
            "ViewerCertificate",
            "Restrictions",
        ],
        &context,
    )?;
    block.insert("enabled".to_string(), required_field(&config, "Enabled", name, CONFIG)?);

    let origins = required_field(&config, "Origins", name, CONFIG)?;
    let mut origin_blocks = Vec::new();
    for (i, origin) in list_items(&origins).iter().enumerate() {
        origin_blocks.push(origin_block(origin, name, i)?);
    }
    block.insert("origin".to_string(), TfValue::List(origin_blocks));

    let default_behavior = required_field(&config, "DefaultCacheBehavior", name, CONFIG)?;
    block.insert(
        "default_cache_behavior".to_string(),
        nested(cache_behavior(&default_behavior, name, "DefaultCacheBehavior")?),
    );

    if let Some(behaviors) = config.get("CacheBehaviors") {
        let mut ordered = Vec::new();
        for (i, behavior) in list_items(behaviors).iter().enumerate() {
            let path = format!("{}.CacheBehaviors[{}]", CONFIG, i);
            ordered.push(TfValue::Map(cache_behavior(behavior, name, &path)?));
        }
        block.insert("ordered_cache_behavior".to_string(), TfValue::List(ordered));
    }

    if let Some(errors) = config.get("CustomErrorResponses") {
        let mut responses = Vec::new();
        for (i, response) in list_items(errors).iter().enumerate() {
            let response = remap(
                response,
                &[
                    ("ErrorCode", "error_code"),
                    ("ResponseCode", "response_code"),
                    ("ResponsePagePath", "response_page_path"),
                    ("ErrorCachingMinTTL", "error_caching_min_ttl"),
                ],
                &[],
                &format!("{}.CustomErrorResponses[{}]", context, i),
            )?;
            responses.push(TfValue::Map(response));
        }
        block.insert("custom_error_response".to_string(), TfValue::List(responses));
    }

    if let Some(logging) = config.get("Logging") {
        block.insert(
            "logging_config".to_string(),
            nested(remap(
                logging,
                &[
                    ("Bucket", "bucket"),
                    ("Prefix", "prefix"),
                    ("IncludeCookies", "include_cookies"),
                ],
                &[],
                &format!("{}.Logging", context),
            )?),
        );
    }

    block.insert(
        "viewer_certificate".to_string(),
        viewer_certificate(config.get("ViewerCertificate"), &context)?,
    );
    block.insert(
        "restrictions".to_string(),
        restrictions(config.get("Restrictions"), &context)?,
    );
    props.tags(cx, &mut block)?;

    let kind = ResourceKind::CloudFrontDistribution;
    let (id, address) = cx.add_resource(kind.terraform_type(), name, block)?;
    Ok(TargetHandle::new(kind, id, address, "id"))
}

fn origin_block(origin: &TfValue, name: &str, index: usize) -> ConvertResult<TfValue> {
    let path = format!("{}.Origins[{}]", CONFIG, index);
    let context = format!("{}.{}", name, path);
    let mut block = remap(
        origin,
        &[("OriginPath", "origin_path")],
        &["Id", "DomainName", "S3OriginConfig", "CustomOriginConfig"],
        &context,
    )?;
    block.insert("origin_id".to_string(), required_field(origin, "Id", name, &path)?);
    block.insert("domain_name".to_string(), required_field(origin, "DomainName", name, &path)?);

    if let Some(s3) = origin.get("S3OriginConfig") {
        let s3 = remap(
            s3,
            &[("OriginAccessIdentity", "origin_access_identity")],
            &[],
            &format!("{}.S3OriginConfig", context),
        )?;
        if !s3.is_empty() {
            block.insert("s3_origin_config".to_string(), nested(s3));
        }
    }
    if let Some(custom) = origin.get("CustomOriginConfig") {
        let mut custom_block = remap(
            custom,
            &[
                ("OriginProtocolPolicy", "origin_protocol_policy"),
                ("OriginReadTimeout", "origin_read_timeout"),
                ("OriginKeepaliveTimeout", "origin_keepalive_timeout"),
            ],
            &["HTTPPort", "HTTPSPort", "OriginSSLProtocols"],
            &format!("{}.CustomOriginConfig", context),
        )?;
        let port = |key: &str, default: u64| custom.get(key).cloned().unwrap_or_else(|| TfValue::Number(default.into()));
        custom_block.insert("http_port".to_string(), port("HTTPPort", 80));
        custom_block.insert("https_port".to_string(), port("HTTPSPort", 443));
        custom_block.insert(
            "origin_ssl_protocols".to_string(),
            custom
                .get("OriginSSLProtocols")
                .cloned()
                .unwrap_or_else(|| TfValue::list_of_strs(&["TLSv1.2"])),
        );
        block.insert("custom_origin_config".to_string(), nested(custom_block));
    }
    Ok(TfValue::Map(block))
}

fn cache_behavior(behavior: &TfValue, name: &str, path: &str) -> ConvertResult<Block> {
    let context = format!("{}.{}", name, path);
    let mut block = remap(
        behavior,
        CACHE_BEHAVIOR_FIELDS,
        &["AllowedMethods", "CachedMethods", "ForwardedValues", "CachePolicyId"],
        &context,
    )?;
    block.insert(
        "target_origin_id".to_string(),
        required_field(behavior, "TargetOriginId", name, path)?,
    );
    block.insert(
        "viewer_protocol_policy".to_string(),
        required_field(behavior, "ViewerProtocolPolicy", name, path)?,
    );
    for (source, target) in [("AllowedMethods", "allowed_methods"), ("CachedMethods", "cached_methods")] {
        let methods = behavior
            .get(source)
            .cloned()
            .unwrap_or_else(|| TfValue::list_of_strs(&["GET", "HEAD"]));
        block.insert(target.to_string(), methods);
    }

    if let Some(forwarded) = behavior.get("ForwardedValues") {
        let context = format!("{}.ForwardedValues", context);
        let mut fv = remap(
            forwarded,
            &[("Headers", "headers"), ("QueryStringCacheKeys", "query_string_cache_keys")],
            &["QueryString", "Cookies"],
            &context,
        )?;
        fv.insert(
            "query_string".to_string(),
            forwarded.get("QueryString").cloned().unwrap_or(TfValue::Bool(false)),
        );
        let mut cookies = Block::new();
        let cookie_config = forwarded.get("Cookies");
        if let Some(cookie_config) = cookie_config {
            check_fields(
                cookie_config,
                &["Forward", "WhitelistedNames"],
                &format!("{}.Cookies", context),
            )?;
        }
        cookies.insert(
            "forward".to_string(),
            cookie_config
                .and_then(|c| c.get("Forward"))
                .cloned()
                .unwrap_or_else(|| TfValue::str("none")),
        );
        if let Some(names) = cookie_config.and_then(|c| c.get("WhitelistedNames")) {
            cookies.insert("whitelisted_names".to_string(), names.clone());
        }
        fv.insert("cookies".to_string(), nested(cookies));
        block.insert("forwarded_values".to_string(), nested(fv));
    }
    if let Some(policy) = behavior.get("CachePolicyId") {
        block.insert("cache_policy_id".to_string(), policy.clone());
    }
    Ok(block)
}

fn viewer_certificate(certificate: Option<&TfValue>, context: &str) -> ConvertResult<TfValue> {
    let block = match certificate {
        Some(cert) => remap(
            cert,
            &[
                ("AcmCertificateArn", "acm_certificate_arn"),
                ("IamCertificateId", "iam_certificate_id"),
                ("CloudFrontDefaultCertificate", "cloudfront_default_certificate"),
                ("SslSupportMethod", "ssl_support_method"),
                ("MinimumProtocolVersion", "minimum_protocol_version"),
            ],
            &[],
            &format!("{}.ViewerCertificate", context),
        )?,
        None => Block::new(),
    };
    if block.is_empty() {
        let mut default = Block::new();
        default.insert("cloudfront_default_certificate".to_string(), TfValue::Bool(true));
        return Ok(nested(default));
    }
    Ok(nested(block))
}

fn restrictions(restrictions: Option<&TfValue>, context: &str) -> ConvertResult<TfValue> {
    let context = format!("{}.Restrictions", context);
    if let Some(restrictions) = restrictions {
        check_fields(restrictions, &["GeoRestriction"], &context)?;
    }
    let mut geo_block = match restrictions.and_then(|r| r.get("GeoRestriction")) {
        Some(geo) => remap(
            geo,
            &[("RestrictionType", "restriction_type"), ("Locations", "locations")],
            &[],
            &format!("{}.GeoRestriction", context),
        )?,
        None => Block::new(),
    };
    geo_block
        .entry("restriction_type".to_string())
        .or_insert_with(|| TfValue::str("none"));
    let mut block = Block::new();
    block.insert("geo_restriction".to_string(), nested(geo_block));
    Ok(nested(block))
}

#[cfg(test)]
mod tests {
    use crate::converter::convert_template;
    use crate::error::ConvertError;
    use crate::reference_map::DeploymentEnvironment;
    use crate::remote_state::NoRemoteState;
    use crate::template::SourceTemplate;
    use crate::terraform::synth;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_distribution_over_website_bucket() {
        let t = SourceTemplate::from_json_value(&json!({
            "Resources": {
                "Site": {
                    "Type": "AWS::S3::Bucket",
                    "Properties": {"BucketName": "my-site", "WebsiteConfiguration": {"IndexDocument": "index.html"}}
                },
                "Cdn": {
                    "Type": "AWS::CloudFront::Distribution",
                    "Properties": {"DistributionConfig": {
                        "Enabled": true,
                        "DefaultRootObject": "index.html",
                        "Origins": [{
                            "Id": "site",
                            "DomainName": {"Fn::Select": [2, {"Fn::Split": ["/", {"Fn::GetAtt": ["Site", "WebsiteURL"]}]}]},
                            "CustomOriginConfig": {"OriginProtocolPolicy": "http-only"}
                        }],
                        "DefaultCacheBehavior": {
                            "TargetOriginId": "site",
                            "ViewerProtocolPolicy": "redirect-to-https",
                            "ForwardedValues": {"QueryString": false}
                        }
                    }}
                }
            },
            "Outputs": {"CdnDomain": {"Value": {"Fn::GetAtt": ["Cdn", "DomainName"]}}}
        }))
        .unwrap();
        let stack = convert_template(&t, &DeploymentEnvironment::default(), &NoRemoteState).unwrap();
        let json = synth::to_json(&stack);
        let cdn = &json["resource"]["aws_cloudfront_distribution"]["Cdn"];

        assert_eq!(
            cdn["origin"][0]["domain_name"],
            "${element(split(\"/\", aws_s3_bucket.Site.website_endpoint), 2)}"
        );
        assert_eq!(cdn["origin"][0]["custom_origin_config"][0]["http_port"], 80);
        assert_eq!(
            cdn["default_cache_behavior"][0]["forwarded_values"],
            json!([{"query_string": false, "cookies": [{"forward": "none"}]}])
        );
        assert_eq!(cdn["restrictions"], json!([{"geo_restriction": [{"restriction_type": "none"}]}]));
        assert_eq!(
            cdn["viewer_certificate"],
            json!([{"cloudfront_default_certificate": true}])
        );
        assert_eq!(
            json["output"]["CdnDomain"]["value"],
            "${aws_cloudfront_distribution.Cdn.domain_name}"
        );
    }

    #[test]
    fn test_distribution_requires_origins() {
        let t = SourceTemplate::from_json_value(&json!({
            "Resources": {
                "Cdn": {
                    "Type": "AWS::CloudFront::Distribution",
                    "Properties": {"DistributionConfig": {"Enabled": true}}
                }
            }
        }))
        .unwrap();
        let err = convert_template(&t, &DeploymentEnvironment::default(), &NoRemoteState).unwrap_err();
        assert_eq!(err, ConvertError::missing("Cdn", "DistributionConfig.Origins"));
    }

    #[test]
    fn test_origin_custom_headers_rejected() {
        let t = SourceTemplate::from_json_value(&json!({
            "Resources": {
                "Cdn": {
                    "Type": "AWS::CloudFront::Distribution",
                    "Properties": {"DistributionConfig": {
                        "Enabled": true,
                        "Origins": [{
                            "Id": "api",
                            "DomainName": "api.example.com",
                            "OriginCustomHeaders": [{"HeaderName": "X-Origin", "HeaderValue": "cdn"}],
                            "CustomOriginConfig": {"OriginProtocolPolicy": "https-only"}
                        }],
                        "DefaultCacheBehavior": {
                            "TargetOriginId": "api",
                            "ViewerProtocolPolicy": "https-only"
                        }
                    }}
                }
            }
        }))
        .unwrap();
        let err = convert_template(&t, &DeploymentEnvironment::default(), &NoRemoteState).unwrap_err();
        assert_eq!(
            err,
            ConvertError::malformed(
                "Cdn.DistributionConfig.Origins[0].OriginCustomHeaders",
                "unsupported property"
            )
        );
    }
}
