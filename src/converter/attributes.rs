//! `Fn::GetAtt` attribute names → Terraform attribute names

use crate::template::ResourceKind;

/// Attributes whose Terraform name is not the snake-cased source name
const EXCEPTIONS: &[(ResourceKind, &str, &str)] = &[
    (ResourceKind::S3Bucket, "WebsiteURL", "website_endpoint"),
    (ResourceKind::S3Bucket, "DomainName", "bucket_domain_name"),
    (ResourceKind::S3Bucket, "RegionalDomainName", "bucket_regional_domain_name"),
    (ResourceKind::IamRole, "RoleId", "unique_id"),
    (ResourceKind::LambdaVersion, "Version", "version"),
    (ResourceKind::CloudFrontDistribution, "DomainName", "domain_name"),
    (ResourceKind::RestApi, "RootResourceId", "root_resource_id"),
];

/// Terraform attribute for `attribute` on a resource of `kind`
pub fn terraform_attribute(kind: ResourceKind, attribute: &str) -> String {
    EXCEPTIONS
        .iter()
        .find(|(k, a, _)| *k == kind && *a == attribute)
        .map(|(_, _, tf)| (*tf).to_string())
        .unwrap_or_else(|| to_snake_case(attribute))
}

/// Upper-camel to lower-snake, keeping acronyms together:
/// `RootResourceId` → `root_resource_id`, `WebsiteURL` → `website_url`,
/// `ARNSuffix` → `arn_suffix`. Dotted attributes (`Endpoint.Address`)
/// become `endpoint_address`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '.' || c == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                None => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                Some(_) => false,
            };
            if starts_word && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
