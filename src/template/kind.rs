//! Supported resource kinds
//!
//! The allow-list of CloudFormation type tags. Tags are resolved to a
//! `ResourceKind` once at parse time; anything outside the list is kept as
//! a raw tag and rejected when the converter visits it.

use std::fmt;

/// Closed set of CloudFormation resource types the converter understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    S3Bucket,
    S3BucketPolicy,
    LogGroup,
    IamRole,
    LambdaFunction,
    LambdaVersion,
    LambdaPermission,
    CloudFrontDistribution,
    RestApi,
    ApiResource,
    ApiMethod,
    ApiAuthorizer,
    ApiDeployment,
    EventRule,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 14] = [
        ResourceKind::S3Bucket,
        ResourceKind::S3BucketPolicy,
        ResourceKind::LogGroup,
        ResourceKind::IamRole,
        ResourceKind::LambdaFunction,
        ResourceKind::LambdaVersion,
        ResourceKind::LambdaPermission,
        ResourceKind::CloudFrontDistribution,
        ResourceKind::RestApi,
        ResourceKind::ApiResource,
        ResourceKind::ApiMethod,
        ResourceKind::ApiAuthorizer,
        ResourceKind::ApiDeployment,
        ResourceKind::EventRule,
    ];

    /// Look up a CloudFormation type tag
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.type_tag() == tag)
    }

    /// The CloudFormation type tag
    pub fn type_tag(self) -> &'static str {
        match self {
            ResourceKind::S3Bucket => "AWS::S3::Bucket",
            ResourceKind::S3BucketPolicy => "AWS::S3::BucketPolicy",
            ResourceKind::LogGroup => "AWS::Logs::LogGroup",
            ResourceKind::IamRole => "AWS::IAM::Role",
            ResourceKind::LambdaFunction => "AWS::Lambda::Function",
            ResourceKind::LambdaVersion => "AWS::Lambda::Version",
            ResourceKind::LambdaPermission => "AWS::Lambda::Permission",
            ResourceKind::CloudFrontDistribution => "AWS::CloudFront::Distribution",
            ResourceKind::RestApi => "AWS::ApiGateway::RestApi",
            ResourceKind::ApiResource => "AWS::ApiGateway::Resource",
            ResourceKind::ApiMethod => "AWS::ApiGateway::Method",
            ResourceKind::ApiAuthorizer => "AWS::ApiGateway::Authorizer",
            ResourceKind::ApiDeployment => "AWS::ApiGateway::Deployment",
            ResourceKind::EventRule => "AWS::Events::Rule",
        }
    }

    /// Terraform type of the primary resource this kind converts into.
    /// `AWS::Lambda::Version` has no resource of its own and aliases the
    /// function it publishes.
    pub fn terraform_type(self) -> &'static str {
        match self {
            ResourceKind::S3Bucket => "aws_s3_bucket",
            ResourceKind::S3BucketPolicy => "aws_s3_bucket_policy",
            ResourceKind::LogGroup => "aws_cloudwatch_log_group",
            ResourceKind::IamRole => "aws_iam_role",
            ResourceKind::LambdaFunction | ResourceKind::LambdaVersion => "aws_lambda_function",
            ResourceKind::LambdaPermission => "aws_lambda_permission",
            ResourceKind::CloudFrontDistribution => "aws_cloudfront_distribution",
            ResourceKind::RestApi => "aws_api_gateway_rest_api",
            ResourceKind::ApiResource => "aws_api_gateway_resource",
            ResourceKind::ApiMethod => "aws_api_gateway_method",
            ResourceKind::ApiAuthorizer => "aws_api_gateway_authorizer",
            ResourceKind::ApiDeployment => "aws_api_gateway_deployment",
            ResourceKind::EventRule => "aws_cloudwatch_event_rule",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}
