//! API Gateway REST APIs: api, resources, methods, authorizers, deployments
//!
//! A method carries its integration and its method/integration responses
//! inline in CloudFormation; in Terraform each of those is its own resource.

use super::{ancillary_name, json_document, list_items, nested, remap, Props};
use crate::converter::{Converter, TargetHandle};
use crate::error::{ConvertError, ConvertResult};
use crate::template::{ResourceKind, SourceResource};
use crate::terraform::{Block, ResourceAddress, TfValue};

pub(crate) fn convert_rest_api(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(
        resource,
        &[
            "Name",
            "Description",
            "BinaryMediaTypes",
            "MinimumCompressionSize",
            "ApiKeySourceType",
            "EndpointConfiguration",
            "Policy",
            "Tags",
        ],
    )?;
    let mut block = Block::new();
    block.insert("name".to_string(), props.eval_required(cx, "Name")?);
    props.copy(cx, &mut block, "Description", "description")?;
    props.copy(cx, &mut block, "BinaryMediaTypes", "binary_media_types")?;
    props.copy(cx, &mut block, "MinimumCompressionSize", "minimum_compression_size")?;
    props.copy(cx, &mut block, "ApiKeySourceType", "api_key_source")?;
    if let Some(endpoint) = props.eval(cx, "EndpointConfiguration")? {
        block.insert(
            "endpoint_configuration".to_string(),
            nested(remap(
                &endpoint,
                &[("Types", "types")],
                &[],
                &format!("{}.EndpointConfiguration", props.name()),
            )?),
        );
    }
    if let Some(policy) = props.eval(cx, "Policy")? {
        block.insert("policy".to_string(), json_document(&policy));
    }
    props.tags(cx, &mut block)?;

    let kind = ResourceKind::RestApi;
    let (id, address) = cx.add_resource(kind.terraform_type(), props.name(), block)?;
    Ok(TargetHandle::new(kind, id, address, "id"))
}

pub(crate) fn convert_resource(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, &["ParentId", "PathPart", "RestApiId"])?;
    let mut block = Block::new();
    block.insert("rest_api_id".to_string(), props.eval_required(cx, "RestApiId")?);
    block.insert("parent_id".to_string(), props.eval_required(cx, "ParentId")?);
    block.insert("path_part".to_string(), props.eval_required(cx, "PathPart")?);

    let kind = ResourceKind::ApiResource;
    let (id, address) = cx.add_resource(kind.terraform_type(), props.name(), block)?;
    Ok(TargetHandle::new(kind, id, address, "id"))
}

pub(crate) fn convert_authorizer(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(
        resource,
        &[
            "Name",
            "RestApiId",
            "Type",
            "AuthorizerUri",
            "AuthorizerCredentials",
            "AuthorizerResultTtlInSeconds",
            "IdentitySource",
            "IdentityValidationExpression",
            "ProviderARNs",
        ],
    )?;
    let mut block = Block::new();
    block.insert("name".to_string(), props.eval_required(cx, "Name")?);
    block.insert("rest_api_id".to_string(), props.eval_required(cx, "RestApiId")?);
    props.copy(cx, &mut block, "Type", "type")?;
    props.copy(cx, &mut block, "AuthorizerUri", "authorizer_uri")?;
    props.copy(cx, &mut block, "AuthorizerCredentials", "authorizer_credentials")?;
    props.copy(cx, &mut block, "AuthorizerResultTtlInSeconds", "authorizer_result_ttl_in_seconds")?;
    props.copy(cx, &mut block, "IdentitySource", "identity_source")?;
    props.copy(cx, &mut block, "IdentityValidationExpression", "identity_validation_expression")?;
    props.copy(cx, &mut block, "ProviderARNs", "provider_arns")?;

    let kind = ResourceKind::ApiAuthorizer;
    let (id, address) = cx.add_resource(kind.terraform_type(), props.name(), block)?;
    Ok(TargetHandle::new(kind, id, address, "id"))
}

pub(crate) fn convert_deployment(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, &["RestApiId", "StageName", "Description"])?;
    let mut block = Block::new();
    block.insert("rest_api_id".to_string(), props.eval_required(cx, "RestApiId")?);
    props.copy(cx, &mut block, "StageName", "stage_name")?;
    props.copy(cx, &mut block, "Description", "description")?;

    let kind = ResourceKind::ApiDeployment;
    let (id, address) = cx.add_resource(kind.terraform_type(), props.name(), block)?;
    Ok(TargetHandle::new(kind, id, address, "id"))
}

// =============================================================================
// METHODS
// =============================================================================

const METHOD_PROPERTIES: &[&str] = &[
    "HttpMethod",
    "ResourceId",
    "RestApiId",
    "AuthorizationType",
    "AuthorizerId",
    "AuthorizationScopes",
    "ApiKeyRequired",
    "OperationName",
    "RequestParameters",
    "RequestModels",
    "Integration",
    "MethodResponses",
];

/// Keys every method-scoped resource shares
struct MethodScope {
    rest_api_id: TfValue,
    resource_id: TfValue,
    http_method: TfValue,
}

impl MethodScope {
    fn block(&self) -> Block {
        let mut block = Block::new();
        block.insert("rest_api_id".to_string(), self.rest_api_id.clone());
        block.insert("resource_id".to_string(), self.resource_id.clone());
        block.insert("http_method".to_string(), self.http_method.clone());
        block
    }
}

pub(crate) fn convert_method(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, METHOD_PROPERTIES)?;
    let name = props.name();

    let rest_api_id = props.eval_required(cx, "RestApiId")?;
    let resource_id = props.eval_required(cx, "ResourceId")?;
    let http_method = props.eval_required(cx, "HttpMethod")?;

    let mut block = Block::new();
    block.insert("rest_api_id".to_string(), rest_api_id.clone());
    block.insert("resource_id".to_string(), resource_id.clone());
    block.insert("http_method".to_string(), http_method);
    let authorization = props
        .eval(cx, "AuthorizationType")?
        .unwrap_or_else(|| TfValue::str("NONE"));
    block.insert("authorization".to_string(), authorization);
    props.copy(cx, &mut block, "AuthorizerId", "authorizer_id")?;
    props.copy(cx, &mut block, "AuthorizationScopes", "authorization_scopes")?;
    props.copy(cx, &mut block, "ApiKeyRequired", "api_key_required")?;
    props.copy(cx, &mut block, "OperationName", "operation_name")?;
    props.copy(cx, &mut block, "RequestParameters", "request_parameters")?;
    props.copy(cx, &mut block, "RequestModels", "request_models")?;

    let kind = ResourceKind::ApiMethod;
    let (id, address) = cx.add_resource(kind.terraform_type(), name, block)?;
    let mut handle = TargetHandle::new(kind, id, address.clone(), "id");

    let scope = MethodScope {
        rest_api_id,
        resource_id,
        http_method: TfValue::Expr(address.attr("http_method")),
    };

    let integration = props.eval(cx, "Integration")?;
    let integration_address = match &integration {
        Some(integration) => Some(convert_integration(cx, name, &scope, integration)?),
        None => None,
    };
    if let Some(integration_address) = &integration_address {
        handle = handle.with_ancillary(integration_address.clone());
    }

    let mut method_responses = Vec::new();
    if let Some(responses) = props.eval(cx, "MethodResponses")? {
        for (i, response) in list_items(&responses).iter().enumerate() {
            let path = format!("MethodResponses[{}]", i);
            let status = status_code(response, name, &path)?;
            let mut block = scope.block();
            block.insert("status_code".to_string(), status.clone());
            block.extend(remap(
                response,
                &[
                    ("ResponseParameters", "response_parameters"),
                    ("ResponseModels", "response_models"),
                ],
                &["StatusCode"],
                &format!("{}.{}", name, path),
            )?);
            let local_name = ancillary_name(name, &format!("response_{}", label(&status, i)));
            let (_, response_address) = cx.add_resource("aws_api_gateway_method_response", &local_name, block)?;
            handle = handle.with_ancillary(response_address.clone());
            method_responses.push((status, response_address));
        }
    }

    if let (Some(integration), Some(integration_address)) = (&integration, &integration_address) {
        if let Some(responses) = integration.get("IntegrationResponses") {
            for (i, response) in list_items(responses).iter().enumerate() {
                let path = format!("Integration.IntegrationResponses[{}]", i);
                let status = status_code(response, name, &path)?;
                let mut block = scope.block();
                block.insert("status_code".to_string(), status.clone());
                block.extend(remap(
                    response,
                    &[
                        ("SelectionPattern", "selection_pattern"),
                        ("ResponseParameters", "response_parameters"),
                        ("ResponseTemplates", "response_templates"),
                        ("ContentHandling", "content_handling"),
                    ],
                    &["StatusCode"],
                    &format!("{}.{}", name, path),
                )?);
                let local_name =
                    ancillary_name(name, &format!("integration_response_{}", label(&status, i)));
                let (response_id, response_address) =
                    cx.add_resource("aws_api_gateway_integration_response", &local_name, block)?;
                handle = handle.with_ancillary(response_address);
                cx.add_depends_on(response_id, integration_address.clone());
                if let Some((_, method_response)) =
                    method_responses.iter().find(|(code, _)| code == &status)
                {
                    cx.add_depends_on(response_id, method_response.clone());
                }
            }
        }
    }

    Ok(handle)
}

fn convert_integration(
    cx: &mut Converter<'_>,
    name: &str,
    scope: &MethodScope,
    integration: &TfValue,
) -> ConvertResult<ResourceAddress> {
    let mut block = scope.block();
    let integration_type = integration
        .get("Type")
        .cloned()
        .ok_or_else(|| ConvertError::missing(name, "Integration.Type"))?;
    block.insert("type".to_string(), integration_type);
    block.extend(remap(
        integration,
        &[
            ("IntegrationHttpMethod", "integration_http_method"),
            ("Uri", "uri"),
            ("Credentials", "credentials"),
            ("RequestParameters", "request_parameters"),
            ("RequestTemplates", "request_templates"),
            ("PassthroughBehavior", "passthrough_behavior"),
            ("ContentHandling", "content_handling"),
            ("TimeoutInMillis", "timeout_milliseconds"),
            ("CacheKeyParameters", "cache_key_parameters"),
            ("ConnectionType", "connection_type"),
            ("ConnectionId", "connection_id"),
        ],
        &["Type", "IntegrationResponses"],
        &format!("{}.Integration", name),
    )?);
    let (_, address) = cx.add_resource(
        "aws_api_gateway_integration",
        &ancillary_name(name, "integration"),
        block,
    )?;
    Ok(address)
}

fn status_code(response: &TfValue, name: &str, path: &str) -> ConvertResult<TfValue> {
    match response.get("StatusCode") {
        Some(TfValue::Number(n)) => Ok(TfValue::String(n.to_string())),
        Some(code) if !code.is_null() => Ok(code.clone()),
        _ => Err(ConvertError::missing(name, format!("{}.StatusCode", path))),
    }
}

/// Local-name suffix for a response: its literal status code, else its position
fn label(status: &TfValue, index: usize) -> String {
    status
        .as_str()
        .filter(|s| s.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string())
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

    fn api() -> serde_json::Value {
        json!({
            "ApiGatewayRestApi": {
                "Type": "AWS::ApiGateway::RestApi",
                "Properties": {"Name": "dev-svc", "EndpointConfiguration": {"Types": ["EDGE"]}}
            },
            "ApiGatewayResourceHello": {
                "Type": "AWS::ApiGateway::Resource",
                "Properties": {
                    "ParentId": {"Fn::GetAtt": ["ApiGatewayRestApi", "RootResourceId"]},
                    "PathPart": "hello",
                    "RestApiId": {"Ref": "ApiGatewayRestApi"}
                }
            },
            "ApiGatewayMethodHelloGet": {
                "Type": "AWS::ApiGateway::Method",
                "Properties": {
                    "HttpMethod": "GET",
                    "RequestParameters": {},
                    "ResourceId": {"Ref": "ApiGatewayResourceHello"},
                    "RestApiId": {"Ref": "ApiGatewayRestApi"},
                    "ApiKeyRequired": false,
                    "AuthorizationType": "NONE",
                    "Integration": {
                        "IntegrationHttpMethod": "POST",
                        "Type": "AWS_PROXY",
                        "Uri": {"Fn::Join": ["", [
                            "arn:", {"Ref": "AWS::Partition"}, ":apigateway:", {"Ref": "AWS::Region"},
                            ":lambda:path/2015-03-31/functions/arn:aws:lambda:us-east-1:1:function:hello/invocations"
                        ]]},
                        "IntegrationResponses": [{"StatusCode": 200}]
                    },
                    "MethodResponses": [{"StatusCode": 200}]
                }
            },
            "ApiGatewayDeployment": {
                "Type": "AWS::ApiGateway::Deployment",
                "Properties": {"RestApiId": {"Ref": "ApiGatewayRestApi"}, "StageName": "dev"},
                "DependsOn": ["ApiGatewayMethodHelloGet"]
            }
        })
    }

    #[test]
    fn test_method_expands_to_integration_and_responses() {
        let t = SourceTemplate::from_json_value(&json!({"Resources": api()})).unwrap();
        let stack = convert_template(&t, &DeploymentEnvironment::default(), &NoRemoteState).unwrap();
        let json = synth::to_json(&stack);
        let resources = &json["resource"];

        assert_eq!(
            resources["aws_api_gateway_resource"]["ApiGatewayResourceHello"]["parent_id"],
            "${aws_api_gateway_rest_api.ApiGatewayRestApi.root_resource_id}"
        );
        assert_eq!(
            resources["aws_api_gateway_integration"]["ApiGatewayMethodHelloGet_integration"],
            json!({
                "rest_api_id": "${aws_api_gateway_rest_api.ApiGatewayRestApi.id}",
                "resource_id": "${aws_api_gateway_resource.ApiGatewayResourceHello.id}",
                "http_method": "${aws_api_gateway_method.ApiGatewayMethodHelloGet.http_method}",
                "type": "AWS_PROXY",
                "integration_http_method": "POST",
                "uri": "arn:aws:apigateway:us-east-1:lambda:path/2015-03-31/functions/arn:aws:lambda:us-east-1:1:function:hello/invocations"
            })
        );
        assert_eq!(
            resources["aws_api_gateway_integration_response"]
                ["ApiGatewayMethodHelloGet_integration_response_200"]["depends_on"],
            json!([
                "aws_api_gateway_integration.ApiGatewayMethodHelloGet_integration",
                "aws_api_gateway_method_response.ApiGatewayMethodHelloGet_response_200"
            ])
        );
        assert_eq!(
            resources["aws_api_gateway_deployment"]["ApiGatewayDeployment"]["depends_on"],
            json!([
                "aws_api_gateway_method.ApiGatewayMethodHelloGet",
                "aws_api_gateway_integration.ApiGatewayMethodHelloGet_integration",
                "aws_api_gateway_method_response.ApiGatewayMethodHelloGet_response_200",
                "aws_api_gateway_integration_response.ApiGatewayMethodHelloGet_integration_response_200"
            ])
        );
    }

    #[test]
    fn test_integration_requires_type() {
        let mut resources = api();
        resources["ApiGatewayMethodHelloGet"]["Properties"]["Integration"] =
            json!({"Uri": "arn:aws:apigateway:x"});
        let t = SourceTemplate::from_json_value(&json!({"Resources": resources})).unwrap();
        let err = convert_template(&t, &DeploymentEnvironment::default(), &NoRemoteState).unwrap_err();
        assert_eq!(
            err,
            ConvertError::missing("ApiGatewayMethodHelloGet", "Integration.Type")
        );
    }

    #[test]
    fn test_unknown_integration_field_rejected() {
        let mut resources = api();
        resources["ApiGatewayMethodHelloGet"]["Properties"]["Integration"]["TlsConfig"] =
            json!({"InsecureSkipVerification": true});
        let t = SourceTemplate::from_json_value(&json!({"Resources": resources})).unwrap();
        let err = convert_template(&t, &DeploymentEnvironment::default(), &NoRemoteState).unwrap_err();
        assert_eq!(
            err,
            ConvertError::malformed(
                "ApiGatewayMethodHelloGet.Integration.TlsConfig",
                "unsupported property"
            )
        );
    }
}
