//! End-to-end conversion of a Serverless-generated update stack
//!
//! Run with: cargo test --test convert_integration

use pretty_assertions::assert_eq;
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;

use cf2tf::{
    convert_template, convert_with_config, synth, Cf2TfConfig, ConvertError, DeploymentEnvironment,
    NoRemoteState, SourceTemplate, TerraformStack, TfValue,
};

const FUNCTION: &str = "aws_lambda_function.HelloLambdaFunction";

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/cloudformation-template-update-stack.json")
}

fn fixture() -> SourceTemplate {
    SourceTemplate::from_path(fixture_path()).expect("fixture parses")
}

fn env() -> DeploymentEnvironment {
    let mut env = DeploymentEnvironment::new("eu-west-1", "123456789012");
    env.stack_name = "update".to_string();
    env
}

fn convert(template: &SourceTemplate) -> TerraformStack {
    convert_template(template, &env(), &NoRemoteState).expect("fixture converts")
}

fn synthesized() -> JsonValue {
    synth::to_json(&convert(&fixture()))
}

// =============================================================================
// RESOURCES
// =============================================================================

#[test]
fn test_every_resource_converted() {
    let json = synthesized();
    let resources = json["resource"].as_object().unwrap();

    let mut types: Vec<&str> = resources.keys().map(String::as_str).collect();
    types.sort_unstable();
    assert_eq!(
        types,
        vec![
            "aws_api_gateway_deployment",
            "aws_api_gateway_integration",
            "aws_api_gateway_method",
            "aws_api_gateway_resource",
            "aws_api_gateway_rest_api",
            "aws_cloudwatch_event_rule",
            "aws_cloudwatch_event_target",
            "aws_cloudwatch_log_group",
            "aws_iam_role",
            "aws_iam_role_policy",
            "aws_lambda_function",
            "aws_lambda_permission",
            "aws_s3_bucket",
            "aws_s3_bucket_policy",
        ]
    );
    assert_eq!(resources["aws_lambda_permission"].as_object().unwrap().len(), 2);
    // The version publishes the function instead of adding a resource
    assert!(resources.get("aws_lambda_version").is_none());
}

#[test]
fn test_function_wiring() {
    let json = synthesized();
    let function = &json["resource"]["aws_lambda_function"]["HelloLambdaFunction"];

    assert_eq!(function["function_name"], "svc-dev-hello");
    assert_eq!(function["s3_bucket"], "${aws_s3_bucket.ServerlessDeploymentBucket.id}");
    assert_eq!(function["role"], "${aws_iam_role.IamRoleLambdaExecution.arn}");
    assert_eq!(function["memory_size"], 1024);
    assert_eq!(function["publish"], true);
    assert_eq!(function["depends_on"], json!(["aws_cloudwatch_log_group.HelloLogGroup"]));
}

#[test]
fn test_role_name_and_inline_policy() {
    let json = synthesized();
    let role = &json["resource"]["aws_iam_role"]["IamRoleLambdaExecution"];
    assert_eq!(role["name"], "svc-dev-eu-west-1-lambdaRole");
    assert_eq!(
        role["assume_role_policy"],
        "${data.aws_iam_policy_document.IamRoleLambdaExecution_assume_role_document.json}"
    );

    let policy = &json["resource"]["aws_iam_role_policy"]["IamRoleLambdaExecution_policy_0"];
    assert_eq!(policy["name"], "svc-dev-lambda");
    assert_eq!(policy["role"], "svc-dev-eu-west-1-lambdaRole");

    let document =
        &json["data"]["aws_iam_policy_document"]["IamRoleLambdaExecution_policy_0_document"];
    assert_eq!(
        document["statement"][0]["resources"],
        json!(["arn:aws:logs:eu-west-1:123456789012:log-group:/aws/lambda/svc-dev*:*"])
    );
}

#[test]
fn test_bucket_policy_denies_insecure_transport() {
    let json = synthesized();
    let policy = &json["resource"]["aws_s3_bucket_policy"]["ServerlessDeploymentBucketPolicy"];
    assert_eq!(policy["bucket"], "${aws_s3_bucket.ServerlessDeploymentBucket.bucket}");
    assert_eq!(policy["depends_on"], json!(["aws_s3_bucket.ServerlessDeploymentBucket"]));

    let statement = &json["data"]["aws_iam_policy_document"]
        ["ServerlessDeploymentBucketPolicy_document"]["statement"][0];
    assert_eq!(
        statement["resources"],
        json!(["arn:aws:s3:::${aws_s3_bucket.ServerlessDeploymentBucket.id}/*"])
    );
    assert_eq!(
        statement["condition"],
        json!([{"test": "Bool", "variable": "aws:SecureTransport", "values": ["false"]}])
    );
}

#[test]
fn test_api_gateway_chain() {
    let json = synthesized();
    let resource = &json["resource"]["aws_api_gateway_resource"]["ApiGatewayResourceHello"];
    assert_eq!(
        resource["parent_id"],
        "${aws_api_gateway_rest_api.ApiGatewayRestApi.root_resource_id}"
    );

    let integration =
        &json["resource"]["aws_api_gateway_integration"]["ApiGatewayMethodHelloGet_integration"];
    assert_eq!(integration["type"], "AWS_PROXY");
    assert_eq!(
        integration["uri"],
        "arn:aws:apigateway:eu-west-1:lambda:path/2015-03-31/functions/${aws_lambda_function.HelloLambdaFunction.arn}/invocations"
    );

    let deployment =
        &json["resource"]["aws_api_gateway_deployment"]["ApiGatewayDeployment1600000000000"];
    assert_eq!(deployment["stage_name"], "dev");
    assert_eq!(
        deployment["depends_on"],
        json!([
            "aws_api_gateway_method.ApiGatewayMethodHelloGet",
            "aws_api_gateway_integration.ApiGatewayMethodHelloGet_integration"
        ])
    );
}

#[test]
fn test_schedule_target_and_permission() {
    let json = synthesized();
    let target =
        &json["resource"]["aws_cloudwatch_event_target"]["HelloEventsRuleSchedule1_target_0"];
    assert_eq!(target["arn"], "${aws_lambda_function.HelloLambdaFunction.arn}");
    assert_eq!(target["target_id"], "helloSchedule");

    let permission =
        &json["resource"]["aws_lambda_permission"]["HelloLambdaPermissionEventsRuleSchedule1"];
    assert_eq!(
        permission["source_arn"],
        "${aws_cloudwatch_event_rule.HelloEventsRuleSchedule1.arn}"
    );
}

// =============================================================================
// OUTPUTS AND PROVIDER
// =============================================================================

#[test]
fn test_outputs() {
    let json = synthesized();
    assert_eq!(
        json["output"]["ServerlessDeploymentBucketName"]["value"],
        "${aws_s3_bucket.ServerlessDeploymentBucket.id}"
    );
    assert_eq!(
        json["output"]["HelloLambdaFunctionQualifiedArn"],
        json!({
            "value": "${aws_lambda_function.HelloLambdaFunction.qualified_arn}",
            "description": "Current Lambda function version"
        })
    );
    assert_eq!(
        json["output"]["ServiceEndpoint"]["value"],
        "https://${aws_api_gateway_rest_api.ApiGatewayRestApi.id}.execute-api.eu-west-1.amazonaws.com/dev"
    );
}

#[test]
fn test_provider_block() {
    let json = synthesized();
    assert_eq!(json["provider"]["aws"], json!([{"region": "eu-west-1"}]));
    assert_eq!(
        json["terraform"]["required_providers"]["aws"]["version"],
        "~> 2.0"
    );
    assert_eq!(json["//"]["metadata"]["stackName"], "update");
}

// =============================================================================
// GRAPH PROPERTIES
// =============================================================================

#[test]
fn test_declaration_order_does_not_matter() {
    let template = fixture();
    let reversed: Vec<&str> = template
        .resources()
        .iter()
        .rev()
        .map(|r| r.name.as_str())
        .collect();
    let reordered = template.reordered(&reversed);

    assert_eq!(
        synth::to_json(&convert(&reordered)),
        synth::to_json(&convert(&template))
    );
}

#[test]
fn test_each_resource_converted_once() {
    let stack = convert(&fixture());
    let mut addresses: Vec<String> = stack
        .resources()
        .iter()
        .map(|r| r.address.to_string())
        .collect();
    let total = addresses.len();
    addresses.sort();
    addresses.dedup();
    assert_eq!(addresses.len(), total);
    assert!(stack.find_by_str(FUNCTION).is_some());
}

#[test]
fn test_unsupported_type_aborts() {
    let mut json: JsonValue =
        serde_json::from_str(&std::fs::read_to_string(fixture_path()).unwrap()).unwrap();
    json["Resources"]["Queue"] = json!({"Type": "AWS::SQS::Queue"});
    json["Resources"]["HelloLambdaFunction"]["Properties"]["DeadLetterConfig"] =
        json!({"TargetArn": {"Fn::GetAtt": ["Queue", "Arn"]}});
    let template = SourceTemplate::from_json_value(&json).unwrap();

    let err = convert_template(&template, &env(), &NoRemoteState).unwrap_err();
    assert_eq!(
        err,
        ConvertError::UnsupportedType {
            resource: "Queue".to_string(),
            tag: "AWS::SQS::Queue".to_string(),
        }
    );
}

#[test]
fn test_cycle_through_depends_on() {
    let mut json: JsonValue =
        serde_json::from_str(&std::fs::read_to_string(fixture_path()).unwrap()).unwrap();
    json["Resources"]["HelloLogGroup"]["DependsOn"] = json!(["HelloLambdaFunction"]);
    let template = SourceTemplate::from_json_value(&json).unwrap();

    match convert_template(&template, &env(), &NoRemoteState).unwrap_err() {
        ConvertError::CyclicReference { chain } => {
            assert_eq!(chain.first(), chain.last());
            assert!(chain.contains(&"HelloLogGroup".to_string()));
            assert!(chain.contains(&"HelloLambdaFunction".to_string()));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

// =============================================================================
// CONFIG AND FILE OUTPUT
// =============================================================================

#[test]
fn test_convert_with_config_and_write() {
    let config = Cf2TfConfig::from_yaml_str(
        r#"
environment:
  region: us-west-2
  account_id: "210987654321"
provider:
  profile: deploy
  version: "~> 3.0"
"#,
    )
    .unwrap();
    let stack = convert_with_config(&fixture(), &config).unwrap();

    let function = stack.find_by_str(FUNCTION).unwrap();
    assert_eq!(function.property("runtime"), Some(&TfValue::str("nodejs12.x")));

    let dir = tempfile::tempdir().unwrap();
    let path = synth::write(&stack, dir.path().join("cdktf-update")).unwrap();
    let written: JsonValue =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(
        written["provider"]["aws"],
        json!([{"region": "us-west-2", "profile": "deploy"}])
    );
    assert_eq!(
        written["terraform"]["required_providers"]["aws"]["version"],
        "~> 3.0"
    );
    assert_eq!(
        written["resource"]["aws_iam_role"]["IamRoleLambdaExecution"]["name"],
        "svc-dev-us-west-2-lambdaRole"
    );
}
