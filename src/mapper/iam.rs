//! IAM roles with their trust policy, inline policies and managed policy attachments

use super::{ancillary_name, list_items, named_handle, policy, unsupported, Props};
use crate::converter::{Converter, TargetHandle};
use crate::error::{ConvertError, ConvertResult};
use crate::template::{CfnValue, ResourceKind, SourceResource};
use crate::terraform::{Block, ResourceAddress, TfValue};

const ROLE_PROPERTIES: &[&str] = &[
    "AssumeRolePolicyDocument",
    "RoleName",
    "Path",
    "Description",
    "MaxSessionDuration",
    "PermissionsBoundary",
    "ManagedPolicyArns",
    "Policies",
    "Tags",
];

pub(crate) fn convert_role(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, ROLE_PROPERTIES)?;
    let name = props.name();

    let trust = policy::required_document(cx, &props, "AssumeRolePolicyDocument", "assume_role_document")?;

    let mut block = Block::new();
    block.insert("assume_role_policy".to_string(), TfValue::Expr(trust.attr("json")));
    let role_name = props.eval(cx, "RoleName")?;
    if let Some(role_name) = &role_name {
        block.insert("name".to_string(), role_name.clone());
    }
    props.copy(cx, &mut block, "Path", "path")?;
    props.copy(cx, &mut block, "Description", "description")?;
    props.copy(cx, &mut block, "MaxSessionDuration", "max_session_duration")?;
    props.copy(cx, &mut block, "PermissionsBoundary", "permissions_boundary")?;
    props.tags(cx, &mut block)?;

    let kind = ResourceKind::IamRole;
    let (id, address) = cx.add_resource(kind.terraform_type(), name, block)?;
    let mut handle = named_handle(kind, id, address, "name", role_name.as_ref());
    let role_ref = handle.identity.clone();

    if let Some(policies) = props.get("Policies") {
        let policies = policies.as_list().ok_or_else(|| {
            ConvertError::malformed(format!("{}.Policies", name), "expected a list of inline policies")
        })?;
        for (i, inline) in policies.iter().enumerate() {
            let policy_address = inline_policy(cx, &handle, &role_ref, name, i, inline)?;
            handle = handle.with_ancillary(policy_address);
        }
    }

    if let Some(arns) = props.eval(cx, "ManagedPolicyArns")? {
        for (i, arn) in list_items(&arns).into_iter().enumerate() {
            let mut attachment = Block::new();
            attachment.insert("role".to_string(), role_ref.clone());
            attachment.insert("policy_arn".to_string(), arn);
            let (attachment_id, attachment_address) = cx.add_resource(
                "aws_iam_role_policy_attachment",
                &ancillary_name(name, &format!("attachment_{}", i)),
                attachment,
            )?;
            cx.add_depends_on(attachment_id, handle.address.clone());
            handle = handle.with_ancillary(attachment_address);
        }
    }

    Ok(handle)
}

/// `Policies[i]` → `aws_iam_role_policy` with its own policy document
fn inline_policy(
    cx: &mut Converter<'_>,
    role: &TargetHandle,
    role_ref: &TfValue,
    owner: &str,
    index: usize,
    inline: &CfnValue,
) -> ConvertResult<ResourceAddress> {
    let property = format!("Policies[{}]", index);
    let context = format!("{}.{}", owner, property);
    let entry = inline
        .as_map()
        .ok_or_else(|| ConvertError::malformed(&context, "expected a map"))?;
    if let Some(key) = entry
        .keys()
        .find(|key| !matches!(key.as_str(), "PolicyName" | "PolicyDocument"))
    {
        return Err(unsupported(&context, key));
    }
    let document = inline
        .get("PolicyDocument")
        .ok_or_else(|| ConvertError::missing(owner, format!("{}.PolicyDocument", property)))?;
    let policy_name = match inline.get("PolicyName") {
        Some(value) => cx.evaluate(value)?,
        None => return Err(ConvertError::missing(owner, format!("{}.PolicyName", property))),
    };

    let local_name = ancillary_name(owner, &format!("policy_{}", index));
    let document = policy::policy_document(
        cx,
        owner,
        &format!("{}.PolicyDocument", property),
        &ancillary_name(&local_name, "document"),
        document,
    )?;

    let mut block = Block::new();
    block.insert("name".to_string(), policy_name);
    block.insert("role".to_string(), role_ref.clone());
    block.insert("policy".to_string(), TfValue::Expr(document.attr("json")));
    let (id, address) = cx.add_resource("aws_iam_role_policy", &local_name, block)?;
    cx.add_depends_on(id, role.address.clone());
    Ok(address)
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

    fn role_template(extra: serde_json::Value) -> serde_json::Value {
        let mut props = json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": {"Service": ["lambda.amazonaws.com"]},
                    "Action": ["sts:AssumeRole"]
                }]
            }
        });
        if let (Some(props), Some(extra)) = (props.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                props.insert(k.clone(), v.clone());
            }
        }
        json!({
            "Resources": {
                "IamRoleLambdaExecution": {"Type": "AWS::IAM::Role", "Properties": props},
                "Logs": {"Type": "AWS::Logs::LogGroup", "Properties": {"LogGroupName": "/aws/lambda/f"}}
            }
        })
    }

    fn convert(template: serde_json::Value) -> Result<TerraformStack, ConvertError> {
        let t = SourceTemplate::from_json_value(&template).unwrap();
        convert_template(
            &t,
            &DeploymentEnvironment::new("us-east-1", "123456789012"),
            &NoRemoteState,
        )
    }

    #[test]
    fn test_role_with_inline_and_managed_policies() {
        let stack = convert(role_template(json!({
            "RoleName": "svc-dev-us-east-1-lambdaRole",
            "ManagedPolicyArns": ["arn:aws:iam::aws:policy/service-role/AWSLambdaVPCAccessExecutionRole"],
            "Policies": [{
                "PolicyName": {"Fn::Join": ["-", ["svc", "dev", "lambda"]]},
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
                        "Resource": [{"Fn::Sub": "${Logs.Arn}:*"}]
                    }]
                }
            }]
        })))
        .unwrap();
        let json = synth::to_json(&stack);

        assert_eq!(
            json["resource"]["aws_iam_role"]["IamRoleLambdaExecution"]["assume_role_policy"],
            "${data.aws_iam_policy_document.IamRoleLambdaExecution_assume_role_document.json}"
        );
        assert_eq!(
            json["resource"]["aws_iam_role_policy"]["IamRoleLambdaExecution_policy_0"],
            json!({
                "name": "svc-dev-lambda",
                "role": "svc-dev-us-east-1-lambdaRole",
                "policy": "${data.aws_iam_policy_document.IamRoleLambdaExecution_policy_0_document.json}",
                "depends_on": ["aws_iam_role.IamRoleLambdaExecution"]
            })
        );
        assert_eq!(
            json["data"]["aws_iam_policy_document"]["IamRoleLambdaExecution_policy_0_document"]
                ["statement"][0]["resources"],
            json!(["${aws_cloudwatch_log_group.Logs.arn}:*"])
        );
        assert_eq!(
            json["resource"]["aws_iam_role_policy_attachment"]["IamRoleLambdaExecution_attachment_0"]
                ["policy_arn"],
            "arn:aws:iam::aws:policy/service-role/AWSLambdaVPCAccessExecutionRole"
        );
    }

    #[test]
    fn test_unnamed_role_is_referenced_by_name_attribute() {
        let stack = convert(role_template(json!({
            "ManagedPolicyArns": ["arn:aws:iam::aws:policy/ReadOnlyAccess"]
        })))
        .unwrap();
        let json = synth::to_json(&stack);
        assert_eq!(
            json["resource"]["aws_iam_role_policy_attachment"]["IamRoleLambdaExecution_attachment_0"]
                ["role"],
            "${aws_iam_role.IamRoleLambdaExecution.name}"
        );
    }

    #[test]
    fn test_role_requires_trust_policy() {
        let t = json!({"Resources": {"R": {"Type": "AWS::IAM::Role", "Properties": {}}}});
        assert_eq!(
            convert(t).unwrap_err(),
            ConvertError::missing("R", "AssumeRolePolicyDocument")
        );
    }

    #[test]
    fn test_inline_policy_unknown_key_rejected() {
        let err = convert(role_template(json!({
            "Policies": [{
                "PolicyName": "p",
                "PolicyDocument": {"Statement": []},
                "Groups": ["admins"]
            }]
        })))
        .unwrap_err();
        assert_eq!(
            err,
            ConvertError::malformed("IamRoleLambdaExecution.Policies[0].Groups", "unsupported property")
        );
    }

    #[test]
    fn test_depends_on_role_waits_for_its_policies() {
        let mut template = role_template(json!({
            "ManagedPolicyArns": ["arn:aws:iam::aws:policy/ReadOnlyAccess"],
            "Policies": [{"PolicyName": "p", "PolicyDocument": {"Statement": []}}]
        }));
        template["Resources"]["Logs"]["DependsOn"] = json!("IamRoleLambdaExecution");
        let json = synth::to_json(&convert(template).unwrap());
        assert_eq!(
            json["resource"]["aws_cloudwatch_log_group"]["Logs"]["depends_on"],
            json!([
                "aws_iam_role.IamRoleLambdaExecution",
                "aws_iam_role_policy.IamRoleLambdaExecution_policy_0",
                "aws_iam_role_policy_attachment.IamRoleLambdaExecution_attachment_0"
            ])
        );
    }
}
