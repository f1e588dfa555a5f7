//! Lambda functions, versions and permissions

use tracing::debug;

use super::{check_fields, named_handle, nested, remap, Props};
use crate::converter::{Converter, TargetHandle};
use crate::error::{ConvertError, ConvertResult};
use crate::template::{Intrinsic, ResourceKind, SourceResource};
use crate::terraform::{Block, TfValue};

const FUNCTION_PROPERTIES: &[&str] = &[
    "Code",
    "Role",
    "FunctionName",
    "Handler",
    "Runtime",
    "MemorySize",
    "Timeout",
    "Description",
    "Environment",
    "Layers",
    "ReservedConcurrentExecutions",
    "VpcConfig",
    "TracingConfig",
    "DeadLetterConfig",
    "KmsKeyArn",
    "Tags",
];

pub(crate) fn convert_function(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, FUNCTION_PROPERTIES)?;
    let name = props.name();
    let mut block = Block::new();

    let code = props.eval_required(cx, "Code")?;
    code_properties(&code, name, &mut block)?;
    block.insert("role".to_string(), props.eval_required(cx, "Role")?);

    // Terraform requires a function name; CloudFormation generates one
    let function_name = props
        .eval(cx, "FunctionName")?
        .unwrap_or_else(|| TfValue::str(name));
    block.insert("function_name".to_string(), function_name.clone());

    props.copy(cx, &mut block, "Handler", "handler")?;
    props.copy(cx, &mut block, "Runtime", "runtime")?;
    props.copy(cx, &mut block, "MemorySize", "memory_size")?;
    props.copy(cx, &mut block, "Timeout", "timeout")?;
    props.copy(cx, &mut block, "Description", "description")?;
    props.copy(cx, &mut block, "Layers", "layers")?;
    props.copy(cx, &mut block, "ReservedConcurrentExecutions", "reserved_concurrent_executions")?;
    props.copy(cx, &mut block, "KmsKeyArn", "kms_key_arn")?;

    if let Some(environment) = props.eval(cx, "Environment")? {
        let env = remap(
            &environment,
            &[("Variables", "variables")],
            &[],
            &format!("{}.Environment", name),
        )?;
        if !env.is_empty() {
            block.insert("environment".to_string(), nested(env));
        }
    }
    if let Some(vpc) = props.eval(cx, "VpcConfig")? {
        block.insert(
            "vpc_config".to_string(),
            nested(remap(
                &vpc,
                &[("SubnetIds", "subnet_ids"), ("SecurityGroupIds", "security_group_ids")],
                &[],
                &format!("{}.VpcConfig", name),
            )?),
        );
    }
    if let Some(tracing) = props.eval(cx, "TracingConfig")? {
        let context = format!("{}.TracingConfig", name);
        block.insert(
            "tracing_config".to_string(),
            nested(remap(&tracing, &[("Mode", "mode")], &[], &context)?),
        );
    }
    if let Some(dlq) = props.eval(cx, "DeadLetterConfig")? {
        block.insert(
            "dead_letter_config".to_string(),
            nested(remap(
                &dlq,
                &[("TargetArn", "target_arn")],
                &[],
                &format!("{}.DeadLetterConfig", name),
            )?),
        );
    }
    props.tags(cx, &mut block)?;

    let kind = ResourceKind::LambdaFunction;
    let (id, address) = cx.add_resource(kind.terraform_type(), name, block)?;
    Ok(named_handle(kind, id, address, "function_name", Some(&function_name)))
}

/// `Code` → deployment package location
fn code_properties(code: &TfValue, name: &str, block: &mut Block) -> ConvertResult<()> {
    let context = format!("{}.Code", name);
    check_fields(
        code,
        &["ZipFile", "ImageUri", "S3Bucket", "S3Key", "S3ObjectVersion"],
        &context,
    )?;
    if code.get("ZipFile").is_some() {
        return Err(ConvertError::malformed(
            &context,
            "inline ZipFile code is not supported",
        ));
    }
    if let Some(image) = code.get("ImageUri") {
        block.insert("image_uri".to_string(), image.clone());
        block.insert("package_type".to_string(), TfValue::str("Image"));
        return Ok(());
    }
    let location = remap(
        code,
        &[
            ("S3Bucket", "s3_bucket"),
            ("S3Key", "s3_key"),
            ("S3ObjectVersion", "s3_object_version"),
        ],
        &[],
        &context,
    )?;
    for (field, tf) in [("S3Bucket", "s3_bucket"), ("S3Key", "s3_key")] {
        if !location.contains_key(tf) {
            return Err(ConvertError::missing(name, format!("Code.{}", field)));
        }
    }
    block.extend(location);
    Ok(())
}

// =============================================================================
// VERSIONS
// =============================================================================

/// A version has no Terraform resource of its own: the function it names is
/// switched to `publish = true` and the version handle aliases it.
pub(crate) fn convert_version(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, &["FunctionName", "CodeSha256", "Description"])?;
    let name = props.name();
    let context = format!("{}.FunctionName", name);

    let target = match props.required("FunctionName")?.as_intrinsic() {
        Some(Intrinsic::Ref(target)) => target,
        Some(Intrinsic::GetAtt { resource, attribute }) if attribute == "Arn" => resource,
        _ => {
            return Err(ConvertError::malformed(
                context,
                "expected a Ref or Fn::GetAtt Arn of a function in this template",
            ))
        }
    };

    let function = cx.resolve(target)?;
    if function.kind != ResourceKind::LambdaFunction {
        return Err(ConvertError::malformed(
            context,
            format!("'{}' is a {}, not a function", target, function.kind),
        ));
    }

    cx.set_property(function.id, "publish", TfValue::Bool(true));
    debug!("{} publishes {}", name, function.address);

    Ok(TargetHandle::new(
        ResourceKind::LambdaVersion,
        function.id,
        function.address,
        "qualified_arn",
    )
    .aliasing(target.as_str()))
}

// =============================================================================
// PERMISSIONS
// =============================================================================

pub(crate) fn convert_permission(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(
        resource,
        &[
            "Action",
            "FunctionName",
            "Principal",
            "SourceArn",
            "SourceAccount",
            "EventSourceToken",
        ],
    )?;
    let mut block = Block::new();
    block.insert("action".to_string(), props.eval_required(cx, "Action")?);
    block.insert("function_name".to_string(), props.eval_required(cx, "FunctionName")?);
    block.insert("principal".to_string(), props.eval_required(cx, "Principal")?);
    props.copy(cx, &mut block, "SourceArn", "source_arn")?;
    props.copy(cx, &mut block, "SourceAccount", "source_account")?;
    props.copy(cx, &mut block, "EventSourceToken", "event_source_token")?;

    let kind = ResourceKind::LambdaPermission;
    let (id, address) = cx.add_resource(kind.terraform_type(), props.name(), block)?;
    Ok(TargetHandle::new(kind, id, address, "id"))
}
