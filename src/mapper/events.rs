//! EventBridge (CloudWatch Events) rules and their targets

use super::{
    ancillary_name, json_document, list_items, named_handle, nested, remap, required_field,
    status_flag, Props,
};
use crate::converter::{Converter, TargetHandle};
use crate::error::{ConvertError, ConvertResult};
use crate::template::{ResourceKind, SourceResource};
use crate::terraform::Block;

pub(crate) fn convert_rule(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(
        resource,
        &[
            "Name",
            "Description",
            "EventPattern",
            "ScheduleExpression",
            "State",
            "RoleArn",
            "EventBusName",
            "Targets",
        ],
    )?;
    let name = props.name();
    let mut block = Block::new();

    let rule_name = props.eval(cx, "Name")?;
    if let Some(rule_name) = &rule_name {
        block.insert("name".to_string(), rule_name.clone());
    }
    props.copy(cx, &mut block, "Description", "description")?;
    props.copy(cx, &mut block, "ScheduleExpression", "schedule_expression")?;
    props.copy(cx, &mut block, "RoleArn", "role_arn")?;
    let event_bus = props.eval(cx, "EventBusName")?;
    if let Some(event_bus) = &event_bus {
        block.insert("event_bus_name".to_string(), event_bus.clone());
    }
    if let Some(pattern) = props.eval(cx, "EventPattern")? {
        block.insert("event_pattern".to_string(), json_document(&pattern));
    }
    if let Some(state) = props.eval(cx, "State")? {
        block.insert(
            "is_enabled".to_string(),
            status_flag(&state, &format!("{}.State", name))?,
        );
    }
    if !block.contains_key("schedule_expression") && !block.contains_key("event_pattern") {
        return Err(ConvertError::missing(name, "ScheduleExpression"));
    }

    let kind = ResourceKind::EventRule;
    let (id, address) = cx.add_resource(kind.terraform_type(), name, block)?;
    let mut handle = named_handle(kind, id, address, "name", rule_name.as_ref());

    if let Some(targets) = props.eval(cx, "Targets")? {
        for (i, target) in list_items(&targets).iter().enumerate() {
            let path = format!("Targets[{}]", i);
            let context = format!("{}.{}", name, path);
            let mut block = remap(
                target,
                &[
                    ("Id", "target_id"),
                    ("Input", "input"),
                    ("InputPath", "input_path"),
                    ("RoleArn", "role_arn"),
                ],
                &["Arn", "InputTransformer"],
                &context,
            )?;
            block.insert("rule".to_string(), handle.identity.clone());
            block.insert(
                "arn".to_string(),
                required_field(target, "Arn", name, &path)?,
            );
            if let Some(event_bus) = &event_bus {
                block.insert("event_bus_name".to_string(), event_bus.clone());
            }
            if let Some(transformer) = target.get("InputTransformer") {
                block.insert(
                    "input_transformer".to_string(),
                    nested(remap(
                        transformer,
                        &[
                            ("InputPathsMap", "input_paths"),
                            ("InputTemplate", "input_template"),
                        ],
                        &[],
                        &format!("{}.InputTransformer", context),
                    )?),
                );
            }
            let (target_id, target_address) = cx.add_resource(
                "aws_cloudwatch_event_target",
                &ancillary_name(name, &format!("target_{}", i)),
                block,
            )?;
            cx.add_depends_on(target_id, handle.address.clone());
            handle = handle.with_ancillary(target_address);
        }
    }

    Ok(handle)
}
