//! CloudWatch log groups

use super::{named_handle, Props};
use crate::converter::{Converter, TargetHandle};
use crate::error::ConvertResult;
use crate::template::{ResourceKind, SourceResource};
use crate::terraform::Block;

pub(crate) fn convert_log_group(
    cx: &mut Converter<'_>,
    resource: &SourceResource,
) -> ConvertResult<TargetHandle> {
    let props = Props::new(resource, &["LogGroupName", "RetentionInDays", "KmsKeyId", "Tags"])?;
    let mut block = Block::new();

    let log_group_name = props.eval(cx, "LogGroupName")?;
    if let Some(name) = &log_group_name {
        block.insert("name".to_string(), name.clone());
    }
    props.copy(cx, &mut block, "RetentionInDays", "retention_in_days")?;
    props.copy(cx, &mut block, "KmsKeyId", "kms_key_id")?;
    props.tags(cx, &mut block)?;

    let kind = ResourceKind::LogGroup;
    let (id, address) = cx.add_resource(kind.terraform_type(), props.name(), block)?;
    Ok(named_handle(kind, id, address, "name", log_group_name.as_ref()))
}
