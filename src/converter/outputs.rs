//! Output Emitter

use tracing::{debug, info};

use super::Converter;
use crate::error::ConvertResult;
use crate::template::CfnValue;
use crate::terraform::TfValue;

impl<'t> Converter<'t> {
    /// Value of a template output, converting whatever it references
    pub fn resolve_output_value(&mut self, value: &CfnValue) -> ConvertResult<TfValue> {
        self.evaluate(value)
    }

    /// Register every template output, in declaration order
    pub fn emit_outputs(&mut self) -> ConvertResult<()> {
        let template = self.template;
        for output in template.outputs() {
            let value = self.resolve_output_value(&output.value)?;
            debug!("Output {} = {}", output.name, value.to_json());

            if let Some(export_name) = &output.export_name {
                let export = self.evaluate(export_name)?;
                info!(
                    "Output {} was exported as {}; Terraform outputs are not exported by name",
                    output.name,
                    export.to_json()
                );
            }

            self.stack
                .add_output(&output.name, value, output.description.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::converter::convert_template;
    use crate::error::ConvertError;
    use crate::reference_map::DeploymentEnvironment;
    use crate::remote_state::NoRemoteState;
    use crate::template::SourceTemplate;
    use crate::terraform::TfValue;
    use serde_json::json;

    #[test]
    fn test_outputs_resolve_unconverted_resources() {
        let t = SourceTemplate::from_json_value(&json!({
            "Resources": {
                "Logs": {"Type": "AWS::Logs::LogGroup"}
            },
            "Outputs": {
                "LogGroupArn": {
                    "Description": "Log group ARN",
                    "Value": {"Fn::GetAtt": ["Logs", "Arn"]},
                    "Export": {"Name": {"Fn::Sub": "${AWS::StackName}-logs"}}
                },
                "Region": {"Value": {"Ref": "AWS::Region"}}
            }
        }))
        .unwrap();
        let env = DeploymentEnvironment::new("eu-west-1", "123456789012");
        let stack = convert_template(&t, &env, &NoRemoteState).unwrap();

        let arn = stack.output("LogGroupArn").unwrap();
        assert_eq!(arn.value, TfValue::expr("aws_cloudwatch_log_group.Logs.arn"));
        assert_eq!(arn.description.as_deref(), Some("Log group ARN"));
        assert_eq!(stack.output("Region").unwrap().value, TfValue::str("eu-west-1"));
        assert_eq!(stack.outputs()[0].name, "LogGroupArn");
    }

    #[test]
    fn test_output_with_unknown_reference_fails() {
        let t = SourceTemplate::from_json_value(&json!({
            "Resources": {},
            "Outputs": {"X": {"Value": {"Ref": "Ghost"}}}
        }))
        .unwrap();
        let env = DeploymentEnvironment::default();
        assert_eq!(
            convert_template(&t, &env, &NoRemoteState).unwrap_err(),
            ConvertError::unresolved("Ghost")
        );
    }
}
