//! Terraform JSON synthesis
//!
//! Renders a `TerraformStack` in the `cdk.tf.json` layout that `cdktf synth`
//! produces, so the output directory can be handed straight to `terraform`.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{Block, ResourceMode, TerraformStack, TfResource};

/// File name `cdktf` uses for synthesized stacks
pub const SYNTH_FILE_NAME: &str = "cdk.tf.json";

/// Render the stack as a Terraform JSON document
pub fn to_json(stack: &TerraformStack) -> JsonValue {
    let mut root = Map::new();

    root.insert(
        "//".to_string(),
        json!({
            "metadata": {
                "stackName": stack.name,
                "generator": concat!("cf2tf/", env!("CARGO_PKG_VERSION")),
            }
        }),
    );

    if !stack.required_providers().is_empty() {
        let providers: Map<String, JsonValue> = stack
            .required_providers()
            .iter()
            .map(|(name, req)| {
                (
                    name.clone(),
                    json!({"source": req.source, "version": req.version}),
                )
            })
            .collect();
        root.insert(
            "terraform".to_string(),
            json!({ "required_providers": providers }),
        );
    }

    if let Some(provider) = stack.aws_provider() {
        let mut block = Map::new();
        block.insert("region".to_string(), json!(provider.region));
        if let Some(profile) = &provider.profile {
            block.insert("profile".to_string(), json!(profile));
        }
        root.insert(
            "provider".to_string(),
            json!({ "aws": [JsonValue::Object(block)] }),
        );
    }

    let resources = group_by_type(stack.resources().iter().filter(|r| r.address.mode == ResourceMode::Managed));
    if !resources.is_empty() {
        root.insert("resource".to_string(), JsonValue::Object(resources));
    }

    let data = group_by_type(stack.resources().iter().filter(|r| r.address.mode == ResourceMode::Data));
    if !data.is_empty() {
        root.insert("data".to_string(), JsonValue::Object(data));
    }

    if !stack.outputs().is_empty() {
        let mut outputs = Map::new();
        for output in stack.outputs() {
            let mut block = Map::new();
            block.insert("value".to_string(), output.value.to_json());
            if let Some(description) = &output.description {
                block.insert("description".to_string(), json!(description));
            }
            outputs.insert(output.name.clone(), JsonValue::Object(block));
        }
        root.insert("output".to_string(), JsonValue::Object(outputs));
    }

    JsonValue::Object(root)
}

fn group_by_type<'a>(resources: impl Iterator<Item = &'a TfResource>) -> Map<String, JsonValue> {
    let mut by_type: Map<String, JsonValue> = Map::new();
    for resource in resources {
        let entry = by_type
            .entry(resource.address.resource_type.clone())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if let JsonValue::Object(names) = entry {
            names.insert(resource.address.name.clone(), render_body(resource));
        }
    }
    by_type
}

fn render_body(resource: &TfResource) -> JsonValue {
    let mut body = render_block(resource.properties());
    if !resource.depends_on().is_empty() {
        body.insert(
            "depends_on".to_string(),
            JsonValue::Array(
                resource
                    .depends_on()
                    .iter()
                    .map(|a| JsonValue::String(a.to_string()))
                    .collect(),
            ),
        );
    }
    JsonValue::Object(body)
}

/// Null properties are omitted
fn render_block(block: &Block) -> Map<String, JsonValue> {
    block
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

/// Write `cdk.tf.json` into `dir`, creating it if needed
pub fn write(stack: &TerraformStack, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(SYNTH_FILE_NAME);
    let text = serde_json::to_string_pretty(&to_json(stack))
        .context("Failed to serialize Terraform JSON")?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(
        "Synthesized stack '{}' ({} resources, {} outputs) to {}",
        stack.name,
        stack.resources().len(),
        stack.outputs().len(),
        path.display()
    );
    Ok(path)
}
