//! Serverless Framework service layout
//!
//! `serverless package` leaves the generated CloudFormation templates in
//! `.serverless/`: one for the create stack (deployment bucket only) and
//! one for the update stack (everything else).

use std::path::{Path, PathBuf};

/// Build directory of a Serverless service
pub const SERVERLESS_DIR: &str = ".serverless";

/// Stacks `serverless package` generates, in deployment order
pub const STACKS: [&str; 2] = ["create", "update"];

/// A generated template found in a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTemplate {
    pub stack: String,
    pub path: PathBuf,
}

/// Path of the template for `stack`, whether or not it exists
pub fn stack_template_path(service_dir: impl AsRef<Path>, stack: &str) -> PathBuf {
    service_dir
        .as_ref()
        .join(SERVERLESS_DIR)
        .join(format!("cloudformation-template-{}-stack.json", stack))
}

/// Generated templates present in the service, in deployment order
pub fn stack_templates(service_dir: impl AsRef<Path>) -> Vec<StackTemplate> {
    let service_dir = service_dir.as_ref();
    STACKS
        .iter()
        .map(|stack| StackTemplate {
            stack: stack.to_string(),
            path: stack_template_path(service_dir, stack),
        })
        .filter(|t| t.path.is_file())
        .collect()
}
