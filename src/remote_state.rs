//! Cross-stack value access for `Fn::ImportValue`
//!
//! The converter never reads remote state itself; it asks an injected
//! `RemoteState` accessor and treats whatever comes back as the value.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::terraform::{Block, StackError, TerraformStack, TfValue};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteStateError {
    #[error("no exported value named '{0}'")]
    NotFound(String),

    #[error("cross-stack imports are not configured")]
    NotConfigured,
}

/// Resolves previously published cross-stack outputs by key
pub trait RemoteState {
    fn lookup(&self, key: &str) -> Result<TfValue, RemoteStateError>;
}

/// Rejects every import
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemoteState;

impl RemoteState for NoRemoteState {
    fn lookup(&self, _key: &str) -> Result<TfValue, RemoteStateError> {
        Err(RemoteStateError::NotConfigured)
    }
}

/// Fixed table of exported values, typically from configuration
#[derive(Debug, Default, Clone)]
pub struct StaticRemoteState {
    values: BTreeMap<String, JsonValue>,
}

impl StaticRemoteState {
    pub fn new(values: BTreeMap<String, JsonValue>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) {
        self.values.insert(key.into(), value);
    }
}

impl RemoteState for StaticRemoteState {
    fn lookup(&self, key: &str) -> Result<TfValue, RemoteStateError> {
        self.values
            .get(key)
            .map(TfValue::from)
            .ok_or_else(|| RemoteStateError::NotFound(key.to_string()))
    }
}

/// Reads exports from another Terraform state through a
/// `terraform_remote_state` data source. Lookups are deferred expressions
/// into the data source's `outputs`.
#[derive(Debug, Clone)]
pub struct TerraformRemoteState {
    pub name: String,
    pub backend: String,
    pub config: BTreeMap<String, JsonValue>,
}

impl TerraformRemoteState {
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            config: BTreeMap::new(),
        }
    }

    /// Register the `terraform_remote_state` data source the lookups point at
    pub fn declare(&self, stack: &mut TerraformStack) -> Result<(), StackError> {
        let mut props = Block::new();
        props.insert("backend".to_string(), TfValue::str(&self.backend));
        if !self.config.is_empty() {
            props.insert(
                "config".to_string(),
                TfValue::Map(
                    self.config
                        .iter()
                        .map(|(k, v)| (k.clone(), TfValue::from(v)))
                        .collect(),
                ),
            );
        }
        stack.add_data_source("terraform_remote_state", &self.name, props)?;
        Ok(())
    }
}

impl RemoteState for TerraformRemoteState {
    fn lookup(&self, key: &str) -> Result<TfValue, RemoteStateError> {
        Ok(TfValue::expr(format!(
            "data.terraform_remote_state.{}.outputs.{}",
            self.name, key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_lookup() {
        let mut state = StaticRemoteState::default();
        state.insert("shared-vpc-id", json!("vpc-123"));
        assert_eq!(state.lookup("shared-vpc-id"), Ok(TfValue::str("vpc-123")));
        assert_eq!(
            state.lookup("missing"),
            Err(RemoteStateError::NotFound("missing".into()))
        );
    }

    #[test]
    fn test_terraform_remote_state_defers() {
        let mut remote = TerraformRemoteState::new("shared", "s3");
        remote.config.insert("bucket".into(), json!("tf-state"));
        assert_eq!(
            remote.lookup("vpc_id").unwrap().to_json(),
            json!("${data.terraform_remote_state.shared.outputs.vpc_id}")
        );

        let mut stack = TerraformStack::new("s");
        remote.declare(&mut stack).unwrap();
        let ds = stack
            .find_by_str("data.terraform_remote_state.shared")
            .unwrap();
        assert_eq!(ds.property("backend"), Some(&TfValue::str("s3")));
    }

    #[test]
    fn test_no_remote_state() {
        assert_eq!(
            NoRemoteState.lookup("x"),
            Err(RemoteStateError::NotConfigured)
        );
    }
}
