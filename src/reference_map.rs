//! Pseudo-parameter table
//!
//! `AWS::Region`, `AWS::AccountId` and friends resolve to literals taken from
//! the deployment environment, without touching the resource graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deployment-environment constants supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentEnvironment {
    pub region: String,
    pub account_id: String,
    /// Derived from the region when absent
    #[serde(default)]
    pub partition: Option<String>,
    /// Derived from the region when absent
    #[serde(default)]
    pub url_suffix: Option<String>,
    #[serde(default = "default_stack_name")]
    pub stack_name: String,
}

fn default_stack_name() -> String {
    "cf2tf".to_string()
}

impl Default for DeploymentEnvironment {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            partition: None,
            url_suffix: None,
            stack_name: default_stack_name(),
        }
    }
}

impl DeploymentEnvironment {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    /// Partition for the region unless set explicitly
    pub fn partition(&self) -> String {
        if let Some(p) = &self.partition {
            return p.clone();
        }
        if self.region.starts_with("cn-") {
            "aws-cn".to_string()
        } else if self.region.starts_with("us-gov-") {
            "aws-us-gov".to_string()
        } else {
            "aws".to_string()
        }
    }

    /// Domain suffix for the region unless set explicitly
    pub fn url_suffix(&self) -> String {
        if let Some(s) = &self.url_suffix {
            return s.clone();
        }
        if self.region.starts_with("cn-") {
            "amazonaws.com.cn".to_string()
        } else {
            "amazonaws.com".to_string()
        }
    }
}

/// Pseudo-parameter name → literal value. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMap {
    values: BTreeMap<&'static str, String>,
}

/// Namespace of every pseudo-parameter
pub const PSEUDO_NAMESPACE: &str = "AWS::";

/// `Ref` to this removes the property
pub const NO_VALUE: &str = "AWS::NoValue";

impl ReferenceMap {
    pub fn new(env: &DeploymentEnvironment) -> Self {
        let mut values = BTreeMap::new();
        values.insert("AWS::Region", env.region.clone());
        values.insert("AWS::AccountId", env.account_id.clone());
        values.insert("AWS::Partition", env.partition());
        values.insert("AWS::URLSuffix", env.url_suffix());
        values.insert("AWS::StackName", env.stack_name.clone());
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether `name` lives in the pseudo-parameter namespace
    pub fn is_pseudo(name: &str) -> bool {
        name.starts_with(PSEUDO_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_and_partition() {
        let refs = ReferenceMap::new(&DeploymentEnvironment::new("us-west-2", "123456789012"));
        assert_eq!(refs.get("AWS::Region"), Some("us-west-2"));
        assert_eq!(refs.get("AWS::AccountId"), Some("123456789012"));
        assert_eq!(refs.get("AWS::Partition"), Some("aws"));
        assert_eq!(refs.get("AWS::URLSuffix"), Some("amazonaws.com"));
    }

    #[test]
    fn test_partition_derived_for_china_and_govcloud() {
        let cn = DeploymentEnvironment::new("cn-north-1", "1");
        assert_eq!(cn.partition(), "aws-cn");
        assert_eq!(cn.url_suffix(), "amazonaws.com.cn");

        let gov = DeploymentEnvironment::new("us-gov-west-1", "1");
        assert_eq!(gov.partition(), "aws-us-gov");
    }

    #[test]
    fn test_explicit_partition_wins() {
        let mut env = DeploymentEnvironment::new("us-east-1", "1");
        env.partition = Some("aws-iso".into());
        assert_eq!(ReferenceMap::new(&env).get("AWS::Partition"), Some("aws-iso"));
    }

    #[test]
    fn test_unknown_pseudo_parameter() {
        let refs = ReferenceMap::new(&DeploymentEnvironment::default());
        assert!(ReferenceMap::is_pseudo("AWS::NotificationARNs"));
        assert_eq!(refs.get("AWS::NotificationARNs"), None);
    }
}
